//! # logic-fabricator
//!
//! A symbolic reasoning playground: define a *belief system* — rules and
//! facts — then *simulate* new statements against it and watch derived
//! consequences, world-state side effects, and contradictions unfold. A
//! contradiction is not an error: it *forks* reality into a child belief
//! system whose relationship to its parent is chosen by a forking strategy.
//!
//! ## Overview
//!
//! The engine is a fixed-point inference loop over ground statements. Rules
//! pair a recursive condition tree (conjunction, existential / universal /
//! counting / negative quantifiers) with statement and effect consequences.
//! A causal memo guarantees each `(rule, binding)` pair fires at most once,
//! making simulation idempotent and guaranteed to terminate.
//!
//! ### Key Features
//!
//! - **Unification with wildcards**: `?x` binds one term, a trailing `*rest`
//!   greedily captures the remainder as a list
//! - **Binding-set evaluation**: conditions evaluate to *sets* of binding
//!   environments, so multi-variable rules fire once per distinct match
//! - **Contradiction forks**: `coexist`, `prioritize_new`, `prioritize_old`,
//!   and `preserve` strategies decide what a contradiction spawns
//! - **Proactive tension reports**: latent rule conflicts detected without
//!   running a simulation
//! - **Canonical persistence**: every simulation lands in a causal graph as
//!   one atomic write, with rules and statements merged by content id
//!
//! ## Quick Start
//!
//! ```rust
//! use logic_fabricator::beliefsystem::{BeliefSystem, ForkStrategy};
//! use logic_fabricator::condition::Condition;
//! use logic_fabricator::properties::{Consequence, Rule, Statement};
//!
//! # fn main() -> Result<(), logic_fabricator::FabricError> {
//! let mut beliefs = BeliefSystem::new("athens", ForkStrategy::Coexist);
//! beliefs.add_rule(Rule::new(
//!     Condition::leaf("is", vec!["?x".into(), "man".into()], false),
//!     vec![Consequence::Statement(Statement::new(
//!         "is",
//!         vec!["?x".into(), "mortal".into()],
//!     ))],
//! ))?;
//!
//! let result = beliefs.simulate(vec![Statement::new(
//!     "is",
//!     vec!["socrates".into(), "man".into()],
//! )])?;
//! assert_eq!(result.derived_facts.len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`properties`]: statements, effects, rules, content-addressed identity
//! - [`condition`]: the condition tree, unifier, and evaluator
//! - [`beliefsystem`]: the façade, the inference engine, and fork semantics
//! - [`worldstate`]: the key-value state mutated by effects
//! - [`codec`]: the IR contract with the external parser, and lowering
//! - [`fabricator`]: the orchestrator tying belief systems to persistence
//! - [`graph`] / [`db`]: the causal-graph persistence adapters
//!
//! The engine is strictly single-threaded and synchronous; only the
//! persistence adapter crosses a concurrency boundary (the `service`
//! feature brings the SQLite adapter).

pub mod beliefsystem;
pub mod codec;
pub mod condition;
pub mod config;
pub mod db;
pub mod error;
pub mod event;
pub mod fabricator;
pub mod graph;
pub mod properties;
pub mod simulation;
pub mod worldstate;

pub use error::*;
