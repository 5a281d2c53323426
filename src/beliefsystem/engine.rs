//! The fixed-point inference engine.
//!
//! `simulate` admits input statements, then repeatedly evaluates every rule
//! against the fact base, firing each `(rule, binding)` pair at most once
//! (the causal memo), until quiescence. Statement consequences extend the
//! fact base; effect consequences mutate the world state in the
//! deterministic order `(rule_id, binding_id, consequence_index)`.
//!
//! A contradiction hands control to the forking strategy. When a fork is
//! produced, the remainder of the simulation completes inside the child;
//! the parent is not advanced further. Subsequent contradictions within the
//! same run are absorbed by the child per the strategy, so a simulation
//! yields at most one fork.

use crate::{
    beliefsystem::{
        contradiction::{instantiate_template, ContradictionOutcome, ContradictionRecord},
        BeliefSystem,
    },
    condition::{eval, Binding},
    error::FabricError,
    properties::{Consequence, Statement, Uuid},
    simulation::{AppliedRule, SimulationResult},
    worldstate::ResolvedEffect,
};

/// One pending rule application: a `(rule, binding)` pair not yet in the
/// causal memo.
#[derive(Debug, Clone)]
struct Firing {
    rule_id: Uuid,
    binding_id: Uuid,
    binding: Binding,
}

#[derive(Debug, Default)]
struct RunLog {
    derived: Vec<Statement>,
    applied: Vec<AppliedRule>,
    effects: Vec<ResolvedEffect>,
    contradictions: Vec<ContradictionRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Origin {
    Introduced,
    Derived,
}

impl BeliefSystem {
    /// Run one simulation: admit `inputs`, then derive to a fixed point.
    ///
    /// Input statements must be ground; a non-ground input is a validation
    /// error and nothing is mutated.
    #[tracing::instrument(skip_all, fields(belief_system = %self.id()))]
    pub fn simulate(&mut self, inputs: Vec<Statement>) -> Result<SimulationResult, FabricError> {
        for statement in &inputs {
            if !statement.is_ground() {
                return Err(FabricError::Validation(format!(
                    "input statement {statement} is not ground"
                )));
            }
        }
        tracing::info!(inputs = inputs.len(), "starting simulation");

        let world_state_before = self.world_state.clone();
        let mut child: Option<BeliefSystem> = None;
        let mut log = RunLog::default();

        for statement in inputs {
            admit(self, &mut child, &mut log, statement, Origin::Introduced);
        }

        loop {
            let firings = active(self, &child).pending_firings();
            if firings.is_empty() {
                break;
            }
            for firing in firings {
                let target = active_mut(self, &mut child);
                if !target.memo.insert((firing.rule_id, firing.binding_id)) {
                    continue;
                }
                let Some(rule) = active(self, &child).rule(&firing.rule_id) else {
                    continue;
                };
                tracing::debug!(rule = %rule, binding = %firing.binding, "rule fired");
                log.applied.push(AppliedRule {
                    rule_id: firing.rule_id,
                    binding: firing.binding.clone(),
                });
                for consequence in rule.consequences.iter() {
                    match consequence {
                        Consequence::Statement(template) => {
                            let statement = instantiate_template(template, &firing.binding);
                            if !statement.is_ground() {
                                tracing::warn!(
                                    %statement,
                                    "derived statement is not ground; the engine \
                                     does not invent symbols, skipping"
                                );
                                continue;
                            }
                            admit(self, &mut child, &mut log, statement, Origin::Derived);
                        }
                        Consequence::Effect(template) => {
                            let resolved = ResolvedEffect::resolve(template, &firing.binding);
                            active_mut(self, &mut child).world_state.apply(&resolved)?;
                            log.effects.push(resolved);
                        }
                    }
                }
            }
        }

        let world_state_after = active(self, &child).world_state.clone();
        tracing::info!(
            derived = log.derived.len(),
            applied = log.applied.len(),
            effects = log.effects.len(),
            contradictions = log.contradictions.len(),
            forked = child.is_some(),
            "simulation completed"
        );
        Ok(SimulationResult {
            derived_facts: log.derived,
            applied_rules: log.applied,
            effects_applied: log.effects,
            world_state_before,
            world_state_after,
            contradictions: log.contradictions,
            forked_beliefs: child.into_iter().collect(),
        })
    }

    /// Every `(rule, binding)` pair that currently holds and has not yet
    /// fired, sorted by `(rule_id, binding_id)` so application order is
    /// deterministic.
    fn pending_firings(&self) -> Vec<Firing> {
        let facts: Vec<Statement> = self.facts.iter().cloned().collect();
        let mut firings = Vec::new();
        for (rule_id, rule) in self.rules.iter() {
            for binding in eval(&rule.condition, &facts, &Binding::new()) {
                let binding_id = binding.id();
                if !self.memo.contains(&(*rule_id, binding_id)) {
                    firings.push(Firing {
                        rule_id: *rule_id,
                        binding_id,
                        binding,
                    });
                }
            }
        }
        firings.sort_by(|a, b| (a.rule_id, a.binding_id).cmp(&(b.rule_id, b.binding_id)));
        firings
    }
}

/// The belief system the simulation is currently advancing: the child once
/// a fork has occurred, the parent before that.
fn active<'a>(parent: &'a BeliefSystem, child: &'a Option<BeliefSystem>) -> &'a BeliefSystem {
    child.as_ref().unwrap_or(parent)
}

fn active_mut<'a>(
    parent: &'a mut BeliefSystem,
    child: &'a mut Option<BeliefSystem>,
) -> &'a mut BeliefSystem {
    match child {
        Some(c) => c,
        None => parent,
    }
}

/// Admit one ground statement into the active belief system, handling
/// duplicates and contradictions.
fn admit(
    parent: &mut BeliefSystem,
    child: &mut Option<BeliefSystem>,
    log: &mut RunLog,
    statement: Statement,
    origin: Origin,
) {
    let (duplicate, conflict) = {
        let target = active(parent, child);
        (
            target.facts.contains(&statement),
            target.engine.find_conflict(&target.facts, &statement),
        )
    };
    if duplicate {
        tracing::debug!(%statement, "content-equal statement already present, discarding");
        return;
    }
    let Some(existing) = conflict else {
        active_mut(parent, child).insert_fact(statement.clone());
        if origin == Origin::Derived {
            log.derived.push(statement);
        }
        return;
    };

    let strategy = active(parent, child).strategy();
    if !strategy.forks() {
        tracing::info!(%statement, "contradiction under preserve, rejecting statement");
        log.contradictions.push(ContradictionRecord {
            statement_new: statement,
            statement_old: existing,
            strategy,
            outcome: ContradictionOutcome::Rejected,
        });
        return;
    }

    if child.is_none() {
        let record = ContradictionRecord {
            statement_new: statement.clone(),
            statement_old: existing.clone(),
            strategy,
            outcome: ContradictionOutcome::Forked,
        };
        let mut fork = parent.spawn(None);
        tracing::info!(
            parent = %parent.id(),
            child = %fork.id(),
            %statement,
            "contradiction forked a child belief system"
        );
        fork.admit_conflicting(statement.clone(), &existing);
        parent.record_fork(fork.id(), strategy, Some(record.clone()));
        log.contradictions.push(record);
        if origin == Origin::Derived {
            log.derived.push(statement);
        }
        *child = Some(fork);
    } else {
        let target = child.as_mut().expect("fork exists on this path");
        tracing::info!(%statement, "contradiction absorbed by the forked child");
        target.admit_conflicting(statement.clone(), &existing);
        log.contradictions.push(ContradictionRecord {
            statement_new: statement.clone(),
            statement_old: existing,
            strategy,
            outcome: ContradictionOutcome::Absorbed,
        });
        if origin == Origin::Derived {
            log.derived.push(statement);
        }
    }
}
