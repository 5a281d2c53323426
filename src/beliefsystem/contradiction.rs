//! Contradiction detection and the forking strategies.
//!
//! A contradiction is the coexistence of content-equal statements with
//! opposite negation flags. It is an outcome, not an error: the active
//! [`ForkStrategy`] decides whether it spawns a child belief system,
//! re-weights priorities, or rejects the incoming statement.
//!
//! The [`ContradictionEngine`] also performs proactive, best-effort *tension*
//! detection between rules: latent conflicts reported without running any
//! simulation.

use std::{
    collections::BTreeSet,
    fmt::{self, Display, Formatter},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::{
    condition::{eval, Binding, Condition},
    error::FabricError,
    properties::{is_variable, is_wildcard, Consequence, Rule, Statement, Uuid},
};

/// Entity substituted for condition variables when probing rules for latent
/// tension.
const HYPOTHETICAL_ENTITY: &str = "_hypothetical_";

/// How a belief system responds to a contradiction.
///
/// A closed set by design: adding a strategy is a language-level change, so
/// this is a plain sum type rather than a strategy object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForkStrategy {
    /// Fork; the child holds both the statement and its negation.
    #[default]
    Coexist,
    /// Fork; the prior statement is down-weighted in the child.
    PrioritizeNew,
    /// Fork; the incoming statement is recorded but down-weighted.
    PrioritizeOld,
    /// No fork; the incoming statement is rejected and the parent is
    /// unchanged.
    Preserve,
}

impl ForkStrategy {
    pub fn forks(&self) -> bool {
        !matches!(self, ForkStrategy::Preserve)
    }
}

impl FromStr for ForkStrategy {
    type Err = FabricError;

    fn from_str(s: &str) -> Result<ForkStrategy, FabricError> {
        match s {
            "coexist" => Ok(ForkStrategy::Coexist),
            "prioritize_new" => Ok(ForkStrategy::PrioritizeNew),
            "prioritize_old" => Ok(ForkStrategy::PrioritizeOld),
            "preserve" => Ok(ForkStrategy::Preserve),
            other => Err(FabricError::Validation(format!(
                "unknown forking strategy '{other}'"
            ))),
        }
    }
}

impl Display for ForkStrategy {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            ForkStrategy::Coexist => write!(f, "coexist"),
            ForkStrategy::PrioritizeNew => write!(f, "prioritize_new"),
            ForkStrategy::PrioritizeOld => write!(f, "prioritize_old"),
            ForkStrategy::Preserve => write!(f, "preserve"),
        }
    }
}

/// What became of a detected contradiction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContradictionOutcome {
    /// A child belief system was spawned to hold the conflicting statement.
    Forked,
    /// The incoming statement was rejected (`preserve`).
    Rejected,
    /// The conflict arose inside an already-forked child and was admitted
    /// there per the strategy, without forking again.
    Absorbed,
}

/// A concrete statement-level contradiction observed during simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContradictionRecord {
    pub statement_new: Statement,
    pub statement_old: Statement,
    pub strategy: ForkStrategy,
    pub outcome: ContradictionOutcome,
}

impl Display for ContradictionRecord {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(
            f,
            "{} vs {} [{} -> {:?}]",
            self.statement_new, self.statement_old, self.strategy, self.outcome
        )
    }
}

/// A latent conflict between two rules: under the witness binding, their
/// consequences would yield a statement and its negation if both conditions
/// were satisfied. Reported only; tensions never fork.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensionReport {
    pub rule_a: Uuid,
    pub rule_b: Uuid,
    pub witness: Binding,
}

/// Statement-level contradiction checks and the proactive rule-tension
/// probe.
#[derive(Debug, Clone, Default)]
pub struct ContradictionEngine {
    /// How many hops through context rules the tension probe expands before
    /// giving up. One hop covers chains like `is ?x penguin => is ?x bird`.
    pub max_hops: u8,
}

impl ContradictionEngine {
    pub fn new(max_hops: u8) -> ContradictionEngine {
        ContradictionEngine { max_hops }
    }

    /// Two statements contradict when their content triples differ only in
    /// the negation flag.
    pub fn detect(&self, s1: &Statement, s2: &Statement) -> bool {
        s1.verb == s2.verb && s1.terms == s2.terms && s1.negated != s2.negated
    }

    /// The existing fact contradicted by `statement`, if any.
    pub fn find_conflict<'a, I>(&self, facts: I, statement: &Statement) -> Option<Statement>
    where
        I: IntoIterator<Item = &'a Statement>,
    {
        let negation = statement.negation();
        facts.into_iter().find(|fact| **fact == negation).cloned()
    }

    /// Report every pair of rules whose consequences would contradict if
    /// their conditions were simultaneously satisfiable.
    ///
    /// Detection is deliberately best-effort: each pair is probed both ways
    /// by instantiating one rule's condition over a hypothetical entity,
    /// expanding the resulting facts at most [`ContradictionEngine::max_hops`]
    /// passes through the context rules, and checking whether both rules
    /// fire with conflicting statement consequences.
    pub fn detect_tensions(
        &self,
        rules: &[(Uuid, Rule)],
        context_rules: &[Rule],
    ) -> Vec<TensionReport> {
        let mut reports = Vec::new();
        for (i, (id_a, rule_a)) in rules.iter().enumerate() {
            for (id_b, rule_b) in rules.iter().skip(i + 1) {
                let witness = self
                    .one_way_conflict(rule_a, rule_b, context_rules)
                    .or_else(|| self.one_way_conflict(rule_b, rule_a, context_rules));
                if let Some(witness) = witness {
                    tracing::warn!(
                        rule_a = %id_a,
                        rule_b = %id_b,
                        %witness,
                        "latent tension detected between rules"
                    );
                    reports.push(TensionReport {
                        rule_a: *id_a,
                        rule_b: *id_b,
                        witness,
                    });
                }
            }
        }
        reports
    }

    /// Check whether satisfying `rule_b`'s condition can lead to a state
    /// conflicting with `rule_a`. Returns the witness binding on conflict.
    fn one_way_conflict(
        &self,
        rule_a: &Rule,
        rule_b: &Rule,
        context_rules: &[Rule],
    ) -> Option<Binding> {
        let hypotheticals = hypothetical_statements(&rule_b.condition);
        if hypotheticals.is_empty() {
            return None;
        }
        let facts = self.expand_hypotheticals(hypotheticals, context_rules);

        let envs_a = eval(&rule_a.condition, &facts, &Binding::new());
        let envs_b = eval(&rule_b.condition, &facts, &Binding::new());

        for env_a in &envs_a {
            for env_b in &envs_b {
                for con_a in &rule_a.consequences {
                    let Consequence::Statement(template_a) = con_a else {
                        continue;
                    };
                    let resolved_a = instantiate_template(template_a, env_a);
                    for con_b in &rule_b.consequences {
                        let Consequence::Statement(template_b) = con_b else {
                            continue;
                        };
                        let resolved_b = instantiate_template(template_b, env_b);
                        if self.detect(&resolved_a, &resolved_b) {
                            let mut witness = env_a.clone();
                            for (var, value) in env_b.iter() {
                                witness.bind(var, value.clone());
                            }
                            return Some(witness);
                        }
                    }
                }
            }
        }
        None
    }

    /// Run a bounded, effect-free inference chain over the context rules to
    /// see what the hypothetical facts entail.
    fn expand_hypotheticals(
        &self,
        initial: Vec<Statement>,
        context_rules: &[Rule],
    ) -> Vec<Statement> {
        let mut facts: BTreeSet<Statement> = initial.into_iter().collect();
        for _hop in 0..self.max_hops {
            let snapshot: Vec<Statement> = facts.iter().cloned().collect();
            let mut inferred = Vec::new();
            for rule in context_rules {
                for env in eval(&rule.condition, &snapshot, &Binding::new()) {
                    for consequence in &rule.consequences {
                        if let Consequence::Statement(template) = consequence {
                            let statement = instantiate_template(template, &env);
                            if statement.is_ground() && !facts.contains(&statement) {
                                inferred.push(statement);
                            }
                        }
                    }
                }
            }
            if inferred.is_empty() {
                break;
            }
            facts.extend(inferred);
        }
        facts.into_iter().collect()
    }
}

/// Substitute a statement template under a binding. Unbound variables pass
/// through unchanged (leaving the result non-ground).
pub fn instantiate_template(template: &Statement, binding: &Binding) -> Statement {
    Statement {
        verb: template.verb.clone(),
        terms: template
            .terms
            .iter()
            .map(|term| binding.resolve_term(term))
            .collect(),
        negated: template.negated,
        priority: template.priority,
    }
}

/// Ground every leaf of a condition over the hypothetical entity, producing
/// the statements that would satisfy it. Quantified branches contribute
/// nothing; the probe stays best-effort.
fn hypothetical_statements(condition: &Condition) -> Vec<Statement> {
    match condition {
        Condition::Leaf {
            verb,
            terms,
            negated,
        } => {
            if terms.iter().any(|t| is_wildcard(t)) {
                return Vec::new();
            }
            if !terms.iter().any(|t| is_variable(t)) {
                // No variable to ground; only worth probing if already ground.
                let statement = Statement {
                    verb: verb.clone(),
                    terms: terms.clone(),
                    negated: *negated,
                    priority: 0,
                };
                return vec![statement];
            }
            let grounded = terms
                .iter()
                .map(|t| {
                    if is_variable(t) {
                        HYPOTHETICAL_ENTITY.to_string()
                    } else {
                        t.clone()
                    }
                })
                .collect();
            vec![Statement {
                verb: verb.clone(),
                terms: grounded,
                negated: *negated,
                priority: 0,
            }]
        }
        Condition::And { children } => children
            .iter()
            .flat_map(hypothetical_statements)
            .collect(),
        _ => Vec::new(),
    }
}
