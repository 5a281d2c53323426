//! Simulation results and their persisted form.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    beliefsystem::{BeliefSystem, ContradictionRecord},
    condition::Binding,
    properties::{Canonical, Rule, Statement, Uuid},
    worldstate::{ResolvedEffect, WorldState},
};

/// One rule firing: the rule's content id and the binding environment it
/// fired under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedRule {
    pub rule_id: Uuid,
    pub binding: Binding,
}

/// The outcome of one `simulate` call.
///
/// `forked_beliefs` carries the spawned child by value (zero or one
/// elements); the caller decides where it lives. Everything else is a plain
/// record of what happened.
#[derive(Debug, Default)]
pub struct SimulationResult {
    /// Facts added to the fact base, in the order the fixed point derived
    /// them.
    pub derived_facts: Vec<Statement>,
    /// Every `(rule, binding)` firing, in application order.
    pub applied_rules: Vec<AppliedRule>,
    /// World-state mutations, in application order.
    pub effects_applied: Vec<ResolvedEffect>,
    pub world_state_before: WorldState,
    pub world_state_after: WorldState,
    pub contradictions: Vec<ContradictionRecord>,
    pub forked_beliefs: Vec<BeliefSystem>,
}

impl SimulationResult {
    /// Keys whose values changed over the simulation, with old and new
    /// values.
    pub fn world_state_changes(&self) -> BTreeMap<String, (Option<Value>, Option<Value>)> {
        WorldState::diff(&self.world_state_before, &self.world_state_after)
    }
}

/// A rule firing with the full rule body, as persisted: the adapter MERGEs
/// rule nodes by content, so the record must carry the content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedRuleRecord {
    pub rule: Rule,
    pub binding: Binding,
}

impl AppliedRuleRecord {
    pub fn rule_id(&self) -> Uuid {
        self.rule.content_id()
    }
}

/// The immutable, persisted record of one simulation event. Handed to the
/// persistence adapter as a single atomic write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationRecord {
    pub id: Uuid,
    pub belief_system_id: Uuid,
    /// Unix seconds.
    pub timestamp: i64,
    pub introduced_statements: Vec<Statement>,
    pub derived_statements: Vec<Statement>,
    pub applied_rules: Vec<AppliedRuleRecord>,
    pub forked_belief_id: Option<Uuid>,
}
