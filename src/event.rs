use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::{
    beliefsystem::ForkStrategy,
    properties::{Rule, Uuid},
    simulation::SimulationRecord,
};

/// A persistence-worthy happening in the fabric.
///
/// The orchestrator emits one event per state change and hands each to the
/// persistence adapter as a single atomic write; adapters never observe
/// partial simulations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FabricEvent {
    /// A root belief system came into existence.
    BeliefSystemCreated {
        id: Uuid,
        name: String,
        strategy: ForkStrategy,
        /// Unix seconds.
        created_at: i64,
    },
    /// A child was spawned, by contradiction or explicitly.
    BeliefSystemForked {
        parent_id: Uuid,
        child_id: Uuid,
        name: String,
        strategy: ForkStrategy,
        created_at: i64,
    },
    /// A rule was appended to a belief system's rule set.
    RuleAdded { belief_system_id: Uuid, rule: Rule },
    /// A simulation ran to quiescence.
    SimulationRecorded(SimulationRecord),
}

impl Display for FabricEvent {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            FabricEvent::BeliefSystemCreated { id, name, .. } => {
                write!(f, "BeliefSystemCreated({name}, {id})")
            }
            FabricEvent::BeliefSystemForked {
                parent_id,
                child_id,
                ..
            } => write!(f, "BeliefSystemForked({parent_id} -> {child_id})"),
            FabricEvent::RuleAdded {
                belief_system_id, ..
            } => write!(f, "RuleAdded({belief_system_id})"),
            FabricEvent::SimulationRecorded(record) => {
                write!(f, "SimulationRecorded({})", record.id)
            }
        }
    }
}
