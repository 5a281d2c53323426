//! The Fabricator: orchestrates belief systems and their persistence.
//!
//! Owns a registry of live belief systems keyed by id and a
//! [`DatabaseAdapter`]. Every operation performs the in-memory change
//! first, then hands the corresponding [`FabricEvent`] to the adapter as
//! one atomic write. Persistence failures propagate while the in-memory
//! state stays valid, so a caller may retry against a healthy adapter.

use std::{
    collections::BTreeMap,
    time::{SystemTime, UNIX_EPOCH},
};

use crate::{
    beliefsystem::{BeliefSystem, ForkStrategy},
    config::FabricConfig,
    db::DatabaseAdapter,
    error::FabricError,
    event::FabricEvent,
    properties::{Rule, Statement, Uuid},
    simulation::{AppliedRuleRecord, SimulationRecord, SimulationResult},
};

pub struct Fabricator<A: DatabaseAdapter> {
    adapter: A,
    config: FabricConfig,
    belief_systems: BTreeMap<Uuid, BeliefSystem>,
}

impl<A: DatabaseAdapter> Fabricator<A> {
    pub fn new(adapter: A, config: FabricConfig) -> Fabricator<A> {
        Fabricator {
            adapter,
            config,
            belief_systems: BTreeMap::new(),
        }
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn config(&self) -> &FabricConfig {
        &self.config
    }

    pub fn belief_system(&self, id: &Uuid) -> Option<&BeliefSystem> {
        self.belief_systems.get(id)
    }

    pub fn belief_systems(&self) -> impl Iterator<Item = &BeliefSystem> {
        self.belief_systems.values()
    }

    fn require(&mut self, id: &Uuid) -> Result<&mut BeliefSystem, FabricError> {
        self.belief_systems
            .get_mut(id)
            .ok_or_else(|| FabricError::NotFound(format!("belief system {id} is not registered")))
    }

    /// Create and persist a root belief system.
    pub async fn create_belief_system(
        &mut self,
        name: &str,
        strategy: Option<ForkStrategy>,
    ) -> Result<Uuid, FabricError> {
        let strategy = strategy.unwrap_or(self.config.default_strategy);
        let bs = BeliefSystem::new(name, strategy).with_tension_hops(self.config.tension_hops);
        let id = bs.id();
        let event = FabricEvent::BeliefSystemCreated {
            id,
            name: name.to_string(),
            strategy,
            created_at: unix_now(),
        };
        self.belief_systems.insert(id, bs);
        self.dispatch(&event).await?;
        Ok(id)
    }

    /// Append a rule to a registered belief system and persist it.
    pub async fn add_rule(
        &mut self,
        belief_system_id: Uuid,
        rule: Rule,
    ) -> Result<Uuid, FabricError> {
        let bs = self.require(&belief_system_id)?;
        let rule_id = bs.add_rule(rule.clone())?;
        self.dispatch(&FabricEvent::RuleAdded {
            belief_system_id,
            rule,
        })
        .await?;
        Ok(rule_id)
    }

    /// Explicitly fork a registered belief system; the child joins the
    /// registry.
    pub async fn fork_belief_system(
        &mut self,
        parent_id: Uuid,
        strategy: Option<ForkStrategy>,
    ) -> Result<Uuid, FabricError> {
        let parent = self.require(&parent_id)?;
        let child = parent.fork(strategy);
        let event = FabricEvent::BeliefSystemForked {
            parent_id,
            child_id: child.id(),
            name: child.name().to_string(),
            strategy: child.strategy(),
            created_at: unix_now(),
        };
        let child_id = child.id();
        self.belief_systems.insert(child_id, child);
        self.dispatch(&event).await?;
        Ok(child_id)
    }

    /// Run a simulation, register any fork it produced, and persist the
    /// whole event. Returns the persisted record alongside the in-memory
    /// result (whose `forked_beliefs` have moved into the registry).
    pub async fn simulate(
        &mut self,
        belief_system_id: Uuid,
        statements: Vec<Statement>,
    ) -> Result<(SimulationRecord, SimulationResult), FabricError> {
        let bs = self.require(&belief_system_id)?;
        let mut result = bs.simulate(statements.clone())?;

        let fork_event = result.forked_beliefs.first().map(|child| {
            FabricEvent::BeliefSystemForked {
                parent_id: belief_system_id,
                child_id: child.id(),
                name: child.name().to_string(),
                strategy: child.strategy(),
                created_at: unix_now(),
            }
        });
        let forked_belief_id = result.forked_beliefs.first().map(|child| child.id());
        for child in result.forked_beliefs.drain(..) {
            self.belief_systems.insert(child.id(), child);
        }

        let applied_rules = result
            .applied_rules
            .iter()
            .filter_map(|applied| {
                let owner = match forked_belief_id {
                    Some(child_id) => self
                        .belief_systems
                        .get(&child_id)
                        .and_then(|child| child.rule(&applied.rule_id))
                        .or_else(|| {
                            self.belief_systems
                                .get(&belief_system_id)
                                .and_then(|bs| bs.rule(&applied.rule_id))
                        }),
                    None => self
                        .belief_systems
                        .get(&belief_system_id)
                        .and_then(|bs| bs.rule(&applied.rule_id)),
                };
                owner.map(|rule| AppliedRuleRecord {
                    rule: rule.as_ref().clone(),
                    binding: applied.binding.clone(),
                })
            })
            .collect();

        let record = SimulationRecord {
            id: Uuid::new_v4(),
            belief_system_id,
            timestamp: unix_now(),
            introduced_statements: statements,
            derived_statements: result.derived_facts.clone(),
            applied_rules,
            forked_belief_id,
        };

        if let Some(event) = fork_event {
            self.dispatch(&event).await?;
        }
        self.dispatch(&FabricEvent::SimulationRecorded(record.clone()))
            .await?;
        Ok((record, result))
    }

    pub async fn get_simulation_history(
        &self,
        belief_system_id: Uuid,
    ) -> Result<Vec<SimulationRecord>, FabricError> {
        self.adapter.get_simulation_history(belief_system_id).await
    }

    /// Hand one fabric event to the persistence adapter.
    async fn dispatch(&self, event: &FabricEvent) -> Result<(), FabricError> {
        tracing::debug!(%event, "dispatching fabric event");
        match event {
            FabricEvent::BeliefSystemCreated {
                id,
                name,
                strategy,
                created_at,
            } => {
                self.adapter
                    .create_belief_system(*id, name, *strategy, *created_at)
                    .await
            }
            FabricEvent::BeliefSystemForked {
                parent_id,
                child_id,
                name,
                strategy,
                created_at,
            } => {
                self.adapter
                    .fork_belief_system(*parent_id, *child_id, name, *strategy, *created_at)
                    .await
            }
            FabricEvent::RuleAdded {
                belief_system_id,
                rule,
            } => self.adapter.add_rule(*belief_system_id, rule).await,
            FabricEvent::SimulationRecorded(record) => {
                self.adapter.record_simulation(record).await
            }
        }
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
