//! BeliefSystem: a named, versioned container for a rule set, a fact base,
//! a world state, and its forks.
//!
//! Invariants (violating code paths panic rather than continue with corrupt
//! state):
//!
//! 1. Every statement in the fact base is ground.
//! 2. No two content-equal statements coexist; a statement and its negation
//!    may coexist only in a child spawned by a coexist-family strategy.
//! 3. The causal memo is monotonic: once a `(rule, binding)` pair is
//!    recorded, its effects are never re-applied.
//! 4. Rule set and fact base are append-only within a simulation; forking is
//!    the only way to diverge.

use std::{
    collections::BTreeSet,
    fmt::{self, Display, Formatter},
    sync::Arc,
};

use serde::{Deserialize, Serialize};

use crate::{
    beliefsystem::contradiction::{
        ContradictionEngine, ContradictionRecord, ForkStrategy, TensionReport,
    },
    error::FabricError,
    properties::{Interner, Rule, Statement, Uuid},
    worldstate::WorldState,
};

/// A non-owning note that a child was spawned from this belief system. The
/// child owns its own state; holders traverse the lineage through ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForkRecord {
    pub child_id: Uuid,
    pub strategy: ForkStrategy,
    /// The contradiction that produced the fork; `None` for explicit manual
    /// forks.
    pub contradiction: Option<ContradictionRecord>,
}

#[derive(Debug, Clone)]
pub struct BeliefSystem {
    id: Uuid,
    name: String,
    parent: Option<Uuid>,
    strategy: ForkStrategy,
    pub(crate) rules: Interner<Rule>,
    pub(crate) facts: BTreeSet<Statement>,
    pub(crate) world_state: WorldState,
    /// The causal memo: `(rule_id, binding_id)` pairs already fired.
    pub(crate) memo: BTreeSet<(Uuid, Uuid)>,
    forks: Vec<ForkRecord>,
    tensions: Vec<TensionReport>,
    pub(crate) engine: ContradictionEngine,
}

impl BeliefSystem {
    pub fn new<S: Into<String>>(name: S, strategy: ForkStrategy) -> BeliefSystem {
        let id = Uuid::new_v4();
        let name = name.into();
        tracing::info!(%id, %name, %strategy, "initializing belief system");
        BeliefSystem {
            id,
            name,
            parent: None,
            strategy,
            rules: Interner::new(),
            facts: BTreeSet::new(),
            world_state: WorldState::new(),
            memo: BTreeSet::new(),
            forks: Vec::new(),
            tensions: Vec::new(),
            engine: ContradictionEngine::new(1),
        }
    }

    /// Bound the tension probe's context-rule expansion (default 1 hop).
    pub fn with_tension_hops(mut self, hops: u8) -> BeliefSystem {
        self.engine.max_hops = hops;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<Uuid> {
        self.parent
    }

    pub fn strategy(&self) -> ForkStrategy {
        self.strategy
    }

    /// Append a rule. Content-equal rules are rejected; the rule set is a
    /// content-addressed table and identical logic is a single node.
    pub fn add_rule(&mut self, rule: Rule) -> Result<Uuid, FabricError> {
        let id = rule.id();
        if self.rules.contains(&id) {
            return Err(FabricError::Validation(format!(
                "rule already present: {rule}"
            )));
        }
        tracing::info!(rule = %rule, rule_id = %id, "adding rule");
        self.rules.intern(rule);
        self.refresh_tensions();
        Ok(id)
    }

    /// Spawn an explicit fork, inheriting rules, facts, world state, causal
    /// memo, and (unless overridden) the strategy tag.
    pub fn fork(&mut self, strategy: Option<ForkStrategy>) -> BeliefSystem {
        let child = self.spawn(strategy);
        tracing::info!(parent = %self.id, child = %child.id, "manual fork");
        self.forks.push(ForkRecord {
            child_id: child.id,
            strategy: child.strategy,
            contradiction: None,
        });
        child
    }

    pub(crate) fn spawn(&self, strategy: Option<ForkStrategy>) -> BeliefSystem {
        BeliefSystem {
            id: Uuid::new_v4(),
            name: format!("{} (fork)", self.name),
            parent: Some(self.id),
            strategy: strategy.unwrap_or(self.strategy),
            rules: self.rules.clone(),
            facts: self.facts.clone(),
            world_state: self.world_state.clone(),
            memo: self.memo.clone(),
            forks: Vec::new(),
            tensions: self.tensions.clone(),
            engine: self.engine.clone(),
        }
    }

    pub(crate) fn record_fork(
        &mut self,
        child_id: Uuid,
        strategy: ForkStrategy,
        contradiction: Option<ContradictionRecord>,
    ) {
        self.forks.push(ForkRecord {
            child_id,
            strategy,
            contradiction,
        });
    }

    pub(crate) fn insert_fact(&mut self, statement: Statement) {
        assert!(
            statement.is_ground(),
            "fact base invariant violated: {statement} is not ground"
        );
        self.facts.insert(statement);
    }

    /// Admit a statement known to contradict `existing`, applying the
    /// strategy's priority handling. Only the forking strategies reach this.
    pub(crate) fn admit_conflicting(&mut self, mut statement: Statement, existing: &Statement) {
        assert!(
            statement.is_ground(),
            "fact base invariant violated: {statement} is not ground"
        );
        match self.strategy {
            ForkStrategy::Coexist => {
                self.facts.insert(statement);
            }
            ForkStrategy::PrioritizeNew => {
                let mut disfavored = existing.clone();
                if disfavored.priority >= statement.priority {
                    disfavored.priority = statement.priority - 1;
                }
                self.facts.remove(existing);
                self.facts.insert(disfavored);
                self.facts.insert(statement);
            }
            ForkStrategy::PrioritizeOld => {
                if statement.priority >= existing.priority {
                    statement.priority = existing.priority - 1;
                }
                self.facts.insert(statement);
            }
            ForkStrategy::Preserve => {
                unreachable!("preserve never admits a conflicting statement")
            }
        }
    }

    fn refresh_tensions(&mut self) {
        let rules: Vec<(Uuid, Rule)> = self
            .rules
            .iter()
            .map(|(id, rule)| (*id, rule.as_ref().clone()))
            .collect();
        let context: Vec<Rule> = rules.iter().map(|(_, rule)| rule.clone()).collect();
        self.tensions = self.engine.detect_tensions(&rules, &context);
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    pub fn rules(&self) -> Vec<(Uuid, Arc<Rule>)> {
        self.rules
            .iter()
            .map(|(id, rule)| (*id, rule.clone()))
            .collect()
    }

    pub fn rule(&self, id: &Uuid) -> Option<Arc<Rule>> {
        self.rules.get(id)
    }

    /// The fact base, in content order.
    pub fn facts(&self) -> Vec<Statement> {
        self.facts.iter().cloned().collect()
    }

    pub fn contains_fact(&self, statement: &Statement) -> bool {
        self.facts.contains(statement)
    }

    /// The stored fact content-equal to `statement` (its priority may
    /// differ from the query's).
    pub fn fact(&self, statement: &Statement) -> Option<&Statement> {
        self.facts.get(statement)
    }

    pub fn world_state(&self) -> &WorldState {
        &self.world_state
    }

    pub fn forks(&self) -> &[ForkRecord] {
        &self.forks
    }

    /// Latent rule-level tensions detected proactively. Reports never fork.
    pub fn tensions(&self) -> &[TensionReport] {
        &self.tensions
    }

    /// Size of the causal memo, for observability.
    pub fn memo_len(&self) -> usize {
        self.memo.len()
    }
}

impl Display for BeliefSystem {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(
            f,
            "BeliefSystem({}, {} rules, {} facts, {} forks, {})",
            self.name,
            self.rules.len(),
            self.facts.len(),
            self.forks.len(),
            self.strategy
        )
    }
}
