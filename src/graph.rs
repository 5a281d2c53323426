//! The in-memory causal graph and the [`MemoryAdapter`].
//!
//! Every simulation leaves an immutable trail: belief systems, rules,
//! statements, and simulation events as canonical nodes, with typed edges
//! (`CONTAINS`, `FORKED_FROM`, `USED`, `INTRODUCED`, `APPLIED_RULE`,
//! `DERIVED_FACT`) between them. Rules and statements are merged by content
//! id, so identical logic is a single node across the whole graph.
//!
//! [`MemoryAdapter`] implements the persistence contract against this graph
//! for tests and workbench sessions that run without a database.

use std::{
    collections::BTreeMap,
    sync::Mutex,
};

use petgraph::{graph::NodeIndex, visit::EdgeRef, Direction, Graph};
use serde::{Deserialize, Serialize};

use crate::{
    beliefsystem::ForkStrategy,
    condition::Binding,
    db::DatabaseAdapter,
    error::FabricError,
    properties::{Canonical, Rule, Statement, Uuid},
    simulation::SimulationRecord,
};

/// A canonical node in the causal graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CausalNode {
    BeliefSystem {
        id: Uuid,
        name: String,
        strategy: ForkStrategy,
        created_at: i64,
    },
    Rule(Rule),
    Statement(Statement),
    Simulation {
        id: Uuid,
        timestamp: i64,
        forked_belief_id: Option<Uuid>,
    },
}

/// A typed relationship between causal nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CausalEdge {
    /// BeliefSystem -> Rule
    Contains,
    /// child BeliefSystem -> parent BeliefSystem
    ForkedFrom,
    /// Simulation -> BeliefSystem
    Used,
    /// Simulation -> Statement
    Introduced,
    /// Simulation -> Rule, annotated with the firing binding
    AppliedRule(Binding),
    /// Simulation -> Statement
    DerivedFact,
}

/// A directed graph of canonical nodes, indexed by id for merge semantics.
#[derive(Debug, Clone, Default)]
pub struct CausalGraph {
    graph: Graph<CausalNode, CausalEdge>,
    index: BTreeMap<Uuid, NodeIndex>,
}

impl CausalGraph {
    pub fn new() -> CausalGraph {
        CausalGraph::default()
    }

    /// Insert-or-match a node by id. Equal content is a single node.
    pub fn merge_node<F>(&mut self, id: Uuid, make: F) -> NodeIndex
    where
        F: FnOnce() -> CausalNode,
    {
        match self.index.get(&id) {
            Some(idx) => *idx,
            None => {
                let idx = self.graph.add_node(make());
                self.index.insert(id, idx);
                idx
            }
        }
    }

    /// Add an edge unless an equal edge already links the pair.
    pub fn merge_edge(&mut self, source: NodeIndex, sink: NodeIndex, edge: CausalEdge) {
        let exists = self
            .graph
            .edges_connecting(source, sink)
            .any(|e| *e.weight() == edge);
        if !exists {
            self.graph.add_edge(source, sink, edge);
        }
    }

    pub fn node(&self, id: &Uuid) -> Option<&CausalNode> {
        self.index.get(id).map(|idx| &self.graph[*idx])
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Ids of the simulations that `USED` the given belief system.
    pub fn simulations_for(&self, belief_system_id: &Uuid) -> Vec<Uuid> {
        let Some(bs_idx) = self.index.get(belief_system_id) else {
            return Vec::new();
        };
        let mut simulations: Vec<(i64, Uuid)> = self
            .graph
            .edges_directed(*bs_idx, Direction::Incoming)
            .filter(|e| matches!(e.weight(), CausalEdge::Used))
            .filter_map(|e| match &self.graph[e.source()] {
                CausalNode::Simulation { id, timestamp, .. } => Some((*timestamp, *id)),
                _ => None,
            })
            .collect();
        simulations.sort();
        simulations.into_iter().map(|(_, id)| id).collect()
    }

    /// The fork lineage below a belief system, as `(parent, child)` pairs.
    pub fn lineage(&self, root: &Uuid) -> Vec<(Uuid, Uuid)> {
        let Some(root_idx) = self.index.get(root) else {
            return Vec::new();
        };
        let mut pairs = Vec::new();
        let mut stack = vec![*root_idx];
        while let Some(parent_idx) = stack.pop() {
            let CausalNode::BeliefSystem { id: parent_id, .. } = self.graph[parent_idx] else {
                continue;
            };
            for edge in self.graph.edges_directed(parent_idx, Direction::Incoming) {
                if !matches!(edge.weight(), CausalEdge::ForkedFrom) {
                    continue;
                }
                if let CausalNode::BeliefSystem { id: child_id, .. } = self.graph[edge.source()] {
                    pairs.push((parent_id, child_id));
                    stack.push(edge.source());
                }
            }
        }
        pairs.sort();
        pairs
    }
}

/// An in-process persistence adapter over a [`CausalGraph`].
///
/// Each operation takes the graph lock once, so a simulation record lands
/// atomically. Simulation records are retained verbatim for history
/// queries; the graph carries the merged causal structure.
#[derive(Debug, Default)]
pub struct MemoryAdapter {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    graph: CausalGraph,
    records: Vec<SimulationRecord>,
}

impl MemoryAdapter {
    pub fn new() -> MemoryAdapter {
        MemoryAdapter::default()
    }

    /// Snapshot the causal graph for inspection.
    pub fn graph(&self) -> CausalGraph {
        self.state.lock().expect("memory adapter lock").graph.clone()
    }
}

impl DatabaseAdapter for MemoryAdapter {
    async fn create_belief_system(
        &self,
        id: Uuid,
        name: &str,
        strategy: ForkStrategy,
        created_at: i64,
    ) -> Result<(), FabricError> {
        let mut state = self.state.lock().expect("memory adapter lock");
        state.graph.merge_node(id, || CausalNode::BeliefSystem {
            id,
            name: name.to_string(),
            strategy,
            created_at,
        });
        Ok(())
    }

    async fn fork_belief_system(
        &self,
        parent_id: Uuid,
        child_id: Uuid,
        name: &str,
        strategy: ForkStrategy,
        created_at: i64,
    ) -> Result<(), FabricError> {
        let mut state = self.state.lock().expect("memory adapter lock");
        let parent_idx = state.graph.index.get(&parent_id).copied().ok_or_else(|| {
            FabricError::NotFound(format!("parent belief system {parent_id} is not persisted"))
        })?;
        let child_idx = state.graph.merge_node(child_id, || CausalNode::BeliefSystem {
            id: child_id,
            name: name.to_string(),
            strategy,
            created_at,
        });
        state
            .graph
            .merge_edge(child_idx, parent_idx, CausalEdge::ForkedFrom);
        Ok(())
    }

    async fn add_rule(&self, belief_system_id: Uuid, rule: &Rule) -> Result<(), FabricError> {
        let mut state = self.state.lock().expect("memory adapter lock");
        let bs_idx = state
            .graph
            .index
            .get(&belief_system_id)
            .copied()
            .ok_or_else(|| {
                FabricError::NotFound(format!(
                    "belief system {belief_system_id} is not persisted"
                ))
            })?;
        let rule_idx = state
            .graph
            .merge_node(rule.id(), || CausalNode::Rule(rule.clone()));
        state.graph.merge_edge(bs_idx, rule_idx, CausalEdge::Contains);
        Ok(())
    }

    async fn record_simulation(&self, record: &SimulationRecord) -> Result<(), FabricError> {
        let mut state = self.state.lock().expect("memory adapter lock");
        let sim_idx = state.graph.merge_node(record.id, || CausalNode::Simulation {
            id: record.id,
            timestamp: record.timestamp,
            forked_belief_id: record.forked_belief_id,
        });
        let bs_idx = state
            .graph
            .index
            .get(&record.belief_system_id)
            .copied()
            .ok_or_else(|| {
                FabricError::NotFound(format!(
                    "belief system {} is not persisted",
                    record.belief_system_id
                ))
            })?;
        state.graph.merge_edge(sim_idx, bs_idx, CausalEdge::Used);
        for statement in &record.introduced_statements {
            let idx = state
                .graph
                .merge_node(statement.content_id(), || {
                    CausalNode::Statement(statement.clone())
                });
            state.graph.merge_edge(sim_idx, idx, CausalEdge::Introduced);
        }
        for statement in &record.derived_statements {
            let idx = state
                .graph
                .merge_node(statement.content_id(), || {
                    CausalNode::Statement(statement.clone())
                });
            state.graph.merge_edge(sim_idx, idx, CausalEdge::DerivedFact);
        }
        for applied in &record.applied_rules {
            let idx = state
                .graph
                .merge_node(applied.rule_id(), || CausalNode::Rule(applied.rule.clone()));
            state
                .graph
                .merge_edge(sim_idx, idx, CausalEdge::AppliedRule(applied.binding.clone()));
        }
        state.records.push(record.clone());
        Ok(())
    }

    async fn get_simulation_history(
        &self,
        belief_system_id: Uuid,
    ) -> Result<Vec<SimulationRecord>, FabricError> {
        let state = self.state.lock().expect("memory adapter lock");
        let mut history: Vec<SimulationRecord> = state
            .records
            .iter()
            .filter(|r| r.belief_system_id == belief_system_id)
            .cloned()
            .collect();
        history.sort_by_key(|r| r.timestamp);
        Ok(history)
    }
}
