//! Derivation graph assembled from provenance edges.
//!
//! Nodes are fact symbols, edges are rule applications. The graph only ever
//! grows; edges are recorded as they are logged and never removed.

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Edge types
// ---------------------------------------------------------------------------

/// Coarse cost class assigned when an edge is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostBucket {
    Low,
    Medium,
    High,
}

impl CostBucket {
    /// Bucket a raw rule cost: `< 1.0` low, `< 5.0` medium, the rest high.
    pub fn from_cost(cost: f64) -> Self {
        if cost < 1.0 {
            Self::Low
        } else if cost < 5.0 {
            Self::Medium
        } else {
            Self::High
        }
    }
}

impl std::fmt::Display for CostBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Audit classification of where a derivation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTag {
    UserInput,
    Derived,
    System,
}

impl std::fmt::Display for SourceTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UserInput => write!(f, "user_input"),
            Self::Derived => write!(f, "derived"),
            Self::System => write!(f, "system"),
        }
    }
}

/// One labeled transition in the derivation graph.
///
/// Carries the cost bucket, not the raw cost; the chain log entry recorded
/// alongside the edge is the system of record for exact costs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvenanceEdge {
    pub source: String,
    pub target: String,
    pub rule_id: String,
    pub cost_bucket: CostBucket,
    pub source_tag: SourceTag,
    pub run_id: String,
    pub timestamp: f64,
}

/// Pure read view of the graph: deduplicated symbols plus the full edge list.
#[derive(Debug, Clone, Serialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<String>,
    pub edges: Vec<ProvenanceEdge>,
}

// ---------------------------------------------------------------------------
// Graph
// ---------------------------------------------------------------------------

/// Symbol graph over recorded edges, with ancestry traversal.
#[derive(Debug, Default)]
pub struct DerivationGraph {
    graph: DiGraph<String, String>,
    nodes: HashMap<String, NodeIndex>,
}

impl DerivationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn intern(&mut self, symbol: &str) -> NodeIndex {
        if let Some(&index) = self.nodes.get(symbol) {
            return index;
        }
        let index = self.graph.add_node(symbol.to_string());
        self.nodes.insert(symbol.to_string(), index);
        index
    }

    /// Record one edge. A repeat of an identical (source, target, rule) edge
    /// leaves the graph unchanged.
    pub fn record(&mut self, edge: &ProvenanceEdge) {
        let source = self.intern(&edge.source);
        let target = self.intern(&edge.target);
        let duplicate = self
            .graph
            .edges_connecting(source, target)
            .any(|existing| existing.weight() == &edge.rule_id);
        if !duplicate {
            self.graph.add_edge(source, target, edge.rule_id.clone());
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Every symbol referenced by any edge, sorted.
    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.graph.node_weights().cloned().collect();
        symbols.sort();
        symbols
    }

    /// Transitive ancestors of `symbol`: every symbol that contributed to its
    /// derivation, sorted. Empty for unknown symbols and for roots.
    pub fn lineage_of(&self, symbol: &str) -> Vec<String> {
        let Some(&start) = self.nodes.get(symbol) else {
            return Vec::new();
        };

        let mut visited: HashSet<NodeIndex> = HashSet::new();
        let mut queue: VecDeque<NodeIndex> = VecDeque::new();
        visited.insert(start);
        queue.push_back(start);

        let mut ancestors = Vec::new();
        while let Some(node) = queue.pop_front() {
            for parent in self.graph.neighbors_directed(node, Direction::Incoming) {
                if visited.insert(parent) {
                    ancestors.push(self.graph[parent].clone());
                    queue.push_back(parent);
                }
            }
        }
        ancestors.sort();
        ancestors
    }
}
