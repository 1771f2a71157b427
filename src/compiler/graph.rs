use crate::error::GraphViolation;
use crate::workflow::{BranchTag, EdgeDefinition, Node};
use ahash::AHashMap;
use petgraph::graph::DiGraph;
use petgraph::visit::EdgeRef;

pub use petgraph::graph::NodeIndex;

/// An outgoing edge as seen from its source node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub target: NodeIndex,
    pub branch: BranchTag,
}

/// The resolved workflow: nodes in declaration order, edges weighted by the
/// slot they fill.
#[derive(Debug, Clone)]
pub struct WorkflowGraph {
    graph: DiGraph<Node, BranchTag>,
    index: AHashMap<String, NodeIndex>,
}

impl WorkflowGraph {
    /// Builds the graph. Edges whose endpoints do not exist and repeated node
    /// ids are reported as violations and left out of the graph.
    pub fn build(nodes: Vec<Node>, edges: &[EdgeDefinition]) -> (Self, Vec<GraphViolation>) {
        let mut violations = Vec::new();
        let mut graph = DiGraph::with_capacity(nodes.len(), edges.len());
        let mut index = AHashMap::new();
        for node in nodes {
            let id = node.id.clone();
            let position = graph.add_node(node);
            if index.contains_key(&id) {
                violations.push(GraphViolation {
                    node_id: id,
                    edge: None,
                    reason: "duplicate node id".to_string(),
                });
            } else {
                index.insert(id, position);
            }
        }

        for edge in edges {
            let from = index.get(&edge.from).copied();
            let to = index.get(&edge.to).copied();
            match (from, to) {
                (Some(from), Some(to)) => {
                    graph.add_edge(from, to, edge.branch);
                }
                (None, _) => violations.push(GraphViolation {
                    node_id: edge.from.clone(),
                    edge: Some(edge.to_string()),
                    reason: format!("source node '{}' does not exist", edge.from),
                }),
                (Some(_), None) => violations.push(GraphViolation {
                    node_id: edge.from.clone(),
                    edge: Some(edge.to_string()),
                    reason: format!("target node '{}' does not exist", edge.to),
                }),
            }
        }

        (Self { graph, index }, violations)
    }

    /// The underlying petgraph graph, for traversals.
    pub fn graph(&self) -> &DiGraph<Node, BranchTag> {
        &self.graph
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn find(&self, id: &str) -> Option<NodeIndex> {
        self.index.get(id).copied()
    }

    pub fn node(&self, index: NodeIndex) -> &Node {
        &self.graph[index]
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeIndex, &Node)> {
        self.graph.node_indices().map(|i| (i, &self.graph[i]))
    }

    /// Outgoing edges of `index` in declaration order.
    pub fn edges(&self, index: NodeIndex) -> Vec<Edge> {
        let mut edges: Vec<_> = self.graph.edges(index).collect();
        // petgraph walks outgoing edges newest first.
        edges.sort_by_key(|e| e.id());
        edges
            .into_iter()
            .map(|e| Edge {
                target: e.target(),
                branch: *e.weight(),
            })
            .collect()
    }

    /// Tags of every edge running from `from` to `to`, in declaration order.
    pub fn branches_between(&self, from: NodeIndex, to: NodeIndex) -> Vec<BranchTag> {
        let mut edges: Vec<_> = self.graph.edges_connecting(from, to).collect();
        edges.sort_by_key(|e| e.id());
        edges.into_iter().map(|e| *e.weight()).collect()
    }

    /// The target of the first outgoing edge carrying `branch`.
    pub fn successor(&self, index: NodeIndex, branch: BranchTag) -> Option<NodeIndex> {
        self.edges(index)
            .into_iter()
            .find(|e| e.branch == branch)
            .map(|e| e.target)
    }

    /// Declaration position of a node id, used to order diagnostics.
    pub fn position(&self, id: &str) -> usize {
        self.find(id).map(|i| i.index()).unwrap_or(self.len())
    }
}

