//! Structural re-validation of a resolved workflow graph.
//!
//! Every check runs and every problem is collected; the result lists them in
//! node declaration order. The graph is never repaired.

use super::graph::{NodeIndex, WorkflowGraph};
use crate::error::{CompileError, GraphViolation};
use crate::workflow::{BranchTag, NodeKind};
use ahash::AHashSet;
use petgraph::visit::{Dfs, DfsEvent, depth_first_search};

pub(super) struct Validator<'a> {
    graph: &'a WorkflowGraph,
    allow_merging: bool,
    violations: Vec<GraphViolation>,
}

impl<'a> Validator<'a> {
    pub(super) fn new(graph: &'a WorkflowGraph, allow_merging: bool) -> Self {
        Self {
            graph,
            allow_merging,
            violations: Vec::new(),
        }
    }

    /// Runs all checks on top of the violations found while building the
    /// arena and returns the entry node when none were found.
    pub(super) fn validate(
        mut self,
        entry_node_id: &str,
        build_violations: Vec<GraphViolation>,
    ) -> Result<NodeIndex, CompileError> {
        self.violations = build_violations;

        let entry = match self.graph.find(entry_node_id) {
            Some(index) if matches!(self.graph.node(index).kind, NodeKind::Start) => Some(index),
            Some(index) => {
                let kind = self.graph.node(index).kind.tag();
                self.report(index, None, format!("entry node must be a Start node, found {}", kind));
                None
            }
            None => {
                self.violations.push(GraphViolation {
                    node_id: entry_node_id.to_string(),
                    edge: None,
                    reason: "entry node does not exist".to_string(),
                });
                None
            }
        };

        for (index, _) in self.graph.nodes() {
            self.check_branch_tags(index);
        }

        if let Some(entry) = entry {
            self.check_reachability(entry);
            self.check_cycles(entry);
            if !self.allow_merging {
                self.check_shared_continuations(entry);
            }
        }

        match entry {
            Some(entry) if self.violations.is_empty() => Ok(entry),
            _ => {
                let graph = self.graph;
                let mut violations = self.violations;
                violations.sort_by_key(|v| graph.position(&v.node_id));
                log::debug!("graph validation found {} violation(s)", violations.len());
                Err(CompileError::MalformedGraph { violations })
            }
        }
    }

    fn report(&mut self, index: NodeIndex, edge: Option<String>, reason: impl Into<String>) {
        self.violations.push(GraphViolation {
            node_id: self.graph.node(index).id.clone(),
            edge,
            reason: reason.into(),
        });
    }

    fn describe_edge(&self, from: NodeIndex, target: NodeIndex, branch: BranchTag) -> String {
        format!(
            "{} -[{}]-> {}",
            self.graph.node(from).id,
            branch,
            self.graph.node(target).id
        )
    }

    /// Checks that each node carries exactly the outgoing tags its kind requires.
    fn check_branch_tags(&mut self, index: NodeIndex) {
        let node = self.graph.node(index);
        let edges = self.graph.edges(index);

        let (required, optional): (Vec<BranchTag>, Vec<BranchTag>) = match &node.kind {
            NodeKind::Start
            | NodeKind::Agent(_)
            | NodeKind::FunctionTool(_)
            | NodeKind::Transform(_)
            | NodeKind::SetState(_)
            | NodeKind::FileSearch(_)
            | NodeKind::McpTool(_) => (vec![], vec![BranchTag::None]),
            NodeKind::Guardrail(_) => (vec![], vec![BranchTag::None, BranchTag::False]),
            NodeKind::If(config) => {
                if config.cases.is_empty() {
                    self.report(index, None, "If node declares no cases");
                }
                let mut required: Vec<BranchTag> =
                    (0..config.cases.len() as u32).map(BranchTag::Case).collect();
                required.push(BranchTag::False);
                (required, vec![])
            }
            NodeKind::While(_) => (vec![BranchTag::LoopBody, BranchTag::LoopExit], vec![]),
            NodeKind::UserApproval(_) => (vec![BranchTag::Approve, BranchTag::Reject], vec![]),
            NodeKind::End(_) => (vec![], vec![]),
        };

        let is_if = matches!(node.kind, NodeKind::If(_));
        // `true` fills the `case0` slot of an If.
        let slot = |tag: BranchTag| match tag.case_index() {
            Some(n) if is_if => BranchTag::Case(n),
            _ => tag,
        };

        let mut seen: AHashSet<BranchTag> = AHashSet::new();
        let mut found = Vec::new();
        for edge in &edges {
            let tag = slot(edge.branch);
            let described = self.describe_edge(index, edge.target, edge.branch);
            if !required.contains(&tag) && !optional.contains(&tag) {
                let kind = self.graph.node(index).kind.tag();
                found.push((
                    Some(described),
                    format!("branch tag '{}' is not valid on a {} node", edge.branch, kind),
                ));
            } else if !seen.insert(tag) {
                found.push((Some(described), format!("duplicate '{}' branch", tag)));
            }
        }
        for tag in &required {
            if !seen.contains(tag) {
                found.push((None, format!("missing '{}' branch", tag)));
            }
        }

        if is_if {
            if let Some(position) = edges.iter().position(|e| e.branch == BranchTag::False) {
                if position + 1 != edges.len() {
                    let edge = edges[position];
                    let described = self.describe_edge(index, edge.target, edge.branch);
                    found.push((
                        Some(described),
                        "the else branch must be declared last".to_string(),
                    ));
                }
            }
        }

        for (edge, reason) in found {
            self.report(index, edge, reason);
        }
    }

    fn check_reachability(&mut self, entry: NodeIndex) {
        let graph = self.graph.graph();
        let mut reached = AHashSet::new();
        let mut dfs = Dfs::new(graph, entry);
        while let Some(index) = dfs.next(graph) {
            reached.insert(index);
        }
        let unreached: Vec<NodeIndex> = graph
            .node_indices()
            .filter(|index| !reached.contains(index))
            .collect();
        for index in unreached {
            self.report(index, None, "node is unreachable from the entry node");
        }
    }

    /// Depth-first search for cycles. The only cycle allowed is one closing on
    /// the innermost While whose `loopBody` edge is on the current path.
    fn check_cycles(&mut self, entry: NodeIndex) {
        let graph = self.graph;
        let mut path: Vec<NodeIndex> = Vec::new();
        let mut closing: Vec<(NodeIndex, NodeIndex, BranchTag)> = Vec::new();
        depth_first_search(graph.graph(), Some(entry), |event| match event {
            DfsEvent::Discover(index, _) => path.push(index),
            DfsEvent::Finish(_, _) => {
                path.pop();
            }
            DfsEvent::BackEdge(from, to)
                if !closing.iter().any(|(f, t, _)| *f == from && *t == to) =>
            {
                for branch in graph.branches_between(from, to) {
                    if self.innermost_loop(&path, branch) != Some(to) {
                        closing.push((from, to, branch));
                    }
                }
            }
            _ => {}
        });
        for (from, to, branch) in closing {
            let described = self.describe_edge(from, to, branch);
            self.report(
                from,
                Some(described),
                "edge closes a cycle that is not a loop body returning to its While node",
            );
        }
    }

    /// The innermost While on `path` whose `loopBody` edge the path follows.
    /// `last` is the tag of the edge leaving the final node of the path.
    fn innermost_loop(&self, path: &[NodeIndex], last: BranchTag) -> Option<NodeIndex> {
        path.iter().enumerate().rev().find_map(|(i, &node)| {
            if !matches!(self.graph.node(node).kind, NodeKind::While(_)) {
                return None;
            }
            let follows_body = match path.get(i + 1) {
                Some(&next) => self
                    .graph
                    .branches_between(node, next)
                    .contains(&BranchTag::LoopBody),
                None => last == BranchTag::LoopBody,
            };
            follows_body.then_some(node)
        })
    }

    /// A non-End node entered by more than one forward edge would have to be
    /// emitted on several paths. Back edges close loops and are not counted.
    fn check_shared_continuations(&mut self, entry: NodeIndex) {
        let mut incoming = vec![0usize; self.graph.len()];
        depth_first_search(self.graph.graph(), Some(entry), |event| {
            if let DfsEvent::TreeEdge(_, to) | DfsEvent::CrossForwardEdge(_, to) = event {
                incoming[to.index()] += 1;
            }
        });

        let shared: Vec<NodeIndex> = self
            .graph
            .nodes()
            .filter(|(index, node)| {
                incoming[index.index()] > 1 && !matches!(node.kind, NodeKind::End(_))
            })
            .map(|(index, _)| index)
            .collect();
        for index in shared {
            self.report(
                index,
                None,
                format!(
                    "node is reached from {} paths; only End nodes may be shared",
                    incoming[index.index()]
                ),
            );
        }
    }
}
