//! Turns the validated graph into one structured statement tree.
//!
//! The walk follows the chain from the entry node, appending each node's
//! statements to the current block. Control kinds open nested blocks and walk
//! their branches recursively with a copy of the path scope, so results bound
//! inside a branch or loop body never leak out of it.

use super::graph::{NodeIndex, WorkflowGraph};
use crate::ast::{Block, BranchArm, Guard, Statement};
use crate::emit::{Emission, Emitter, WORKFLOW};
use crate::error::CompileError;
use crate::workflow::{BranchTag, IfConfig, NodeKind, StateDeclaration};
use ahash::AHashSet;
use petgraph::visit::{Bfs, NodeFiltered};

/// What the walk knows about the path it is on.
#[derive(Debug, Clone, Default)]
struct Scope {
    /// The most recent result record on this path.
    aggregate: Option<String>,
    /// Enclosing While nodes, innermost last.
    loop_heads: Vec<NodeIndex>,
    /// Nodes where a merged If continues after its chain.
    merge_points: Vec<NodeIndex>,
    /// Output of a guardrail stage that directly precedes the next node.
    guardrail_output: Option<String>,
}

impl Scope {
    fn input(&self) -> &str {
        self.aggregate.as_deref().unwrap_or(WORKFLOW)
    }
}

pub(super) struct Linearizer<'a> {
    graph: &'a WorkflowGraph,
    emitter: &'a mut Emitter,
    state_declarations: &'a [StateDeclaration],
    allow_merging: bool,
    emitted: AHashSet<NodeIndex>,
}

impl<'a> Linearizer<'a> {
    pub(super) fn new(
        graph: &'a WorkflowGraph,
        emitter: &'a mut Emitter,
        state_declarations: &'a [StateDeclaration],
        allow_merging: bool,
    ) -> Self {
        Self {
            graph,
            emitter,
            state_declarations,
            allow_merging,
            emitted: AHashSet::new(),
        }
    }

    /// Linearizes everything reachable from `entry` into the entry-point body.
    pub(super) fn linearize(mut self, entry: NodeIndex) -> Result<Block, CompileError> {
        let mut body = Block::new();
        self.walk(Some(entry), Scope::default(), &mut body)?;
        log::debug!("linearized {} node(s)", self.emitted.len());
        Ok(body)
    }

    fn walk(
        &mut self,
        start: Option<NodeIndex>,
        mut scope: Scope,
        block: &mut Block,
    ) -> Result<(), CompileError> {
        let mut current = start;
        while let Some(index) = current {
            if scope.loop_heads.last() == Some(&index) || scope.merge_points.contains(&index) {
                return Ok(());
            }
            self.mark_emitted(index)?;

            let graph = self.graph;
            let node = graph.node(index);
            log::trace!("linearizing node '{}' ({})", node.id, node.kind.tag());
            let chained = scope.guardrail_output.take();

            current = match &node.kind {
                NodeKind::Start => {
                    let emission = self.emitter.emit_start(self.state_declarations);
                    append(block, emission, &mut scope);
                    graph.successor(index, BranchTag::None)
                }
                NodeKind::Agent(config) => {
                    let emission = self.emitter.emit_agent(node, config, scope.input())?;
                    append(block, emission, &mut scope);
                    graph.successor(index, BranchTag::None)
                }
                NodeKind::FunctionTool(config) => {
                    let emission = self.emitter.emit_function_tool(node, config, scope.input())?;
                    append(block, emission, &mut scope);
                    graph.successor(index, BranchTag::None)
                }
                NodeKind::Transform(config) => {
                    let emission = self.emitter.emit_transform(node, config, scope.input())?;
                    append(block, emission, &mut scope);
                    graph.successor(index, BranchTag::None)
                }
                NodeKind::SetState(config) => {
                    let emission = self.emitter.emit_set_state(node, config, scope.input())?;
                    append(block, emission, &mut scope);
                    graph.successor(index, BranchTag::None)
                }
                NodeKind::FileSearch(config) => {
                    let emission = self.emitter.emit_file_search(node, config, scope.input())?;
                    append(block, emission, &mut scope);
                    graph.successor(index, BranchTag::None)
                }
                NodeKind::McpTool(config) => {
                    let emission = self.emitter.emit_mcp_tool(config);
                    append(block, emission, &mut scope);
                    graph.successor(index, BranchTag::None)
                }
                NodeKind::End(config) => {
                    let emission = self.emitter.emit_end(config, scope.input());
                    block.statements.extend(emission.statements);
                    return Ok(());
                }
                NodeKind::If(config) => match self.emit_branch(index, config, &scope, block)? {
                    Some(merge) => Some(merge),
                    None => return Ok(()),
                },
                NodeKind::While(config) => {
                    let condition =
                        self.emitter
                            .emit_condition(node, &config.condition, scope.input())?;
                    let mut body = Block::new();
                    let mut inner = scope.clone();
                    inner.loop_heads.push(index);
                    self.walk(graph.successor(index, BranchTag::LoopBody), inner, &mut body)?;
                    block.push(Statement::Loop { condition, body });
                    graph.successor(index, BranchTag::LoopExit)
                }
                NodeKind::UserApproval(config) => {
                    let (emission, check) =
                        self.emitter.emit_approval(node, config, scope.input())?;
                    block.statements.extend(emission.statements);

                    let mut continuation = Block::new();
                    self.walk(
                        graph.successor(index, BranchTag::Approve),
                        scope.clone(),
                        &mut continuation,
                    )?;

                    let reject = graph.successor(index, BranchTag::Reject);
                    let mut exit_scope = scope.clone();
                    if reject.is_some_and(|r| matches!(graph.node(r).kind, NodeKind::End(_))) {
                        // A rejection that ends the workflow returns the input record.
                        exit_scope.aggregate = None;
                    }
                    let mut exit = Block::new();
                    self.walk(reject, exit_scope, &mut exit)?;

                    block.push(Statement::Guard(Guard {
                        check,
                        proceed_when: true,
                        continuation,
                        exit,
                    }));
                    return Ok(());
                }
                NodeKind::Guardrail(config) => {
                    let stage = self.emitter.emit_guardrail(
                        node,
                        config,
                        scope.input(),
                        chained.as_deref(),
                    )?;
                    block.statements.extend(stage.emission.statements);
                    let Some(output) = stage.emission.result else {
                        return Err(CompileError::malformed(
                            &node.id,
                            None,
                            "guardrail stage produced no output",
                        ));
                    };

                    let pass = graph.successor(index, BranchTag::None);
                    let mut inner = scope.clone();
                    inner.aggregate = Some(output.clone());
                    inner.guardrail_output = pass
                        .filter(|p| matches!(graph.node(*p).kind, NodeKind::Guardrail(_)))
                        .map(|_| output.clone());
                    let mut continuation = Block::new();
                    self.walk(pass, inner, &mut continuation)?;

                    let mut exit = Block::new();
                    match graph.successor(index, BranchTag::False) {
                        Some(fail) => {
                            let mut fail_scope = scope.clone();
                            fail_scope.aggregate = Some(output.clone());
                            self.walk(Some(fail), fail_scope, &mut exit)?;
                        }
                        None => exit.push(Statement::Return(output)),
                    }

                    block.push(Statement::Guard(Guard {
                        check: stage.check,
                        proceed_when: false,
                        continuation,
                        exit,
                    }));
                    return Ok(());
                }
            };
        }

        // A chain that runs out of edges returns what it has.
        block.push(Statement::Return(scope.input().to_string()));
        Ok(())
    }

    /// Emits the `if`/`elif`/`else` chain of an If node. Returns the node
    /// where the walk continues when its branches merge.
    fn emit_branch(
        &mut self,
        index: NodeIndex,
        config: &IfConfig,
        scope: &Scope,
        block: &mut Block,
    ) -> Result<Option<NodeIndex>, CompileError> {
        let graph = self.graph;
        let node = graph.node(index);

        // Edge declaration order is the chain order; the else edge is last.
        let mut targets = Vec::new();
        for edge in graph.edges(index) {
            if let Some(case) = edge.branch.case_index() {
                targets.push((case as usize, edge.target));
            }
        }
        let otherwise = graph.successor(index, BranchTag::False);

        let merge = if self.allow_merging {
            let mut starts: Vec<NodeIndex> = targets.iter().map(|(_, t)| *t).collect();
            starts.extend(otherwise);
            self.merge_point(&starts, scope)
        } else {
            None
        };
        if let Some(merge) = merge {
            log::debug!(
                "branches of '{}' merge at '{}'",
                node.id,
                graph.node(merge).id
            );
        }

        let mut branch_scope = scope.clone();
        branch_scope.merge_points.extend(merge);

        let mut arms = Vec::with_capacity(targets.len());
        for (case, target) in targets {
            let Some(case) = config.cases.get(case) else {
                return Err(CompileError::malformed(
                    &node.id,
                    None,
                    "branch edge has no matching case",
                ));
            };
            let condition = self
                .emitter
                .emit_condition(node, &case.condition, scope.input())?;
            let mut body = Block::new();
            if let Some(label) = case.label.as_deref().filter(|l| !l.trim().is_empty()) {
                body.push(Statement::Comment(label.to_string()));
            }
            self.walk(Some(target), branch_scope.clone(), &mut body)?;
            arms.push(BranchArm { condition, body });
        }

        let otherwise = match otherwise {
            Some(target) => {
                let mut body = Block::new();
                self.walk(Some(target), branch_scope, &mut body)?;
                Some(body)
            }
            None => None,
        };

        block.push(Statement::Branch { arms, otherwise });
        Ok(merge)
    }

    /// The first non-End node, in breadth-first order from the first branch,
    /// that every branch reaches.
    fn merge_point(&self, starts: &[NodeIndex], scope: &Scope) -> Option<NodeIndex> {
        let (first, rest) = starts.split_first()?;
        if rest.is_empty() {
            return None;
        }
        let reachable: Vec<AHashSet<NodeIndex>> = rest
            .iter()
            .map(|s| self.forward_reach(*s, scope).into_iter().collect())
            .collect();
        self.forward_reach(*first, scope).into_iter().find(|candidate| {
            !matches!(self.graph.node(*candidate).kind, NodeKind::End(_))
                && reachable.iter().all(|set| set.contains(candidate))
        })
    }

    /// Nodes reachable from `start` in breadth-first order, without entering
    /// enclosing loop heads or outer merge points.
    fn forward_reach(&self, start: NodeIndex, scope: &Scope) -> Vec<NodeIndex> {
        let open = |index: NodeIndex| {
            !scope.loop_heads.contains(&index) && !scope.merge_points.contains(&index)
        };
        if !open(start) {
            return Vec::new();
        }
        let graph = NodeFiltered::from_fn(self.graph.graph(), open);
        let mut bfs = Bfs::new(&graph, start);
        let mut order = Vec::new();
        while let Some(index) = bfs.next(&graph) {
            order.push(index);
        }
        order
    }

    /// End nodes may close several paths; any other node is emitted once.
    fn mark_emitted(&mut self, index: NodeIndex) -> Result<(), CompileError> {
        let node = self.graph.node(index);
        if !self.emitted.insert(index) && !matches!(node.kind, NodeKind::End(_)) {
            return Err(CompileError::malformed(
                &node.id,
                None,
                "node would be emitted on more than one path",
            ));
        }
        Ok(())
    }
}

fn append(block: &mut Block, emission: Emission, scope: &mut Scope) {
    block.statements.extend(emission.statements);
    if let Some(result) = emission.result {
        scope.aggregate = Some(result);
    }
}
