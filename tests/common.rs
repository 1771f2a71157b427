//! Common test utilities for building workflow definitions.
use flowgen::prelude::*;
use serde_json::{Value, json};

/// Fluent builder over `WorkflowDefinition`. Every workflow starts with a
/// Start node `start` that is also the entry node.
#[allow(dead_code)]
pub struct WorkflowBuilder {
    workflow: WorkflowDefinition,
}

#[allow(dead_code)]
impl WorkflowBuilder {
    pub fn new() -> Self {
        let mut workflow = WorkflowDefinition::new("start");
        workflow.nodes.push(NodeDefinition::new("start", "Start"));
        Self { workflow }
    }

    pub fn node(mut self, id: &str, kind: &str, config: Value) -> Self {
        self.workflow
            .nodes
            .push(NodeDefinition::new(id, kind).with_config(config));
        self
    }

    pub fn labeled(mut self, id: &str, kind: &str, label: &str, config: Value) -> Self {
        self.workflow.nodes.push(
            NodeDefinition::new(id, kind)
                .with_label(label)
                .with_config(config),
        );
        self
    }

    /// An unlabeled edge.
    pub fn edge(self, from: &str, to: &str) -> Self {
        self.branch(from, to, BranchTag::None)
    }

    pub fn branch(mut self, from: &str, to: &str, tag: BranchTag) -> Self {
        self.workflow.edges.push(EdgeDefinition::new(from, to, tag));
        self
    }

    pub fn state(mut self, declaration: StateDeclaration) -> Self {
        self.workflow.state_declarations.push(declaration);
        self
    }

    pub fn build(self) -> WorkflowDefinition {
        self.workflow
    }
}

/// Compiles with default options and renders the module.
#[allow(dead_code)]
pub fn compile(workflow: WorkflowDefinition) -> String {
    Compiler::builder(workflow)
        .build()
        .compile_to_source()
        .expect("Failed to compile")
}

/// Compiles with default options, expecting an error.
#[allow(dead_code)]
pub fn compile_err(workflow: WorkflowDefinition) -> CompileError {
    match Compiler::builder(workflow).build().compile() {
        Ok(module) => panic!("Expected a compile error, got:\n{}", module.render()),
        Err(e) => e,
    }
}

/// Start → `count` unlabeled agents in sequence → End.
#[allow(dead_code)]
pub fn create_agent_chain(count: usize) -> WorkflowDefinition {
    let mut builder = WorkflowBuilder::new();
    let mut previous = "start".to_string();
    for i in 0..count {
        let id = format!("agent-{}", i);
        builder = builder
            .node(&id, "Agent", json!({ "instructions": format!("Step {}", i) }))
            .edge(&previous, &id);
        previous = id;
    }
    builder.node("end", "End", Value::Null).edge(&previous, "end").build()
}

/// Start → `count` chained Guardrail nodes, the last one dangling.
#[allow(dead_code)]
pub fn create_guardrail_chain(count: usize) -> WorkflowDefinition {
    let mut builder = WorkflowBuilder::new();
    let mut previous = "start".to_string();
    for i in 0..count {
        let id = format!("guard-{}", i);
        builder = builder
            .node(
                &id,
                "builtins.Guardrails",
                json!({ "bundle": { "guardrails": [{ "name": format!("Check {}", i) }] } }),
            )
            .edge(&previous, &id);
        previous = id;
    }
    builder.build()
}

/// Start → If(input_as_text == "") → {case0: agent A, else: agent B} → End.
#[allow(dead_code)]
pub fn create_if_else_flow() -> WorkflowDefinition {
    WorkflowBuilder::new()
        .node(
            "if",
            "If",
            json!({ "cases": [{ "condition": "workflow.input_as_text == \"\"" }] }),
        )
        .labeled("a", "Agent", "Empty handler", json!({ "instructions": "Ask for input" }))
        .labeled("b", "Agent", "Responder", json!({ "instructions": "Answer" }))
        .node("end", "End", Value::Null)
        .edge("start", "if")
        .branch("if", "a", BranchTag::Case(0))
        .branch("if", "b", BranchTag::False)
        .edge("a", "end")
        .edge("b", "end")
        .build()
}

/// Counts non-overlapping occurrences of `needle`.
#[allow(dead_code)]
pub fn occurrences(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}
