use crate::emit::literal::is_identifier;
use crate::emit::{self, Emitter};
use crate::error::CompileError;
use crate::module::EmittedModule;
use crate::workflow::{AgentTool, FieldType, NodeKind, WorkflowDefinition};
use ahash::{AHashMap, AHashSet};

pub mod expression;
pub mod graph;
mod linearize;
pub mod parsing;
pub mod symbols;
mod validate;

use graph::WorkflowGraph;
use linearize::Linearizer;
use parsing::*;
use symbols::SymbolTable;
use validate::Validator;

/// Name of the generated entry-point function unless configured otherwise.
pub const DEFAULT_ENTRY_POINT: &str = "run_workflow";

pub struct Compiler {
    workflow: WorkflowDefinition,
    registry: AHashMap<String, Box<dyn NodeParser>>,
    entry_point: String,
    allow_merging: bool,
}

pub struct CompilerBuilder {
    workflow: WorkflowDefinition,
    registry: AHashMap<String, Box<dyn NodeParser>>,
    entry_point: String,
    allow_merging: bool,
}

impl CompilerBuilder {
    pub fn new(workflow: WorkflowDefinition) -> Self {
        let mut registry: AHashMap<String, Box<dyn NodeParser>> = AHashMap::new();
        register_default_parsers(&mut registry);
        Self {
            workflow,
            registry,
            entry_point: DEFAULT_ENTRY_POINT.to_string(),
            allow_merging: false,
        }
    }

    /// Accepts `user_kind_name` as an alias of a built-in kind. Unknown
    /// built-in names are ignored.
    pub fn with_type_mapping(mut self, user_kind_name: &str, builtin_kind_name: &str) -> Self {
        if let Some(parser) = create_parser_by_name(builtin_kind_name) {
            self.registry
                .insert(normalize_kind_name(user_kind_name), parser);
        }
        self
    }

    pub fn with_custom_parser(mut self, parser: Box<dyn NodeParser>) -> Self {
        self.registry
            .insert(normalize_kind_name(parser.node_type()), parser);
        self
    }

    pub fn with_entry_point(mut self, name: impl Into<String>) -> Self {
        self.entry_point = name.into();
        self
    }

    /// Lets the branches of an If continue at a shared node instead of
    /// rejecting the graph.
    pub fn with_branch_merging(mut self, enabled: bool) -> Self {
        self.allow_merging = enabled;
        self
    }

    pub fn build(self) -> Compiler {
        Compiler {
            workflow: self.workflow,
            registry: self.registry,
            entry_point: self.entry_point,
            allow_merging: self.allow_merging,
        }
    }
}

impl Compiler {
    pub fn builder(workflow: WorkflowDefinition) -> CompilerBuilder {
        CompilerBuilder::new(workflow)
    }

    /// Compiles the workflow into a structured module.
    pub fn compile(self) -> Result<EmittedModule, CompileError> {
        let seed_field = self.check_schema()?;

        let nodes = self
            .workflow
            .nodes
            .iter()
            .map(|definition| resolve_node(&self.registry, definition))
            .collect::<Result<Vec<_>, _>>()?;
        log::debug!("resolved {} node(s)", nodes.len());

        let (graph, build_violations) = WorkflowGraph::build(nodes, &self.workflow.edges);
        let entry = Validator::new(&graph, self.allow_merging)
            .validate(&self.workflow.entry_node_id, build_violations)?;

        let mut symbols = SymbolTable::new();
        for name in [
            emit::STATE,
            emit::WORKFLOW,
            emit::WORKFLOW_INPUT,
            emit::CONVERSATION_HISTORY,
            emit::CLIENT,
            emit::CONTEXT,
            emit::INPUT_MODEL,
        ] {
            symbols.reserve(name);
        }
        for name in emit::IMPORTED_NAMES {
            symbols.reserve(name);
        }
        for name in emit::GUARDRAIL_HELPERS {
            symbols.reserve(name);
        }
        symbols.reserve(&self.entry_point);

        let mut emitter = Emitter::new(symbols, seed_field);
        // Tool stubs keep their configured names, so those are claimed before
        // any generated identifier.
        for (_, node) in graph.nodes() {
            match &node.kind {
                NodeKind::Agent(config) => {
                    for tool in &config.tools {
                        if let AgentTool::Function(definition) = tool {
                            emitter.reserve_tool_name(&node.id, &definition.name)?;
                        }
                    }
                }
                NodeKind::FunctionTool(config) => {
                    emitter.reserve_tool_name(&node.id, &config.tool.name)?;
                }
                _ => {}
            }
        }

        let body = Linearizer::new(
            &graph,
            &mut emitter,
            &self.workflow.state_declarations,
            self.allow_merging,
        )
        .linearize(entry)?;

        Ok(emitter.finish(self.workflow.input_schema, self.entry_point, body))
    }

    /// Compiles and renders the module as source text.
    pub fn compile_to_source(self) -> Result<String, CompileError> {
        Ok(self.compile()?.render())
    }

    /// Rejects repeated field names and returns the input field that seeds the
    /// conversation history.
    fn check_schema(&self) -> Result<String, CompileError> {
        if !is_identifier(&self.entry_point) {
            return Err(CompileError::InvalidSchema(format!(
                "entry point '{}' is not a valid identifier",
                self.entry_point
            )));
        }

        let mut seen = AHashSet::new();
        for declaration in &self.workflow.state_declarations {
            if !seen.insert(declaration.name.as_str()) {
                return Err(CompileError::InvalidSchema(format!(
                    "state variable '{}' is declared more than once",
                    declaration.name
                )));
            }
        }

        let mut seen = AHashSet::new();
        for field in &self.workflow.input_schema {
            if !is_identifier(&field.name) {
                return Err(CompileError::InvalidSchema(format!(
                    "input field '{}' is not a valid identifier",
                    field.name
                )));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(CompileError::InvalidSchema(format!(
                    "input field '{}' is declared more than once",
                    field.name
                )));
            }
        }

        self.workflow
            .input_schema
            .iter()
            .find(|f| f.field_type == FieldType::String)
            .map(|f| f.name.clone())
            .ok_or_else(|| {
                CompileError::InvalidSchema(
                    "the input schema needs a string field to seed the conversation".to_string(),
                )
            })
    }
}
