//! Per-kind code emission.
//!
//! The [`Emitter`] owns everything that outlives a single node: the symbol
//! table, the import set and the module-level declarations. Each emission rule
//! returns the statements for its node in order, and registers whatever
//! imports and declarations they depend on.

use crate::ast::{Block, Expr, Statement};
use crate::compiler::expression::{TemplateSegment, parse_expression, parse_template};
use crate::compiler::symbols::SymbolTable;
use crate::error::CompileError;
use crate::module::{Declaration, DeclarationKind, EmittedModule, ImportSet};
use crate::workflow::InputField;
use ahash::AHashSet;

mod agent;
mod control;
mod data;
mod guardrail;
pub mod literal;
mod tools;

pub use guardrail::{GuardrailStage, HELPER_NAMES as GUARDRAIL_HELPERS};

/// Ambient locals of the entry-point function.
pub const STATE: &str = "state";
pub const WORKFLOW: &str = "workflow";
pub const WORKFLOW_INPUT: &str = "workflow_input";
pub const CONVERSATION_HISTORY: &str = "conversation_history";
/// Module-level names of the shared client block.
pub const CLIENT: &str = "client";
pub const CONTEXT: &str = "ctx";
pub const INPUT_MODEL: &str = "WorkflowInput";

/// Every name the generated module imports. A module-level binding with one
/// of these names would shadow the import.
pub const IMPORTED_NAMES: &[&str] = &[
    "Agent",
    "ModelSettings",
    "Runner",
    "TResponseInputItem",
    "WebSearchTool",
    "function_tool",
    "Reasoning",
    "BaseModel",
    "AsyncOpenAI",
    "SimpleNamespace",
    "Any",
    "Client",
    "SSEClientTransport",
    "StdioClientTransport",
    "load_config_bundle",
    "instantiate_guardrails",
    "run_guardrails",
];

/// Statements produced for one node, plus the aggregate result it binds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Emission {
    pub statements: Vec<Statement>,
    pub result: Option<String>,
}

impl Emission {
    fn code(&mut self, line: impl Into<String>) {
        self.statements.push(Statement::Code(line.into()));
    }

    fn blank(&mut self) {
        self.statements.push(Statement::Blank);
    }

    fn comment(&mut self, text: impl Into<String>) {
        self.statements.push(Statement::Comment(text.into()));
    }
}

pub struct Emitter {
    pub(crate) symbols: SymbolTable,
    imports: ImportSet,
    declarations: Vec<Declaration>,
    tool_stubs: AHashSet<String>,
    reserved_tools: AHashSet<String>,
    shared_client: bool,
    guardrail_helpers: bool,
    /// Input field whose value seeds the conversation history.
    seed_field: String,
}

impl Emitter {
    pub fn new(symbols: SymbolTable, seed_field: impl Into<String>) -> Self {
        Self {
            symbols,
            imports: ImportSet::new(),
            declarations: Vec::new(),
            tool_stubs: AHashSet::new(),
            reserved_tools: AHashSet::new(),
            shared_client: false,
            guardrail_helpers: false,
            seed_field: seed_field.into(),
        }
    }

    fn import(&mut self, module: &str, name: &str) {
        debug_assert!(IMPORTED_NAMES.contains(&name), "unreserved import '{}'", name);
        self.imports.add(module, name);
    }

    fn declare(&mut self, kind: DeclarationKind, name: impl Into<String>, source: impl Into<String>) {
        self.declarations.push(Declaration {
            kind,
            name: name.into(),
            source: source.into(),
        });
    }

    /// The `client`/`ctx` pair used by file search and guardrails, declared once.
    fn require_shared_client(&mut self) {
        if self.shared_client {
            return;
        }
        self.shared_client = true;
        self.import("openai", "AsyncOpenAI");
        self.import("types", "SimpleNamespace");
        self.declare(
            DeclarationKind::SharedClient,
            CLIENT,
            format!(
                "# Shared client for guardrails and file search\n{} = AsyncOpenAI()\n{} = SimpleNamespace(guardrail_llm={})",
                CLIENT, CONTEXT, CLIENT
            ),
        );
    }

    /// Parses `source`, attributing failures to `node_id`.
    pub(crate) fn expression(&self, node_id: &str, source: &str) -> Result<Expr, CompileError> {
        parse_expression(source).map_err(|e| CompileError::InvalidExpression {
            node_id: node_id.to_string(),
            expression: source.to_string(),
            message: e.to_string(),
        })
    }

    pub(crate) fn template(
        &self,
        node_id: &str,
        source: &str,
    ) -> Result<Vec<TemplateSegment>, CompileError> {
        parse_template(source).map_err(|e| CompileError::InvalidExpression {
            node_id: node_id.to_string(),
            expression: source.to_string(),
            message: e.to_string(),
        })
    }

    /// Assembles the module. Declarations are stably sorted into render order.
    pub fn finish(
        mut self,
        input_fields: Vec<InputField>,
        entry_point: String,
        body: Block,
    ) -> EmittedModule {
        self.import("pydantic", "BaseModel");
        self.import("agents", "TResponseInputItem");
        if input_fields
            .iter()
            .any(|f| f.field_type == crate::workflow::FieldType::Any)
        {
            self.import("typing", "Any");
        }
        self.declarations.sort_by_key(|d| d.kind);
        EmittedModule {
            imports: self.imports,
            declarations: self.declarations,
            input_fields,
            entry_point,
            body,
        }
    }
}
