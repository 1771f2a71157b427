//! # Flowgen - Agent Workflow Compiler
//!
//! **Flowgen** compiles node-based AI agent workflows, as drawn in a visual
//! editor, into a single sequential Python module built on the OpenAI Agents
//! SDK. The graph is validated, linearized into structured control flow and
//! emitted as deterministic, human-readable source.
//!
//! ## Core Workflow
//!
//! The compiler is format-agnostic. It operates on a canonical model of a
//! workflow, [`WorkflowDefinition`](workflow::WorkflowDefinition):
//!
//! 1.  **Load Your Data**: Parse your editor's export into your own Rust structs.
//! 2.  **Convert**: Implement the `IntoWorkflow` trait for those structs to translate them into a `WorkflowDefinition`.
//! 3.  **Compile**: Use `Compiler::builder` to configure a compiler and call `compile` for a structured [`EmittedModule`](module::EmittedModule), or `compile_to_source` for the rendered text.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use flowgen::prelude::*;
//! use serde_json::json;
//!
//! fn main() -> Result<()> {
//!     let mut workflow = WorkflowDefinition::new("start");
//!     workflow.nodes = vec![
//!         NodeDefinition::new("start", "Start"),
//!         NodeDefinition::new("triage", "Agent")
//!             .with_label("Triage")
//!             .with_config(json!({ "instructions": "Classify the request" })),
//!         NodeDefinition::new("end", "End"),
//!     ];
//!     workflow.edges = vec![
//!         EdgeDefinition::new("start", "triage", BranchTag::None),
//!         EdgeDefinition::new("triage", "end", BranchTag::None),
//!     ];
//!
//!     let source = Compiler::builder(workflow)
//!         .with_entry_point("run_triage")
//!         .build()
//!         .compile_to_source()?;
//!     println!("{}", source);
//!     Ok(())
//! }
//! ```

pub mod ast;
pub mod compiler;
pub mod emit;
pub mod error;
pub mod module;
pub mod prelude;
pub mod workflow;

#[cfg(feature = "python-bindings")]
mod python;
