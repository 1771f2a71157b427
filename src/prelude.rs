//! Prelude module for convenient imports
//!
//! This module re-exports the most commonly used types and traits from the flowgen crate.
//!
//! # Example
//!
//! ```rust,no_run
//! use flowgen::prelude::*;
//!
//! # fn run_example() -> Result<()> {
//! let json = std::fs::read_to_string("path/to/workflow.json")?;
//! let workflow = WorkflowDefinition::from_json(&json)?;
//!
//! let module = Compiler::builder(workflow).build().compile()?;
//! println!("{}", module.render());
//! # Ok(())
//! # }
//! ```

// Compilation
pub use crate::compiler::{Compiler, CompilerBuilder};
pub use crate::compiler::parsing::NodeParser;

// Workflow model
pub use crate::workflow::{
    BranchTag, EdgeDefinition, FieldType, InputField, IntoWorkflow, NodeDefinition, NodeKind,
    StateDeclaration, StateType, WorkflowDefinition,
};

// Output
pub use crate::ast::{Block, DisplayBlock, Statement};
pub use crate::module::EmittedModule;

// Error types
pub use crate::error::{CompileError, GraphViolation, WorkflowConversionError};

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;
