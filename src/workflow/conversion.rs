use super::definition::WorkflowDefinition;
use crate::error::WorkflowConversionError;

/// A trait for custom editor models that can be converted into a `WorkflowDefinition`.
///
/// This is the extension point that keeps the compiler format-agnostic. Implement
/// it on the structs you deserialize your editor's export into, and the compiler
/// can process that format.
///
/// # Example
///
/// ```rust,no_run
/// use flowgen::prelude::*;
/// use flowgen::error::WorkflowConversionError;
///
/// struct MyNode { id: String, node_type: String }
/// struct MyWorkflow { start: String, nodes: Vec<MyNode> }
///
/// impl IntoWorkflow for MyWorkflow {
///     fn into_workflow(self) -> std::result::Result<WorkflowDefinition, WorkflowConversionError> {
///         let mut workflow = WorkflowDefinition::new(self.start);
///         for node in self.nodes {
///             workflow.nodes.push(NodeDefinition::new(node.id, node.node_type));
///         }
///         Ok(workflow)
///     }
/// }
/// ```
pub trait IntoWorkflow {
    /// Consumes the object and converts it into a compilable workflow.
    fn into_workflow(self) -> Result<WorkflowDefinition, WorkflowConversionError>;
}
