use itertools::Itertools;
use std::fmt;
use thiserror::Error;

/// A single structural problem found while re-validating a workflow graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphViolation {
    /// The node the violation is attributed to.
    pub node_id: String,
    /// The offending edge, rendered as `from -[tag]-> to`, when one is involved.
    pub edge: Option<String>,
    pub reason: String,
}

impl fmt::Display for GraphViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.edge {
            Some(edge) => write!(f, "node '{}' (edge {}): {}", self.node_id, edge, self.reason),
            None => write!(f, "node '{}': {}", self.node_id, self.reason),
        }
    }
}

/// Errors that can occur while compiling a workflow graph into source text.
///
/// Every error is deterministic: compiling the same graph again reproduces it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error("Failed to parse workflow JSON: {0}")]
    JsonParseError(String),

    #[error("Malformed workflow graph: {}", .violations.iter().join("; "))]
    MalformedGraph { violations: Vec<GraphViolation> },

    #[error("Node '{node_id}' has an unknown node kind: '{kind}'")]
    UnknownNodeKind { node_id: String, kind: String },

    #[error("Node '{node_id}' has an invalid expression '{expression}': {message}")]
    InvalidExpression {
        node_id: String,
        expression: String,
        message: String,
    },

    #[error("Node '{node_id}' has an invalid configuration: {message}")]
    InvalidNodeConfig { node_id: String, message: String },

    #[error("Invalid workflow schema: {0}")]
    InvalidSchema(String),
}

impl CompileError {
    /// Shorthand for a graph error with a single violation.
    pub(crate) fn malformed(node_id: &str, edge: Option<String>, reason: impl Into<String>) -> Self {
        CompileError::MalformedGraph {
            violations: vec![GraphViolation {
                node_id: node_id.to_string(),
                edge,
                reason: reason.into(),
            }],
        }
    }
}

/// Errors that can occur when converting a custom editor format into a `WorkflowDefinition`.
#[derive(Error, Debug, Clone)]
pub enum WorkflowConversionError {
    #[error("Invalid custom data: {0}")]
    ValidationError(String),
}
