use crate::error::CompileError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The complete, canonical definition of an agent workflow, ready for compilation.
/// This is the target structure for any custom editor format conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDefinition {
    pub entry_node_id: String,
    #[serde(default = "default_input_schema")]
    pub input_schema: Vec<InputField>,
    #[serde(default)]
    pub state_declarations: Vec<StateDeclaration>,
    pub nodes: Vec<NodeDefinition>,
    #[serde(default)]
    pub edges: Vec<EdgeDefinition>,
}

impl WorkflowDefinition {
    /// Creates an empty workflow whose entry is `entry_node_id` and whose input
    /// schema is the single `input_as_text` string field.
    pub fn new(entry_node_id: impl Into<String>) -> Self {
        Self {
            entry_node_id: entry_node_id.into(),
            input_schema: default_input_schema(),
            state_declarations: Vec::new(),
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// Parses the canonical JSON form of a workflow.
    pub fn from_json(json: &str) -> Result<Self, CompileError> {
        serde_json::from_str(json).map_err(|e| CompileError::JsonParseError(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, CompileError> {
        serde_json::to_string_pretty(self).map_err(|e| CompileError::JsonParseError(e.to_string()))
    }
}

fn default_input_schema() -> Vec<InputField> {
    vec![InputField {
        name: "input_as_text".to_string(),
        field_type: FieldType::String,
    }]
}

/// Defines a single node in the workflow graph.
///
/// `kind` is resolved by the compiler against its kind registry; `config` is a
/// kind-specific JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDefinition {
    pub id: String,
    pub kind: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub config: serde_json::Value,
}

impl NodeDefinition {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            label: String::new(),
            config: serde_json::Value::Null,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        self.config = config;
        self
    }
}

/// Defines a directed, labeled connection between two nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeDefinition {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub branch: BranchTag,
}

impl EdgeDefinition {
    pub fn new(from: impl Into<String>, to: impl Into<String>, branch: BranchTag) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            branch,
        }
    }
}

impl fmt::Display for EdgeDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -[{}]-> {}", self.from, self.branch, self.to)
    }
}

/// Selects which structural slot of its source node an edge fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BranchTag {
    #[default]
    None,
    True,
    False,
    Case(u32),
    LoopBody,
    LoopExit,
    Approve,
    Reject,
}

impl BranchTag {
    /// The case slot an edge fills on an If node. `True` is a synonym of `Case(0)`.
    pub fn case_index(&self) -> Option<u32> {
        match self {
            BranchTag::True => Some(0),
            BranchTag::Case(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for BranchTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BranchTag::None => write!(f, "none"),
            BranchTag::True => write!(f, "true"),
            BranchTag::False => write!(f, "false"),
            BranchTag::Case(n) => write!(f, "case{}", n),
            BranchTag::LoopBody => write!(f, "loopBody"),
            BranchTag::LoopExit => write!(f, "loopExit"),
            BranchTag::Approve => write!(f, "approve"),
            BranchTag::Reject => write!(f, "reject"),
        }
    }
}

/// A named, optionally typed and defaulted entry of the ambient `state` record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDeclaration {
    pub name: String,
    #[serde(default, rename = "type")]
    pub state_type: Option<StateType>,
    #[serde(default)]
    pub default: Option<serde_json::Value>,
}

impl StateDeclaration {
    pub fn new(name: impl Into<String>, state_type: Option<StateType>) -> Self {
        Self {
            name: name.into(),
            state_type,
            default: None,
        }
    }

    pub fn with_default(mut self, default: serde_json::Value) -> Self {
        self.default = Some(default);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateType {
    String,
    Number,
    Bool,
    List,
}

/// A field of the workflow's declared input record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

impl InputField {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }
}

/// JSON-schema style primitive types, shared by input fields and tool parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
    #[serde(other)]
    Any,
}

impl FieldType {
    /// The Python annotation for this type.
    pub fn python_annotation(&self) -> &'static str {
        match self {
            FieldType::String => "str",
            FieldType::Number => "float",
            FieldType::Integer => "int",
            FieldType::Boolean => "bool",
            FieldType::Array => "list",
            FieldType::Object => "dict",
            FieldType::Any => "Any",
        }
    }
}
