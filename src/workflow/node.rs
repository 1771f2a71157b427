//! Typed node kinds.
//!
//! A `NodeDefinition` carries its kind as a string and its configuration as raw
//! JSON; the compiler resolves both into a [`Node`] whose [`NodeKind`] is a
//! closed enum, so every later phase matches over it exhaustively.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A node after kind resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: String,
    pub label: String,
    pub kind: NodeKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Start,
    End(EndConfig),
    Agent(AgentConfig),
    FunctionTool(FunctionToolConfig),
    Transform(TransformConfig),
    SetState(SetStateConfig),
    If(IfConfig),
    While(WhileConfig),
    UserApproval(UserApprovalConfig),
    FileSearch(FileSearchConfig),
    McpTool(McpToolConfig),
    Guardrail(GuardrailConfig),
}

impl NodeKind {
    pub fn tag(&self) -> NodeKindTag {
        match self {
            NodeKind::Start => NodeKindTag::Start,
            NodeKind::End(_) => NodeKindTag::End,
            NodeKind::Agent(_) => NodeKindTag::Agent,
            NodeKind::FunctionTool(_) => NodeKindTag::FunctionTool,
            NodeKind::Transform(_) => NodeKindTag::Transform,
            NodeKind::SetState(_) => NodeKindTag::SetState,
            NodeKind::If(_) => NodeKindTag::If,
            NodeKind::While(_) => NodeKindTag::While,
            NodeKind::UserApproval(_) => NodeKindTag::UserApproval,
            NodeKind::FileSearch(_) => NodeKindTag::FileSearch,
            NodeKind::McpTool(_) => NodeKindTag::McpTool,
            NodeKind::Guardrail(_) => NodeKindTag::Guardrail,
        }
    }
}

/// Fieldless discriminant of [`NodeKind`], used for kind-name lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKindTag {
    Start,
    End,
    Agent,
    FunctionTool,
    Transform,
    SetState,
    If,
    While,
    UserApproval,
    FileSearch,
    McpTool,
    Guardrail,
}

impl NodeKindTag {
    pub const ALL: [NodeKindTag; 12] = [
        NodeKindTag::Start,
        NodeKindTag::End,
        NodeKindTag::Agent,
        NodeKindTag::FunctionTool,
        NodeKindTag::Transform,
        NodeKindTag::SetState,
        NodeKindTag::If,
        NodeKindTag::While,
        NodeKindTag::UserApproval,
        NodeKindTag::FileSearch,
        NodeKindTag::McpTool,
        NodeKindTag::Guardrail,
    ];

    pub fn canonical_name(&self) -> &'static str {
        match self {
            NodeKindTag::Start => "Start",
            NodeKindTag::End => "End",
            NodeKindTag::Agent => "Agent",
            NodeKindTag::FunctionTool => "FunctionTool",
            NodeKindTag::Transform => "Transform",
            NodeKindTag::SetState => "SetState",
            NodeKindTag::If => "If",
            NodeKindTag::While => "While",
            NodeKindTag::UserApproval => "UserApproval",
            NodeKindTag::FileSearch => "FileSearch",
            NodeKindTag::McpTool => "MCPTool",
            NodeKindTag::Guardrail => "Guardrail",
        }
    }

    /// The node type name the workflow editor exports for this kind.
    pub fn editor_name(&self) -> &'static str {
        match self {
            NodeKindTag::Start => "builtins.Start",
            NodeKindTag::End => "builtins.End",
            NodeKindTag::Agent => "builtins.Agent",
            NodeKindTag::FunctionTool => "builtins.FunctionTool",
            NodeKindTag::Transform => "builtins.Transform",
            NodeKindTag::SetState => "builtins.SetState",
            NodeKindTag::If => "builtins.IfElse",
            NodeKindTag::While => "builtins.While",
            NodeKindTag::UserApproval => "builtins.BinaryApproval",
            NodeKindTag::FileSearch => "builtins.tool.FileSearch",
            NodeKindTag::McpTool => "builtins.MCP",
            NodeKindTag::Guardrail => "builtins.Guardrails",
        }
    }
}

impl fmt::Display for NodeKindTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical_name())
    }
}

// --- Kind-specific configuration ---

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EndConfig {
    /// JSON schema of the workflow output. When present the End node returns
    /// a skeleton record shaped by it instead of the path's aggregate.
    pub output_schema: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AgentConfig {
    pub instructions: String,
    pub model: String,
    pub tools: Vec<AgentTool>,
    pub reasoning: ReasoningConfig,
    pub parallel_tool_calls: bool,
    /// Extra conversation turns appended after the history for this call only.
    pub messages: Vec<AgentMessage>,
    /// JSON schema of a structured output type.
    pub output_schema: Option<Value>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            instructions: String::new(),
            model: "gpt-5".to_string(),
            tools: Vec::new(),
            reasoning: ReasoningConfig::default(),
            parallel_tool_calls: false,
            messages: Vec::new(),
            output_schema: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReasoningConfig {
    pub effort: String,
    pub summary: Option<String>,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            effort: "low".to_string(),
            summary: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMessage {
    pub role: MessageRole,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// A tool bound to an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentTool {
    Function(ToolDefinition),
    WebSearch(WebSearchConfig),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: ToolParameters,
}

/// The JSON-schema `properties` of a tool's parameter object, in declaration order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolParameters {
    pub properties: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WebSearchConfig {
    pub search_context_size: String,
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            search_context_size: "medium".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FunctionToolConfig {
    pub tool: ToolDefinition,
    pub arguments: Vec<Assignment>,
}

/// A `name = expression` pair: a state assignment or a named call argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub name: String,
    #[serde(default)]
    pub expression: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    pub expression: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SetStateConfig {
    pub assignments: Vec<Assignment>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IfConfig {
    pub cases: Vec<IfCase>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IfCase {
    pub label: Option<String>,
    pub condition: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WhileConfig {
    pub condition: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserApprovalConfig {
    /// Message template; `{{ expression }}` segments are compiled and spliced in.
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FileSearchConfig {
    pub vector_store_id: String,
    pub query: String,
    pub max_results: u32,
}

impl Default for FileSearchConfig {
    fn default() -> Self {
        Self {
            vector_store_id: String::new(),
            query: String::new(),
            max_results: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct McpToolConfig {
    pub transport: McpTransport,
    pub auth: McpAuth,
    pub calls: Vec<McpCall>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum McpTransport {
    Http {
        url: String,
    },
    Sse {
        url: String,
    },
    Stdio {
        #[serde(default = "default_stdio_command")]
        command: String,
        #[serde(default)]
        args: Vec<String>,
    },
}

impl Default for McpTransport {
    fn default() -> Self {
        McpTransport::Http { url: String::new() }
    }
}

fn default_stdio_command() -> String {
    "python".to_string()
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum McpAuth {
    #[default]
    None,
    ApiKey {
        key: String,
    },
    Bearer {
        token: String,
    },
    Custom {
        headers: Map<String, Value>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpCall {
    pub tool_name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardrailConfig {
    /// The policy bundle handed to `load_config_bundle`.
    pub bundle: Value,
    /// Input text expression of the first stage of a chain.
    pub input: Option<String>,
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            bundle: serde_json::json!({ "guardrails": [] }),
            input: None,
        }
    }
}
