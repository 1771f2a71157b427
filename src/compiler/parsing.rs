use crate::error::CompileError;
use crate::workflow::*;
use ahash::AHashMap;
use serde::de::DeserializeOwned;

/// Defines the contract for turning a `NodeDefinition` of one kind name into a typed [`NodeKind`].
pub trait NodeParser: Send + Sync {
    /// The kind name this parser is registered under.
    fn node_type(&self) -> &str;
    fn parse(&self, node: &NodeDefinition) -> Result<NodeKind, CompileError>;
}

/// Normalizes a kind name for lookup: case-insensitive, `-` and `_` ignored.
pub fn normalize_kind_name(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '-' && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Deserializes a node's config, treating a missing config as all defaults.
fn parse_config<T: DeserializeOwned + Default>(node: &NodeDefinition) -> Result<T, CompileError> {
    if node.config.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(node.config.clone()).map_err(|e| CompileError::InvalidNodeConfig {
        node_id: node.id.clone(),
        message: e.to_string(),
    })
}

/// Master macro to define the built-in parsers, their registration, and their creation.
macro_rules! define_node_parsers {
    ( $( ($struct_name:ident, $tag:path, $variant:path, $config:ty) ),* $(,)? ) => {
        struct StartNodeParser;
        impl NodeParser for StartNodeParser {
            fn node_type(&self) -> &str { NodeKindTag::Start.canonical_name() }
            fn parse(&self, _node: &NodeDefinition) -> Result<NodeKind, CompileError> {
                Ok(NodeKind::Start)
            }
        }

        $(
            struct $struct_name;
            impl NodeParser for $struct_name {
                fn node_type(&self) -> &str { $tag.canonical_name() }
                fn parse(&self, node: &NodeDefinition) -> Result<NodeKind, CompileError> {
                    parse_config::<$config>(node).map($variant)
                }
            }
        )*

        fn parser_for(tag: NodeKindTag) -> Box<dyn NodeParser> {
            match tag {
                NodeKindTag::Start => Box::new(StartNodeParser),
                $( $tag => Box::new($struct_name), )*
            }
        }
    };
}

define_node_parsers! {
    (EndNodeParser, NodeKindTag::End, NodeKind::End, EndConfig),
    (AgentNodeParser, NodeKindTag::Agent, NodeKind::Agent, AgentConfig),
    (FunctionToolNodeParser, NodeKindTag::FunctionTool, NodeKind::FunctionTool, FunctionToolConfig),
    (TransformNodeParser, NodeKindTag::Transform, NodeKind::Transform, TransformConfig),
    (SetStateNodeParser, NodeKindTag::SetState, NodeKind::SetState, SetStateConfig),
    (IfNodeParser, NodeKindTag::If, NodeKind::If, IfConfig),
    (WhileNodeParser, NodeKindTag::While, NodeKind::While, WhileConfig),
    (UserApprovalNodeParser, NodeKindTag::UserApproval, NodeKind::UserApproval, UserApprovalConfig),
    (FileSearchNodeParser, NodeKindTag::FileSearch, NodeKind::FileSearch, FileSearchConfig),
    (McpToolNodeParser, NodeKindTag::McpTool, NodeKind::McpTool, McpToolConfig),
    (GuardrailNodeParser, NodeKindTag::Guardrail, NodeKind::Guardrail, GuardrailConfig),
}

/// Registers every built-in kind under its canonical and editor names.
pub(super) fn register_default_parsers(registry: &mut AHashMap<String, Box<dyn NodeParser>>) {
    for tag in NodeKindTag::ALL {
        registry.insert(normalize_kind_name(tag.canonical_name()), parser_for(tag));
        registry.insert(normalize_kind_name(tag.editor_name()), parser_for(tag));
    }
}

/// Creates the built-in parser for any accepted spelling of a kind name.
pub(super) fn create_parser_by_name(name: &str) -> Option<Box<dyn NodeParser>> {
    let wanted = normalize_kind_name(name);
    NodeKindTag::ALL
        .into_iter()
        .find(|tag| {
            normalize_kind_name(tag.canonical_name()) == wanted
                || normalize_kind_name(tag.editor_name()) == wanted
        })
        .map(parser_for)
}

/// Resolves a node definition against the registry.
pub(super) fn resolve_node(
    registry: &AHashMap<String, Box<dyn NodeParser>>,
    definition: &NodeDefinition,
) -> Result<Node, CompileError> {
    let parser = registry
        .get(&normalize_kind_name(&definition.kind))
        .ok_or_else(|| CompileError::UnknownNodeKind {
            node_id: definition.id.clone(),
            kind: definition.kind.clone(),
        })?;
    let kind = parser.parse(definition)?;
    log::trace!("node '{}' resolved as {}", definition.id, kind.tag());
    Ok(Node {
        id: definition.id.clone(),
        label: definition.label.clone(),
        kind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> AHashMap<String, Box<dyn NodeParser>> {
        let mut registry = AHashMap::new();
        register_default_parsers(&mut registry);
        registry
    }

    #[test]
    fn accepts_canonical_editor_and_loose_spellings() {
        let registry = registry();
        for name in ["UserApproval", "user_approval", "user-approval", "builtins.BinaryApproval"] {
            let node = resolve_node(&registry, &NodeDefinition::new("a", name)).unwrap();
            assert_eq!(node.kind.tag(), NodeKindTag::UserApproval, "{}", name);
        }
        let node = resolve_node(&registry, &NodeDefinition::new("m", "mcp_tool")).unwrap();
        assert_eq!(node.kind.tag(), NodeKindTag::McpTool);
    }

    #[test]
    fn unknown_kind_names_the_node() {
        let err = resolve_node(&registry(), &NodeDefinition::new("n7", "Teleport")).unwrap_err();
        assert_eq!(
            err,
            CompileError::UnknownNodeKind {
                node_id: "n7".to_string(),
                kind: "Teleport".to_string()
            }
        );
    }

    #[test]
    fn config_defaults_fill_missing_fields() {
        let node = NodeDefinition::new("a", "Agent").with_config(json!({ "instructions": "hi" }));
        let resolved = resolve_node(&registry(), &node).unwrap();
        let NodeKind::Agent(config) = resolved.kind else {
            panic!("expected agent");
        };
        assert_eq!(config.instructions, "hi");
        assert_eq!(config.model, "gpt-5");
        assert_eq!(config.reasoning.effort, "low");
    }

    #[test]
    fn mistyped_config_is_rejected() {
        let node = NodeDefinition::new("w", "While").with_config(json!({ "condition": 5 }));
        let err = resolve_node(&registry(), &node).unwrap_err();
        assert!(matches!(err, CompileError::InvalidNodeConfig { node_id, .. } if node_id == "w"));
    }
}
