use super::literal::*;
use super::{CONVERSATION_HISTORY, Emission, Emitter};
use crate::compiler::symbols::{pascal_case, snake_case};
use crate::error::CompileError;
use crate::module::DeclarationKind;
use crate::workflow::{AgentConfig, AgentTool, Node};
use serde_json::Value as Json;

/// Base names the other node kinds allocate from.
const KIND_BASES: &[&str] = &[
    "web_search_preview",
    "filesearch_response",
    "filesearch_result",
    "mcp_transport",
    "mcp_client",
    "mcp_result",
    "transform_result",
    "end_result",
    "approval_request",
    "approval_message",
    "guardrails_config",
    "guardrails_inputtext",
    "guardrails_result",
    "guardrails_hastripwire",
    "guardrails_anonymizedtext",
    "guardrails_output",
];

/// The label-derived base of an agent's names. Falls back to `agent_<label>`
/// when the base or one of its derived names belongs to another kind.
fn agent_base(label: &str) -> String {
    let Some(base) = snake_case(label) else {
        return "agent".to_string();
    };
    let derived = [
        base.clone(),
        format!("{}_result", base),
        format!("{}_result_temp", base),
    ];
    if derived.iter().any(|name| KIND_BASES.contains(&name.as_str())) {
        format!("agent_{}", base)
    } else {
        base
    }
}

impl Emitter {
    /// Hoists the agent declaration and emits one `Runner.run` call followed
    /// by the history update and the result record.
    pub fn emit_agent(
        &mut self,
        node: &Node,
        config: &AgentConfig,
        input: &str,
    ) -> Result<Emission, CompileError> {
        let base = agent_base(&node.label);
        let agent = self.symbols.allocate(&base);

        let mut tools = Vec::with_capacity(config.tools.len());
        for tool in &config.tools {
            let name = match tool {
                AgentTool::Function(definition) => self.declare_tool_stub(&node.id, definition)?,
                AgentTool::WebSearch(web_search) => self.declare_web_search(web_search),
            };
            tools.push(name);
        }

        let output_type = match &config.output_schema {
            Some(schema) => Some(self.declare_output_schema(node, schema)?),
            None => None,
        };

        self.import("agents", "Agent");
        self.import("agents", "ModelSettings");
        self.import("agents", "Runner");
        self.import("openai.types.shared.reasoning", "Reasoning");

        let display_name = if node.label.trim().is_empty() {
            "Agent"
        } else {
            node.label.as_str()
        };
        let mut args = vec![
            format!("name={}", python_string(display_name)),
            format!("instructions={}", python_text_block(&config.instructions)),
            format!("model={}", python_string(&config.model)),
        ];
        if !tools.is_empty() {
            args.push(format!("tools={}", python_list(&tools, 1)));
        }
        if let Some(output_type) = &output_type {
            args.push(format!("output_type={}", output_type));
        }

        let mut reasoning = vec![format!("effort={}", python_string(&config.reasoning.effort))];
        if let Some(summary) = &config.reasoning.summary {
            reasoning.push(format!("summary={}", python_string(summary)));
        }
        let mut settings = Vec::new();
        if config.parallel_tool_calls {
            settings.push("parallel_tool_calls=True".to_string());
        }
        settings.push("store=True".to_string());
        settings.push(format!("reasoning={}", python_call("Reasoning", &reasoning, 2)));
        args.push(format!(
            "model_settings={}",
            python_call("ModelSettings", &settings, 1)
        ));

        self.declare(
            DeclarationKind::Agent,
            agent.clone(),
            format!("{} = {}", agent, python_call("Agent", &args, 0)),
        );

        let temp = self.symbols.allocate(&format!("{}_result_temp", base));
        let result = self.symbols.allocate(&format!("{}_result", base));

        let mut items = vec![format!("*{}", CONVERSATION_HISTORY)];
        for message in &config.messages {
            let segments = self.template(&node.id, &message.text)?;
            items.push(python_message(
                message.role,
                &python_template(&segments, input),
                2,
            ));
        }

        let mut emission = Emission::default();
        emission.code(format!(
            "{} = await {}",
            temp,
            python_call(
                "Runner.run",
                &[agent, format!("input={}", python_list(&items, 1))],
                0
            )
        ));
        emission.blank();
        emission.code(format!(
            "{}.extend([item.to_input_item() for item in {}.new_items])",
            CONVERSATION_HISTORY, temp
        ));
        emission.blank();
        let fields = if output_type.is_some() {
            vec![
                ("output_text", format!("{}.final_output.json()", temp)),
                ("output_parsed", format!("{}.final_output.model_dump()", temp)),
            ]
        } else {
            vec![("output_text", format!("{}.final_output_as(str)", temp))]
        };
        emission.code(format!("{} = {}", result, python_dict(&fields, 0)));
        emission.result = Some(result);
        Ok(emission)
    }

    /// Declares the `BaseModel` classes for an agent's structured output and
    /// returns the top-level class name.
    fn declare_output_schema(&mut self, node: &Node, schema: &Json) -> Result<String, CompileError> {
        let base = format!(
            "{}Schema",
            pascal_case(&node.label).unwrap_or_else(|| "Agent".to_string())
        );
        let name = self.symbols.allocate(&base);
        self.declare_schema_class(node, &name, schema)?;
        Ok(name)
    }

    /// Nested object types are declared before the class that uses them.
    fn declare_schema_class(
        &mut self,
        node: &Node,
        name: &str,
        schema: &Json,
    ) -> Result<(), CompileError> {
        self.import("pydantic", "BaseModel");

        let mut fields = Vec::new();
        if let Some(properties) = schema.get("properties").and_then(Json::as_object) {
            for (key, property) in properties {
                if !is_identifier(key) {
                    return Err(CompileError::InvalidNodeConfig {
                        node_id: node.id.clone(),
                        message: format!("output schema property '{}' is not a valid field name", key),
                    });
                }
                let annotation = self.schema_annotation(node, name, key, property)?;
                fields.push(format!("  {}: {}", key, annotation));
            }
        }
        if fields.is_empty() {
            fields.push("  pass".to_string());
        }

        self.declare(
            DeclarationKind::OutputSchema,
            name,
            format!("class {}(BaseModel):\n{}", name, fields.join("\n")),
        );
        Ok(())
    }

    fn schema_annotation(
        &mut self,
        node: &Node,
        parent: &str,
        key: &str,
        property: &Json,
    ) -> Result<String, CompileError> {
        let annotation = match property.get("type").and_then(Json::as_str) {
            Some("string") => "str".to_string(),
            Some("number") => "float".to_string(),
            Some("integer") => "int".to_string(),
            Some("boolean") => "bool".to_string(),
            Some("object") if property.get("properties").is_some() => {
                let nested_base = format!(
                    "{}{}",
                    parent,
                    pascal_case(key).unwrap_or_else(|| "Item".to_string())
                );
                let nested = self.symbols.allocate(&nested_base);
                self.declare_schema_class(node, &nested, property)?;
                nested
            }
            Some("object") => "dict".to_string(),
            Some("array") => match property.get("items") {
                Some(items) => format!("list[{}]", self.schema_annotation(node, parent, key, items)?),
                None => "list".to_string(),
            },
            _ => {
                self.import("typing", "Any");
                "Any".to_string()
            }
        };
        Ok(annotation)
    }
}
