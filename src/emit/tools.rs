use super::literal::*;
use super::{CLIENT, Emission, Emitter};
use crate::error::CompileError;
use crate::module::DeclarationKind;
use crate::workflow::{
    FileSearchConfig, FunctionToolConfig, McpAuth, McpToolConfig, McpTransport, Node,
    ToolDefinition, WebSearchConfig,
};
use serde_json::{Map, Value as Json};

impl Emitter {
    /// Declares the `@function_tool` stub for `definition` once per tool name.
    pub(super) fn declare_tool_stub(
        &mut self,
        node_id: &str,
        definition: &ToolDefinition,
    ) -> Result<String, CompileError> {
        let name = definition.name.clone();
        if !is_identifier(&name) {
            return Err(CompileError::InvalidNodeConfig {
                node_id: node_id.to_string(),
                message: format!("tool name '{}' is not a valid identifier", name),
            });
        }
        if self.tool_stubs.contains(&name) {
            return Ok(name);
        }

        let mut parameters = Vec::new();
        for (parameter, schema) in &definition.parameters.properties {
            if !is_identifier(parameter) {
                return Err(CompileError::InvalidNodeConfig {
                    node_id: node_id.to_string(),
                    message: format!(
                        "parameter '{}' of tool '{}' is not a valid identifier",
                        parameter, name
                    ),
                });
            }
            parameters.push(format!("{}: {}", parameter, self.parameter_annotation(schema)));
        }

        self.import("agents", "function_tool");
        self.symbols.reserve(&name);
        self.tool_stubs.insert(name.clone());
        self.declare(
            DeclarationKind::ToolStub,
            name.clone(),
            format!(
                "@function_tool\ndef {}({}):\n  pass",
                name,
                parameters.join(", ")
            ),
        );
        Ok(name)
    }

    fn parameter_annotation(&mut self, schema: &Json) -> &'static str {
        match schema.get("type").and_then(Json::as_str) {
            Some("string") => "str",
            Some("number") => "float",
            Some("integer") => "int",
            Some("boolean") => "bool",
            Some("array") => "list",
            Some("object") => "dict",
            _ => {
                self.import("typing", "Any");
                "Any"
            }
        }
    }

    /// Every tool name used by an agent or FunctionTool node must be free.
    /// Called with all tool names before any emission so later allocations
    /// steer around them.
    pub fn reserve_tool_name(&mut self, node_id: &str, name: &str) -> Result<(), CompileError> {
        if self.symbols.is_taken(name) && !self.reserved_tools.contains(name) {
            return Err(CompileError::InvalidNodeConfig {
                node_id: node_id.to_string(),
                message: format!("tool name '{}' collides with a reserved identifier", name),
            });
        }
        self.symbols.reserve(name);
        self.reserved_tools.insert(name.to_string());
        Ok(())
    }

    pub(super) fn declare_web_search(&mut self, config: &WebSearchConfig) -> String {
        let name = self.symbols.allocate("web_search_preview");
        self.import("agents", "WebSearchTool");
        let location = python_dict(&[("type", python_string("approximate"))], 1);
        self.declare(
            DeclarationKind::ToolStub,
            name.clone(),
            format!(
                "{} = {}",
                name,
                python_call(
                    "WebSearchTool",
                    &[
                        format!("search_context_size={}", python_string(&config.search_context_size)),
                        format!("user_location={}", location),
                    ],
                    0
                )
            ),
        );
        name
    }

    /// A FunctionTool node calls its tool with the configured arguments.
    pub fn emit_function_tool(
        &mut self,
        node: &Node,
        config: &FunctionToolConfig,
        input: &str,
    ) -> Result<Emission, CompileError> {
        let tool = self.declare_tool_stub(&node.id, &config.tool)?;

        let mut arguments = Vec::new();
        for argument in &config.arguments {
            if argument.expression.trim().is_empty() {
                continue;
            }
            if !is_identifier(&argument.name) {
                return Err(CompileError::InvalidNodeConfig {
                    node_id: node.id.clone(),
                    message: format!("argument name '{}' is not a valid identifier", argument.name),
                });
            }
            let expr = self.expression(&node.id, &argument.expression)?;
            arguments.push(format!("{}={}", argument.name, python_expr(&expr, input)));
        }

        let result = self.symbols.allocate(&format!("{}_result", tool));
        let mut emission = Emission::default();
        emission.code(format!(
            "{} = {{\"result\": {}({})}}",
            result,
            tool,
            arguments.join(", ")
        ));
        emission.result = Some(result);
        Ok(emission)
    }

    /// Searches a vector store and projects the hits into a results record.
    pub fn emit_file_search(
        &mut self,
        node: &Node,
        config: &FileSearchConfig,
        input: &str,
    ) -> Result<Emission, CompileError> {
        self.require_shared_client();
        let query = self.template(&node.id, &config.query)?;

        let response = self.symbols.allocate("filesearch_response");
        let result = self.symbols.allocate("filesearch_result");

        let mut emission = Emission::default();
        emission.code(format!(
            "{} = await {}.vector_stores.search(vector_store_id={}, query={}, max_num_results={})",
            response,
            CLIENT,
            python_string(&config.vector_store_id),
            python_template(&query, input),
            config.max_results
        ));
        emission.code(format!(
            "{} = {{\"results\": [\n  {{\n    \"id\": result.file_id,\n    \"filename\": result.filename,\n    \"score\": result.score,\n  }} for result in {}.data\n]}}",
            result, response
        ));
        emission.result = Some(result);
        Ok(emission)
    }

    /// Opens an MCP client, performs the configured calls in order and closes it.
    pub fn emit_mcp_tool(&mut self, config: &McpToolConfig) -> Emission {
        let transport = self.symbols.allocate("mcp_transport");
        let client = self.symbols.allocate("mcp_client");
        let mut emission = Emission::default();

        self.import("mcp.client", "Client");
        match &config.transport {
            McpTransport::Http { url } | McpTransport::Sse { url } => {
                self.import("mcp.client", "SSEClientTransport");
                let headers = auth_headers(&config.auth);
                emission.comment("MCP Client initialization (HTTP/SSE)");
                emission.code(format!(
                    "{} = {}",
                    transport,
                    python_call(
                        "SSEClientTransport",
                        &[
                            format!("url={}", python_string(url)),
                            format!("headers={}", python_json(&Json::Object(headers), 1)),
                        ],
                        0
                    )
                ));
            }
            McpTransport::Stdio { command, args } => {
                self.import("mcp.client", "StdioClientTransport");
                let args: Vec<String> = args.iter().map(|a| python_string(a)).collect();
                emission.comment("MCP Client initialization (Stdio)");
                emission.code(format!(
                    "{} = {}",
                    transport,
                    python_call(
                        "StdioClientTransport",
                        &[
                            format!("command={}", python_string(command)),
                            format!("args=[{}]", args.join(", ")),
                        ],
                        0
                    )
                ));
            }
        }
        emission.code(format!("{} = Client(transport={})", client, transport));
        emission.code(format!("await {}.initialize()", client));

        for call in &config.calls {
            let result = self.symbols.allocate("mcp_result");
            emission.blank();
            emission.comment("Call MCP tool");
            emission.code(format!(
                "{} = await {}",
                result,
                python_call(
                    &format!("{}.call_tool", client),
                    &[
                        format!("name={}", python_string(&call.tool_name)),
                        format!("arguments={}", python_json(&Json::Object(call.arguments.clone()), 1)),
                    ],
                    0
                )
            ));
        }

        emission.blank();
        emission.comment("Close connection");
        emission.code(format!("await {}.close()", client));
        emission
    }
}

fn auth_headers(auth: &McpAuth) -> Map<String, Json> {
    let mut headers = Map::new();
    match auth {
        McpAuth::None => {}
        McpAuth::ApiKey { key } => {
            headers.insert("Authorization".to_string(), Json::String(format!("Api-Key {}", key)));
        }
        McpAuth::Bearer { token } => {
            headers.insert("Authorization".to_string(), Json::String(format!("Bearer {}", token)));
        }
        McpAuth::Custom { headers: custom } => headers.extend(custom.clone()),
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Statement;
    use crate::compiler::symbols::SymbolTable;
    use crate::workflow::{Assignment, McpCall, NodeKind, ToolParameters};
    use serde_json::json;

    fn node(id: &str) -> Node {
        Node {
            id: id.to_string(),
            label: String::new(),
            kind: NodeKind::Start,
        }
    }

    fn emitter() -> Emitter {
        Emitter::new(SymbolTable::new(), "input_as_text")
    }

    fn weather_tool() -> ToolDefinition {
        let mut properties = Map::new();
        properties.insert("location".to_string(), json!({"type": "string"}));
        properties.insert("days".to_string(), json!({"type": "integer"}));
        properties.insert("extra".to_string(), json!({}));
        ToolDefinition {
            name: "get_weather".to_string(),
            description: String::new(),
            parameters: ToolParameters { properties },
        }
    }

    #[test]
    fn tool_stub_is_declared_once_with_typed_parameters() {
        let mut emitter = emitter();
        emitter.declare_tool_stub("a", &weather_tool()).unwrap();
        emitter.declare_tool_stub("b", &weather_tool()).unwrap();
        let module = emitter.finish(vec![], "run_workflow".to_string(), Default::default());
        let stubs: Vec<&str> = module
            .declarations_of(DeclarationKind::ToolStub)
            .map(|d| d.source.as_str())
            .collect();
        assert_eq!(
            stubs,
            vec!["@function_tool\ndef get_weather(location: str, days: int, extra: Any):\n  pass"]
        );
        assert!(module.imports.contains("typing", "Any"));
        assert!(module.imports.contains("agents", "function_tool"));
    }

    #[test]
    fn function_tool_node_calls_the_stub() {
        let mut emitter = emitter();
        let config = FunctionToolConfig {
            tool: weather_tool(),
            arguments: vec![
                Assignment {
                    name: "location".to_string(),
                    expression: "input.output_text".to_string(),
                },
                Assignment {
                    name: "days".to_string(),
                    expression: String::new(),
                },
            ],
        };
        let emission = emitter
            .emit_function_tool(&node("f"), &config, "agent_result")
            .unwrap();
        assert_eq!(
            emission.statements,
            vec![Statement::Code(
                "get_weather_result = {\"result\": get_weather(location=agent_result[\"output_text\"])}"
                    .to_string()
            )]
        );
        assert_eq!(emission.result.as_deref(), Some("get_weather_result"));
    }

    #[test]
    fn reserved_tool_names_are_rejected() {
        let mut emitter = emitter();
        emitter.symbols.reserve("state");
        assert!(emitter.reserve_tool_name("t", "get_weather").is_ok());
        assert!(emitter.reserve_tool_name("t2", "get_weather").is_ok());
        assert!(matches!(
            emitter.reserve_tool_name("t3", "state"),
            Err(CompileError::InvalidNodeConfig { .. })
        ));
    }

    #[test]
    fn file_search_escapes_query_and_awaits_the_search() {
        let mut emitter = emitter();
        let config = FileSearchConfig {
            vector_store_id: "123".to_string(),
            query: "search query \"with\" quotes".to_string(),
            max_results: 10,
        };
        let emission = emitter.emit_file_search(&node("fs"), &config, "workflow").unwrap();
        assert_eq!(
            emission.statements[0],
            Statement::Code(
                "filesearch_response = await client.vector_stores.search(vector_store_id=\"123\", query=\"search query \\\"with\\\" quotes\", max_num_results=10)"
                    .to_string()
            )
        );
        assert_eq!(emission.result.as_deref(), Some("filesearch_result"));
        let module = emitter.finish(vec![], "run_workflow".to_string(), Default::default());
        assert_eq!(module.declarations_of(DeclarationKind::SharedClient).count(), 1);
    }

    #[test]
    fn mcp_opens_calls_and_closes_in_order() {
        let mut emitter = emitter();
        let mut arguments = Map::new();
        arguments.insert("table".to_string(), json!("users"));
        let config = McpToolConfig {
            transport: McpTransport::Http {
                url: "https://api.example.com/mcp".to_string(),
            },
            auth: McpAuth::Bearer {
                token: "sk-test".to_string(),
            },
            calls: vec![
                McpCall {
                    tool_name: "database_query".to_string(),
                    arguments,
                },
                McpCall {
                    tool_name: "ping".to_string(),
                    arguments: Map::new(),
                },
            ],
        };
        let emission = emitter.emit_mcp_tool(&config);
        assert_eq!(emission.result, None);
        let code: Vec<&str> = emission
            .statements
            .iter()
            .filter_map(|s| match s {
                Statement::Code(c) => Some(c.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(
            code,
            vec![
                "mcp_transport = SSEClientTransport(\n  url=\"https://api.example.com/mcp\",\n  headers={\n    \"Authorization\": \"Bearer sk-test\"\n  }\n)",
                "mcp_client = Client(transport=mcp_transport)",
                "await mcp_client.initialize()",
                "mcp_result = await mcp_client.call_tool(\n  name=\"database_query\",\n  arguments={\n    \"table\": \"users\"\n  }\n)",
                "mcp_result1 = await mcp_client.call_tool(\n  name=\"ping\",\n  arguments={}\n)",
                "await mcp_client.close()",
            ]
        );
    }
}
