use clap::Parser;
use flowgen::ast::DisplayBlock;
use flowgen::prelude::*;
use serde::Deserialize;
use std::fs;
use std::time::Instant;

// --- JSON Deserialization Structs (Input Format Specific) ---
// These structs match the editor's workflow export and are only used here for conversion.

#[derive(Deserialize)]
struct RawWorkflow {
    start_node_id: String,
    #[serde(default)]
    state_vars: Vec<RawStateVar>,
    #[serde(default)]
    input_variable_json_schema: Option<RawInputSchema>,
    nodes: Vec<RawNode>,
    #[serde(default)]
    edges: Vec<RawEdge>,
}

#[derive(Deserialize)]
struct RawStateVar {
    name: String,
    #[serde(default)]
    default: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct RawInputSchema {
    #[serde(default)]
    properties: serde_json::Map<String, serde_json::Value>,
}

#[derive(Deserialize)]
struct RawNode {
    id: String,
    #[serde(default)]
    label: String,
    node_type: String,
    #[serde(default)]
    config: serde_json::Value,
}

#[derive(Deserialize)]
struct RawEdge {
    source_node_id: String,
    target_node_id: String,
    #[serde(default)]
    source_port_id: Option<String>,
}

// --- Converter Implementation ---
// This implements the conversion from the editor export to flowgen's canonical WorkflowDefinition.

/// Maps an editor output port onto the structural slot it fills.
fn branch_for_port(port: Option<&str>) -> Result<BranchTag, WorkflowConversionError> {
    let Some(port) = port else {
        return Ok(BranchTag::None);
    };
    if let Some(case) = port.strip_prefix("case-") {
        return case.parse().map(BranchTag::Case).map_err(|_| {
            WorkflowConversionError::ValidationError(format!("invalid case port '{}'", port))
        });
    }
    Ok(match port {
        "on_approve" | "approve" => BranchTag::Approve,
        "on_reject" | "reject" => BranchTag::Reject,
        "fallback" | "else" | "on_fail" | "fail" => BranchTag::False,
        "loop_body" | "body" => BranchTag::LoopBody,
        "loop_exit" | "exit" => BranchTag::LoopExit,
        _ => BranchTag::None,
    })
}

fn state_type_of(value: Option<&serde_json::Value>) -> Option<StateType> {
    match value? {
        serde_json::Value::String(_) => Some(StateType::String),
        serde_json::Value::Number(_) => Some(StateType::Number),
        serde_json::Value::Bool(_) => Some(StateType::Bool),
        serde_json::Value::Array(_) => Some(StateType::List),
        _ => None,
    }
}

impl IntoWorkflow for RawWorkflow {
    fn into_workflow(self) -> Result<WorkflowDefinition, WorkflowConversionError> {
        let mut workflow = WorkflowDefinition::new(self.start_node_id);

        if let Some(schema) = self.input_variable_json_schema {
            if !schema.properties.is_empty() {
                workflow.input_schema = schema
                    .properties
                    .into_iter()
                    .map(|(name, property)| {
                        let field_type = property
                            .get("type")
                            .cloned()
                            .and_then(|t| serde_json::from_value(t).ok())
                            .unwrap_or(FieldType::Any);
                        InputField::new(name, field_type)
                    })
                    .collect();
            }
        }

        workflow.state_declarations = self
            .state_vars
            .into_iter()
            .map(|var| {
                let declaration = StateDeclaration::new(var.name, state_type_of(var.default.as_ref()));
                match var.default {
                    Some(default) => declaration.with_default(default),
                    None => declaration,
                }
            })
            .collect();

        // Sticky notes carry no behavior.
        let notes: Vec<String> = self
            .nodes
            .iter()
            .filter(|n| n.node_type == "note" || n.node_type.ends_with(".Note"))
            .map(|n| n.id.clone())
            .collect();

        workflow.nodes = self
            .nodes
            .into_iter()
            .filter(|n| !notes.contains(&n.id))
            .map(|n| {
                NodeDefinition::new(n.id, n.node_type)
                    .with_label(n.label)
                    .with_config(n.config)
            })
            .collect();

        for edge in self.edges {
            if notes.contains(&edge.source_node_id) || notes.contains(&edge.target_node_id) {
                continue;
            }
            let branch = branch_for_port(edge.source_port_id.as_deref())?;
            workflow
                .edges
                .push(EdgeDefinition::new(edge.source_node_id, edge.target_node_id, branch));
        }

        Ok(workflow)
    }
}

/// Compiles an agent workflow export into a Python module
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the workflow JSON export
    workflow_path: String,

    /// Write the generated module here instead of stdout
    #[arg(short, long)]
    output: Option<String>,

    /// Name of the generated entry-point function
    #[arg(short, long, default_value = "run_workflow")]
    entry_point: String,

    /// Let the branches of an If continue at a shared node
    #[arg(long)]
    merge_branches: bool,

    /// Read the canonical workflow JSON instead of the editor export
    #[arg(long)]
    canonical: bool,

    /// Print the control-flow outline of the entry point to stderr
    #[arg(long)]
    outline: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    // --- 1. File Loading ---
    let start = Instant::now();
    let json = fs::read_to_string(&cli.workflow_path).unwrap_or_else(|e| {
        exit_with_error(&format!(
            "Failed to read workflow file '{}': {}",
            &cli.workflow_path, e
        ))
    });

    // --- 2. Parsing and Conversion ---
    let workflow = if cli.canonical {
        WorkflowDefinition::from_json(&json)
            .unwrap_or_else(|e| exit_with_error(&e.to_string()))
    } else {
        let raw: RawWorkflow = serde_json::from_str(&json)
            .unwrap_or_else(|e| exit_with_error(&format!("Failed to parse workflow JSON: {}", e)));
        raw.into_workflow().unwrap_or_else(|e| {
            exit_with_error(&format!("Failed to convert workflow: {}", e))
        })
    };
    log::info!(
        "loaded {} node(s) and {} edge(s)",
        workflow.nodes.len(),
        workflow.edges.len()
    );

    // --- 3. Compilation ---
    let module = Compiler::builder(workflow)
        .with_entry_point(cli.entry_point)
        .with_branch_merging(cli.merge_branches)
        .build()
        .compile()
        .unwrap_or_else(|e| exit_with_error(&format!("Compilation failed: {}", e)));

    if cli.outline {
        eprintln!("{}", DisplayBlock { block: &module.body });
    }

    // --- 4. Output ---
    let source = module.render();
    match &cli.output {
        Some(path) => {
            fs::write(path, &source).unwrap_or_else(|e| {
                exit_with_error(&format!("Failed to write '{}': {}", path, e))
            });
            eprintln!("Wrote {} ({} bytes) in {:?}", path, source.len(), start.elapsed());
        }
        None => print!("{}", source),
    }
}

fn exit_with_error(message: &str) -> ! {
    eprintln!("\nError: {}", message);
    std::process::exit(1);
}
