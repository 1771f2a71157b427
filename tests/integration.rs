//! End-to-end tests: whole workflows compiled and rendered.
mod common;
use common::*;
use flowgen::ast::{Block, Guard, Statement};
use flowgen::prelude::*;
use serde_json::{Value, json};

const HISTORY_SEED: &str = "  conversation_history: list[TResponseInputItem] = [
    {
      \"role\": \"user\",
      \"content\": [
        {
          \"type\": \"input_text\",
          \"text\": workflow[\"input_as_text\"]
        }
      ]
    }
  ]
";

#[test]
fn test_start_to_end_returns_the_input_record() {
    let workflow = WorkflowBuilder::new()
        .state(StateDeclaration::new("a", Some(StateType::String)).with_default(json!("x")))
        .state(StateDeclaration::new("b", Some(StateType::Number)))
        .node("end", "End", Value::Null)
        .edge("start", "end")
        .build();

    let expected = format!(
        "from pydantic import BaseModel
from agents import TResponseInputItem

class WorkflowInput(BaseModel):
  input_as_text: str


# Main code entrypoint
async def run_workflow(workflow_input: WorkflowInput):
  state = {{
    \"a\": \"x\",
    \"b\": None
  }}
  workflow = workflow_input.model_dump()
{}  return workflow
",
        HISTORY_SEED
    );
    assert_eq!(compile(workflow), expected);
}

#[test]
fn test_if_else_branches_share_no_code() {
    let source = compile(create_if_else_flow());

    assert!(source.contains(
        "  if workflow[\"input_as_text\"] == \"\":\n    empty_handler_result_temp = await Runner.run(\n"
    ));
    assert!(source.contains("\n  else:\n    responder_result_temp = await Runner.run(\n"));
    assert!(source.contains("    return empty_handler_result\n  else:\n"));
    assert!(source.ends_with("    return responder_result\n"));
    assert_eq!(occurrences(&source, "conversation_history.extend("), 2);
}

#[test]
fn test_while_loop_wraps_the_body() {
    let workflow = WorkflowBuilder::new()
        .state(StateDeclaration::new("flag", Some(StateType::Bool)).with_default(json!(true)))
        .node("loop", "While", json!({ "condition": "state.flag" }))
        .node("agent", "Agent", json!({}))
        .node("end", "End", Value::Null)
        .edge("start", "loop")
        .branch("loop", "agent", BranchTag::LoopBody)
        .edge("agent", "loop")
        .branch("loop", "end", BranchTag::LoopExit)
        .build();
    let source = compile(workflow);

    let expected_tail = "  while state[\"flag\"]:
    agent_result_temp = await Runner.run(
      agent,
      input=[
        *conversation_history
      ]
    )

    conversation_history.extend([item.to_input_item() for item in agent_result_temp.new_items])

    agent_result = {
      \"output_text\": agent_result_temp.final_output_as(str)
    }
  return workflow
";
    assert!(source.ends_with(expected_tail), "{}", source);
}

#[test]
fn test_nested_loops_each_close_on_their_own_head() {
    let workflow = WorkflowBuilder::new()
        .node("outer", "While", json!({ "condition": "state.left > 0" }))
        .node("inner", "While", json!({ "condition": "workflow.input_as_text == \"\"" }))
        .node("step", "SetState", json!({ "assignments": [{ "name": "left", "expression": "state.left - 1" }] }))
        .node("end", "End", Value::Null)
        .state(StateDeclaration::new("left", Some(StateType::Number)).with_default(json!(3)))
        .edge("start", "outer")
        .branch("outer", "inner", BranchTag::LoopBody)
        .branch("inner", "step", BranchTag::LoopBody)
        .edge("step", "inner")
        .branch("inner", "outer", BranchTag::LoopExit)
        .branch("outer", "end", BranchTag::LoopExit)
        .build();
    let source = compile(workflow);

    assert!(source.ends_with(
        "  while state[\"left\"] > 0:
    while workflow[\"input_as_text\"] == \"\":
      state[\"left\"] = state[\"left\"] - 1
  return workflow
"
    ));
}

#[test]
fn test_four_agents_get_monotonic_suffixes() {
    let module = Compiler::builder(create_agent_chain(4))
        .build()
        .compile()
        .expect("Failed to compile");

    let agents: Vec<&str> = module
        .declarations_of(flowgen::module::DeclarationKind::Agent)
        .map(|d| d.name.as_str())
        .collect();
    assert_eq!(agents, vec!["agent", "agent1", "agent2", "agent3"]);

    let source = module.render();
    assert!(source.contains("agent_result_temp = await Runner.run(\n    agent,\n"));
    assert!(source.contains("agent_result_temp3 = await Runner.run(\n    agent3,\n"));
    assert!(source.ends_with("  return agent_result3\n"));
}

#[test]
fn test_history_is_extended_once_after_each_call() {
    let source = compile(create_agent_chain(3));
    for suffix in ["", "1", "2"] {
        let call = format!("agent_result_temp{} = await Runner.run(", suffix);
        let extend = format!("for item in agent_result_temp{}.new_items])", suffix);
        assert_eq!(occurrences(&source, &call), 1, "{}", call);
        assert_eq!(occurrences(&source, &extend), 1, "{}", extend);
        let call_at = source.find(&call).unwrap();
        let extend_at = source.find(&extend).unwrap();
        assert!(call_at < extend_at);
    }
}

#[test]
fn test_four_guardrails_nest_their_stages() {
    let source = compile(create_guardrail_chain(4));

    for name in [
        "guardrails_result",
        "guardrails_result1",
        "guardrails_result2",
        "guardrails_result3",
    ] {
        assert!(source.contains(&format!("  {} = await run_guardrails(", name)), "{}", name);
    }
    assert!(!source.contains("guardrails_result4"));
    assert!(source.contains("  guardrails_inputtext = workflow[\"input_as_text\"]\n"));
    assert!(source.contains("    guardrails_inputtext1 = guardrails_output[\"safe_text\"]\n"));
    assert!(source.ends_with(
        "        if guardrails_hastripwire3:
          return guardrails_output3
        else:
          return guardrails_output3
"
    ));
    assert_eq!(occurrences(&source, "def guardrails_has_tripwire("), 1);
    assert_eq!(occurrences(&source, "# Guardrails definitions"), 1);
    assert_eq!(occurrences(&source, "client = AsyncOpenAI()"), 1);
}

/// Finds the guard whose check is `check`, anywhere in `block`.
fn find_guard<'a>(block: &'a Block, check: &str) -> Option<&'a Guard> {
    block.statements.iter().find_map(|statement| match statement {
        Statement::Guard(guard) if guard.check == check => Some(guard),
        Statement::Guard(guard) => {
            find_guard(&guard.continuation, check).or_else(|| find_guard(&guard.exit, check))
        }
        Statement::Branch { arms, otherwise } => arms
            .iter()
            .find_map(|arm| find_guard(&arm.body, check))
            .or_else(|| otherwise.as_ref().and_then(|b| find_guard(b, check))),
        Statement::Loop { body, .. } => find_guard(body, check),
        _ => None,
    })
}

#[test]
fn test_tripped_stage_returns_before_the_next_stage() {
    let module = Compiler::builder(create_guardrail_chain(3))
        .build()
        .compile()
        .expect("Failed to compile");

    for (k, suffix) in ["", "1", "2"].iter().enumerate() {
        let guard = find_guard(&module.body, &format!("guardrails_hastripwire{}", suffix))
            .unwrap_or_else(|| panic!("stage {} has no guard", k));
        assert!(!guard.proceed_when);
        assert_eq!(
            guard.when_true().statements,
            vec![Statement::Return(format!("guardrails_output{}", suffix))]
        );
    }
}

#[test]
fn test_guardrail_fail_edge_runs_its_chain() {
    let workflow = WorkflowBuilder::new()
        .node("guard", "Guardrail", Value::Null)
        .labeled("fallback", "Agent", "Apology", json!({ "instructions": "Apologize" }))
        .node("answer", "Agent", json!({}))
        .node("end", "End", Value::Null)
        .edge("start", "guard")
        .edge("guard", "answer")
        .branch("guard", "fallback", BranchTag::False)
        .edge("answer", "end")
        .edge("fallback", "end")
        .build();
    let source = compile(workflow);

    assert!(source.contains("  if guardrails_hastripwire:\n    apology_result_temp = await Runner.run("));
    assert!(source.contains("    return apology_result\n  else:\n    agent_result_temp = await Runner.run("));
    assert!(source.ends_with("    return agent_result\n"));
}

#[test]
fn test_file_search_query_quotes_round_trip() {
    let query = "Find \"quoted\" text with a \\ backslash";
    let workflow = WorkflowBuilder::new()
        .node(
            "search",
            "builtins.tool.FileSearch",
            json!({ "vectorStoreId": "vs_123", "query": query, "maxResults": 5 }),
        )
        .node("end", "End", Value::Null)
        .edge("start", "search")
        .edge("search", "end")
        .build();
    let source = compile(workflow);

    let start = source.find("query=").expect("query argument") + "query=".len();
    let end = source[start..].find(", max_num_results=").expect("max results") + start;
    let literal = &source[start..end];

    // Decode the Python literal.
    assert!(literal.starts_with('"') && literal.ends_with('"'));
    let mut decoded = String::new();
    let mut chars = literal[1..literal.len() - 1].chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            decoded.push(chars.next().expect("dangling escape"));
        } else {
            decoded.push(c);
        }
    }
    assert_eq!(decoded, query);
    assert!(source.contains("max_num_results=5)"));
    assert!(source.ends_with("  return filesearch_result\n"));
}

#[test]
fn test_approval_reject_to_end_returns_workflow() {
    let workflow = WorkflowBuilder::new()
        .labeled("draft", "Agent", "Writer", json!({ "instructions": "Draft a reply" }))
        .node(
            "approval",
            "builtins.BinaryApproval",
            json!({ "message": "Send {{ input.output_text }}?" }),
        )
        .labeled("send", "Agent", "Sender", json!({}))
        .node("end", "End", Value::Null)
        .edge("start", "draft")
        .edge("draft", "approval")
        .branch("approval", "send", BranchTag::Approve)
        .branch("approval", "end", BranchTag::Reject)
        .edge("send", "end")
        .build();
    let source = compile(workflow);

    assert!(source.contains(
        "  approval_message = \"Send \" + str(writer_result[\"output_text\"]) + \"?\"\n\n  if approval_request(approval_message):\n"
    ));
    assert!(source.ends_with("    return sender_result\n  else:\n    return workflow\n"));
    assert!(source.contains("def approval_request(message: str):\n  # TODO: Implement\n  return True\n"));
}

#[test]
fn test_approval_reject_chain_is_linearized_in_the_exit() {
    let workflow = WorkflowBuilder::new()
        .node("approval", "UserApproval", json!({ "message": "Proceed?" }))
        .labeled("yes", "Transform", "", json!({ "expression": "{\"approved\": true}" }))
        .labeled("no", "Transform", "", json!({ "expression": "{\"approved\": false}" }))
        .node("end", "End", Value::Null)
        .edge("start", "approval")
        .branch("approval", "yes", BranchTag::Approve)
        .branch("approval", "no", BranchTag::Reject)
        .edge("yes", "end")
        .edge("no", "end")
        .build();
    let source = compile(workflow);

    assert!(source.ends_with(
        "  if approval_request(approval_message):
    transform_result = {\"approved\": True}
    return transform_result
  else:
    transform_result1 = {\"approved\": False}
    return transform_result1
"
    ));
}

#[test]
fn test_end_with_output_schema_returns_a_skeleton() {
    let workflow = WorkflowBuilder::new()
        .node(
            "end",
            "End",
            json!({ "outputSchema": {
                "type": "object",
                "properties": { "answer": { "type": "string" }, "sources": { "type": "array" } }
            }}),
        )
        .edge("start", "end")
        .build();
    let source = compile(workflow);

    assert!(source.ends_with(
        "  end_result = {
    \"answer\": None,
    \"sources\": []
  }
  return end_result
"
    ));
}

#[test]
fn test_function_tool_and_agent_share_one_stub() {
    let tool = json!({
        "name": "lookup_order",
        "description": "Find an order",
        "parameters": { "properties": { "order_id": { "type": "string" }, "verbose": { "type": "boolean" } } }
    });
    let workflow = WorkflowBuilder::new()
        .labeled(
            "support",
            "Agent",
            "Support",
            json!({ "tools": [{ "type": "function", "name": "lookup_order", "parameters": tool["parameters"] }] }),
        )
        .node(
            "call",
            "FunctionTool",
            json!({ "tool": tool, "arguments": [{ "name": "order_id", "expression": "state.order" }] }),
        )
        .node("end", "End", Value::Null)
        .state(StateDeclaration::new("order", Some(StateType::String)))
        .edge("start", "support")
        .edge("support", "call")
        .edge("call", "end")
        .build();
    let source = compile(workflow);

    assert_eq!(occurrences(&source, "@function_tool\n"), 1);
    assert!(source.contains(
        "# Tool definitions\n@function_tool\ndef lookup_order(order_id: str, verbose: bool):\n  pass\n"
    ));
    assert!(source.contains("  tools=[\n    lookup_order\n  ],\n"));
    assert!(source.contains(
        "  lookup_order_result = {\"result\": lookup_order(order_id=state[\"order\"])}\n  return lookup_order_result\n"
    ));
}

#[test]
fn test_mcp_tool_keeps_the_previous_aggregate() {
    let workflow = WorkflowBuilder::new()
        .node("t", "Transform", json!({ "expression": "{\"ok\": true}" }))
        .node(
            "mcp",
            "MCPTool",
            json!({
                "transport": { "type": "http", "url": "https://mcp.example.com" },
                "auth": { "type": "bearer", "token": "secret" },
                "calls": [{ "toolName": "ping", "arguments": { "depth": 1 } }]
            }),
        )
        .node("end", "End", Value::Null)
        .edge("start", "t")
        .edge("t", "mcp")
        .edge("mcp", "end")
        .build();
    let source = compile(workflow);

    assert!(source.contains("from mcp.client import Client, SSEClientTransport\n"));
    assert!(source.contains("    \"Authorization\": \"Bearer secret\"\n"));
    assert!(source.contains("  mcp_result = await mcp_client.call_tool(\n    name=\"ping\",\n"));
    assert!(source.ends_with("  await mcp_client.close()\n  return transform_result\n"));
}

#[test]
fn test_compilation_is_deterministic() {
    let build = || {
        WorkflowBuilder::new()
            .labeled("triage", "Agent", "Triage", json!({ "instructions": "Classify" }))
            .node(
                "route",
                "If",
                json!({ "cases": [
                    { "condition": "input.output_text == \"refund\"" },
                    { "condition": "input.output_text == \"order\"" }
                ]}),
            )
            .node("refund", "Guardrail", Value::Null)
            .node("order", "FileSearch", json!({ "vectorStoreId": "vs_1", "query": "{{ workflow.input_as_text }}" }))
            .node("other", "Transform", json!({ "expression": "state" }))
            .node("end", "End", Value::Null)
            .edge("start", "triage")
            .edge("triage", "route")
            .branch("route", "refund", BranchTag::Case(0))
            .branch("route", "order", BranchTag::Case(1))
            .branch("route", "other", BranchTag::False)
            .edge("order", "end")
            .edge("other", "end")
            .build()
    };
    assert_eq!(compile(build()), compile(build()));
}

#[test]
fn test_allocated_identifiers_are_distinct() {
    let workflow = WorkflowBuilder::new()
        .labeled("first", "Agent", "Agent", json!({}))
        .node("second", "Agent", json!({}))
        .node("search", "FileSearch", json!({ "vectorStoreId": "vs_1", "query": "q" }))
        .node("t1", "Transform", json!({ "expression": "input" }))
        .node("approve", "UserApproval", json!({ "message": "ok?" }))
        .node("guard", "Guardrail", Value::Null)
        .node("t2", "Transform", json!({ "expression": "input" }))
        .node("second_search", "FileSearch", json!({ "vectorStoreId": "vs_2", "query": "q" }))
        .node("end", "End", Value::Null)
        .edge("start", "first")
        .edge("first", "second")
        .edge("second", "search")
        .edge("search", "t1")
        .edge("t1", "approve")
        .branch("approve", "guard", BranchTag::Approve)
        .branch("approve", "end", BranchTag::Reject)
        .edge("guard", "t2")
        .edge("t2", "second_search")
        .edge("second_search", "end")
        .build();
    let source = compile(workflow);

    let entry = source.find("async def").expect("entry point");
    let mut assigned: Vec<&str> = Vec::new();
    for (offset, line) in source.lines().scan(0, |at, line| {
        let start = *at;
        *at += line.len() + 1;
        Some((start, line))
    }) {
        // Helper bodies reuse locals; only module-level and entry-point
        // bindings are allocated.
        if offset < entry && line.starts_with(' ') {
            continue;
        }
        if let Some((name, _)) = line.trim_start().split_once(" = ") {
            if name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                assigned.push(name);
            }
        }
    }
    let mut unique = assigned.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), assigned.len(), "{:?}", assigned);
    assert!(assigned.contains(&"agent"));
    assert!(assigned.contains(&"agent1"));
    assert!(assigned.contains(&"filesearch_result1"));
    assert!(assigned.contains(&"transform_result1"));
}
