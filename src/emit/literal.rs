//! Rendering of literals and expressions as Python source.

use crate::ast::{BinaryOp, Expr, Root, UnaryOp, Value};
use crate::compiler::expression::TemplateSegment;
use crate::workflow::MessageRole;
use serde_json::Value as Json;

const INDENT: &str = "  ";

/// A double-quoted Python string literal that evaluates back to `text`.
pub fn python_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        push_escaped(&mut out, c);
    }
    out.push('"');
    out
}

/// Like [`python_string`], but text containing line breaks becomes a
/// triple-quoted literal that keeps them readable.
pub fn python_text_block(text: &str) -> String {
    if !text.contains('\n') {
        return python_string(text);
    }
    let mut out = String::with_capacity(text.len() + 6);
    out.push_str("\"\"\"");
    for c in text.chars() {
        match c {
            '\n' => out.push('\n'),
            other => push_escaped(&mut out, other),
        }
    }
    out.push_str("\"\"\"");
    out
}

fn push_escaped(out: &mut String, c: char) {
    match c {
        '\\' => out.push_str("\\\\"),
        '"' => out.push_str("\\\""),
        '\n' => out.push_str("\\n"),
        '\r' => out.push_str("\\r"),
        '\t' => out.push_str("\\t"),
        c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
        c => out.push(c),
    }
}

pub fn python_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Renders JSON as a Python literal, one entry per line, nested with
/// two-space steps starting from `level`.
pub fn python_json(value: &Json, level: usize) -> String {
    match value {
        Json::Null => "None".to_string(),
        Json::Bool(true) => "True".to_string(),
        Json::Bool(false) => "False".to_string(),
        Json::Number(n) => n.to_string(),
        Json::String(s) => python_string(s),
        Json::Array(items) if items.is_empty() => "[]".to_string(),
        Json::Object(entries) if entries.is_empty() => "{}".to_string(),
        Json::Array(items) => {
            let inner = INDENT.repeat(level + 1);
            let body: Vec<String> = items
                .iter()
                .map(|item| format!("{}{}", inner, python_json(item, level + 1)))
                .collect();
            format!("[\n{}\n{}]", body.join(",\n"), INDENT.repeat(level))
        }
        Json::Object(entries) => {
            let inner = INDENT.repeat(level + 1);
            let body: Vec<String> = entries
                .iter()
                .map(|(key, item)| {
                    format!("{}{}: {}", inner, python_string(key), python_json(item, level + 1))
                })
                .collect();
            format!("{{\n{}\n{}}}", body.join(",\n"), INDENT.repeat(level))
        }
    }
}

/// A multi-line Python dict whose values are already-rendered expressions.
pub fn python_dict(entries: &[(&str, String)], level: usize) -> String {
    if entries.is_empty() {
        return "{}".to_string();
    }
    let inner = INDENT.repeat(level + 1);
    let body: Vec<String> = entries
        .iter()
        .map(|(key, value)| format!("{}{}: {}", inner, python_string(key), value))
        .collect();
    format!("{{\n{}\n{}}}", body.join(",\n"), INDENT.repeat(level))
}

/// A multi-line Python list of already-rendered items.
pub fn python_list(items: &[String], level: usize) -> String {
    if items.is_empty() {
        return "[]".to_string();
    }
    let inner = INDENT.repeat(level + 1);
    let body: Vec<String> = items.iter().map(|item| format!("{}{}", inner, item)).collect();
    format!("[\n{}\n{}]", body.join(",\n"), INDENT.repeat(level))
}

/// A call with one argument per line; arguments are rendered at `level + 1`.
pub fn python_call(callee: &str, args: &[String], level: usize) -> String {
    if args.is_empty() {
        return format!("{}()", callee);
    }
    let inner = INDENT.repeat(level + 1);
    let body: Vec<String> = args.iter().map(|arg| format!("{}{}", inner, arg)).collect();
    format!("{}(\n{}\n{})", callee, body.join(",\n"), INDENT.repeat(level))
}

/// One conversation item in the Responses input format. `text` is a rendered
/// Python expression.
pub fn python_message(role: MessageRole, text: &str, level: usize) -> String {
    let (part_type, leading) = match role {
        MessageRole::User => ("input_text", vec![]),
        MessageRole::Assistant => ("output_text", vec![("id", "None".to_string())]),
    };
    let role_name = match role {
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
    };
    let part = python_dict(
        &[("type", python_string(part_type)), ("text", text.to_string())],
        level + 2,
    );
    let mut entries = leading;
    entries.push(("role", python_string(role_name)));
    entries.push(("content", python_list(&[part], level + 1)));
    python_dict(&entries, level)
}

/// Binding strength of the rendered Python form; higher binds tighter.
fn precedence(expr: &Expr) -> u8 {
    match expr {
        Expr::Binary(BinaryOp::Or, _, _) => 1,
        Expr::Binary(BinaryOp::And, _, _) => 2,
        Expr::Unary(UnaryOp::Not, _) => 3,
        Expr::Binary(op, _, _) if op.precedence() == 4 => 4,
        Expr::Binary(BinaryOp::Add | BinaryOp::Subtract, _, _) => 5,
        Expr::Binary(_, _, _) => 6,
        Expr::Unary(UnaryOp::Negate, _) => 7,
        Expr::Member(_, _) | Expr::Index(_, _) => 8,
        Expr::Literal(_) | Expr::Reference(_) | Expr::List(_) | Expr::Object(_) => 9,
    }
}

/// Renders an expression as Python. `input` is the identifier the `input`
/// root stands for on the current path.
pub fn python_expr(expr: &Expr, input: &str) -> String {
    let mut out = String::new();
    write_expr(&mut out, expr, input, 0);
    out
}

fn write_expr(out: &mut String, expr: &Expr, input: &str, parent_precedence: u8) {
    let current = precedence(expr);
    let needs_parens = current < parent_precedence;
    if needs_parens {
        out.push('(');
    }

    match expr {
        Expr::Literal(Value::String(s)) => out.push_str(&python_string(s)),
        Expr::Literal(Value::Number(n)) => out.push_str(&python_number(*n)),
        Expr::Literal(Value::Bool(true)) => out.push_str("True"),
        Expr::Literal(Value::Bool(false)) => out.push_str("False"),
        Expr::Literal(Value::Null) => out.push_str("None"),
        Expr::Reference(Root::Workflow) => out.push_str("workflow"),
        Expr::Reference(Root::State) => out.push_str("state"),
        Expr::Reference(Root::Input) => out.push_str(input),
        Expr::Member(object, field) => {
            write_expr(out, object, input, 8);
            out.push('[');
            out.push_str(&python_string(field));
            out.push(']');
        }
        Expr::Index(object, key) => {
            write_expr(out, object, input, 8);
            out.push('[');
            write_expr(out, key, input, 0);
            out.push(']');
        }
        Expr::List(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_expr(out, item, input, 0);
            }
            out.push(']');
        }
        Expr::Object(entries) => {
            out.push('{');
            for (i, (key, value)) in entries.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(&python_string(key));
                out.push_str(": ");
                write_expr(out, value, input, 0);
            }
            out.push('}');
        }
        Expr::Unary(UnaryOp::Not, operand) => {
            out.push_str("not ");
            write_expr(out, operand, input, current);
        }
        Expr::Unary(UnaryOp::Negate, operand) => {
            out.push('-');
            write_expr(out, operand, input, current);
        }
        Expr::Binary(op, left, right) => {
            let keyword = match op {
                BinaryOp::Or => "or",
                BinaryOp::And => "and",
                other => other.symbol(),
            };
            // Python chains comparisons; a nested comparison keeps its parentheses.
            let left_floor = if current == 4 { current + 1 } else { current };
            write_expr(out, left, input, left_floor);
            out.push(' ');
            out.push_str(keyword);
            out.push(' ');
            write_expr(out, right, input, current + 1);
        }
    }

    if needs_parens {
        out.push(')');
    }
}

/// Renders a message template as one Python string expression.
pub fn python_template(segments: &[TemplateSegment], input: &str) -> String {
    if segments.is_empty() {
        return "\"\"".to_string();
    }
    segments
        .iter()
        .map(|segment| match segment {
            TemplateSegment::Text(text) => python_string(text),
            TemplateSegment::Expr(expr) => format!("str({})", python_expr(expr, input)),
        })
        .collect::<Vec<_>>()
        .join(" + ")
}

/// Whether `name` can be used verbatim as a Python identifier.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
