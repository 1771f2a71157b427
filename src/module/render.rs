use super::{DeclarationKind, EmittedModule};
use crate::ast::{Block, Statement};
use itertools::Itertools;

const INDENT: &str = "  ";

pub(super) fn render_module(module: &EmittedModule) -> String {
    let mut out = String::new();

    for (source, names) in module.imports.groups() {
        out.push_str(&format!("from {} import {}\n", source, names.iter().join(", ")));
    }
    if !module.imports.is_empty() {
        out.push('\n');
    }

    let mut previous: Option<DeclarationKind> = None;
    for declaration in &module.declarations {
        if previous != Some(declaration.kind) {
            if let Some(header) = declaration.kind.header() {
                out.push_str(header);
                out.push('\n');
            }
        }
        out.push_str(&declaration.source);
        out.push_str("\n\n");
        previous = Some(declaration.kind);
    }

    out.push_str("class WorkflowInput(BaseModel):\n");
    if module.input_fields.is_empty() {
        out.push_str(&format!("{}pass\n", INDENT));
    }
    for field in &module.input_fields {
        out.push_str(&format!(
            "{}{}: {}\n",
            INDENT,
            field.name,
            field.field_type.python_annotation()
        ));
    }
    out.push_str("\n\n# Main code entrypoint\n");
    out.push_str(&format!(
        "async def {}(workflow_input: WorkflowInput):\n",
        module.entry_point
    ));
    write_block(&mut out, &module.body, 1);
    out
}

fn write_block(out: &mut String, block: &Block, level: usize) {
    let has_code = block
        .statements
        .iter()
        .any(|s| !matches!(s, Statement::Blank | Statement::Comment(_)));
    if !has_code {
        write_line(out, level, "pass");
    }
    for statement in &block.statements {
        write_statement(out, statement, level);
    }
}

fn write_line(out: &mut String, level: usize, line: &str) {
    if !line.is_empty() {
        out.push_str(&INDENT.repeat(level));
        out.push_str(line);
    }
    out.push('\n');
}

fn write_statement(out: &mut String, statement: &Statement, level: usize) {
    match statement {
        Statement::Code(code) => {
            for line in code.lines() {
                write_line(out, level, line);
            }
        }
        Statement::Comment(text) => write_line(out, level, &format!("# {}", text)),
        Statement::Blank => out.push('\n'),
        Statement::Return(value) => write_line(out, level, &format!("return {}", value)),
        Statement::Loop { condition, body } => {
            write_line(out, level, &format!("while {}:", condition));
            write_block(out, body, level + 1);
        }
        Statement::Branch { arms, otherwise } => {
            for (i, arm) in arms.iter().enumerate() {
                let keyword = if i == 0 { "if" } else { "elif" };
                write_line(out, level, &format!("{} {}:", keyword, arm.condition));
                write_block(out, &arm.body, level + 1);
            }
            if let Some(otherwise) = otherwise {
                write_line(out, level, "else:");
                write_block(out, otherwise, level + 1);
            }
        }
        Statement::Guard(guard) => {
            write_line(out, level, &format!("if {}:", guard.check));
            write_block(out, guard.when_true(), level + 1);
            write_line(out, level, "else:");
            write_block(out, guard.when_false(), level + 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BranchArm, Guard};

    fn render(block: &Block) -> String {
        let mut out = String::new();
        write_block(&mut out, block, 1);
        out
    }

    #[test]
    fn empty_blocks_render_pass() {
        let block = Block {
            statements: vec![Statement::Branch {
                arms: vec![BranchArm {
                    condition: "x".to_string(),
                    body: Block::new(),
                }],
                otherwise: Some(Block {
                    statements: vec![Statement::Comment("nothing".to_string())],
                }),
            }],
        };
        assert_eq!(render(&block), "  if x:\n    pass\n  else:\n    # nothing\n    pass\n");
    }

    #[test]
    fn multi_line_code_is_indented_per_line() {
        let block = Block {
            statements: vec![
                Statement::Code("a = {\n  \"k\": 1\n}".to_string()),
                Statement::Blank,
                Statement::Return("a".to_string()),
            ],
        };
        assert_eq!(render(&block), "  a = {\n    \"k\": 1\n  }\n\n  return a\n");
    }

    #[test]
    fn inverted_guard_puts_exit_under_the_check() {
        let guard = Guard {
            check: "tripped".to_string(),
            proceed_when: false,
            continuation: Block {
                statements: vec![Statement::Return("next".to_string())],
            },
            exit: Block {
                statements: vec![Statement::Return("output".to_string())],
            },
        };
        let block = Block {
            statements: vec![Statement::Guard(guard)],
        };
        assert_eq!(
            render(&block),
            "  if tripped:\n    return output\n  else:\n    return next\n"
        );
    }
}
