use std::fmt;

/// An ordered sequence of statements sharing one indentation level.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Block {
    pub statements: Vec<Statement>,
}

/// The structured control flow the linearizer produces.
///
/// Conditions and code lines are already rendered target source; the tree only
/// carries their nesting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// One or more source lines emitted verbatim at the block's indentation.
    Code(String),
    Comment(String),
    /// An empty separator line.
    Blank,
    /// `if`/`elif` chain with an optional `else`.
    Branch {
        arms: Vec<BranchArm>,
        otherwise: Option<Block>,
    },
    Loop {
        condition: String,
        body: Block,
    },
    Guard(Guard),
    Return(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchArm {
    pub condition: String,
    pub body: Block,
}

/// A guarded continuation: evaluates `check`, proceeds with `continuation`
/// when the check equals `proceed_when`, otherwise runs `exit`.
///
/// User approval proceeds on `true`; a guardrail stage proceeds on `false`
/// (its check is the tripwire flag). The rendered `if` always tests `check`
/// itself, so the polarity decides which block sits under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guard {
    pub check: String,
    pub proceed_when: bool,
    pub continuation: Block,
    pub exit: Block,
}

impl Guard {
    /// The block executed when `check` is truthy.
    pub fn when_true(&self) -> &Block {
        if self.proceed_when {
            &self.continuation
        } else {
            &self.exit
        }
    }

    /// The block executed when `check` is falsy.
    pub fn when_false(&self) -> &Block {
        if self.proceed_when {
            &self.exit
        } else {
            &self.continuation
        }
    }
}

impl Block {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, statement: Statement) {
        self.statements.push(statement);
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Whether every path through the block ends in a `return`.
    pub fn is_terminal(&self) -> bool {
        self.statements.last().is_some_and(Statement::is_terminal)
    }
}

impl Statement {
    pub fn is_terminal(&self) -> bool {
        match self {
            Statement::Return(_) => true,
            Statement::Branch { arms, otherwise } => {
                otherwise.as_ref().is_some_and(Block::is_terminal)
                    && arms.iter().all(|arm| arm.body.is_terminal())
            }
            Statement::Guard(guard) => guard.continuation.is_terminal() && guard.exit.is_terminal(),
            Statement::Loop { .. } | Statement::Code(_) | Statement::Comment(_) | Statement::Blank => {
                false
            }
        }
    }
}

/// Renders a block as an indented outline of its control structure, one line
/// per statement. Used by the CLI's `--outline` flag and in test failures.
pub struct DisplayBlock<'a> {
    pub block: &'a Block,
}

impl<'a> fmt::Display for DisplayBlock<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Body")?;
        self.fmt_children(self.block, f, "")
    }
}

impl<'a> DisplayBlock<'a> {
    fn fmt_children(&self, block: &Block, f: &mut fmt::Formatter<'_>, prefix: &str) -> fmt::Result {
        // Separator lines carry no structure.
        let visible: Vec<&Statement> = block
            .statements
            .iter()
            .filter(|s| !matches!(s, Statement::Blank))
            .collect();
        if visible.is_empty() {
            return writeln!(f, "{}└── pass", prefix);
        }
        let count = visible.len();
        for (i, statement) in visible.into_iter().enumerate() {
            self.fmt_as_tree(statement, f, prefix, i + 1 == count)?;
        }
        Ok(())
    }

    fn fmt_as_tree(
        &self,
        statement: &Statement,
        f: &mut fmt::Formatter<'_>,
        prefix: &str,
        is_last: bool,
    ) -> fmt::Result {
        let node_marker = if is_last { "└── " } else { "├── " };
        write!(f, "{}{}", prefix, node_marker)?;

        let child_prefix = format!("{}{}", prefix, if is_last { "    " } else { "│   " });

        match statement {
            Statement::Code(code) => {
                let first = code.lines().next().unwrap_or_default();
                if code.lines().count() > 1 {
                    writeln!(f, "{} ...", first)
                } else {
                    writeln!(f, "{}", first)
                }
            }
            Statement::Comment(text) => writeln!(f, "# {}", text),
            Statement::Blank => writeln!(f),
            Statement::Return(value) => writeln!(f, "return {}", value),
            Statement::Loop { condition, body } => {
                writeln!(f, "while {}", condition)?;
                self.fmt_children(body, f, &child_prefix)
            }
            Statement::Branch { arms, otherwise } => {
                writeln!(f, "branch")?;
                let total = arms.len() + usize::from(otherwise.is_some());
                for (i, arm) in arms.iter().enumerate() {
                    let keyword = if i == 0 { "if" } else { "elif" };
                    self.fmt_arm(f, &format!("{} {}", keyword, arm.condition), &arm.body, &child_prefix, i + 1 == total)?;
                }
                if let Some(otherwise) = otherwise {
                    self.fmt_arm(f, "else", otherwise, &child_prefix, true)?;
                }
                Ok(())
            }
            Statement::Guard(guard) => {
                writeln!(f, "guard {} (proceed when {})", guard.check, guard.proceed_when)?;
                self.fmt_arm(f, "continue", &guard.continuation, &child_prefix, false)?;
                self.fmt_arm(f, "exit", &guard.exit, &child_prefix, true)
            }
        }
    }

    fn fmt_arm(
        &self,
        f: &mut fmt::Formatter<'_>,
        header: &str,
        body: &Block,
        prefix: &str,
        is_last: bool,
    ) -> fmt::Result {
        let node_marker = if is_last { "└── " } else { "├── " };
        writeln!(f, "{}{}{}", prefix, node_marker, header)?;
        let child_prefix = format!("{}{}", prefix, if is_last { "    " } else { "│   " });
        self.fmt_children(body, f, &child_prefix)
    }
}
