//! The assembled output of a compilation: imports, module-level declarations,
//! the input schema and the entry-point body.

use crate::ast::Block;
use crate::workflow::InputField;

mod render;

/// `from <module> import <names>` lines, grouped per module in first-use order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSet {
    groups: Vec<(String, Vec<String>)>,
}

impl ImportSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `name` from `module`; repeated pairs are ignored.
    pub fn add(&mut self, module: &str, name: &str) {
        match self.groups.iter_mut().find(|(m, _)| m == module) {
            Some((_, names)) => {
                if !names.iter().any(|n| n == name) {
                    names.push(name.to_string());
                }
            }
            None => self
                .groups
                .push((module.to_string(), vec![name.to_string()])),
        }
    }

    pub fn contains(&self, module: &str, name: &str) -> bool {
        self.groups
            .iter()
            .any(|(m, names)| m == module && names.iter().any(|n| n == name))
    }

    pub fn groups(&self) -> &[(String, Vec<String>)] {
        &self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Module-level declaration categories, in the order they are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DeclarationKind {
    SharedClient,
    ToolStub,
    GuardrailBundle,
    OutputSchema,
    Agent,
    ApprovalCallback,
    GuardrailHelpers,
}

impl DeclarationKind {
    /// Comment line rendered once before the first declaration of the kind.
    pub fn header(&self) -> Option<&'static str> {
        match self {
            DeclarationKind::ToolStub => Some("# Tool definitions"),
            DeclarationKind::GuardrailBundle => Some("# Guardrails definitions"),
            DeclarationKind::GuardrailHelpers => Some("# Guardrails utils"),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub kind: DeclarationKind,
    /// The principal identifier the declaration binds.
    pub name: String,
    /// Source text at module indentation, without a trailing newline.
    pub source: String,
}

/// A compiled workflow, ready to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedModule {
    pub imports: ImportSet,
    /// Sorted by [`DeclarationKind`], emission order within a kind.
    pub declarations: Vec<Declaration>,
    pub input_fields: Vec<InputField>,
    pub entry_point: String,
    pub body: Block,
}

impl EmittedModule {
    pub fn declaration(&self, name: &str) -> Option<&Declaration> {
        self.declarations.iter().find(|d| d.name == name)
    }

    pub fn declarations_of(&self, kind: DeclarationKind) -> impl Iterator<Item = &Declaration> {
        self.declarations.iter().filter(move |d| d.kind == kind)
    }

    /// The complete source text of the module.
    pub fn render(&self) -> String {
        render::render_module(self)
    }
}
