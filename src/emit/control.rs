use super::literal::*;
use super::{CONVERSATION_HISTORY, Emission, Emitter, STATE, WORKFLOW, WORKFLOW_INPUT};
use crate::ast::Statement;
use crate::error::CompileError;
use crate::module::DeclarationKind;
use crate::workflow::{
    EndConfig, MessageRole, Node, StateDeclaration, StateType, UserApprovalConfig,
};
use serde_json::Value as Json;

impl Emitter {
    /// Binds the ambient locals: `state`, `workflow` and the seeded history.
    pub fn emit_start(&mut self, declarations: &[StateDeclaration]) -> Emission {
        let mut emission = Emission::default();

        let entries: Vec<(&str, String)> = declarations
            .iter()
            .map(|d| (d.name.as_str(), initial_state_value(d)))
            .collect();
        emission.code(format!("{} = {}", STATE, python_dict(&entries, 0)));
        emission.code(format!("{} = {}.model_dump()", WORKFLOW, WORKFLOW_INPUT));

        let seed = format!("{}[{}]", WORKFLOW, python_string(&self.seed_field));
        emission.code(format!(
            "{}: list[TResponseInputItem] = {}",
            CONVERSATION_HISTORY,
            python_list(&[python_message(MessageRole::User, &seed, 1)], 0)
        ));
        emission
    }

    /// Returns `aggregate`, or the skeleton record shaped by the End node's
    /// output schema.
    pub fn emit_end(&mut self, config: &EndConfig, aggregate: &str) -> Emission {
        let mut emission = Emission::default();
        match &config.output_schema {
            Some(schema) => {
                let name = self.symbols.allocate("end_result");
                emission.code(format!("{} = {}", name, schema_skeleton(schema, 0)));
                emission.statements.push(Statement::Return(name));
            }
            None => emission.statements.push(Statement::Return(aggregate.to_string())),
        }
        emission
    }

    /// Declares the approval callback and binds the rendered message. Returns
    /// the statements and the call that gates the approve path.
    pub fn emit_approval(
        &mut self,
        node: &Node,
        config: &UserApprovalConfig,
        input: &str,
    ) -> Result<(Emission, String), CompileError> {
        let segments = self.template(&node.id, &config.message)?;

        let callback = self.symbols.allocate("approval_request");
        self.declare(
            DeclarationKind::ApprovalCallback,
            callback.clone(),
            format!(
                "def {}(message: str):\n  # TODO: Implement\n  return True",
                callback
            ),
        );

        let message = self.symbols.allocate("approval_message");
        let mut emission = Emission::default();
        emission.code(format!("{} = {}", message, python_template(&segments, input)));
        emission.blank();
        Ok((emission, format!("{}({})", callback, message)))
    }

    /// Compiles an If case or While condition.
    pub fn emit_condition(
        &self,
        node: &Node,
        source: &str,
        input: &str,
    ) -> Result<String, CompileError> {
        let expr = self.expression(&node.id, source)?;
        Ok(python_expr(&expr, input))
    }
}

fn initial_state_value(declaration: &StateDeclaration) -> String {
    // Lists always start empty, whatever their default.
    match (&declaration.default, declaration.state_type) {
        (_, Some(StateType::List)) => "[]".to_string(),
        (Some(value), _) => python_json(value, 1),
        (None, _) => "None".to_string(),
    }
}

/// A record with one entry per schema property: nested objects recurse,
/// arrays start empty and everything else is `None`.
fn schema_skeleton(schema: &Json, level: usize) -> String {
    let Some(properties) = schema.get("properties").and_then(Json::as_object) else {
        return "{}".to_string();
    };
    let entries: Vec<(&str, String)> = properties
        .iter()
        .map(|(key, property)| {
            let value = match property.get("type").and_then(Json::as_str) {
                Some("object") => schema_skeleton(property, level + 1),
                Some("array") => "[]".to_string(),
                _ => "None".to_string(),
            };
            (key.as_str(), value)
        })
        .collect();
    python_dict(&entries, level)
}
