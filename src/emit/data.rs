use super::literal::{python_expr, python_string};
use super::{Emission, Emitter, STATE};
use crate::error::CompileError;
use crate::workflow::{Node, SetStateConfig, TransformConfig};

impl Emitter {
    /// `transform_result = <expr>`; an empty expression yields `{}`.
    pub fn emit_transform(
        &mut self,
        node: &Node,
        config: &TransformConfig,
        input: &str,
    ) -> Result<Emission, CompileError> {
        let value = if config.expression.trim().is_empty() {
            "{}".to_string()
        } else {
            python_expr(&self.expression(&node.id, &config.expression)?, input)
        };
        let result = self.symbols.allocate("transform_result");
        let mut emission = Emission::default();
        emission.code(format!("{} = {}", result, value));
        emission.result = Some(result);
        Ok(emission)
    }

    /// One `state[...]` assignment per configured entry, in order. Entries with
    /// an empty expression are skipped.
    pub fn emit_set_state(
        &mut self,
        node: &Node,
        config: &SetStateConfig,
        input: &str,
    ) -> Result<Emission, CompileError> {
        let mut emission = Emission::default();
        for assignment in &config.assignments {
            if assignment.expression.trim().is_empty() {
                continue;
            }
            let expr = self.expression(&node.id, &assignment.expression)?;
            emission.code(format!(
                "{}[{}] = {}",
                STATE,
                python_string(&assignment.name),
                python_expr(&expr, input)
            ));
        }
        Ok(emission)
    }
}
