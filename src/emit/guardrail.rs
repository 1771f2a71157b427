use super::literal::*;
use super::{CONTEXT, Emission, Emitter, WORKFLOW};
use crate::error::CompileError;
use crate::module::DeclarationKind;
use crate::workflow::{GuardrailConfig, Node};

/// Helper functions shared by every guardrail stage.
pub const HELPER_NAMES: [&str; 3] = [
    "guardrails_has_tripwire",
    "get_guardrail_checked_text",
    "build_guardrail_fail_output",
];

const HELPERS: &str = r#"def guardrails_has_tripwire(results):
  return any(getattr(r, "tripwire_triggered", False) is True for r in (results or []))

def get_guardrail_checked_text(results, fallback_text):
  for r in (results or []):
    info = getattr(r, "info", None) or {}
    if isinstance(info, dict) and ("checked_text" in info):
      return info.get("checked_text") or fallback_text
  return fallback_text

def build_guardrail_fail_output(results):
  failures = []
  for r in (results or []):
    if getattr(r, "tripwire_triggered", False):
      info = getattr(r, "info", None) or {}
      failure = {
        "guardrail_name": info.get("guardrail_name"),
      }
      for key in ("flagged", "confidence", "threshold", "hallucination_type", "hallucinated_statements", "verified_statements"):
        if key in (info or {}):
          failure[key] = info.get(key)
      failures.append(failure)
  return {"failed": len(failures) > 0, "failures": failures}"#;

/// The statements of one guardrail stage, before its guarded continuation.
#[derive(Debug, Clone, PartialEq)]
pub struct GuardrailStage {
    /// Stage statements; `emission.result` is the stage output record.
    pub emission: Emission,
    /// The tripwire flag the guard tests.
    pub check: String,
}

impl Emitter {
    /// Emits a guardrail stage. `chained_from` is the output of the stage
    /// directly before this one, whose checked text becomes this stage's input.
    pub fn emit_guardrail(
        &mut self,
        node: &Node,
        config: &GuardrailConfig,
        input: &str,
        chained_from: Option<&str>,
    ) -> Result<GuardrailStage, CompileError> {
        self.require_shared_client();
        self.import("guardrails.runtime", "load_config_bundle");
        self.import("guardrails.runtime", "instantiate_guardrails");
        self.import("guardrails.runtime", "run_guardrails");
        self.require_guardrail_helpers();

        let input_text = match (chained_from, &config.input) {
            (Some(previous), _) => format!("{}[\"safe_text\"]", previous),
            (None, Some(source)) if !source.trim().is_empty() => {
                python_expr(&self.expression(&node.id, source)?, input)
            }
            (None, _) => format!("{}[{}]", WORKFLOW, python_string(&self.seed_field)),
        };

        let bundle = self.symbols.allocate("guardrails_config");
        self.declare(
            DeclarationKind::GuardrailBundle,
            bundle.clone(),
            format!("{} = {}", bundle, python_json(&config.bundle, 0)),
        );

        let text = self.symbols.allocate("guardrails_inputtext");
        let result = self.symbols.allocate("guardrails_result");
        let tripwire = self.symbols.allocate("guardrails_hastripwire");
        let checked = self.symbols.allocate("guardrails_anonymizedtext");
        let output = self.symbols.allocate("guardrails_output");

        let mut emission = Emission::default();
        emission.code(format!("{} = {}", text, input_text));
        emission.code(format!(
            "{} = await run_guardrails({}, {}, \"text/plain\", instantiate_guardrails(load_config_bundle({})), suppress_tripwire=True)",
            result, CONTEXT, text, bundle
        ));
        emission.code(format!("{} = guardrails_has_tripwire({})", tripwire, result));
        emission.code(format!(
            "{} = get_guardrail_checked_text({}, {})",
            checked, result, text
        ));
        emission.code(format!(
            "{} = ({} and build_guardrail_fail_output({} or [])) or {{\"safe_text\": ({} or {})}}",
            output, tripwire, result, checked, text
        ));
        emission.result = Some(output);

        Ok(GuardrailStage {
            emission,
            check: tripwire,
        })
    }

    fn require_guardrail_helpers(&mut self) {
        if self.guardrail_helpers {
            return;
        }
        self.guardrail_helpers = true;
        self.declare(DeclarationKind::GuardrailHelpers, HELPER_NAMES[0], HELPERS);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Statement;
    use crate::compiler::symbols::SymbolTable;
    use crate::workflow::NodeKind;

    fn node() -> Node {
        Node {
            id: "g".to_string(),
            label: String::new(),
            kind: NodeKind::Start,
        }
    }

    #[test]
    fn first_stage_reads_the_seed_field() {
        let mut emitter = Emitter::new(SymbolTable::new(), "input_as_text");
        let stage = emitter
            .emit_guardrail(&node(), &GuardrailConfig::default(), "workflow", None)
            .unwrap();
        assert_eq!(stage.check, "guardrails_hastripwire");
        assert_eq!(stage.emission.result.as_deref(), Some("guardrails_output"));
        assert_eq!(
            stage.emission.statements[0],
            Statement::Code("guardrails_inputtext = workflow[\"input_as_text\"]".to_string())
        );
        assert_eq!(
            stage.emission.statements[1],
            Statement::Code("guardrails_result = await run_guardrails(ctx, guardrails_inputtext, \"text/plain\", instantiate_guardrails(load_config_bundle(guardrails_config)), suppress_tripwire=True)".to_string())
        );
    }

    #[test]
    fn chained_stage_reads_previous_safe_text_and_shares_helpers() {
        let mut emitter = Emitter::new(SymbolTable::new(), "input_as_text");
        let first = emitter
            .emit_guardrail(&node(), &GuardrailConfig::default(), "workflow", None)
            .unwrap();
        let previous = first.emission.result.unwrap();
        let second = emitter
            .emit_guardrail(&node(), &GuardrailConfig::default(), "workflow", Some(&previous))
            .unwrap();
        assert_eq!(
            second.emission.statements[0],
            Statement::Code("guardrails_inputtext1 = guardrails_output[\"safe_text\"]".to_string())
        );

        let module = emitter.finish(vec![], "run_workflow".to_string(), Default::default());
        assert_eq!(module.declarations_of(DeclarationKind::GuardrailHelpers).count(), 1);
        assert_eq!(module.declarations_of(DeclarationKind::GuardrailBundle).count(), 2);
        assert_eq!(module.declarations_of(DeclarationKind::SharedClient).count(), 1);
        assert_eq!(
            module.declaration("guardrails_config").unwrap().source,
            "guardrails_config = {\n  \"guardrails\": []\n}"
        );
    }
}
