use crate::compiler::Compiler;
use crate::workflow::WorkflowDefinition;
use pyo3::prelude::*;

/// Compiles a workflow into Python source.
///
/// Args:
///     workflow_json (str): The canonical JSON form of the workflow, with
///         `entryNodeId`, `nodes`, `edges` and optional `inputSchema` and
///         `stateDeclarations`.
///     entry_point (str | None): Name of the generated async function.
///         Defaults to `run_workflow`.
///     branch_merging (bool): Let the branches of an If continue at a
///         shared node.
///
/// Returns:
///     str: The generated module source.
///
/// Raises:
///     ValueError: If the JSON is malformed or the workflow fails to compile
///         (invalid graph, unknown node kind, bad expression or config).
#[pyfunction]
#[pyo3(signature = (workflow_json, entry_point = None, branch_merging = false))]
fn compile_workflow(
    workflow_json: &str,
    entry_point: Option<String>,
    branch_merging: bool,
) -> PyResult<String> {
    let workflow = WorkflowDefinition::from_json(workflow_json)
        .map_err(|e| PyErr::new::<pyo3::exceptions::PyValueError, _>(e.to_string()))?;

    let mut builder = Compiler::builder(workflow).with_branch_merging(branch_merging);
    if let Some(entry_point) = entry_point {
        builder = builder.with_entry_point(entry_point);
    }
    builder
        .build()
        .compile_to_source()
        .map_err(|e| PyErr::new::<pyo3::exceptions::PyValueError, _>(e.to_string()))
}

/// A compiler from agent workflow graphs to Python source.
///
/// This module provides Python bindings to the flowgen Rust library.
#[pymodule]
fn flowgen(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(compile_workflow, m)?)?;
    Ok(())
}
