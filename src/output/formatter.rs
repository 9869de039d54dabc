use std::path::PathBuf;

use crate::output::report;
use crate::output::workspace::{OutputError, RequestWorkspace};
use crate::pipeline::Outcome;

/// Serialize an outcome as pretty-printed JSON.
pub fn outcome_json(outcome: &Outcome) -> Result<String, OutputError> {
    Ok(serde_json::to_string_pretty(outcome)?)
}

/// Write `outcome.json` and `report.md` into the request workspace.
///
/// Returns the path of the JSON file.
pub fn write_outcome(
    workspace: &RequestWorkspace,
    outcome: &Outcome,
) -> Result<PathBuf, OutputError> {
    let json_path = workspace.outcome_path();
    workspace.write(&json_path, outcome_json(outcome)?)?;

    let report_path = workspace.report_path();
    workspace.write(&report_path, report::build_report(outcome))?;

    Ok(json_path)
}
