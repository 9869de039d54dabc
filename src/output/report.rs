use std::fmt::Write;

use crate::parser::table::render_table;
use crate::pipeline::{Failure, Outcome, ResultKind};

/// Build a markdown report of a request outcome.
pub fn build_report(outcome: &Outcome) -> String {
    let mut report = String::new();

    writeln!(report, "# provscope report").unwrap();
    writeln!(report).unwrap();
    writeln!(report, "| Request | Engine | Mode | Action |").unwrap();
    writeln!(report, "|---------|--------|------|--------|").unwrap();
    writeln!(
        report,
        "| {} | {} | {} | {} |",
        outcome.request_id,
        outcome.backend,
        outcome.mode,
        action_name(outcome)
    )
    .unwrap();

    writeln!(report).unwrap();
    writeln!(report, "## Query").unwrap();
    writeln!(report).unwrap();
    writeln!(report, "```sql\n{}\n```", outcome.query).unwrap();

    if let Some(diagnostic) = &outcome.diagnostic {
        writeln!(report).unwrap();
        writeln!(report, "> {diagnostic}").unwrap();
    }

    writeln!(report).unwrap();
    match &outcome.failure {
        Some(failure) => {
            writeln!(report, "## Failure ({})", describe_failure(failure)).unwrap();
            writeln!(report).unwrap();
            writeln!(report, "```\n{}\n```", outcome.raw_output.trim_end()).unwrap();
        }
        None if outcome.result_kind == ResultKind::Table => {
            writeln!(report, "## Result").unwrap();
            writeln!(report).unwrap();
            write!(report, "```\n{}```\n", render_table(&outcome.table)).unwrap();
        }
        None => {
            writeln!(report, "## Output").unwrap();
            writeln!(report).unwrap();
            writeln!(report, "```\n{}\n```", outcome.raw_output.trim_end()).unwrap();
        }
    }

    if !outcome.histogram.is_empty() {
        writeln!(report).unwrap();
        writeln!(report, "## Histogram").unwrap();
        writeln!(report).unwrap();
        writeln!(report, "| Label | Count |").unwrap();
        writeln!(report, "|-------|-------|").unwrap();
        for (label, count) in &outcome.histogram.entries {
            writeln!(report, "| {label} | {count} |").unwrap();
        }
    }

    if let Some(graph) = &outcome.graph {
        writeln!(report).unwrap();
        writeln!(report, "## Provenance Graph").unwrap();
        writeln!(report).unwrap();
        writeln!(
            report,
            "{} nodes, {} edges",
            graph.nodes.len(),
            graph.edges.len()
        )
        .unwrap();
    }

    let artifacts = [
        ("DOT", &outcome.artifacts.dot),
        ("CSV", &outcome.artifacts.csv),
        ("Image", &outcome.artifacts.image),
    ];
    if artifacts.iter().any(|(_, path)| path.is_some()) {
        writeln!(report).unwrap();
        writeln!(report, "## Artifacts").unwrap();
        writeln!(report).unwrap();
        for (name, path) in artifacts {
            if let Some(path) = path {
                writeln!(report, "- **{name}**: {}", path.display()).unwrap();
            }
        }
    }

    report
}

fn action_name(outcome: &Outcome) -> &'static str {
    use crate::pipeline::Action;
    match outcome.action {
        Action::Run => "run",
        Action::Image => "image",
        Action::Circuit { .. } => "circuit",
    }
}

fn describe_failure(failure: &Failure) -> String {
    match failure {
        Failure::ExternalProcess {
            exit_code: Some(code),
        } => format!("engine error, exit code {code}"),
        Failure::ExternalProcess { exit_code: None } => "engine error".to_string(),
        Failure::Timeout { millis } => {
            format!("timed out after {}s", *millis as f64 / 1000.0)
        }
        Failure::Engine { .. } => "engine unavailable".to_string(),
    }
}
