use std::time::Duration;

use tracing::{debug, info};

use crate::config::GpromConfig;
use crate::engine::process::{self, CommandSpec};
use crate::engine::{Engine, EngineError, EngineRequest, ExecutionMode, RawOutput};
use crate::intent::mode::Backend;

/// Line GProM prints before the optimized query graph in `-show_graphviz` mode.
pub const GRAPHVIZ_MARKER: &str = "GRAPHVIZ: AFTER OPTIMIZATIONS";

const DIGRAPH_OPENING: &str = "digraph G {";

/// Runs queries through the GProM command-line client.
#[derive(Debug, Clone)]
pub struct GpromEngine {
    config: GpromConfig,
    timeout: Duration,
}

impl GpromEngine {
    /// Engine using `config` with a per-process `timeout`.
    pub fn new(config: GpromConfig, timeout: Duration) -> Self {
        Self { config, timeout }
    }

    /// Client invocation with connection flags only.
    pub fn base_command(&self) -> CommandSpec {
        let c = &self.config;
        CommandSpec::new(&c.binary).args([
            "-db".to_string(),
            c.database.clone(),
            "-backend".to_string(),
            c.backend.clone(),
            "-host".to_string(),
            c.host.clone(),
            "-port".to_string(),
            c.port.to_string(),
            "-user".to_string(),
            c.user.clone(),
        ])
    }

    /// Interactive invocation: the query and a quit directive on stdin.
    pub fn interactive_command(&self, query: &str) -> CommandSpec {
        self.base_command().stdin(format!("{query}\n\\q\n"))
    }

    /// One-shot invocation that prints the query graph.
    pub fn graph_command(&self, query: &str) -> CommandSpec {
        self.base_command()
            .args(["-show_graphviz", "-graphviz_details", "-query"])
            .arg(query)
    }
}

impl Engine for GpromEngine {
    fn backend(&self) -> Backend {
        Backend::Gprom
    }

    fn execute(&self, request: &EngineRequest<'_>) -> Result<RawOutput, EngineError> {
        match request.mode {
            ExecutionMode::Interactive => {
                let output = process::run(&self.interactive_command(request.query), self.timeout)?;
                Ok(RawOutput {
                    text: output.text().to_string(),
                    exit_code: output.exit_code,
                    artifact: None,
                })
            }
            ExecutionMode::Graph => {
                let output =
                    process::run_checked(&self.graph_command(request.query), self.timeout)?;
                let merged = output.merged();
                let workspace = request.workspace;
                workspace.write(&workspace.engine_log_path(), &merged)?;

                let dot = extract_graphviz_block(&merged).ok_or(EngineError::MissingGraph)?;
                let dot_path = workspace.dot_path();
                workspace.write(&dot_path, &dot)?;
                info!(path = %dot_path.display(), "extracted GProM query graph");

                Ok(RawOutput {
                    text: merged,
                    exit_code: output.exit_code,
                    artifact: Some(dot_path),
                })
            }
        }
    }
}

/// Cut the `digraph G { ... }` block that follows [`GRAPHVIZ_MARKER`].
///
/// Lines between the marker and the opening line are skipped; the block ends
/// when its braces balance. Returns `None` without a marker, without an
/// opening line, or when the block is not closed.
pub fn extract_graphviz_block(output: &str) -> Option<String> {
    let mut found_marker = false;
    let mut depth: isize = 0;
    let mut block = String::new();

    for line in output.split_inclusive('\n') {
        if !found_marker {
            found_marker = line.contains(GRAPHVIZ_MARKER);
            continue;
        }
        if block.is_empty() && !line.contains(DIGRAPH_OPENING) {
            continue;
        }
        block.push_str(line);
        depth += line.matches('{').count() as isize - line.matches('}').count() as isize;
        if depth <= 0 {
            return Some(block);
        }
    }

    debug!(found_marker, "no complete graphviz block in GProM output");
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> GpromEngine {
        GpromEngine::new(GpromConfig::default(), Duration::from_secs(5))
    }

    #[test]
    fn interactive_command_carries_connection_flags_and_quit() {
        let spec = engine().interactive_command("PROVENANCE OF (SELECT 1);");
        assert_eq!(
            spec.display(),
            "gprom -db gprom_db -backend postgres -host localhost -port 5432 -user postgres"
        );
        assert_eq!(spec.stdin_text(), Some("PROVENANCE OF (SELECT 1);\n\\q\n"));
    }

    #[test]
    fn graph_command_passes_query_as_one_argument() {
        let spec = engine().graph_command("SELECT a FROM r;");
        let args: Vec<String> = spec
            .arguments()
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            &args[args.len() - 4..],
            ["-show_graphviz", "-graphviz_details", "-query", "SELECT a FROM r;"]
        );
    }

    #[test]
    fn extracts_block_after_marker() {
        let output = "\
digraph G { ignored }
GRAPHVIZ: AFTER OPTIMIZATIONS
noise
digraph G {
  node1 [label=\"a\"];
  subgraph cluster { x; }
  node1 -> node2;
}
trailing
";
        let block = extract_graphviz_block(output).expect("block should be found");
        assert!(block.starts_with("digraph G {\n"));
        assert!(block.ends_with("}\n"));
        assert!(block.contains("subgraph cluster { x; }"));
        assert!(!block.contains("trailing"));
        assert!(!block.contains("ignored"));
    }

    #[test]
    fn single_line_block_is_complete() {
        assert_eq!(
            extract_graphviz_block("GRAPHVIZ: AFTER OPTIMIZATIONS\ndigraph G { a; }\nrest\n"),
            Some("digraph G { a; }\n".to_string())
        );
    }

    #[test]
    fn missing_marker_or_unclosed_block_yields_none() {
        assert_eq!(extract_graphviz_block("digraph G {\n}\n"), None);
        assert_eq!(
            extract_graphviz_block("GRAPHVIZ: AFTER OPTIMIZATIONS\ndigraph G {\n  a;\n"),
            None
        );
    }
}
