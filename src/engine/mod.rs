use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::config::EngineConfig;
use crate::intent::mode::Backend;
use crate::output::workspace::{OutputError, RequestWorkspace};
use crate::parser::formula::FormulaCsvError;
use crate::parser::text::contains_ignore_case;

/// GProM command-line client, interactive and one-shot graph modes.
pub mod gprom;
/// Graphviz rendering of DOT sources to images.
pub mod graphviz;
/// Timeout-bounded process execution with guaranteed kill and reap.
pub mod process;
/// `ProvSQL` through `psql` inside a Docker container, including formula export.
pub mod provsql;

/// Phrases that mark engine output as a failed run, matched case-insensitively.
pub const FAILURE_KEYWORDS: [&str; 3] = ["error", "fatal", "does not exist"];

/// How an engine should run a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Run the query and capture its textual result.
    Interactive,
    /// Run the query and also produce a graph artifact (DOT source or formula CSV).
    Graph,
}

/// One query execution, with the workspace that receives its artifacts.
#[derive(Debug, Clone, Copy)]
pub struct EngineRequest<'a> {
    /// Query text to run.
    pub query: &'a str,
    /// Execution flavour.
    pub mode: ExecutionMode,
    /// Request-private artifact directory.
    pub workspace: &'a RequestWorkspace,
}

/// Text produced by an engine, plus the artifact written in graph mode.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawOutput {
    /// Captured output text.
    pub text: String,
    /// Exit code of the main process; `None` when killed by a signal.
    pub exit_code: Option<i32>,
    /// DOT source (GProM) or formula CSV (`ProvSQL`) written in graph mode.
    pub artifact: Option<PathBuf>,
}

/// Failures running an external engine or tool.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The program could not be started.
    #[error("failed to run `{program}`: {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// An I/O step around the process failed.
    #[error("{context}: {source}")]
    Io {
        /// What was being done.
        context: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The process outlived its deadline and was killed.
    #[error("`{program}` timed out after {}s and was terminated", .timeout.as_secs_f64())]
    Timeout {
        /// Program that was killed.
        program: String,
        /// Deadline that expired.
        timeout: Duration,
    },
    /// A step that must succeed exited with a nonzero status.
    #[error("`{program}` exited with status {}: {output}", .code.map_or_else(|| "signal".to_string(), |c| c.to_string()))]
    Status {
        /// Program that failed.
        program: String,
        /// Exit code, `None` when killed by a signal.
        code: Option<i32>,
        /// Captured stdout and stderr.
        output: String,
    },
    /// The engine output did not contain the expected graph block.
    #[error("no graph found in engine output")]
    MissingGraph,
    /// The exported formula CSV could not be read.
    #[error(transparent)]
    Formula(#[from] FormulaCsvError),
    /// An artifact could not be written to the request workspace.
    #[error(transparent)]
    Output(#[from] OutputError),
}

impl EngineError {
    /// True for [`EngineError::Timeout`].
    pub fn is_timeout(&self) -> bool {
        matches!(self, EngineError::Timeout { .. })
    }
}

/// A provenance engine reachable through an external process.
pub trait Engine {
    /// Backend whose dialect this engine speaks.
    fn backend(&self) -> Backend;

    /// Run one query. Blocks until the process exits or its timeout expires.
    fn execute(&self, request: &EngineRequest<'_>) -> Result<RawOutput, EngineError>;
}

/// Build the engine for `backend` from configuration.
pub fn for_backend(backend: Backend, config: &EngineConfig) -> Box<dyn Engine> {
    match backend {
        Backend::Gprom => Box::new(gprom::GpromEngine::new(
            config.gprom.clone(),
            config.timeout(),
        )),
        Backend::ProvSql => Box::new(provsql::ProvSqlEngine::new(
            config.provsql.clone(),
            config.timeout(),
        )),
    }
}

/// True when output text signals a failed run: a nonzero exit or a failure keyword.
pub fn detect_failure(text: &str, exit_code: Option<i32>) -> bool {
    let failed_exit = exit_code.is_some_and(|code| code != 0);
    failed_exit
        || FAILURE_KEYWORDS
            .iter()
            .any(|keyword| contains_ignore_case(text, keyword))
}
