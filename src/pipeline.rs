use std::path::PathBuf;

use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::graphviz::Renderer;
use crate::engine::{detect_failure, Engine, EngineError, EngineRequest, ExecutionMode};
use crate::generator::chart::{summarize, Histogram};
use crate::generator::dot::to_dot;
use crate::generator::graph::{build, ProvenanceGraph};
use crate::intent::composer::{compose, compose_view_circuit, ComposedQuery, CompositionError};
use crate::intent::mode::{Backend, Mode, ProvenanceRequest};
use crate::output::workspace::RequestWorkspace;
use crate::parser::formula::read_formula_csv;
use crate::parser::table::{parse_csv_like, parse_output, ParsedTable};

/// What to produce for a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    /// Execute and parse the result into a table and histogram.
    Run,
    /// Render the provenance graph as an image.
    Image,
    /// Inspect a `ProvSQL` provenance circuit with `VIEW_CIRCUIT`.
    Circuit {
        /// Circuit token.
        view_uuid: String,
        /// Mapping table.
        view_table: String,
    },
}

/// How the result should be shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    /// Columns and rows were recovered.
    Table,
    /// Only raw text is available.
    Raw,
}

/// Why a request did not produce a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Failure {
    /// The engine reported an error in its output or exit status.
    ExternalProcess {
        /// Exit code, when the process exited normally.
        exit_code: Option<i32>,
    },
    /// An external process exceeded its deadline and was killed.
    Timeout {
        /// Deadline in milliseconds.
        millis: u64,
    },
    /// The engine could not be driven at all.
    Engine {
        /// Error message.
        message: String,
    },
}

/// Files written for a request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Artifacts {
    /// Graphviz source.
    pub dot: Option<PathBuf>,
    /// Exported formula CSV.
    pub csv: Option<PathBuf>,
    /// Rendered image.
    pub image: Option<PathBuf>,
}

/// Everything a request produced, successful or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    /// Request identifier, also the workspace directory name.
    pub request_id: Uuid,
    /// Backend the request targeted.
    pub backend: Backend,
    /// Requested mode.
    pub mode: Mode,
    /// Requested action.
    pub action: Action,
    /// Query text that was attempted, or a placeholder.
    pub query: String,
    /// Composition diagnostic, when the query is not the intended one.
    pub diagnostic: Option<CompositionError>,
    /// Engine output, or the error report on failure.
    pub raw_output: String,
    /// Parsed result.
    pub table: ParsedTable,
    /// First-column counts of the parsed rows.
    pub histogram: Histogram,
    /// Table or raw display.
    pub result_kind: ResultKind,
    /// Set when the request failed.
    pub failure: Option<Failure>,
    /// Provenance graph built from exported formulas.
    pub graph: Option<ProvenanceGraph>,
    /// Files written along the way.
    pub artifacts: Artifacts,
}

impl Outcome {
    /// True when the request failed.
    pub fn is_failure(&self) -> bool {
        self.failure.is_some()
    }

    fn fail(&mut self, err: &EngineError) {
        warn!(request_id = %self.request_id, error = %err, "request failed");
        self.raw_output = error_report(&err.to_string(), &self.query);
        self.result_kind = ResultKind::Raw;
        self.failure = Some(match err {
            EngineError::Timeout { timeout, .. } => Failure::Timeout {
                millis: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            },
            EngineError::Status { code, .. } => Failure::ExternalProcess { exit_code: *code },
            other => Failure::Engine {
                message: other.to_string(),
            },
        });
    }

    fn show_table(&mut self, table: ParsedTable) {
        self.histogram = summarize(&table.rows);
        self.result_kind = if table.has_data() {
            ResultKind::Table
        } else {
            ResultKind::Raw
        };
        self.table = table;
    }
}

/// Failure text shown in place of a result.
pub fn error_report(message: &str, query: &str) -> String {
    format!("[ERROR] {message}\n\n---\nQuery attempted:\n{query}")
}

/// Compose the query text a request will run.
///
/// For a circuit action on a `ProvSQL` semirings intent the `VIEW_CIRCUIT`
/// call is appended; elsewhere a circuit action composes like a plain run.
pub fn compose_request(request: &ProvenanceRequest, action: &Action) -> ComposedQuery {
    let composed = compose(request.backend, &request.intent);
    match action {
        Action::Circuit {
            view_uuid,
            view_table,
        } if shows_circuit(request) => compose_view_circuit(&composed, view_uuid, view_table),
        _ => composed,
    }
}

fn shows_circuit(request: &ProvenanceRequest) -> bool {
    request.backend == Backend::ProvSql && request.intent.mode() == Mode::Semirings
}

/// Run one request end to end.
///
/// Never panics on engine trouble: composition placeholders are returned
/// without execution, and every engine or rendering error becomes a failed
/// [`Outcome`] whose raw output names the error and the attempted query.
pub fn run(
    request: &ProvenanceRequest,
    action: &Action,
    engine: &dyn Engine,
    renderer: &dyn Renderer,
    workspace: &RequestWorkspace,
) -> Outcome {
    let backend = request.backend;
    let mode = request.intent.mode();
    let composed = compose_request(request, action);

    let circuit = matches!(action, Action::Circuit { .. });
    if circuit && !shows_circuit(request) {
        warn!(%backend, %mode, "circuit view needs provsql semirings, running the query instead");
    }
    let circuit = circuit && shows_circuit(request);

    let mut outcome = Outcome {
        request_id: workspace.id(),
        backend,
        mode,
        action: action.clone(),
        query: composed.text.clone(),
        diagnostic: composed.diagnostic.clone(),
        raw_output: String::new(),
        table: ParsedTable::default(),
        histogram: Histogram::default(),
        result_kind: ResultKind::Raw,
        failure: None,
        graph: None,
        artifacts: Artifacts::default(),
    };

    if composed.is_placeholder() {
        info!(query = %outcome.query, "incomplete intent, nothing executed");
        outcome.raw_output = composed.text;
        return outcome;
    }

    info!(request_id = %outcome.request_id, %backend, %mode, "running request");
    let result = match action {
        Action::Image => match backend {
            Backend::Gprom => query_graph(&mut outcome, engine, renderer, workspace),
            Backend::ProvSql if mode == Mode::Semirings => {
                formula_graph(&mut outcome, engine, renderer, workspace)
            }
            Backend::ProvSql => {
                warn!(%mode, "provsql graphs need semirings mode, running the query instead");
                interactive(&mut outcome, engine, workspace, true)
            }
        },
        _ => interactive(&mut outcome, engine, workspace, !circuit),
    };
    if let Err(err) = result {
        outcome.fail(&err);
    }
    debug!(
        request_id = %outcome.request_id,
        result_kind = ?outcome.result_kind,
        failed = outcome.is_failure(),
        "request finished"
    );
    outcome
}

fn interactive(
    outcome: &mut Outcome,
    engine: &dyn Engine,
    workspace: &RequestWorkspace,
    parse: bool,
) -> Result<(), EngineError> {
    let raw = engine.execute(&EngineRequest {
        query: &outcome.query,
        mode: ExecutionMode::Interactive,
        workspace,
    })?;

    if detect_failure(&raw.text, raw.exit_code) {
        warn!(exit_code = ?raw.exit_code, "engine reported an error");
        outcome.failure = Some(Failure::ExternalProcess {
            exit_code: raw.exit_code,
        });
        outcome.raw_output = raw.text;
        return Ok(());
    }

    if parse {
        let table = parse_output(&raw.text);
        outcome.show_table(table);
    }
    outcome.raw_output = raw.text;
    Ok(())
}

fn query_graph(
    outcome: &mut Outcome,
    engine: &dyn Engine,
    renderer: &dyn Renderer,
    workspace: &RequestWorkspace,
) -> Result<(), EngineError> {
    let raw = engine.execute(&EngineRequest {
        query: &outcome.query,
        mode: ExecutionMode::Graph,
        workspace,
    })?;
    outcome.raw_output = raw.text;
    let dot = raw.artifact.ok_or(EngineError::MissingGraph)?;
    outcome.artifacts.dot = Some(dot.clone());

    let image = workspace.image_path();
    renderer.render(&dot, &image)?;
    outcome.artifacts.image = Some(image);
    Ok(())
}

fn formula_graph(
    outcome: &mut Outcome,
    engine: &dyn Engine,
    renderer: &dyn Renderer,
    workspace: &RequestWorkspace,
) -> Result<(), EngineError> {
    let raw = engine.execute(&EngineRequest {
        query: &outcome.query,
        mode: ExecutionMode::Graph,
        workspace,
    })?;
    outcome.raw_output = raw.text;
    let csv_path = raw.artifact.ok_or(EngineError::MissingGraph)?;
    outcome.artifacts.csv = Some(csv_path.clone());

    let csv = std::fs::read_to_string(&csv_path).map_err(|source| EngineError::Io {
        context: format!("reading {}", csv_path.display()),
        source,
    })?;
    outcome.show_table(parse_csv_like(&csv));

    let records = read_formula_csv(csv.as_bytes())?;
    let graph = build(&records);
    debug!(
        records = records.len(),
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        "built provenance graph"
    );

    let dot = workspace.dot_path();
    workspace.write(&dot, to_dot(&graph))?;
    outcome.artifacts.dot = Some(dot.clone());
    outcome.graph = Some(graph);

    let image = workspace.image_path();
    renderer.render(&dot, &image)?;
    outcome.artifacts.image = Some(image);
    Ok(())
}
