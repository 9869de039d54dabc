use std::path::{Path, PathBuf};
use std::time::Duration;

use provscope::config::{GpromConfig, ProvSqlConfig};
use provscope::engine::gprom::GpromEngine;
use provscope::engine::provsql::ProvSqlEngine;
use provscope::engine::{Engine, EngineError, EngineRequest, ExecutionMode, RawOutput};
use provscope::output::workspace::RequestWorkspace;

mod support;

use support::{fixture_path, read_fixture, temp_workspace, write_script};

const TIMEOUT: Duration = Duration::from_secs(10);

fn absolute_fixture(name: &str) -> PathBuf {
    std::fs::canonicalize(fixture_path(name)).expect("fixture path")
}

fn graph(
    engine: &dyn Engine,
    workspace: &RequestWorkspace,
    query: &str,
) -> Result<RawOutput, EngineError> {
    engine.execute(&EngineRequest {
        query,
        mode: ExecutionMode::Graph,
        workspace,
    })
}

fn gprom_printing(dir: &Path, body: &str) -> GpromEngine {
    let config = GpromConfig {
        binary: write_script(dir, "gprom.sh", body),
        ..GpromConfig::default()
    };
    GpromEngine::new(config, TIMEOUT)
}

#[test]
fn gprom_graph_run_writes_log_and_dot_into_the_workspace() {
    let (root, workspace) = temp_workspace();
    let fixture = absolute_fixture("gprom_graphviz.txt");
    let engine = gprom_printing(root.path(), &format!("cat '{}'\n", fixture.display()));

    let output = graph(&engine, &workspace, "PROVENANCE OF (SELECT name FROM r);")
        .expect("graph run should succeed");

    assert_eq!(output.artifact, Some(workspace.dot_path()));
    assert_eq!(output.text, read_fixture("gprom_graphviz.txt"));
    assert_eq!(
        std::fs::read_to_string(workspace.engine_log_path()).expect("engine log"),
        output.text
    );

    let dot = std::fs::read_to_string(workspace.dot_path()).expect("dot file");
    assert!(dot.starts_with("digraph G {\n  subgraph cluster_0"));
    assert!(dot.contains("PROJECTION [NAME, PROV_R_NAME]"));
    assert!(dot.ends_with("}\n"));
    assert!(!dot.contains("Alice"));
}

#[test]
fn gprom_output_without_graph_is_missing_graph() {
    let (root, workspace) = temp_workspace();
    let engine = gprom_printing(root.path(), "echo 'GProM version 1.0.1'\n");

    let err = graph(&engine, &workspace, "SELECT 1;").expect_err("no graph block");
    assert!(matches!(err, EngineError::MissingGraph), "got {err:?}");
    assert!(workspace.engine_log_path().is_file());
    assert!(!workspace.dot_path().exists());
}

#[test]
fn gprom_nonzero_exit_in_graph_mode_is_a_status_error() {
    let (root, workspace) = temp_workspace();
    let engine = gprom_printing(root.path(), "echo 'parse error' >&2\nexit 4\n");

    let err = graph(&engine, &workspace, "SELECT 1;").expect_err("exit 4");
    match err {
        EngineError::Status { code, output, .. } => {
            assert_eq!(code, Some(4));
            assert_eq!(output, "parse error\n");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

/// Stand-in for the docker CLI: logs every call, serves `cp` out of the
/// container from a fixture and answers `psql` with `psql_reply`.
fn fake_docker(dir: &Path, psql_reply: &str) -> (ProvSqlEngine, PathBuf) {
    let log = dir.join("docker.log");
    let csv = absolute_fixture("provsql_formula_export.csv");
    let body = format!(
        "echo \"$*\" >> '{log}'
case \"$1\" in
  cp)
    case \"$3\" in
      *:*) ;;
      *) cat '{csv}' > \"$3\" ;;
    esac
    ;;
  exec)
    case \"$*\" in
      *\" psql \"*) {psql_reply} ;;
    esac
    ;;
esac
",
        log = log.display(),
        csv = csv.display(),
    );
    let config = ProvSqlConfig {
        docker: write_script(dir, "docker.sh", &body),
        ..ProvSqlConfig::default()
    };
    (ProvSqlEngine::new(config, TIMEOUT), log)
}

fn docker_calls(log: &Path) -> Vec<String> {
    std::fs::read_to_string(log)
        .expect("docker log")
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn provsql_export_copies_script_in_and_csv_out() {
    let (root, workspace) = temp_workspace();
    let (engine, log) = fake_docker(root.path(), "echo 'COPY 4'");
    let query = "SELECT *, SR_FORMULA(PROVENANCE(), 'mapping') FROM (SELECT * FROM r) t;";

    let output = graph(&engine, &workspace, query).expect("export should succeed");

    assert_eq!(output.text, "COPY 4\n");
    assert_eq!(output.artifact, Some(workspace.export_csv_path()));
    assert_eq!(
        std::fs::read_to_string(workspace.export_csv_path()).expect("csv"),
        read_fixture("provsql_formula_export.csv")
    );
    let script = std::fs::read_to_string(workspace.export_script_path()).expect("script");
    assert!(script.contains(
        "\\copy (SELECT *, SR_FORMULA(PROVENANCE(), 'mapping') FROM (SELECT * FROM r) t) TO"
    ));

    let calls = docker_calls(&log);
    assert_eq!(calls.len(), 4, "{calls:?}");
    let scoped = workspace.scoped_name("export.sql");
    assert!(calls[0].starts_with("cp ") && calls[0].contains(&scoped));
    assert!(calls[1].contains(" psql ") && calls[1].contains(" -f "));
    assert!(calls[2].starts_with("cp provsql-demo:"));
    assert!(calls[3].contains(" rm -f ") && calls[3].contains(&scoped));
}

#[test]
fn provsql_script_error_is_a_status_error_and_still_cleans_up() {
    let (root, workspace) = temp_workspace();
    let (engine, log) = fake_docker(
        root.path(),
        "echo 'psql:/tmp/export.sql:2: ERROR:  relation \"r\" does not exist' >&2",
    );

    let err = graph(&engine, &workspace, "SELECT * FROM r;").expect_err("script failed");
    match err {
        EngineError::Status { code, output, .. } => {
            assert_eq!(code, Some(0));
            assert!(output.contains("relation \"r\" does not exist"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!workspace.export_csv_path().exists());

    let calls = docker_calls(&log);
    assert_eq!(calls.len(), 3, "{calls:?}");
    assert!(calls[2].contains(" rm -f "));
}
