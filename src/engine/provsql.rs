use std::path::Path;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::ProvSqlConfig;
use crate::engine::process::{self, CommandSpec};
use crate::engine::{detect_failure, Engine, EngineError, EngineRequest, ExecutionMode, RawOutput};
use crate::intent::mode::Backend;

/// Runs queries through `psql` inside the `ProvSQL` container.
#[derive(Debug, Clone)]
pub struct ProvSqlEngine {
    config: ProvSqlConfig,
    timeout: Duration,
}

impl ProvSqlEngine {
    /// Engine using `config` with a per-process `timeout`.
    pub fn new(config: ProvSqlConfig, timeout: Duration) -> Self {
        Self { config, timeout }
    }

    fn docker(&self) -> CommandSpec {
        CommandSpec::new(&self.config.docker)
    }

    /// `psql` inside the container with the server-side statement timeout set
    /// to the engine timeout, so a killed client does not leave the query running.
    fn psql(&self) -> CommandSpec {
        let c = &self.config;
        self.docker()
            .args(["exec", "-i", "-e"])
            .arg(format!(
                "PGOPTIONS=-c statement_timeout={}",
                self.timeout.as_millis()
            ))
            .args([c.container.as_str(), "psql", "-U", c.user.as_str()])
    }

    /// `docker exec -i -e PGOPTIONS=... <container> psql -U <user> <db> -c <query>`.
    pub fn query_command(&self, query: &str) -> CommandSpec {
        self.psql()
            .args([self.config.database.as_str(), "-c"])
            .arg(query)
    }

    /// `docker exec -i -e PGOPTIONS=... <container> psql -U <user> -d <db> -f <script>`.
    pub fn script_command(&self, container_script: &str) -> CommandSpec {
        self.psql()
            .args(["-d", self.config.database.as_str(), "-f", container_script])
    }

    /// `docker cp <local> <container>:<path>`.
    pub fn copy_in_command(&self, local: &Path, container_path: &str) -> CommandSpec {
        self.docker()
            .arg("cp")
            .arg(local)
            .arg(format!("{}:{container_path}", self.config.container))
    }

    /// `docker cp <container>:<path> <local>`.
    pub fn copy_out_command(&self, container_path: &str, local: &Path) -> CommandSpec {
        self.docker()
            .arg("cp")
            .arg(format!("{}:{container_path}", self.config.container))
            .arg(local)
    }

    fn container_path(&self, file: &str) -> String {
        format!("{}/{file}", self.config.container_tmp.trim_end_matches('/'))
    }

    fn export(&self, request: &EngineRequest<'_>) -> Result<RawOutput, EngineError> {
        let workspace = request.workspace;
        let container_script = self.container_path(&workspace.scoped_name("export.sql"));
        let container_csv = self.container_path(&workspace.scoped_name("prov_output.csv"));

        let script_path = workspace.export_script_path();
        let script = export_script(&self.config.search_path, request.query, &container_csv);
        workspace.write(&script_path, &script)?;

        process::run_checked(
            &self.copy_in_command(&script_path, &container_script),
            self.timeout,
        )?;
        let result = self.export_in_container(request, &container_script, &container_csv);
        self.remove_in_container(&[&container_script, &container_csv]);
        result
    }

    fn export_in_container(
        &self,
        request: &EngineRequest<'_>,
        container_script: &str,
        container_csv: &str,
    ) -> Result<RawOutput, EngineError> {
        let command = self.script_command(container_script);
        let output = process::run_checked(&command, self.timeout)?;
        let merged = output.merged();
        if detect_failure(&merged, output.exit_code) {
            return Err(EngineError::Status {
                program: command.program_name(),
                code: output.exit_code,
                output: merged,
            });
        }

        let csv_path = request.workspace.export_csv_path();
        process::run_checked(&self.copy_out_command(container_csv, &csv_path), self.timeout)?;
        info!(path = %csv_path.display(), "exported provenance formulas");

        Ok(RawOutput {
            text: merged,
            exit_code: output.exit_code,
            artifact: Some(csv_path),
        })
    }

    fn remove_in_container(&self, paths: &[&str]) {
        let command = self
            .docker()
            .args(["exec", self.config.container.as_str(), "rm", "-f"])
            .args(paths.iter().copied());
        match process::run(&command, self.timeout) {
            Ok(output) if output.success() => debug!(?paths, "removed container files"),
            Ok(output) => warn!(exit_code = ?output.exit_code, "container cleanup failed"),
            Err(e) => warn!(error = %e, "container cleanup failed"),
        }
    }
}

impl Engine for ProvSqlEngine {
    fn backend(&self) -> Backend {
        Backend::ProvSql
    }

    fn execute(&self, request: &EngineRequest<'_>) -> Result<RawOutput, EngineError> {
        match request.mode {
            ExecutionMode::Interactive => {
                let output = process::run(&self.query_command(request.query), self.timeout)?;
                Ok(RawOutput {
                    text: output.text().to_string(),
                    exit_code: output.exit_code,
                    artifact: None,
                })
            }
            ExecutionMode::Graph => self.export(request),
        }
    }
}

/// `psql` script exporting the result of `query` to `csv_path` inside the container.
///
/// A trailing `;` on the query is dropped since `\copy` takes a bare query.
pub fn export_script(search_path: &str, query: &str, csv_path: &str) -> String {
    let query = query.trim_end().trim_end_matches(';').trim_end();
    format!(
        "SET search_path TO {search_path};\n\\copy ({query}) TO '{csv_path}' CSV HEADER ENCODING 'UTF8';\n"
    )
}
