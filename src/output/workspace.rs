use std::path::{Path, PathBuf};

use tracing::debug;
use uuid::Uuid;

/// Errors creating or writing request artifacts.
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// The artifact directory could not be created.
    #[error("Failed to create output directory {}: {source}", .path.display())]
    CreateDir {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// An artifact could not be written.
    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        /// File that could not be written.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The outcome could not be serialized.
    #[error("Failed to serialize outcome: {0}")]
    Json(#[from] serde_json::Error),
}

/// A private artifact directory for one request, named by a fresh UUID.
///
/// Engine logs, DOT sources, export scripts, CSV exports, and rendered images
/// of concurrent requests never share a path.
#[derive(Debug, Clone)]
pub struct RequestWorkspace {
    id: Uuid,
    dir: PathBuf,
}

impl RequestWorkspace {
    /// Create `<root>/<uuid>` for a new request.
    pub fn create(root: &Path) -> Result<Self, OutputError> {
        let id = Uuid::new_v4();
        let dir = root.join(id.to_string());
        std::fs::create_dir_all(&dir).map_err(|source| OutputError::CreateDir {
            path: dir.clone(),
            source,
        })?;
        debug!(request_id = %id, dir = %dir.display(), "created request workspace");
        Ok(Self { id, dir })
    }

    /// Request identifier.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Directory holding this request's artifacts.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Captured engine output of a one-shot graph run.
    pub fn engine_log_path(&self) -> PathBuf {
        self.dir.join("engine_output.txt")
    }

    /// Graphviz source of the provenance graph.
    pub fn dot_path(&self) -> PathBuf {
        self.dir.join("graph.dot")
    }

    /// Rendered provenance graph.
    pub fn image_path(&self) -> PathBuf {
        self.dir.join("graph.png")
    }

    /// Formula export script sent to the database.
    pub fn export_script_path(&self) -> PathBuf {
        self.dir.join("export.sql")
    }

    /// Exported `position,sr_formula` CSV.
    pub fn export_csv_path(&self) -> PathBuf {
        self.dir.join("prov_output.csv")
    }

    /// JSON dump of the request outcome.
    pub fn outcome_path(&self) -> PathBuf {
        self.dir.join("outcome.json")
    }

    /// Markdown report of the request outcome.
    pub fn report_path(&self) -> PathBuf {
        self.dir.join("report.md")
    }

    /// File name prefixed with the request id, for paths outside this directory.
    pub fn scoped_name(&self, file: &str) -> String {
        format!("{}_{file}", self.id)
    }

    /// Write `contents` to `path`, mapping failures to [`OutputError::Write`].
    pub fn write(&self, path: &Path, contents: impl AsRef<[u8]>) -> Result<(), OutputError> {
        std::fs::write(path, contents).map_err(|source| OutputError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workspaces_of_two_requests_do_not_collide() {
        let root = tempfile::tempdir().expect("temp dir");
        let first = RequestWorkspace::create(root.path()).expect("first workspace");
        let second = RequestWorkspace::create(root.path()).expect("second workspace");

        assert_ne!(first.id(), second.id());
        assert_ne!(first.dot_path(), second.dot_path());
        assert!(first.dir().is_dir());
        assert!(second.image_path().starts_with(second.dir()));
        assert!(first
            .scoped_name("prov_output.csv")
            .starts_with(&first.id().to_string()));
    }

    #[test]
    fn create_reports_directory_errors() {
        let root = tempfile::tempdir().expect("temp dir");
        let file = root.path().join("not_a_dir");
        std::fs::write(&file, "x").expect("marker file");

        let err = RequestWorkspace::create(&file).expect_err("should fail under a file");
        assert!(err.to_string().contains("Failed to create output directory"));
    }
}
