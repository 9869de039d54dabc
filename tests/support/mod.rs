#![allow(dead_code)]

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use provscope::engine::graphviz::Renderer;
use provscope::engine::{Engine, EngineError, EngineRequest, ExecutionMode, RawOutput};
use provscope::intent::mode::Backend;
use provscope::output::workspace::RequestWorkspace;

pub(crate) fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from("tests/fixtures").join(name)
}

pub(crate) fn read_fixture(name: &str) -> String {
    std::fs::read_to_string(fixture_path(name))
        .unwrap_or_else(|e| panic!("fixture {name} should be readable: {e}"))
}

pub(crate) fn cells(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// Write an executable `sh` script standing in for an external program.
pub(crate) fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}")).expect("write script");
    make_executable(&path);
    path
}

#[cfg(unix)]
fn make_executable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    let mut permissions = std::fs::metadata(path).expect("metadata").permissions();
    permissions.set_mode(0o755);
    std::fs::set_permissions(path, permissions).expect("chmod");
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) {}

pub(crate) fn temp_workspace() -> (tempfile::TempDir, RequestWorkspace) {
    let root = tempfile::tempdir().expect("temp dir");
    let workspace = RequestWorkspace::create(root.path()).expect("workspace");
    (root, workspace)
}

type Respond = dyn Fn(&EngineRequest<'_>) -> Result<RawOutput, EngineError>;

/// Engine double that records every call and answers through a closure.
pub(crate) struct FakeEngine {
    backend: Backend,
    respond: Box<Respond>,
    calls: RefCell<Vec<(String, ExecutionMode)>>,
}

impl FakeEngine {
    pub(crate) fn new(
        backend: Backend,
        respond: impl Fn(&EngineRequest<'_>) -> Result<RawOutput, EngineError> + 'static,
    ) -> Self {
        Self {
            backend,
            respond: Box::new(respond),
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Engine that prints `text` and exits 0.
    pub(crate) fn printing(backend: Backend, text: &str) -> Self {
        let text = text.to_string();
        Self::new(backend, move |_| {
            Ok(RawOutput {
                text: text.clone(),
                exit_code: Some(0),
                artifact: None,
            })
        })
    }

    pub(crate) fn calls(&self) -> Vec<(String, ExecutionMode)> {
        self.calls.borrow().clone()
    }
}

impl Engine for FakeEngine {
    fn backend(&self) -> Backend {
        self.backend
    }

    fn execute(&self, request: &EngineRequest<'_>) -> Result<RawOutput, EngineError> {
        self.calls
            .borrow_mut()
            .push((request.query.to_string(), request.mode));
        (self.respond)(request)
    }
}

/// Renderer double that writes a marker file, or fails when asked to.
#[derive(Default)]
pub(crate) struct StubRenderer {
    pub(crate) fail: bool,
    rendered: RefCell<Vec<(PathBuf, PathBuf)>>,
}

impl StubRenderer {
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            rendered: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn rendered(&self) -> Vec<(PathBuf, PathBuf)> {
        self.rendered.borrow().clone()
    }
}

impl Renderer for StubRenderer {
    fn render(&self, dot: &Path, image: &Path) -> Result<(), EngineError> {
        if self.fail {
            return Err(EngineError::Status {
                program: "dot".to_string(),
                code: Some(1),
                output: "Error: syntax error in line 1".to_string(),
            });
        }
        std::fs::write(image, b"PNG").map_err(|source| EngineError::Io {
            context: "writing stub image".to_string(),
            source,
        })?;
        self.rendered
            .borrow_mut()
            .push((dot.to_path_buf(), image.to_path_buf()));
        Ok(())
    }
}
