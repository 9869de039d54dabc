use std::path::Path;
use std::time::Duration;

use tracing::info;

use crate::config::GraphvizConfig;
use crate::engine::process::{self, CommandSpec};
use crate::engine::EngineError;

/// Turns a DOT source file into an image.
pub trait Renderer {
    /// Render `dot` into `image`, overwriting it.
    fn render(&self, dot: &Path, image: &Path) -> Result<(), EngineError>;
}

/// Renders PNG images with the Graphviz `dot` executable.
#[derive(Debug, Clone)]
pub struct Graphviz {
    config: GraphvizConfig,
    timeout: Duration,
}

impl Graphviz {
    /// Renderer using `config` with a per-process `timeout`.
    pub fn new(config: GraphvizConfig, timeout: Duration) -> Self {
        Self { config, timeout }
    }

    /// `dot -Tpng <dot> -o <image>`.
    pub fn command(&self, dot: &Path, image: &Path) -> CommandSpec {
        CommandSpec::new(&self.config.binary)
            .arg("-Tpng")
            .arg(dot)
            .arg("-o")
            .arg(image)
    }
}

impl Renderer for Graphviz {
    fn render(&self, dot: &Path, image: &Path) -> Result<(), EngineError> {
        process::run_checked(&self.command(dot, image), self.timeout)?;
        info!(image = %image.display(), "rendered provenance graph");
        Ok(())
    }
}
