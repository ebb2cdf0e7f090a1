//! Per-region render failures

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while rendering a single region.
///
/// None of these abort a batch; the orchestrator turns them into a
/// status on the affected region.
#[derive(Debug, Error)]
pub enum RenderError {
    /// A referenced file does not exist.
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// An external tool could not be started (usually not installed).
    #[error("Failed to run {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: io::Error,
    },

    /// An external tool ran but reported failure.
    #[error("{tool} failed ({status}): {message}")]
    Tool {
        tool: String,
        status: String,
        message: String,
    },

    /// A tool exited cleanly without producing its output file.
    #[error("{tool} produced no output at {}", .path.display())]
    MissingOutput { tool: String, path: PathBuf },

    /// The vector result could not be turned into a bitmap.
    #[error("Rasterization failed: {0}")]
    Rasterize(String),

    /// A renderer panicked; caught at the region boundary.
    #[error("Renderer panicked: {0}")]
    Panicked(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl RenderError {
    pub fn is_file_not_found(&self) -> bool {
        matches!(self, RenderError::FileNotFound(_))
    }
}
