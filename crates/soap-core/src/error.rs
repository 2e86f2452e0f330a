use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures at the external tool boundary.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("no conda binary found; looked for $MAMBA_EXE, micromamba, mamba, $CONDA_EXE and conda")]
    NotFound,

    #[error("failed to launch {program}")]
    Launch {
        program: String,
        #[source]
        source: io::Error,
    },

    /// The tool ran and exited nonzero. For `update` this is a recoverable
    /// signal; for `create` and `run` it is surfaced to the caller.
    #[error("{program} {operation} exited with code {code}{}", render_diagnostics(diagnostics))]
    Invocation {
        program: String,
        operation: &'static str,
        code: i32,
        diagnostics: String,
    },
}

fn render_diagnostics(diagnostics: &str) -> String {
    let trimmed = diagnostics.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(":\n{trimmed}")
    }
}

/// Failures while preparing one environment.
#[derive(Debug, Error)]
pub enum PrepareError {
    #[error("environment file {} does not exist", path.display())]
    MissingSpecFile { path: PathBuf },

    #[error("environment file {} is not valid YAML: {message}", path.display())]
    InvalidSpecFile { path: PathBuf, message: String },

    #[error("failed to access {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Tool(#[from] ToolError),
}

impl PrepareError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        PrepareError::Io {
            path: path.into(),
            source,
        }
    }
}
