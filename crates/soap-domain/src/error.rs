use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures while locating or loading the project configuration.
///
/// Every variant is fatal to configuration loading: callers never see a
/// partially populated [`crate::Config`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "no soap.toml or pyproject.toml with a [tool.soap] table found above {}",
        start.display()
    )]
    NotFound { start: PathBuf },

    #[error("invalid configuration in {}:\n  {}", path.display(), violations.join("\n  "))]
    Invalid {
        path: PathBuf,
        violations: Vec<String>,
    },

    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
