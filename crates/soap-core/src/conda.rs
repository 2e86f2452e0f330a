//! The conda/mamba adapter.
//!
//! The concrete binary is probed once per process and carried as an
//! explicit handle; nothing in this crate consults global state after
//! [`CondaTool::locate`] returns.

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

use crate::error::ToolError;
use crate::process;

/// The three operations the decision engine consumes.
///
/// `create` and `update` report nonzero exits as
/// [`ToolError::Invocation`] with the captured diagnostics; `run_in`
/// propagates the child's exit code without translating it.
pub trait EnvTool {
    fn create(&self, spec_file: &Path, prefix: &Path) -> Result<(), ToolError>;
    fn update(&self, spec_file: &Path, prefix: &Path) -> Result<(), ToolError>;
    fn run_in(&self, prefix: &Path, args: &[String], cwd: Option<&Path>) -> Result<i32, ToolError>;
}

#[derive(Debug, Clone)]
pub struct CondaTool {
    program: PathBuf,
}

impl CondaTool {
    /// Probe for a conda implementation in a fixed preference order:
    /// `$MAMBA_EXE`, `micromamba`, `mamba`, `$CONDA_EXE`, `conda`.
    pub fn locate() -> Result<Self, ToolError> {
        Self::locate_from(&EnvSnapshot::capture(), |name| which::which(name).ok())
    }

    fn locate_from(
        snapshot: &EnvSnapshot,
        find_on_path: impl Fn(&str) -> Option<PathBuf>,
    ) -> Result<Self, ToolError> {
        if let Some(exe) = snapshot.var("MAMBA_EXE").filter(|exe| !exe.is_empty()) {
            return Ok(Self {
                program: PathBuf::from(exe),
            });
        }
        for candidate in ["micromamba", "mamba"] {
            if let Some(path) = find_on_path(candidate) {
                return Ok(Self { program: path });
            }
        }
        if let Some(exe) = snapshot.var("CONDA_EXE").filter(|exe| !exe.is_empty()) {
            return Ok(Self {
                program: PathBuf::from(exe),
            });
        }
        if let Some(path) = find_on_path("conda") {
            return Ok(Self { program: path });
        }
        Err(ToolError::NotFound)
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn checked(&self, operation: &'static str, args: Vec<String>) -> Result<(), ToolError> {
        tracing::debug!(program = %self.program.display(), operation, "invoking conda");
        let exit = process::run_streaming(&self.program, &args, None)?;
        if exit.code == 0 {
            Ok(())
        } else {
            Err(ToolError::Invocation {
                program: self.program.display().to_string(),
                operation,
                code: exit.code,
                diagnostics: exit.diagnostics,
            })
        }
    }
}

impl EnvTool for CondaTool {
    fn create(&self, spec_file: &Path, prefix: &Path) -> Result<(), ToolError> {
        self.checked(
            "create",
            vec![
                "create".to_string(),
                "--file".to_string(),
                spec_file.display().to_string(),
                "--prefix".to_string(),
                prefix.display().to_string(),
            ],
        )
    }

    fn update(&self, spec_file: &Path, prefix: &Path) -> Result<(), ToolError> {
        self.checked(
            "update",
            vec![
                "update".to_string(),
                "--file".to_string(),
                spec_file.display().to_string(),
                "--prefix".to_string(),
                prefix.display().to_string(),
                "--prune".to_string(),
            ],
        )
    }

    fn run_in(&self, prefix: &Path, args: &[String], cwd: Option<&Path>) -> Result<i32, ToolError> {
        let mut argv = vec![
            "run".to_string(),
            format!("--prefix={}", prefix.display()),
            "--attach=STDIN".to_string(),
            "--attach=STDOUT".to_string(),
            "--attach=STDERR".to_string(),
        ];
        argv.extend_from_slice(args);
        process::run_inherited(&self.program, &argv, cwd)
    }
}

#[derive(Debug, Clone)]
struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    fn capture() -> Self {
        Self {
            vars: env::vars().collect(),
        }
    }

    fn var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    #[cfg(test)]
    fn testing(pairs: &[(&str, &str)]) -> Self {
        let vars = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Self { vars }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_path_hits(_: &str) -> Option<PathBuf> {
        None
    }

    #[test]
    fn mamba_exe_wins_over_everything() {
        let snapshot = EnvSnapshot::testing(&[
            ("MAMBA_EXE", "/opt/bin/micromamba"),
            ("CONDA_EXE", "/opt/bin/conda"),
        ]);
        let tool = CondaTool::locate_from(&snapshot, |_| Some(PathBuf::from("/usr/bin/conda")))
            .expect("locate");
        assert_eq!(tool.program(), Path::new("/opt/bin/micromamba"));
    }

    #[test]
    fn path_probe_prefers_micromamba_then_mamba() {
        let snapshot = EnvSnapshot::testing(&[]);
        let tool = CondaTool::locate_from(&snapshot, |name| {
            (name == "mamba" || name == "micromamba")
                .then(|| PathBuf::from("/usr/bin").join(name))
        })
        .expect("locate");
        assert_eq!(tool.program(), Path::new("/usr/bin/micromamba"));

        let tool = CondaTool::locate_from(&snapshot, |name| {
            (name == "mamba").then(|| PathBuf::from("/usr/bin/mamba"))
        })
        .expect("locate");
        assert_eq!(tool.program(), Path::new("/usr/bin/mamba"));
    }

    #[test]
    fn conda_exe_beats_plain_conda() {
        let snapshot = EnvSnapshot::testing(&[("CONDA_EXE", "/miniconda/bin/conda")]);
        let tool = CondaTool::locate_from(&snapshot, |name| {
            (name == "conda").then(|| PathBuf::from("/usr/bin/conda"))
        })
        .expect("locate");
        assert_eq!(tool.program(), Path::new("/miniconda/bin/conda"));
    }

    #[test]
    fn empty_probe_is_not_found() {
        let snapshot = EnvSnapshot::testing(&[("MAMBA_EXE", "")]);
        assert!(matches!(
            CondaTool::locate_from(&snapshot, no_path_hits),
            Err(ToolError::NotFound)
        ));
    }
}
