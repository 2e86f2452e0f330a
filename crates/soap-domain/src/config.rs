//! The project configuration model.
//!
//! `soap.toml` (or `[tool.soap]` in `pyproject.toml`) declares two maps:
//! `envs`, naming Conda environments backed by a YAML specification file,
//! and `aliases`, naming shell commands bound to a default environment.
//! Both accept a bare-string shorthand at the parse boundary; in memory
//! every entity is the fully expanded record with all paths already
//! resolved against the project root.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;

use crate::discover::{discover_project, Anchor, ProjectRoot};
use crate::error::ConfigError;

/// Environment used when neither the alias nor the caller names one.
pub const DEFAULT_ENV: &str = "test";

/// One named, reproducible execution context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Env {
    pub name: String,
    /// Absolute path to the Conda environment YAML file.
    pub yml_path: PathBuf,
    /// Absolute path to the prefix where the environment is materialized.
    pub env_path: PathBuf,
    /// Install the owning project into the environment as an editable dep.
    pub install_current: bool,
    /// Prepended to the YAML file's channel list, highest priority first.
    pub additional_channels: Vec<String>,
    /// Appended to the YAML file's dependency list.
    pub additional_dependencies: Vec<String>,
    pub project_root: PathBuf,
}

/// One named shortcut command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alias {
    pub name: String,
    pub command: String,
    /// Absolute directory to run in; `None` keeps the caller's cwd.
    pub working_dir: Option<PathBuf>,
    pub default_env: String,
    pub description: String,
    pub passthrough_args: bool,
}

/// The root aggregate, reconstructed from configuration on every
/// invocation and immutable thereafter.
#[derive(Debug, Clone)]
pub struct Config {
    pub project_root: PathBuf,
    pub envs: IndexMap<String, Env>,
    pub aliases: IndexMap<String, Alias>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    envs: IndexMap<String, RawEnv>,
    #[serde(default)]
    aliases: IndexMap<String, RawAlias>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawEnv {
    Path(String),
    Record(RawEnvRecord),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawEnvRecord {
    yml_path: String,
    #[serde(default)]
    env_path: Option<String>,
    #[serde(default = "default_true")]
    install_current: bool,
    #[serde(default)]
    additional_channels: Vec<String>,
    #[serde(default)]
    additional_dependencies: Vec<String>,
}

impl RawEnv {
    fn into_record(self) -> RawEnvRecord {
        match self {
            RawEnv::Path(yml_path) => RawEnvRecord {
                yml_path,
                env_path: None,
                install_current: true,
                additional_channels: Vec::new(),
                additional_dependencies: Vec::new(),
            },
            RawEnv::Record(record) => record,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawAlias {
    Cmd(String),
    Record(RawAliasRecord),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAliasRecord {
    cmd: String,
    #[serde(default)]
    chdir: RawChdir,
    /// `None` falls back to [`DEFAULT_ENV`] and skips the reference check.
    #[serde(default)]
    env: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    passthrough_args: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawChdir {
    Flag(bool),
    Subdir(String),
}

impl Default for RawChdir {
    fn default() -> Self {
        RawChdir::Flag(false)
    }
}

impl RawAlias {
    fn into_record(self) -> RawAliasRecord {
        match self {
            RawAlias::Cmd(cmd) => RawAliasRecord {
                cmd,
                chdir: RawChdir::default(),
                env: None,
                description: None,
                passthrough_args: false,
            },
            RawAlias::Record(record) => record,
        }
    }
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Discover and load the configuration for the project containing
    /// `start_dir`.
    pub fn load(start_dir: &Path) -> Result<Self, ConfigError> {
        let project = discover_project(start_dir)?;
        Self::from_project(&project)
    }

    pub fn from_project(project: &ProjectRoot) -> Result<Self, ConfigError> {
        let path = project.anchor.path();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let raw = parse_raw(&contents, &project.anchor)?;
        Self::from_raw(raw, &project.root, path)
    }

    fn from_raw(raw: RawConfig, root: &Path, source: &Path) -> Result<Self, ConfigError> {
        let mut violations = Vec::new();

        let mut envs = IndexMap::new();
        for (name, entry) in raw.envs {
            let record = entry.into_record();
            if record.yml_path.is_empty() {
                violations.push(format!("envs.{name}: yml_path must not be empty"));
                continue;
            }
            let env_path = match record.env_path {
                Some(explicit) => resolve(root, Path::new(&explicit)),
                None => root.join(".soap").join(&name),
            };
            envs.insert(
                name.clone(),
                Env {
                    yml_path: resolve(root, Path::new(&record.yml_path)),
                    env_path,
                    install_current: record.install_current,
                    additional_channels: record.additional_channels,
                    additional_dependencies: record.additional_dependencies,
                    project_root: root.to_path_buf(),
                    name,
                },
            );
        }

        let mut aliases = IndexMap::new();
        for (name, entry) in raw.aliases {
            let record = entry.into_record();
            if record.cmd.is_empty() {
                violations.push(format!("aliases.{name}: cmd must not be empty"));
            }
            if let Some(env) = &record.env {
                if !envs.contains_key(env) {
                    violations.push(format!(
                        "aliases.{name}: env '{env}' does not name a configured environment"
                    ));
                }
            }
            let working_dir = match record.chdir {
                RawChdir::Flag(false) => None,
                RawChdir::Flag(true) => Some(root.to_path_buf()),
                RawChdir::Subdir(sub) => {
                    let sub = PathBuf::from(sub);
                    if sub.is_absolute() {
                        violations.push(format!(
                            "aliases.{name}: chdir must be a project-relative path"
                        ));
                        None
                    } else {
                        Some(root.join(sub))
                    }
                }
            };
            let description = record
                .description
                .filter(|text| !text.is_empty())
                .unwrap_or_else(|| format!("Alias for '{}'", record.cmd));
            aliases.insert(
                name.clone(),
                Alias {
                    command: record.cmd,
                    working_dir,
                    default_env: record.env.unwrap_or_else(|| DEFAULT_ENV.to_string()),
                    description,
                    passthrough_args: record.passthrough_args,
                    name,
                },
            );
        }

        if violations.is_empty() {
            Ok(Self {
                project_root: root.to_path_buf(),
                envs,
                aliases,
            })
        } else {
            Err(ConfigError::Invalid {
                path: source.to_path_buf(),
                violations,
            })
        }
    }
}

fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

fn parse_raw(contents: &str, anchor: &Anchor) -> Result<RawConfig, ConfigError> {
    match anchor {
        Anchor::SoapToml(path) => {
            toml_edit::de::from_str(contents).map_err(|err| ConfigError::Parse {
                path: path.clone(),
                message: format!("{err}"),
            })
        }
        Anchor::Pyproject(path) => {
            let shell: PyprojectShell =
                toml_edit::de::from_str(contents).map_err(|err| ConfigError::Parse {
                    path: path.clone(),
                    message: format!("{err}"),
                })?;
            Ok(shell.tool.soap.unwrap_or_default())
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct PyprojectShell {
    #[serde(default)]
    tool: ToolSection,
}

#[derive(Debug, Default, Deserialize)]
struct ToolSection {
    #[serde(default)]
    soap: Option<RawConfig>,
}
