//! Upward walk that locates the project root and its configuration anchor.

use std::fs;
use std::path::{Path, PathBuf};

use toml_edit::DocumentMut;

use crate::error::ConfigError;

/// Where the configuration for a project lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anchor {
    /// A dedicated `soap.toml` at the project root.
    SoapToml(PathBuf),
    /// A `[tool.soap]` table inside `pyproject.toml`.
    Pyproject(PathBuf),
}

impl Anchor {
    pub fn path(&self) -> &Path {
        match self {
            Anchor::SoapToml(path) | Anchor::Pyproject(path) => path,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProjectRoot {
    pub root: PathBuf,
    pub anchor: Anchor,
}

/// Walk upward from `start` looking for a configuration anchor.
///
/// The outermost ancestor carrying a `.git` entry fixes the project root;
/// the anchor must live there. Without any `.git` marker the nearest
/// ancestor containing an anchor wins.
pub fn discover_project(start: &Path) -> Result<ProjectRoot, ConfigError> {
    let mut outermost_marker: Option<PathBuf> = None;
    let mut nearest_anchor: Option<ProjectRoot> = None;

    let mut dir = start.to_path_buf();
    loop {
        if dir.join(".git").exists() {
            outermost_marker = Some(dir.clone());
        }
        if nearest_anchor.is_none() {
            if let Some(anchor) = anchor_in(&dir)? {
                nearest_anchor = Some(ProjectRoot {
                    root: dir.clone(),
                    anchor,
                });
            }
        }
        if !dir.pop() {
            break;
        }
    }

    if let Some(root) = outermost_marker {
        return match anchor_in(&root)? {
            Some(anchor) => Ok(ProjectRoot { root, anchor }),
            None => Err(ConfigError::NotFound {
                start: start.to_path_buf(),
            }),
        };
    }

    nearest_anchor.ok_or_else(|| ConfigError::NotFound {
        start: start.to_path_buf(),
    })
}

/// `soap.toml` is preferred over `pyproject.toml` within one directory.
fn anchor_in(dir: &Path) -> Result<Option<Anchor>, ConfigError> {
    let soap_toml = dir.join("soap.toml");
    if soap_toml.is_file() {
        return Ok(Some(Anchor::SoapToml(soap_toml)));
    }
    let pyproject = dir.join("pyproject.toml");
    if pyproject.is_file() && pyproject_has_tool_soap(&pyproject)? {
        return Ok(Some(Anchor::Pyproject(pyproject)));
    }
    Ok(None)
}

fn pyproject_has_tool_soap(path: &Path) -> Result<bool, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let doc: DocumentMut = contents.parse().map_err(|err| ConfigError::Parse {
        path: path.to_path_buf(),
        message: format!("{err}"),
    })?;
    Ok(doc
        .get("tool")
        .and_then(|item| item.as_table())
        .and_then(|table| table.get("soap"))
        .is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        fs::write(path, b"").expect("write");
    }

    #[test]
    fn nearest_soap_toml_wins_without_marker() {
        let temp = tempfile::tempdir().expect("tempdir");
        let nested = temp.path().join("a/b");
        fs::create_dir_all(&nested).expect("mkdir");
        touch(&temp.path().join("soap.toml"));
        touch(&nested.join("soap.toml"));

        let found = discover_project(&nested).expect("discover");
        assert_eq!(found.root, nested);
        assert_eq!(found.anchor, Anchor::SoapToml(nested.join("soap.toml")));
    }

    #[test]
    fn outermost_git_marker_fixes_the_root() {
        let temp = tempfile::tempdir().expect("tempdir");
        let outer = temp.path().join("repo");
        let inner = outer.join("vendored");
        fs::create_dir_all(inner.join(".git")).expect("mkdir");
        fs::create_dir_all(outer.join(".git")).expect("mkdir");
        touch(&outer.join("soap.toml"));
        touch(&inner.join("soap.toml"));

        let found = discover_project(&inner).expect("discover");
        assert_eq!(found.root, outer);
    }

    #[test]
    fn marker_without_anchor_is_not_found() {
        let temp = tempfile::tempdir().expect("tempdir");
        let repo = temp.path().join("repo");
        fs::create_dir_all(repo.join(".git")).expect("mkdir");

        let err = discover_project(&repo).expect_err("should fail");
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }

    #[test]
    fn pyproject_needs_tool_soap_table() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(
            temp.path().join("pyproject.toml"),
            "[project]\nname = \"demo\"\n",
        )
        .expect("write");

        assert!(matches!(
            discover_project(temp.path()),
            Err(ConfigError::NotFound { .. })
        ));

        fs::write(
            temp.path().join("pyproject.toml"),
            "[project]\nname = \"demo\"\n\n[tool.soap.envs]\ntest = \"env.yml\"\n",
        )
        .expect("write");

        let found = discover_project(temp.path()).expect("discover");
        assert_eq!(
            found.anchor,
            Anchor::Pyproject(temp.path().join("pyproject.toml"))
        );
    }
}
