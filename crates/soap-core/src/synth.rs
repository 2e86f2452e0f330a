//! Derives the specification actually handed to the external tool.
//!
//! The synthesized document is the base YAML file with the environment's
//! overlay folded in. It is a pure function of the base file's bytes and
//! the overlay fields; the decision engine relies on byte-identical
//! output for its cache comparison.

use std::fs;
use std::io;
use std::path::Path;

use serde_yaml::{Mapping, Value};
use sha2::{Digest, Sha256};
use soap_domain::Env;

use crate::error::PrepareError;

/// A transient, derived specification document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Synthesized {
    /// Canonical serialized form, used for caching and handed to the tool.
    pub text: String,
    /// Hex digest of the *original* base file bytes. The derived name
    /// changes iff the user edits the base file, independent of overlays.
    pub hash: String,
}

pub fn synthesize(env: &Env) -> Result<Synthesized, PrepareError> {
    let bytes = fs::read(&env.yml_path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            PrepareError::MissingSpecFile {
                path: env.yml_path.clone(),
            }
        } else {
            PrepareError::io(&env.yml_path, source)
        }
    })?;
    let hash = hex::encode(Sha256::digest(&bytes));

    let parsed: Value =
        serde_yaml::from_slice(&bytes).map_err(|err| PrepareError::InvalidSpecFile {
            path: env.yml_path.clone(),
            message: format!("{err}"),
        })?;
    let Value::Mapping(mut doc) = parsed else {
        return Err(PrepareError::InvalidSpecFile {
            path: env.yml_path.clone(),
            message: "top-level document must be a mapping".to_string(),
        });
    };

    let base_name = field(&doc, "name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    doc.insert(
        Value::from("name"),
        Value::from(format!("{base_name}.{hash}")),
    );

    let mut channels: Vec<Value> = env
        .additional_channels
        .iter()
        .map(|channel| Value::from(channel.as_str()))
        .collect();
    if let Some(Value::Sequence(existing)) = field(&doc, "channels") {
        channels.extend(existing.iter().cloned());
    }
    doc.insert(Value::from("channels"), Value::Sequence(channels));

    let mut dependencies = match field(&doc, "dependencies") {
        Some(Value::Sequence(existing)) => existing.clone(),
        _ => Vec::new(),
    };
    dependencies.extend(
        env.additional_dependencies
            .iter()
            .map(|dep| Value::from(dep.as_str())),
    );
    if env.install_current {
        merge_editable_install(&mut dependencies, &env.project_root);
    }
    doc.insert(Value::from("dependencies"), Value::Sequence(dependencies));

    let text = serde_yaml::to_string(&doc).map_err(|err| PrepareError::InvalidSpecFile {
        path: env.yml_path.clone(),
        message: format!("{err}"),
    })?;
    Ok(Synthesized { text, hash })
}

fn field<'a>(doc: &'a Mapping, key: &str) -> Option<&'a Value> {
    doc.iter()
        .find(|(name, _)| name.as_str() == Some(key))
        .map(|(_, value)| value)
}

/// Appends `-e <project root>` to the single `pip:` sub-group, creating
/// the group only when no entry carries one yet. Unrelated entries are
/// never touched.
fn merge_editable_install(dependencies: &mut Vec<Value>, project_root: &Path) {
    let editable = Value::from(format!("-e {}", project_root.display()));
    for entry in dependencies.iter_mut() {
        if let Value::Mapping(group) = entry {
            for (key, value) in group.iter_mut() {
                if key.as_str() == Some("pip") {
                    if let Value::Sequence(pip) = value {
                        pip.push(editable);
                        return;
                    }
                }
            }
        }
    }
    let mut group = Mapping::new();
    group.insert(Value::from("pip"), Value::Sequence(vec![editable]));
    dependencies.push(Value::Mapping(group));
}
