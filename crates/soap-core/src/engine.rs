//! The cache/build decision engine.
//!
//! One preparation call walks `START -> SYNTHESIZED -> {CACHE_HIT |
//! BUILD_NEEDED} -> {UPDATED | RECREATED | SKIPPED} -> DONE`. The
//! synthesized document is written to a working file next to the prefix,
//! compared against the committed file from the last successful build,
//! and promoted with a single rename once the external tool succeeds.
//!
//! Two concurrent processes preparing the same prefix race benignly on
//! the committed file (last writer wins); the external tool is not built
//! for concurrent mutation of one prefix either, so no locking is done.

use std::fs;
use std::path::PathBuf;

use soap_domain::Env;

use crate::conda::EnvTool;
use crate::error::{PrepareError, ToolError};
use crate::synth::synthesize;

/// Name of the committed specification inside the prefix. It records the
/// specification last applied to that prefix, and nothing else.
pub const COMMITTED_FILE: &str = ".soap-env.yml";

#[derive(Debug, Clone, Copy)]
pub struct PrepareOptions {
    /// Skip the committed-file comparison and always invoke the tool.
    pub ignore_cache: bool,
    /// Try in-place update of an existing prefix before recreating.
    pub allow_update: bool,
}

impl Default for PrepareOptions {
    fn default() -> Self {
        Self {
            ignore_cache: false,
            allow_update: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrepareOutcome {
    /// Committed file matched; zero tool invocations.
    UpToDate,
    /// Existing prefix reconciled in place.
    Updated,
    /// Prefix built from scratch (possibly after removing the old one).
    Recreated,
}

/// Bring `env`'s prefix in line with its current synthesized
/// specification, invoking the external tool only when needed.
///
/// On failure after the working file was written, the working file is
/// left behind for diagnosis. Promotion to the committed file is a
/// single rename, so an interrupted call leaves either the old or the
/// new committed file intact and re-running is always safe.
pub fn prepare(
    tool: &dyn EnvTool,
    env: &Env,
    opts: &PrepareOptions,
) -> Result<PrepareOutcome, PrepareError> {
    let synthesized = synthesize(env)?;

    // Conda rejects foreign files in a fresh prefix, so the working file
    // lives one level up from it.
    let working = working_path(env);
    if let Some(parent) = working.parent() {
        fs::create_dir_all(parent).map_err(|source| PrepareError::io(parent, source))?;
    }
    fs::write(&working, &synthesized.text).map_err(|source| PrepareError::io(&working, source))?;

    let committed = env.env_path.join(COMMITTED_FILE);
    if !opts.ignore_cache && env.env_path.exists() && committed.exists() {
        let cached =
            fs::read(&committed).map_err(|source| PrepareError::io(&committed, source))?;
        if cached == synthesized.text.as_bytes() {
            fs::remove_file(&working).map_err(|source| PrepareError::io(&working, source))?;
            tracing::debug!(env = %env.name, "environment is up to date");
            return Ok(PrepareOutcome::UpToDate);
        }
    }

    let mut outcome = PrepareOutcome::Recreated;
    if opts.allow_update && env.env_path.exists() {
        match tool.update(&working, &env.env_path) {
            Ok(()) => outcome = PrepareOutcome::Updated,
            Err(ToolError::Invocation { code, .. }) => {
                tracing::warn!(
                    env = %env.name,
                    code,
                    "updating environment in place failed; recreating"
                );
            }
            Err(err) => return Err(err.into()),
        }
    }

    if outcome != PrepareOutcome::Updated {
        if env.env_path.exists() {
            fs::remove_dir_all(&env.env_path)
                .map_err(|source| PrepareError::io(&env.env_path, source))?;
        }
        tool.create(&working, &env.env_path)?;
    }

    fs::rename(&working, &committed).map_err(|source| PrepareError::io(&committed, source))?;
    tracing::info!(env = %env.name, outcome = ?outcome, "environment prepared");
    Ok(outcome)
}

fn working_path(env: &Env) -> PathBuf {
    let file = format!(".{}.working.yml", env.name);
    match env.env_path.parent() {
        Some(parent) => parent.join(file),
        None => env.env_path.join(file),
    }
}
