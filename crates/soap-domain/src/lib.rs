#![deny(clippy::all, warnings)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

pub mod config;
pub mod discover;
mod error;

pub use config::{Alias, Config, Env, DEFAULT_ENV};
pub use discover::{discover_project, Anchor, ProjectRoot};
pub use error::ConfigError;
