#![deny(clippy::all, warnings)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

pub mod conda;
pub mod engine;
mod error;
mod process;
pub mod synth;

pub use conda::{CondaTool, EnvTool};
pub use engine::{prepare, PrepareOptions, PrepareOutcome, COMMITTED_FILE};
pub use error::{PrepareError, ToolError};
pub use synth::{synthesize, Synthesized};
