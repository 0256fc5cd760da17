//! Error types for the CLI

use std::io;
use std::process::ExitStatus;

use thiserror::Error;

/// Failures of the Python host or the interactive shell.
///
/// Pipeline diagnostics are not represented here; they are reported through
/// `tora_core::Diagnostic`.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("failed to start {interpreter}: {source}")]
    Spawn {
        interpreter: String,
        #[source]
        source: io::Error,
    },

    /// The driver process went away or broke the framing.
    #[error("lost connection to the Python driver: {0}")]
    Driver(String),

    #[error("I/O error while talking to Python: {0}")]
    Io(#[from] io::Error),

    #[error("Python exited with {0}")]
    ScriptFailed(ExitStatus),

    #[error("REPL error: {0}")]
    Repl(String),
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;
