//! CLI error types with exit code handling

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

use crate::exit_codes;

/// Errors that end a templer run
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// A definition file given on the command line does not exist
    #[error("Definition file does not exist: {}", path.display())]
    #[diagnostic(code(templer::cli::definition))]
    MissingDefinition { path: PathBuf },

    /// At least one manifest or unit failed
    #[error("Rendering failed: {summary}")]
    #[diagnostic(code(templer::cli::render))]
    RenderFailed { summary: String },

    /// Watch mode could not be started
    #[error("Could not start auto renderer")]
    #[diagnostic(code(templer::cli::watch))]
    Watch {
        #[source]
        source: templer_render::RenderError,
    },

    /// Internal error (runtime, unexpected failure)
    #[error("Internal error: {message}")]
    #[diagnostic(code(templer::cli::internal))]
    Internal { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::MissingDefinition { .. }
            | CliError::RenderFailed { .. }
            | CliError::Watch { .. }
            | CliError::Internal { .. } => exit_codes::ERROR,
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
