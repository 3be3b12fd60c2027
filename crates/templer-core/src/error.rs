//! Core error types

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("File does not exist: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Is not a file: {}", path.display())]
    NotAFile { path: PathBuf },

    #[error("Destination already exists: {}. Use '-f' flag to overwrite the file", path.display())]
    AlreadyExists { path: PathBuf },

    #[error("Error loading options from definition file {}: {description}", path.display())]
    Definition { path: PathBuf, description: String },

    #[error("Invalid variables: {message}")]
    InvalidValues { message: String },

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn definition(path: impl Into<PathBuf>, description: impl Into<String>) -> Self {
        Self::Definition {
            path: path.into(),
            description: description.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
