/// Build system error types
use std::path::PathBuf;
use thiserror::Error;

pub type BuildResult<T> = Result<T, BuildError>;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Failed to scan {path}: {error}")]
    Discovery {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] tinyai_config::ConfigError),

    #[error("Invalid target configuration: {0}")]
    InvalidTarget(String),

    #[error("Entry point not found for target '{target}': {path}")]
    MissingEntry { target: String, path: PathBuf },

    #[error("Cannot resolve '{specifier}' imported from {file}")]
    UnresolvedImport { file: PathBuf, specifier: String },

    #[error("Target '{target}': {step} failed on {file}: {message}")]
    Transform {
        target: String,
        step: String,
        file: PathBuf,
        message: String,
    },

    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    #[error("I/O error at {path}: {error}")]
    IoError {
        path: PathBuf,
        error: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Build failed: {0}")]
    BuildFailed(String),
}

impl BuildError {
    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, error: std::io::Error) -> Self {
        Self::IoError {
            path: path.into(),
            error,
        }
    }

    /// Create a transform error
    pub fn transform(
        target: impl Into<String>,
        step: impl Into<String>,
        file: impl Into<PathBuf>,
        message: impl ToString,
    ) -> Self {
        Self::Transform {
            target: target.into(),
            step: step.into(),
            file: file.into(),
            message: message.to_string(),
        }
    }

    /// Create an unresolved import error
    pub fn unresolved(file: impl Into<PathBuf>, specifier: impl Into<String>) -> Self {
        Self::UnresolvedImport {
            file: file.into(),
            specifier: specifier.into(),
        }
    }

    /// Create a missing entry error
    pub fn missing_entry(target: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::MissingEntry {
            target: target.into(),
            path: path.into(),
        }
    }
}
