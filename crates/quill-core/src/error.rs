use core::result::Result as CoreResult;
use std::io::Error as IoError;

use serde_json::Error as SerdeJsonError;
use thiserror::Error;
use toml::de::Error as TomlError;

/// Result type for core operations.
pub type Result<T> = CoreResult<T, Error>;

/// Errors that can occur across the pipeline crates.
#[derive(Debug, Error)]
pub enum Error {
    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization or deserialization failed.
    #[error("JSON serialization error: {0}")]
    Json(#[from] SerdeJsonError),

    /// TOML deserialization failed.
    #[error("TOML deserialization error: {0}")]
    Toml(#[from] TomlError),

    /// Configuration is invalid or missing.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A generation collaborator failed.
    #[error("Generation failed: {0}")]
    Generation(String),

    /// A retrieval collaborator failed.
    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    /// An execution collaborator failed outside its own result contract.
    #[error("Execution failed: {0}")]
    Execution(String),

    /// A test-generation collaborator failed.
    #[error("Test generation failed: {0}")]
    TestGeneration(String),

    /// A stage with this name is already registered.
    #[error("Duplicate stage registration: {0}")]
    DuplicateStage(String),

    /// A general error not covered by other variants.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Determines whether this error may succeed if retried.
    ///
    /// Collaborator transport faults are transient; configuration and
    /// registration faults are not.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Generation(_) | Self::Retrieval(_) | Self::Execution(_) | Self::TestGeneration(_)
        )
    }
}
