//! Error types for apimsync-publish

use std::path::PathBuf;

use thiserror::Error;

/// Result type for apimsync-publish operations
pub type Result<T> = std::result::Result<T, PublishError>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PublishError {
    #[error(transparent)]
    Core(#[from] apimsync_core::CoreError),

    #[error(transparent)]
    Apim(#[from] apimsync_apim::ApimError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("git {command} failed: {message}")]
    Git { command: String, message: String },

    /// A file matched more than one resource kind.
    #[error("ambiguous file '{path}': matches {kinds:?}")]
    AmbiguousFile { path: PathBuf, kinds: Vec<String> },

    /// A link information file without the secondary's id.
    #[error("link file '{path}' does not carry '{property}'")]
    MissingLinkProperty { path: PathBuf, property: String },

    /// A link file whose directory disagrees with the id it carries.
    #[error("link file '{path}' sits under '{expected}' but links '{found}'")]
    LinkSecondaryMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },

    /// A resource in the processing set without a readable source.
    #[error("no source file found for resource {key}")]
    MissingSource { key: String },

    /// Aggregated relationship validation failures.
    #[error("relationship validation failed:\n{}", messages.join("\n"))]
    RelationshipValidation { messages: Vec<String> },
}
