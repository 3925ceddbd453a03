//! Error types for apimsync-extract

use thiserror::Error;

/// Result type for apimsync-extract operations
pub type Result<T> = std::result::Result<T, ExtractError>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExtractError {
    #[error(transparent)]
    Core(#[from] apimsync_core::CoreError),

    #[error(transparent)]
    Apim(#[from] apimsync_apim::ApimError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A listing entry without a usable name.
    #[error("collection entry at {uri} has no name")]
    UnnamedEntry { uri: String },
}
