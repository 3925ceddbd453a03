//! Core error types

use thiserror::Error;

/// Result type for apimsync-core operations
pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CoreError {
    #[error("invalid resource name: {message}")]
    InvalidName { message: String },

    #[error("invalid revision suffix in '{name}': {message}")]
    InvalidRevision { name: String, message: String },

    #[error("DTO does not match the {kind} schema: {message}")]
    Schema { kind: String, message: String },

    #[error("missing required property '{path}'")]
    MissingProperty { path: String },

    #[error("expected a JSON object, got {found}")]
    NotJsonObject { found: String },

    #[error("malformed resource id '{id}': {message}")]
    MalformedReferenceId { id: String, message: String },

    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
