//! Error types for apimsync-apim

use thiserror::Error;

/// Result type for apimsync-apim operations
pub type Result<T> = std::result::Result<T, ApimError>;

/// Errors raised against the live service
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApimError {
    /// Transport-level failure
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The configured service URL cannot anchor management paths
    #[error("'{url}' cannot be used as a service URL")]
    InvalidServiceUrl { url: String },

    /// Non-success response from the management endpoint
    #[error("service returned {status} for {url}: {body}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },

    /// Response body did not have the expected shape
    #[error("unexpected response from {url}: {message}")]
    UnexpectedResponse { url: String, message: String },

    /// Long-running operation did not settle
    #[error("operation at {url} did not complete after {attempts} polls")]
    OperationPending { url: String, attempts: u32 },

    #[error(transparent)]
    Core(#[from] apimsync_core::CoreError),

    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to serialize YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

fn contains_case_insensitive(haystack: &str, needle: &str) -> bool {
    haystack.to_ascii_lowercase().contains(&needle.to_ascii_lowercase())
}

impl ApimError {
    /// Classified 404; optional GETs convert this to `None`.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApimError::Status { status: 404, .. })
    }

    /// The service rejects the resource kind in the current pricing tier.
    pub fn is_sku_unsupported(&self) -> bool {
        match self {
            ApimError::Status { status: 400, body, .. } => {
                contains_case_insensitive(body, "MethodNotAllowedInPricingTier")
            }
            ApimError::Status { status: 500, body, .. } => {
                body.contains("Request processing failed due to internal error")
            }
            _ => false,
        }
    }
}
