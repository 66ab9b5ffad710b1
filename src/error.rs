//! Error types for holowatch.

/// Top-level error type for the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Notify error: {0}")]
    Notify(#[from] NotifyError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors talking to the holoplus API.
///
/// Every variant names the request target so the operator can tell which
/// fetch (channel list, a channel's thread page, ...) failed.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Request for {target} failed: {source}")]
    Request {
        target: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Fetch of {target} returned {status}: {body}")]
    Status {
        target: String,
        status: reqwest::StatusCode,
        body: String,
    },
}

/// Snapshot file errors.
///
/// A malformed previous harvest file is not an error: the tolerant loader
/// returns an empty known-ID set instead.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not valid JSON: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{path} must be a JSON array")]
    NotAnArray { path: String },

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Webhook delivery errors.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Webhook request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Webhook failed ({status}): {body}")]
    WebhookFailed {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Failed to download voice clip ({status}): {body}")]
    VoiceDownloadFailed {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Webhook (voice clip) failed ({status}): {body}")]
    VoiceUploadFailed {
        status: reqwest::StatusCode,
        body: String,
    },
}

/// Result type alias for the pipeline.
pub type Result<T> = std::result::Result<T, Error>;
