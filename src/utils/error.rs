use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Notification error: {0}")]
    Sink(#[from] SinkError),

    #[error("State store error: {key}: {message}")]
    Store { key: String, message: String },

    #[error("Plugin error: {plugin_type}: {message}")]
    Plugin { plugin_type: String, message: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {resource}")]
    NotFound { resource: String },
}

/// Failure of a page retrieval. All variants are recoverable: the pair is
/// skipped for the current tick and its state stays untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("request blocked (HTTP 403) and no proxy candidate succeeded")]
    Blocked,

    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,
}

impl FetchError {
    pub(crate) fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    #[error("{sink} delivery failed: {message}")]
    Delivery { sink: String, message: String },

    #[error("{sink} is misconfigured: {message}")]
    Config { sink: String, message: String },
}

impl SinkError {
    pub fn delivery(sink: &str, message: impl ToString) -> Self {
        SinkError::Delivery {
            sink: sink.to_string(),
            message: message.to_string(),
        }
    }

    pub fn config(sink: &str, message: impl ToString) -> Self {
        SinkError::Config {
            sink: sink.to_string(),
            message: message.to_string(),
        }
    }
}

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;
