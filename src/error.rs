use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdcrewError {
    #[error("Malformed task input: {0}")]
    MalformedInput(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Worker pool error: {0}")]
    WorkerPool(String),
}

/// Why a single task execution failed.
///
/// Contained at the dispatcher: recorded in the task's outcome and never
/// propagated to the rest of the user's task list.
#[derive(Debug, Error)]
pub enum ExecutionFailure {
    #[error("missing shared resource: {0}")]
    MissingResource(&'static str),

    #[error("image generation failed: {0}")]
    Generation(String),

    #[error("vision analysis failed: {0}")]
    Vision(String),

    #[error("copy generation failed: {0}")]
    Copy(String),

    #[error("upload failed: {0}")]
    Upload(String),

    #[error("image store error: {0}")]
    Store(String),

    #[error("{service} rate limited, retry after {retry_after_ms}ms")]
    RateLimited {
        service: &'static str,
        retry_after_ms: u64,
    },

    #[error("ad publishing failed: {0}")]
    Publish(String),

    /// The launcher refused the ad or was never reachable as configured.
    #[error("ad publishing rejected: {0}")]
    PublishRejected(String),

    /// The request may have reached the launcher but no ad id came back.
    #[error("ad publishing unconfirmed: {0}")]
    PublishUnconfirmed(String),

    #[error("timed out after {0}ms")]
    Timeout(u64),

    #[error("{operation} gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        last: Box<ExecutionFailure>,
    },

    #[error("{0}")]
    Other(String),
}

impl ExecutionFailure {
    /// Whether another attempt could succeed.
    pub fn is_transient(&self) -> bool {
        !matches!(
            self,
            Self::MissingResource(_)
                | Self::PublishRejected(_)
                | Self::PublishUnconfirmed(_)
                | Self::RetriesExhausted { .. }
        )
    }

    /// Minimum wait the service asked for before the next attempt.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after_ms, .. } => Some(*retry_after_ms),
            _ => None,
        }
    }
}
