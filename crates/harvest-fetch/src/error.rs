use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("transport error for {url}: {message}")]
    Transport { url: String, message: String },
    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("model file not found: {0}; set a model base URL or place it there manually")]
    ModelMissing(String),
    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

impl FetchError {
    /// Map a reqwest failure onto the taxonomy.
    pub fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(url.to_string())
        } else if err.is_builder() {
            Self::InvalidUrl(url.to_string())
        } else if let Some(status) = err.status() {
            Self::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }
        } else {
            Self::Transport {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }

    /// Transient failures: timeouts, connection problems, 5xx, 408 and 429.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Transport { .. } => true,
            Self::Status { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            Self::InvalidUrl(_) | Self::Io { .. } | Self::ModelMissing(_) | Self::Client(_) => {
                false
            }
        }
    }
}
