use thiserror::Error;

pub type Result<T> = std::result::Result<T, TransportError>;

/// Failures inside the transport. These never leave [`crate::Transport::post`];
/// they are logged and folded into the fixed fallback response.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP error during {operation}: {source}")]
    Http {
        operation: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid header value for {header}")]
    InvalidHeader { header: String },

    #[error("Transport worker thread panicked")]
    WorkerPanicked,
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Http { source, .. } if source.is_timeout())
    }

    pub fn is_connect(&self) -> bool {
        matches!(self, TransportError::Http { source, .. } if source.is_connect())
    }
}
