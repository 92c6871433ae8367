use thiserror::Error;

pub type Result<T> = std::result::Result<T, RaygunError>;

/// Boxed error returned by user callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum RaygunError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Failed to load settings from {path}: {source}")]
    SettingsLoad {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Grouping key callback failed: {source}")]
    GroupingKey {
        #[source]
        source: BoxError,
    },

    #[error("Variable capture failed: {message}")]
    Capture { message: String },
}

impl RaygunError {
    pub fn capture(message: impl Into<String>) -> Self {
        RaygunError::Capture {
            message: message.into(),
        }
    }
}
