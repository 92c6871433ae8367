//! # raygun-telemetry
//!
//! Logging setup for raygun4rs applications, plus [`RaygunLayer`], which
//! turns error-level `tracing` events into Raygun reports.
//!
//! ## Quick Start
//!
//! ```no_run
//! use raygun_provider::{ConfigOptions, RaygunSender};
//! use raygun_telemetry::{RaygunLayer, TelemetryConfig, TelemetrySystem};
//!
//! fn main() -> raygun_telemetry::Result<()> {
//!     let sender = RaygunSender::new(Some("your-api-key".to_string()), ConfigOptions::new());
//!     let _guard = TelemetrySystem::init(TelemetryConfig::default(), Some(RaygunLayer::new(sender)))?;
//!
//!     tracing::error!(order_id = 42, "Payment provider rejected the charge");
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod filters;
pub mod layer;
pub mod system;

#[cfg(test)]
mod tests;

pub use config::{LogFormat, LogLevel, TelemetryConfig};
pub use layer::{RaygunLayer, LOGGER_MESSAGE_KEY};
pub use system::{TelemetryGuard, TelemetrySystem};

/// Result type for telemetry operations
pub type Result<T> = std::result::Result<T, Error>;

/// Telemetry-specific errors
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Telemetry system error: {message}")]
    System { message: String },
}
