//! # raygun-core
//!
//! Report model, exception normalization and configuration shared by the
//! raygun4rs crates. The sender and transport live in `raygun-provider`.

pub mod config;
pub mod environment;
pub mod error;
pub mod exception;
pub mod message;
pub mod settings;

pub use config::{ConfigOptions, Endpoint, Proxy, SenderConfig};
pub use environment::EnvironmentMessage;
pub use error::{BoxError, RaygunError, Result};
pub use exception::{
    CaptureOptions, ErrorMessage, ExceptionNormalizer, NoVariableCapture, RawFrame, StackFrame,
    StackTrace, StaticGlobals, VariableCapture, Variables,
};
pub use message::{
    HttpRequest, ReportBuilder, ReportDetails, ReportDocument, RequestMessage, UserContext,
    UserInfo,
};
pub use settings::Settings;
