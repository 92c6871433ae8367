//! # raygun-provider
//!
//! Sends error reports to the Raygun collection endpoint.
//!
//! ```no_run
//! use raygun_provider::{ConfigOptions, RaygunSender, SendOptions};
//!
//! let sender = RaygunSender::new(
//!     Some("your-api-key".to_string()),
//!     ConfigOptions::new().with_filtered_keys(["password"]),
//! );
//!
//! if let Err(e) = "12x".parse::<i32>() {
//!     let outcome = sender.send_exception(&e, SendOptions::new().with_tags(["startup"]));
//!     println!("{:?}", outcome);
//! }
//! ```

pub mod error;
pub mod sender;
pub mod transform;
pub mod transport;

pub use error::TransportError;
pub use raygun_core::{ConfigOptions, Endpoint, HttpRequest, RaygunError, StackTrace, UserContext};
pub use sender::{RaygunSender, SendOptions, SendOutcome};
pub use transport::{HttpTransport, SendResponse, Transport, TransportSettings};
