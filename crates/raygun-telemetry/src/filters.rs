//! Event filters for the reporting layer

use tracing::{Level, Metadata};

/// Target prefix shared by every raygun4rs crate.
const CLIENT_TARGET_PREFIX: &str = "raygun";

/// Whether an event was emitted by the client itself.
pub fn is_client_target(target: &str) -> bool {
    target.starts_with(CLIENT_TARGET_PREFIX)
}

/// Whether an event is severe enough to report and did not come from the
/// client.
pub fn should_report(metadata: &Metadata<'_>, threshold: Level) -> bool {
    metadata.is_event() && *metadata.level() <= threshold && !is_client_target(metadata.target())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_targets() {
        assert!(is_client_target("raygun_provider::transport"));
        assert!(is_client_target("raygun_telemetry::layer"));
        assert!(!is_client_target("shop::checkout"));
        assert!(!is_client_target("hyper"));
    }
}
