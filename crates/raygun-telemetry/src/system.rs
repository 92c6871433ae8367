//! Subscriber assembly and global installation

use crate::{
    config::{LogFormat, TelemetryConfig},
    layer::RaygunLayer,
    Error, Result,
};
use tracing::{Level, Subscriber};
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Builds and installs the process-wide subscriber.
pub struct TelemetrySystem;

/// Returned by [`TelemetrySystem::init`]; logs shutdown when dropped.
pub struct TelemetryGuard {
    _private: (),
}

impl TelemetrySystem {
    /// Install the global subscriber: console output filtered by the
    /// configured level (`RUST_LOG` takes precedence) plus the optional
    /// reporting layer, which applies its own threshold.
    pub fn init(config: TelemetryConfig, reporter: Option<RaygunLayer>) -> Result<TelemetryGuard> {
        let reporting = reporter.is_some();

        Self::subscriber(&config, reporter)?
            .try_init()
            .map_err(|e| Error::System {
                message: format!("Failed to initialize tracing subscriber: {}", e),
            })?;

        tracing::info!(
            telemetry.event = "system_initialized",
            telemetry.version = env!("CARGO_PKG_VERSION"),
            reporting,
            "Telemetry system initialized"
        );

        Ok(TelemetryGuard { _private: () })
    }

    /// Build the subscriber without installing it.
    pub fn subscriber(
        config: &TelemetryConfig,
        reporter: Option<RaygunLayer>,
    ) -> Result<impl Subscriber + Send + Sync + 'static> {
        config.validate()?;

        let mut layers: Vec<BoxedLayer> = Vec::new();
        if let Some(console) = Self::build_console_layer(config)? {
            layers.push(console);
        }
        if let Some(reporter) = reporter {
            let threshold: Level = config.report_level.into();
            layers.push(reporter.with_threshold(threshold).boxed());
        }

        Ok(Registry::default().with(layers))
    }

    /// Build environment filter for log level filtering
    fn build_env_filter(config: &TelemetryConfig) -> Result<EnvFilter> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }

        let level: Level = config.level.into();
        let mut filter = EnvFilter::new(level.to_string());
        for directive in config.parsed_directives()? {
            filter = filter.add_directive(directive);
        }
        Ok(filter)
    }

    /// Build console logging layer
    fn build_console_layer(config: &TelemetryConfig) -> Result<Option<BoxedLayer>> {
        if !config.enabled {
            return Ok(None);
        }

        let filter = Self::build_env_filter(config)?;
        let layer = match config.format {
            LogFormat::Json => fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(false)
                .with_target(true)
                .with_file(config.include_location)
                .with_line_number(config.include_location)
                .with_writer(std::io::stderr)
                .with_filter(filter)
                .boxed(),
            LogFormat::Pretty => fmt::layer()
                .pretty()
                .with_target(true)
                .with_file(config.include_location)
                .with_line_number(config.include_location)
                .with_writer(std::io::stderr)
                .with_filter(filter)
                .boxed(),
            LogFormat::Compact => fmt::layer()
                .compact()
                .with_target(false)
                .with_file(config.include_location)
                .with_line_number(config.include_location)
                .with_writer(std::io::stderr)
                .with_filter(filter)
                .boxed(),
        };

        Ok(Some(layer))
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(
            telemetry.event = "system_shutdown",
            "Telemetry system shutting down"
        );
    }
}
