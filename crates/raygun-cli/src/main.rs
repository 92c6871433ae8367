use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use raygun_core::Settings;
use raygun_provider::{RaygunSender, SendOptions, SendOutcome};
use raygun_telemetry::{LogFormat, LogLevel, TelemetryConfig, TelemetrySystem};
use serde_json::{Map, Value};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(
    after_help = "SETTINGS:\n  The API key and sender options are read from the settings file\n  (--config, or the platform config directory) and RAYGUN_* environment\n  variables. A .env file in the working directory is loaded first."
)]
struct Cli {
    /// Settings file path
    #[arg(long, global = true, help = "Path to settings file")]
    config: Option<PathBuf>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(long, global = true, help = "Set log level")]
    log_level: Option<LogLevel>,

    /// Set log format (json, pretty, compact)
    #[arg(long, global = true, help = "Set log output format")]
    log_format: Option<LogFormat>,

    /// Telemetry configuration file
    #[arg(long, global = true, help = "Path to telemetry configuration file")]
    telemetry_config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Send a canned test error to verify an API key
    Test {
        /// Application API key
        api_key: String,
    },

    /// Send a report with a custom message
    Send {
        /// Report message
        #[arg(short, long)]
        message: String,

        /// API key; overrides the settings file
        #[arg(long)]
        api_key: Option<String>,

        /// Tag to attach; repeatable
        #[arg(short, long = "tag")]
        tags: Vec<String>,

        /// Custom data entry as key=value; repeatable. Values that parse as
        /// JSON are sent as JSON.
        #[arg(short, long = "data", value_parser = parse_key_value)]
        data: Vec<(String, Value)>,

        /// Application version reported with the error
        #[arg(long)]
        app_version: Option<String>,
    },
}

/// Error sent by `raygun test`.
#[derive(Error, Debug)]
#[error("Raygun4rs manual sending test")]
struct ManualSendingTest;

/// Error sent by `raygun send`.
#[derive(Error, Debug)]
#[error("{0}")]
struct ManualReport(String);

/// Parse a `key=value` pair; the value is JSON when it parses as JSON.
fn parse_key_value(raw: &str) -> std::result::Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))?;

    if key.is_empty() {
        return Err(format!("empty key in '{}'", raw));
    }

    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

/// Create telemetry configuration from CLI arguments
fn create_telemetry_config(cli: &Cli) -> Result<TelemetryConfig> {
    let mut config = match &cli.telemetry_config {
        Some(path) => TelemetryConfig::load(Some(path))?,
        None => {
            let mut config = TelemetryConfig::default();
            config.load_env_overrides();
            config
        }
    };

    if let Some(level) = cli.log_level {
        config.level = level;
    }
    if let Some(format) = cli.log_format {
        config.format = format;
    }

    Ok(config)
}

fn report(outcome: SendOutcome) -> Result<()> {
    match outcome {
        SendOutcome::Sent(response) => {
            println!("{} {}", response.status_code, response.body);
            if !response.is_success() {
                anyhow::bail!("Raygun responded with status {}", response.status_code);
            }
            Ok(())
        }
        SendOutcome::Suppressed => {
            println!("Report suppressed by the configured filters");
            Ok(())
        }
    }
}

fn run_test(settings: Settings, api_key: String) -> Result<()> {
    info!("Sending test report");
    let sender = RaygunSender::new(Some(api_key), settings.options);
    let outcome = sender
        .send_exception(&ManualSendingTest, SendOptions::new().with_current_stack())
        .context("Failed to send test report")?;
    report(outcome)
}

fn run_send(
    settings: Settings,
    message: String,
    api_key: Option<String>,
    tags: Vec<String>,
    data: Vec<(String, Value)>,
    app_version: Option<String>,
) -> Result<()> {
    let api_key = api_key.or(settings.api_key);
    if api_key.is_none() {
        warn!("No API key given on the command line or in settings");
    }

    let mut sender = RaygunSender::new(api_key, settings.options);
    if let Some(version) = app_version {
        sender.set_version(version);
    }

    let mut options = SendOptions::new().with_current_stack();
    if !tags.is_empty() {
        options = options.with_tags(tags);
    }
    if !data.is_empty() {
        options = options.with_custom_data(data.into_iter().collect::<Map<_, _>>());
    }

    info!(message = %message, "Sending manual report");
    let outcome = sender
        .send_exception(&ManualReport(message), options)
        .context("Failed to send report")?;
    report(outcome)
}

fn main() -> Result<()> {
    // Load environment variables before parsing configuration
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let telemetry_config = create_telemetry_config(&cli)?;
    let _telemetry_guard = TelemetrySystem::init(telemetry_config, None)
        .map_err(|e| anyhow::anyhow!("Telemetry initialization failed: {}", e))?;

    let settings = Settings::load(cli.config.as_deref()).context("Failed to load settings")?;

    match cli.command {
        Command::Test { api_key } => run_test(settings, api_key),
        Command::Send {
            message,
            api_key,
            tags,
            data,
            app_version,
        } => run_send(settings, message, api_key, tags, data, app_version),
    }
}
