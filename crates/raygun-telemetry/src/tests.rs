//! Reporting layer tests against an in-memory transport

use crate::{
    config::{LogLevel, TelemetryConfig},
    layer::{RaygunLayer, LOGGER_MESSAGE_KEY},
    system::TelemetrySystem,
};
use raygun_core::message::ReportDocument;
use raygun_provider::{ConfigOptions, RaygunSender, SendResponse, Transport, TransportSettings};
use std::sync::{Arc, Mutex};
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

#[derive(Clone, Default)]
struct RecordingTransport {
    documents: Arc<Mutex<Vec<ReportDocument>>>,
}

impl RecordingTransport {
    fn reports(&self) -> Vec<ReportDocument> {
        self.documents.lock().unwrap().clone()
    }
}

impl Transport for RecordingTransport {
    fn post(&self, document: &ReportDocument, _settings: &TransportSettings) -> SendResponse {
        self.documents.lock().unwrap().push(document.clone());
        SendResponse::new(202, "")
    }
}

fn layer(options: ConfigOptions) -> (RaygunLayer, RecordingTransport) {
    let transport = RecordingTransport::default();
    let sender = RaygunSender::new(Some("layer-key".to_string()), options)
        .with_transport(transport.clone());
    (RaygunLayer::new(sender), transport)
}

#[test]
fn test_error_event_is_reported_with_logger_message() {
    let (layer, transport) = layer(ConfigOptions::new());
    let subscriber = Registry::default().with(layer);

    tracing::subscriber::with_default(subscriber, || {
        tracing::error!(target: "shop::checkout", order_id = 42, retry = true, "Payment provider rejected the charge");
    });

    let reports = transport.reports();
    assert_eq!(reports.len(), 1);

    let details = &reports[0].details;
    let data = details.user_custom_data.as_ref().unwrap();
    assert_eq!(data[LOGGER_MESSAGE_KEY], "Payment provider rejected the charge");
    assert_eq!(data["order_id"], 42);
    assert_eq!(data["retry"], true);

    let error = details.error.as_ref().unwrap();
    assert!(error.class_name.is_empty());
    assert!(error.message.is_empty());
}

#[test]
fn test_events_below_threshold_are_ignored() {
    let (layer, transport) = layer(ConfigOptions::new());
    let subscriber = Registry::default().with(layer);

    tracing::subscriber::with_default(subscriber, || {
        tracing::warn!(target: "shop::checkout", "Slow payment provider");
        tracing::info!(target: "shop::checkout", "Checkout started");
    });

    assert!(transport.reports().is_empty());
}

#[test]
fn test_threshold_can_be_lowered() {
    let (layer, transport) = layer(ConfigOptions::new());
    let subscriber = Registry::default().with(layer.with_threshold(Level::WARN));

    tracing::subscriber::with_default(subscriber, || {
        tracing::warn!(target: "shop::checkout", "Slow payment provider");
        tracing::info!(target: "shop::checkout", "Checkout started");
    });

    assert_eq!(transport.reports().len(), 1);
}

#[test]
fn test_client_events_are_not_reported() {
    let (layer, transport) = layer(ConfigOptions::new());
    let subscriber = Registry::default().with(layer);

    tracing::subscriber::with_default(subscriber, || {
        tracing::error!(target: "raygun_provider::transport", "Could not send report");
    });

    assert!(transport.reports().is_empty());
}

#[test]
fn test_layer_reports_pass_through_key_filter() {
    let (layer, transport) = layer(ConfigOptions::new().with_filtered_keys(["password"]));
    let subscriber = Registry::default().with(layer);

    tracing::subscriber::with_default(subscriber, || {
        tracing::error!(target: "shop::login", password = "hunter2", "Login failed");
    });

    let reports = transport.reports();
    let data = reports[0].details.user_custom_data.as_ref().unwrap();
    assert_eq!(data["password"], "<filtered>");
    assert_eq!(data[LOGGER_MESSAGE_KEY], "Login failed");
}

#[test]
fn test_system_subscriber_applies_report_level() {
    let (layer, transport) = layer(ConfigOptions::new());
    let mut config = TelemetryConfig::default();
    config.enabled = false;
    config.report_level = LogLevel::Warn;

    let subscriber = TelemetrySystem::subscriber(&config, Some(layer)).unwrap();
    tracing::subscriber::with_default(subscriber, || {
        tracing::warn!(target: "shop::checkout", "Slow payment provider");
        tracing::debug!(target: "shop::checkout", "Cart loaded");
    });

    assert_eq!(transport.reports().len(), 1);
}
