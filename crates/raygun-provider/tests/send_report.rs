//! End-to-end sends against a local HTTP endpoint.

use anyhow::Result;
use mockito::{Matcher, Server};
use raygun_core::exception::{RawFrame, Variables, VariableCapture};
use raygun_core::message::{ReportDocument, UserInfo};
use raygun_provider::{
    ConfigOptions, Endpoint, HttpRequest, RaygunSender, SendOptions, SendOutcome, SendResponse,
    StackTrace, Transport, TransportSettings,
};
use serde_json::json;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Error, Debug)]
#[error("checkout failed")]
struct CheckoutFailed {
    #[source]
    source: std::io::Error,
}

fn checkout_failed() -> CheckoutFailed {
    CheckoutFailed {
        source: std::io::Error::new(std::io::ErrorKind::ConnectionReset, "connection reset"),
    }
}

fn endpoint_for(server: &Server) -> Endpoint {
    let host = server.host_with_port();
    Endpoint {
        protocol: "http://".to_string(),
        host,
        path: "/entries".to_string(),
    }
}

fn sender_for(server: &Server, options: ConfigOptions) -> RaygunSender {
    RaygunSender::new(
        Some("integration-key".to_string()),
        options.with_endpoint(endpoint_for(server)),
    )
}

#[derive(Clone, Default)]
struct RecordingTransport {
    documents: Arc<Mutex<Vec<ReportDocument>>>,
}

impl Transport for RecordingTransport {
    fn post(&self, document: &ReportDocument, _settings: &TransportSettings) -> SendResponse {
        self.documents.lock().unwrap().push(document.clone());
        SendResponse::new(202, "")
    }
}

struct EveryFrameCapture;

impl VariableCapture for EveryFrameCapture {
    fn locals(&self, frame: &RawFrame) -> raygun_core::Result<Variables> {
        Ok(Variables::from([(
            "frame".to_string(),
            frame.function.clone(),
        )]))
    }
}

#[test]
fn test_report_reaches_endpoint_with_api_key() -> Result<()> {
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/entries")
        .match_header("x-apikey", "integration-key")
        .match_body(Matcher::PartialJson(json!({
            "details": {
                "error": {
                    "className": "CheckoutFailed",
                    "message": "checkout failed",
                    "innerError": {"message": "connection reset"}
                },
                "client": {"name": "raygun4rs"},
                "tags": ["checkout"]
            }
        })))
        .with_status(202)
        .create();

    let sender = sender_for(&server, ConfigOptions::new());
    let outcome = sender.send_exception(&checkout_failed(), SendOptions::new().with_tags(["checkout"]))?;

    mock.assert();
    assert_eq!(outcome, SendOutcome::Sent(SendResponse::new(202, "")));
    Ok(())
}

#[test]
fn test_filtered_keys_are_redacted_on_the_wire() -> Result<()> {
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/entries")
        .match_body(Matcher::PartialJson(json!({
            "details": {
                "userCustomData": {"password": "<filtered>", "username": "ada"},
                "request": {
                    "headers": {"Authorization": "<filtered>", "Accept": "text/html"}
                }
            }
        })))
        .with_status(202)
        .create();

    let sender = sender_for(
        &server,
        ConfigOptions::new().with_filtered_keys(["password", "request.headers.Authorization"]),
    );
    let request = HttpRequest::new()
        .with_url("/checkout")
        .with_header("Authorization", "Bearer abc")
        .with_header("Accept", "text/html");

    sender.send(
        None,
        SendOptions::new()
            .with_custom_value("password", "hunter2")
            .with_custom_value("username", "ada")
            .with_request(request),
    )?;

    mock.assert();
    Ok(())
}

#[test]
fn test_filtered_user_and_request_fields_are_redacted_on_the_wire() -> Result<()> {
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/entries")
        .match_body(Matcher::PartialJson(json!({
            "details": {
                "user": {"identifier": "user-17", "email": "<filtered>"},
                "request": {
                    "url": "/checkout",
                    "ipAddress": "<filtered>",
                    "rawData": "<filtered>"
                }
            }
        })))
        .with_status(202)
        .create();

    let mut sender = sender_for(
        &server,
        ConfigOptions::new().with_filtered_keys([
            "user.email",
            "request.ipAddress",
            "request.rawData",
        ]),
    );
    sender.set_user(UserInfo {
        identifier: Some("user-17".to_string()),
        email: Some("ada@example.com".to_string()),
        ..Default::default()
    });
    let request = HttpRequest::new()
        .with_url("/checkout")
        .with_ip_address("10.0.0.7")
        .with_raw_data("card=4111");

    sender.send(None, SendOptions::new().with_request(request))?;

    mock.assert();
    Ok(())
}

#[test]
fn test_before_send_changes_are_transmitted() -> Result<()> {
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/entries")
        .match_body(Matcher::PartialJson(json!({
            "details": {"tags": ["rewritten"], "groupingKey": "checkout-group"}
        })))
        .with_status(202)
        .create();

    let mut sender = sender_for(&server, ConfigOptions::new());
    sender.on_grouping_key(|_| Ok("checkout-group".to_string()));
    sender.on_before_send(|mut details| {
        details.tags = Some(vec!["rewritten".to_string()]);
        Some(details)
    });

    sender.send_exception(&checkout_failed(), SendOptions::new().with_tags(["original"]))?;

    mock.assert();
    Ok(())
}

#[test]
fn test_suppressed_report_sends_nothing() -> Result<()> {
    let mut server = Server::new();
    let mock = server.mock("POST", "/entries").expect(0).create();

    let sender = sender_for(
        &server,
        ConfigOptions::new().with_ignored_exceptions(["CheckoutFailed"]),
    );
    let outcome = sender.send_exception(&checkout_failed(), SendOptions::new())?;

    mock.assert();
    assert!(outcome.is_suppressed());
    Ok(())
}

#[test]
fn test_rejected_key_returns_endpoint_status() -> Result<()> {
    let mut server = Server::new();
    let _mock = server
        .mock("POST", "/entries")
        .with_status(403)
        .with_body("Invalid API Key")
        .create();

    let sender = sender_for(&server, ConfigOptions::new());
    let outcome = sender.send(None, SendOptions::new())?;

    assert_eq!(outcome.response(), Some(&SendResponse::new(403, "Invalid API Key")));
    Ok(())
}

#[test]
fn test_unreachable_endpoint_returns_fallback() -> Result<()> {
    let sender = RaygunSender::new(
        Some("integration-key".to_string()),
        ConfigOptions::new()
            .with_http_timeout(2.0)
            .with_endpoint(Endpoint {
                protocol: "http://".to_string(),
                host: "127.0.0.1:1".to_string(),
                path: "/entries".to_string(),
            }),
    );

    let outcome = sender.send(None, SendOptions::new())?;
    assert_eq!(outcome, SendOutcome::Sent(SendResponse::could_not_send()));
    Ok(())
}

#[test]
fn test_local_variables_follow_transmit_flag() -> Result<()> {
    let stack = StackTrace::from_frames(vec![
        RawFrame::new("shop::cart::Cart::total").at("src/cart.rs", 40),
        RawFrame::new("shop::main").at("src/main.rs", 7),
    ]);

    let enabled = RecordingTransport::default();
    RaygunSender::new(Some("key".to_string()), ConfigOptions::new())
        .with_transport(enabled.clone())
        .with_variable_capture(EveryFrameCapture)
        .send_exception(&checkout_failed(), SendOptions::new().with_stack_trace(stack.clone()))?;

    let disabled = RecordingTransport::default();
    RaygunSender::new(
        Some("key".to_string()),
        ConfigOptions::new().with_transmit_local_variables(false),
    )
    .with_transport(disabled.clone())
    .with_variable_capture(EveryFrameCapture)
    .send_exception(&checkout_failed(), SendOptions::new().with_stack_trace(stack))?;

    let documents = enabled.documents.lock().unwrap();
    let frames = &documents[0].details.error.as_ref().unwrap().stack_trace;
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].class_name, "shop::cart::Cart");
    assert_eq!(frames[0].method_name, "total");
    assert_eq!(frames[0].line_number, Some(40));
    assert!(frames.iter().all(|frame| frame.local_variables.is_some()));

    let documents = disabled.documents.lock().unwrap();
    let body = serde_json::to_string(&documents[0])?;
    assert!(!body.contains("localVariables"));
    Ok(())
}

#[test]
fn test_senders_do_not_share_configuration() {
    let mut first = RaygunSender::new(Some("a".to_string()), ConfigOptions::new());
    let second = RaygunSender::new(Some("b".to_string()), ConfigOptions::new());

    first.filter_keys(vec!["password".to_string()]);
    first.set_version("2.0.0");

    assert!(second.config().filtered_keys.is_empty());
    assert_eq!(second.config().userversion, "Not defined");
}
