use crate::error::{Result, TransportError};
use raygun_core::config::Proxy;
use raygun_core::message::ReportDocument;
use reqwest::blocking::{Client, ClientBuilder};
use reqwest::header;
use std::thread;
use std::time::Duration;
use tracing::{debug, error};

/// Status reported when a report could not be delivered.
pub const FALLBACK_STATUS: u16 = 400;

/// Body reported when a report could not be delivered.
pub const FALLBACK_BODY: &str = "Exception: Could not send";

const USER_AGENT: &str = concat!("raygun4rs/", env!("CARGO_PKG_VERSION"));

/// Outcome of one POST: the endpoint's status and body, or the fixed
/// fallback when the request never completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendResponse {
    pub status_code: u16,
    pub body: String,
}

impl SendResponse {
    pub fn new(status_code: u16, body: impl Into<String>) -> Self {
        Self {
            status_code,
            body: body.into(),
        }
    }

    pub fn could_not_send() -> Self {
        Self::new(FALLBACK_STATUS, FALLBACK_BODY)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// Per-request HTTP settings resolved from the sender configuration.
#[derive(Debug, Clone)]
pub struct TransportSettings {
    pub url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub proxy: Option<Proxy>,
}

/// Delivers a finished report. Implementations must not panic or return
/// errors; every failure becomes [`SendResponse::could_not_send`].
#[cfg_attr(test, mockall::automock)]
pub trait Transport: Send + Sync {
    fn post(&self, document: &ReportDocument, settings: &TransportSettings) -> SendResponse;
}

/// Blocking HTTPS transport. A client is built per request; nothing is
/// pooled between sends.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpTransport;

impl HttpTransport {
    pub fn new() -> Self {
        Self
    }

    /// Whether this build can reach HTTPS endpoints.
    pub fn tls_available() -> bool {
        cfg!(feature = "rustls-tls")
    }

    fn client_builder() -> ClientBuilder {
        let builder = Client::builder();
        #[cfg(feature = "rustls-tls")]
        let builder = builder.use_rustls_tls();
        builder
    }

    fn build_client(settings: &TransportSettings) -> Result<Client> {
        let mut headers = header::HeaderMap::new();
        if let Some(api_key) = &settings.api_key {
            headers.insert(
                header::HeaderName::from_static("x-apikey"),
                header::HeaderValue::from_str(api_key).map_err(|_| {
                    TransportError::InvalidHeader {
                        header: "X-ApiKey".to_string(),
                    }
                })?,
            );
        }
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_static(USER_AGENT),
        );

        let mut builder = Self::client_builder()
            .timeout(settings.timeout)
            .default_headers(headers);

        if let Some(proxy) = &settings.proxy {
            let proxy = reqwest::Proxy::all(proxy.url()).map_err(|e| TransportError::Http {
                operation: "configure_proxy".to_string(),
                source: e,
            })?;
            builder = builder.proxy(proxy);
        }

        builder.build().map_err(|e| TransportError::Http {
            operation: "build_client".to_string(),
            source: e,
        })
    }

    fn try_post(
        &self,
        document: &ReportDocument,
        settings: &TransportSettings,
    ) -> Result<SendResponse> {
        let body = serde_json::to_string(document)?;
        let client = Self::build_client(settings)?;

        debug!(url = %settings.url, bytes = body.len(), "Posting report");

        let response = client
            .post(&settings.url)
            .body(body)
            .send()
            .map_err(|e| TransportError::Http {
                operation: "post_report".to_string(),
                source: e,
            })?;

        let status_code = response.status().as_u16();
        let body = response.text().map_err(|e| TransportError::Http {
            operation: "read_response_text".to_string(),
            source: e,
        })?;

        debug!(status = status_code, "Report endpoint responded");
        Ok(SendResponse { status_code, body })
    }
}

impl Transport for HttpTransport {
    fn post(&self, document: &ReportDocument, settings: &TransportSettings) -> SendResponse {
        // The blocking client owns a runtime and must not be built or
        // dropped on a thread that is driving one.
        let result = if tokio::runtime::Handle::try_current().is_ok() {
            debug!("Async runtime detected, posting from a worker thread");
            thread::scope(|scope| {
                scope
                    .spawn(|| self.try_post(document, settings))
                    .join()
                    .unwrap_or(Err(TransportError::WorkerPanicked))
            })
        } else {
            self.try_post(document, settings)
        };

        match result {
            Ok(response) => response,
            Err(e) => {
                error!(
                    error = %e,
                    timeout = e.is_timeout(),
                    connect = e.is_connect(),
                    "Could not send report"
                );
                SendResponse::could_not_send()
            }
        }
    }
}
