use crate::transform;
use crate::transport::{HttpTransport, SendResponse, Transport, TransportSettings};
use raygun_core::config::{ConfigOptions, Endpoint, Proxy, SenderConfig};
use raygun_core::environment::{self, EnvironmentMessage};
use raygun_core::exception::{ExceptionNormalizer, NoVariableCapture, StackTrace, VariableCapture};
use raygun_core::message::{
    HttpRequest, ReportBuilder, ReportDetails, ReportDocument, UserContext,
};
use raygun_core::{BoxError, ErrorMessage, Result};
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt;
use tracing::{debug, warn};

/// Per-send extras attached to a report.
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    pub tags: Option<Vec<String>>,
    pub user_custom_data: Option<Map<String, Value>>,
    pub http_request: Option<HttpRequest>,
    pub stack_trace: Option<StackTrace>,
}

impl SendOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_custom_data(mut self, data: Map<String, Value>) -> Self {
        self.user_custom_data = Some(data);
        self
    }

    pub fn with_custom_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.user_custom_data
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn with_request(mut self, request: HttpRequest) -> Self {
        self.http_request = Some(request);
        self
    }

    pub fn with_stack_trace(mut self, stack_trace: StackTrace) -> Self {
        self.stack_trace = Some(stack_trace);
        self
    }

    /// Attach the caller's current stack.
    pub fn with_current_stack(self) -> Self {
        self.with_stack_trace(StackTrace::capture())
    }
}

/// What happened to a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The transport ran; this is its response, fallback included.
    Sent(SendResponse),
    /// An ignore rule or the before-send callback vetoed the report.
    Suppressed,
}

impl SendOutcome {
    pub fn response(&self) -> Option<&SendResponse> {
        match self {
            SendOutcome::Sent(response) => Some(response),
            SendOutcome::Suppressed => None,
        }
    }

    pub fn is_suppressed(&self) -> bool {
        matches!(self, SendOutcome::Suppressed)
    }
}

/// Builds, filters and transmits error reports.
///
/// Each sender owns its configuration. Setters take `&mut self`, so the
/// configuration cannot change while a send is running.
pub struct RaygunSender {
    api_key: Option<String>,
    config: SenderConfig,
    transport: Box<dyn Transport>,
    variable_capture: Box<dyn VariableCapture>,
}

impl fmt::Debug for RaygunSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RaygunSender")
            .field("api_key", &self.api_key.as_ref().map(|_| "<set>"))
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RaygunSender {
    /// Create a sender. Never fails; problems are reported as warnings.
    pub fn new(api_key: Option<String>, options: ConfigOptions) -> Self {
        let api_key = api_key.filter(|key| !key.trim().is_empty());
        if api_key.is_none() {
            warn!("RaygunSender: API key not set, errors will not be transmitted");
        }

        if !HttpTransport::tls_available() {
            warn!("RaygunSender: TLS client could not be initialised, sends will fail");
        }

        Self {
            api_key,
            config: SenderConfig::merged(options),
            transport: Box::new(HttpTransport::new()),
            variable_capture: Box::new(NoVariableCapture),
        }
    }

    pub fn with_transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Box::new(transport);
        self
    }

    pub fn with_variable_capture(mut self, capture: impl VariableCapture + 'static) -> Self {
        self.variable_capture = Box::new(capture);
        self
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    pub fn config(&self) -> &SenderConfig {
        &self.config
    }

    pub fn set_version(&mut self, version: impl Into<String>) {
        self.config.userversion = version.into();
    }

    pub fn set_user(&mut self, user: impl Into<UserContext>) {
        self.config.user = Some(user.into());
    }

    pub fn ignore_exceptions(&mut self, exceptions: Vec<String>) {
        self.config.ignored_exceptions = exceptions;
    }

    pub fn filter_keys(&mut self, keys: Vec<String>) {
        self.config.filtered_keys = keys;
    }

    pub fn set_proxy(&mut self, host: impl Into<String>, port: u16) {
        self.config.proxy = Some(Proxy {
            host: host.into(),
            port,
        });
    }

    pub fn set_endpoint(&mut self, endpoint: Endpoint) {
        self.config.endpoint = endpoint;
    }

    pub fn on_before_send<F>(&mut self, callback: F)
    where
        F: Fn(ReportDetails) -> Option<ReportDetails> + Send + Sync + 'static,
    {
        self.config.before_send_callback = Some(std::sync::Arc::new(callback));
    }

    pub fn on_grouping_key<F>(&mut self, callback: F)
    where
        F: Fn(&ReportDocument) -> std::result::Result<String, BoxError> + Send + Sync + 'static,
    {
        self.config.grouping_key_callback = Some(std::sync::Arc::new(callback));
    }

    /// Set an option from a loosely typed value; see [`SenderConfig::apply_json`].
    pub fn set_option_json(&mut self, key: &str, value: &Value) -> bool {
        self.config.apply_json(key, value)
    }

    /// Report a concrete error, named after its Rust type.
    pub fn send_exception<E>(&self, error: &E, options: SendOptions) -> Result<SendOutcome>
    where
        E: Error + 'static,
    {
        let normalized = self
            .normalizer()
            .normalize_typed(error, options.stack_trace.as_ref());
        self.dispatch(normalized, options)
    }

    /// Report an error trait object, or a bare report when `error` is `None`.
    ///
    /// A trait object carries no type name, so the class name comes from the
    /// leading identifier of its `Debug` output. For an enum that is the
    /// variant (`Io`), not the enum (`StoreError`), and `ignored_exceptions`
    /// entries must name it that way. Use [`RaygunSender::send_exception`]
    /// when the concrete type is known.
    pub fn send(
        &self,
        error: Option<&(dyn Error + 'static)>,
        options: SendOptions,
    ) -> Result<SendOutcome> {
        let normalized = self
            .normalizer()
            .normalize_optional(error, options.stack_trace.as_ref());
        self.dispatch(normalized, options)
    }

    fn normalizer(&self) -> ExceptionNormalizer<'_> {
        ExceptionNormalizer::new(self.config.capture_options(), self.variable_capture.as_ref())
    }

    fn dispatch(&self, error: ErrorMessage, options: SendOptions) -> Result<SendOutcome> {
        let document = self.create_message(error, options);

        let Some(document) = transform::apply(&self.config, document)? else {
            return Ok(SendOutcome::Suppressed);
        };

        debug!(
            class_name = document
                .details
                .error
                .as_ref()
                .map(|error| error.class_name.as_str())
                .unwrap_or_default(),
            "Dispatching report"
        );

        let response = self.transport.post(&document, &self.transport_settings());
        Ok(SendOutcome::Sent(response))
    }

    fn create_message(&self, error: ErrorMessage, options: SendOptions) -> ReportDocument {
        ReportBuilder::new()
            .set_machine_name(environment::machine_name())
            .set_version(self.config.userversion.as_str())
            .set_client_details()
            .set_exception_details(error)
            .set_environment_details(EnvironmentMessage::capture())
            .set_tags(options.tags)
            .set_custom_data(options.user_custom_data)
            .set_request_details(options.http_request.as_ref())
            .set_user(self.config.user.clone())
            .build()
    }

    fn transport_settings(&self) -> TransportSettings {
        TransportSettings {
            url: self.config.endpoint.url(),
            api_key: self.api_key.clone(),
            timeout: self.config.timeout(),
            proxy: self.config.proxy.clone(),
        }
    }
}
