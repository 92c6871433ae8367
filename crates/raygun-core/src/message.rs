//! Report document model and the staged builder that assembles it.
//!
//! The JSON produced by serializing a [`ReportDocument`] is the wire format
//! accepted by the collection endpoint. Every field of [`ReportDetails`] is
//! optional and omitted from the output when its input was not supplied.

use crate::environment::EnvironmentMessage;
use crate::exception::ErrorMessage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Name reported in `details.client.name`.
pub const CLIENT_NAME: &str = "raygun4rs";

/// Version reported in `details.client.version`.
pub const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const CLIENT_URL: &str = "https://github.com/raygun4rs/raygun4rs";

/// A complete error report, ready for the transform pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportDocument {
    #[serde(rename = "occurredOn")]
    pub occurred_on: DateTime<Utc>,
    pub details: ReportDetails,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub machine_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub client: Option<ClientMessage>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorMessage>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<EnvironmentMessage>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_custom_data: Option<Map<String, Value>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<RequestMessage>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserContext>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub grouping_key: Option<String>,
}

/// Identifies this library to the collection endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientMessage {
    pub name: String,
    pub version: String,
    pub client_url: String,
}

impl Default for ClientMessage {
    fn default() -> Self {
        Self {
            name: CLIENT_NAME.to_string(),
            version: CLIENT_VERSION.to_string(),
            client_url: CLIENT_URL.to_string(),
        }
    }
}

/// HTTP request context as supplied by the caller.
///
/// Every field is optional; the builder copies only what is present.
#[derive(Debug, Clone, Default)]
pub struct HttpRequest {
    pub host_name: Option<String>,
    pub url: Option<String>,
    pub http_method: Option<String>,
    pub ip_address: Option<String>,
    /// Raw query string, with or without the leading `?`.
    pub query_string: Option<String>,
    pub headers: Vec<(String, String)>,
    pub form: Vec<(String, String)>,
    pub raw_data: Option<String>,
}

impl HttpRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host_name(mut self, host_name: impl Into<String>) -> Self {
        self.host_name = Some(host_name.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.http_method = Some(method.into());
        self
    }

    pub fn with_ip_address(mut self, ip_address: impl Into<String>) -> Self {
        self.ip_address = Some(ip_address.into());
        self
    }

    pub fn with_query_string(mut self, query: impl Into<String>) -> Self {
        self.query_string = Some(query.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_form_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.push((name.into(), value.into()));
        self
    }

    pub fn with_raw_data(mut self, raw_data: impl Into<String>) -> Self {
        self.raw_data = Some(raw_data.into());
        self
    }
}

/// Request context as it appears in the report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_method: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_string: Option<BTreeMap<String, String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub form: Option<BTreeMap<String, String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_data: Option<String>,
}

impl From<&HttpRequest> for RequestMessage {
    fn from(request: &HttpRequest) -> Self {
        let query_string = request
            .query_string
            .as_deref()
            .map(|query| query.trim_start_matches('?'))
            .filter(|query| !query.is_empty())
            .map(|query| {
                url::form_urlencoded::parse(query.as_bytes())
                    .into_owned()
                    .collect::<BTreeMap<_, _>>()
            });

        Self {
            host_name: request.host_name.clone(),
            url: request.url.clone(),
            http_method: request.http_method.clone(),
            ip_address: request.ip_address.clone(),
            query_string,
            headers: pairs_to_map(&request.headers),
            form: pairs_to_map(&request.form),
            raw_data: request.raw_data.clone(),
        }
    }
}

fn pairs_to_map(pairs: &[(String, String)]) -> Option<BTreeMap<String, String>> {
    if pairs.is_empty() {
        return None;
    }
    Some(pairs.iter().cloned().collect())
}

/// The user affected by an error.
///
/// A bare identifier serializes as a JSON string, the detailed form as an
/// object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserContext {
    Identifier(String),
    Details(UserInfo),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_anonymous: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
}

impl From<&str> for UserContext {
    fn from(identifier: &str) -> Self {
        UserContext::Identifier(identifier.to_string())
    }
}

impl From<String> for UserContext {
    fn from(identifier: String) -> Self {
        UserContext::Identifier(identifier)
    }
}

impl From<UserInfo> for UserContext {
    fn from(info: UserInfo) -> Self {
        UserContext::Details(info)
    }
}

/// Staged assembly of a [`ReportDocument`].
///
/// Each stage consumes the builder and hands back the next partially filled
/// value. Stages taking an `Option` leave the field absent on `None`.
#[derive(Debug, Clone)]
pub struct ReportBuilder {
    document: ReportDocument,
}

impl Default for ReportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportBuilder {
    /// Start a report stamped with the current time.
    pub fn new() -> Self {
        Self {
            document: ReportDocument {
                occurred_on: Utc::now(),
                details: ReportDetails::default(),
            },
        }
    }

    pub fn set_machine_name(mut self, name: Option<String>) -> Self {
        self.document.details.machine_name = name;
        self
    }

    pub fn set_version(mut self, version: impl Into<String>) -> Self {
        self.document.details.version = Some(version.into());
        self
    }

    pub fn set_client_details(mut self) -> Self {
        self.document.details.client = Some(ClientMessage::default());
        self
    }

    pub fn set_exception_details(mut self, error: ErrorMessage) -> Self {
        self.document.details.error = Some(error);
        self
    }

    pub fn set_environment_details(mut self, environment: EnvironmentMessage) -> Self {
        self.document.details.environment = Some(environment);
        self
    }

    pub fn set_tags(mut self, tags: Option<Vec<String>>) -> Self {
        self.document.details.tags = tags;
        self
    }

    pub fn set_custom_data(mut self, data: Option<Map<String, Value>>) -> Self {
        self.document.details.user_custom_data = data;
        self
    }

    pub fn set_request_details(mut self, request: Option<&HttpRequest>) -> Self {
        self.document.details.request = request.map(RequestMessage::from);
        self
    }

    pub fn set_user(mut self, user: Option<UserContext>) -> Self {
        self.document.details.user = user;
        self
    }

    pub fn build(self) -> ReportDocument {
        self.document
    }
}
