use crate::error::BoxError;
use crate::exception::CaptureOptions;
use crate::message::{ReportDetails, ReportDocument, UserContext};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_USER_VERSION: &str = "Not defined";
pub const DEFAULT_HTTP_TIMEOUT_SECS: f64 = 10.0;

/// Receives the report details before transmission. Returning `None` drops
/// the report.
pub type BeforeSendCallback = Arc<dyn Fn(ReportDetails) -> Option<ReportDetails> + Send + Sync>;

/// Computes `details.groupingKey`. An error aborts the send.
pub type GroupingKeyCallback =
    Arc<dyn Fn(&ReportDocument) -> Result<String, BoxError> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proxy {
    pub host: String,
    pub port: u16,
}

impl Proxy {
    pub fn url(&self) -> String {
        if self.host.contains("://") {
            format!("{}:{}", self.host, self.port)
        } else {
            format!("http://{}:{}", self.host, self.port)
        }
    }
}

/// Where reports are posted: `protocol + host + path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub protocol: String,
    pub host: String,
    pub path: String,
}

impl Default for Endpoint {
    fn default() -> Self {
        Self {
            protocol: "https://".to_string(),
            host: "api.raygun.io".to_string(),
            path: "/entries".to_string(),
        }
    }
}

impl Endpoint {
    pub fn url(&self) -> String {
        format!("{}{}{}", self.protocol, self.host, self.path)
    }
}

/// Resolved sender configuration.
///
/// `Default` returns a fresh value every time, so senders never share
/// mutable defaults.
#[derive(Clone)]
pub struct SenderConfig {
    pub before_send_callback: Option<BeforeSendCallback>,
    pub grouping_key_callback: Option<GroupingKeyCallback>,
    pub filtered_keys: Vec<String>,
    pub ignored_exceptions: Vec<String>,
    pub proxy: Option<Proxy>,
    pub transmit_global_variables: bool,
    pub transmit_local_variables: bool,
    pub userversion: String,
    pub user: Option<UserContext>,
    /// Seconds
    pub http_timeout: f64,
    pub endpoint: Endpoint,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            before_send_callback: None,
            grouping_key_callback: None,
            filtered_keys: Vec::new(),
            ignored_exceptions: Vec::new(),
            proxy: None,
            transmit_global_variables: true,
            transmit_local_variables: true,
            userversion: DEFAULT_USER_VERSION.to_string(),
            user: None,
            http_timeout: DEFAULT_HTTP_TIMEOUT_SECS,
            endpoint: Endpoint::default(),
        }
    }
}

impl fmt::Debug for SenderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SenderConfig")
            .field("before_send_callback", &self.before_send_callback.is_some())
            .field("grouping_key_callback", &self.grouping_key_callback.is_some())
            .field("filtered_keys", &self.filtered_keys)
            .field("ignored_exceptions", &self.ignored_exceptions)
            .field("proxy", &self.proxy)
            .field("transmit_global_variables", &self.transmit_global_variables)
            .field("transmit_local_variables", &self.transmit_local_variables)
            .field("userversion", &self.userversion)
            .field("user", &self.user)
            .field("http_timeout", &self.http_timeout)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl SenderConfig {
    /// Defaults with `options` laid over them field by field.
    pub fn merged(options: ConfigOptions) -> Self {
        let mut config = Self::default();
        config.apply(options);
        config
    }

    /// Overwrite every field that `options` sets; leave the rest alone.
    pub fn apply(&mut self, options: ConfigOptions) {
        if let Some(callback) = options.before_send_callback {
            self.before_send_callback = Some(callback);
        }
        if let Some(callback) = options.grouping_key_callback {
            self.grouping_key_callback = Some(callback);
        }
        if let Some(keys) = options.filtered_keys {
            self.filtered_keys = keys;
        }
        if let Some(exceptions) = options.ignored_exceptions {
            self.ignored_exceptions = exceptions;
        }
        if let Some(proxy) = options.proxy {
            self.proxy = Some(proxy);
        }
        if let Some(enabled) = options.transmit_global_variables {
            self.transmit_global_variables = enabled;
        }
        if let Some(enabled) = options.transmit_local_variables {
            self.transmit_local_variables = enabled;
        }
        if let Some(version) = options.userversion {
            self.userversion = version;
        }
        if let Some(user) = options.user {
            self.user = Some(user);
        }
        if let Some(timeout) = options.http_timeout {
            self.http_timeout = timeout;
        }
        if let Some(endpoint) = options.endpoint {
            self.endpoint = endpoint;
        }
    }

    /// Set one option from a loosely typed value. Returns `false`, leaving
    /// the configuration untouched, when the key is unknown or the value has
    /// the wrong shape.
    pub fn apply_json(&mut self, key: &str, value: &Value) -> bool {
        let mut options = ConfigOptions::default();
        if !options.set_json(key, value) {
            return false;
        }
        self.apply(options);
        true
    }

    pub fn capture_options(&self) -> CaptureOptions {
        CaptureOptions {
            transmit_local_variables: self.transmit_local_variables,
            transmit_global_variables: self.transmit_global_variables,
        }
    }

    /// The HTTP timeout, or the default when the configured value is not a
    /// usable number of seconds.
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.http_timeout)
            .unwrap_or_else(|_| Duration::from_secs_f64(DEFAULT_HTTP_TIMEOUT_SECS))
    }
}

/// Explicit overrides for [`SenderConfig`]. Unset fields keep their
/// defaults.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigOptions {
    #[serde(skip)]
    pub before_send_callback: Option<BeforeSendCallback>,
    #[serde(skip)]
    pub grouping_key_callback: Option<GroupingKeyCallback>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filtered_keys: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignored_exceptions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<Proxy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transmit_global_variables: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transmit_local_variables: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub userversion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserContext>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_timeout: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<Endpoint>,
}

impl fmt::Debug for ConfigOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigOptions")
            .field("before_send_callback", &self.before_send_callback.is_some())
            .field("grouping_key_callback", &self.grouping_key_callback.is_some())
            .field("filtered_keys", &self.filtered_keys)
            .field("ignored_exceptions", &self.ignored_exceptions)
            .field("proxy", &self.proxy)
            .field("transmit_global_variables", &self.transmit_global_variables)
            .field("transmit_local_variables", &self.transmit_local_variables)
            .field("userversion", &self.userversion)
            .field("user", &self.user)
            .field("http_timeout", &self.http_timeout)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl ConfigOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Best-effort conversion of a JSON object. Keys that are unknown or carry
    /// a value of the wrong shape are dropped without error.
    pub fn from_json(value: &Value) -> Self {
        let mut options = Self::default();
        if let Value::Object(map) = value {
            for (key, value) in map {
                options.set_json(key, value);
            }
        }
        options
    }

    fn set_json(&mut self, key: &str, value: &Value) -> bool {
        match key {
            "filtered_keys" => assign(&mut self.filtered_keys, value),
            "ignored_exceptions" => assign(&mut self.ignored_exceptions, value),
            "proxy" => assign(&mut self.proxy, value),
            "transmit_global_variables" => assign(&mut self.transmit_global_variables, value),
            "transmit_local_variables" => assign(&mut self.transmit_local_variables, value),
            "userversion" => assign(&mut self.userversion, value),
            "user" => assign(&mut self.user, value),
            "http_timeout" => assign(&mut self.http_timeout, value),
            "endpoint" => assign(&mut self.endpoint, value),
            _ => false,
        }
    }

    pub fn with_before_send<F>(mut self, callback: F) -> Self
    where
        F: Fn(ReportDetails) -> Option<ReportDetails> + Send + Sync + 'static,
    {
        self.before_send_callback = Some(Arc::new(callback));
        self
    }

    pub fn with_grouping_key<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ReportDocument) -> Result<String, BoxError> + Send + Sync + 'static,
    {
        self.grouping_key_callback = Some(Arc::new(callback));
        self
    }

    pub fn with_filtered_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filtered_keys = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_ignored_exceptions<I, S>(mut self, exceptions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored_exceptions = Some(exceptions.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_proxy(mut self, host: impl Into<String>, port: u16) -> Self {
        self.proxy = Some(Proxy {
            host: host.into(),
            port,
        });
        self
    }

    pub fn with_transmit_local_variables(mut self, enabled: bool) -> Self {
        self.transmit_local_variables = Some(enabled);
        self
    }

    pub fn with_transmit_global_variables(mut self, enabled: bool) -> Self {
        self.transmit_global_variables = Some(enabled);
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.userversion = Some(version.into());
        self
    }

    pub fn with_user(mut self, user: impl Into<UserContext>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_http_timeout(mut self, seconds: f64) -> Self {
        self.http_timeout = Some(seconds);
        self
    }

    pub fn with_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoint = Some(endpoint);
        self
    }
}

fn assign<T: DeserializeOwned>(slot: &mut Option<T>, value: &Value) -> bool {
    match serde_json::from_value(value.clone()) {
        Ok(parsed) => {
            *slot = Some(parsed);
            true
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let config = SenderConfig::default();
        assert!(config.before_send_callback.is_none());
        assert!(config.grouping_key_callback.is_none());
        assert!(config.filtered_keys.is_empty());
        assert!(config.ignored_exceptions.is_empty());
        assert!(config.proxy.is_none());
        assert!(config.transmit_global_variables);
        assert!(config.transmit_local_variables);
        assert_eq!(config.userversion, "Not defined");
        assert!(config.user.is_none());
        assert_eq!(config.http_timeout, 10.0);
        assert_eq!(config.endpoint.url(), "https://api.raygun.io/entries");
    }

    #[test]
    fn test_merge_overrides_only_given_fields() {
        let options = ConfigOptions::new()
            .with_version("2.0.0")
            .with_transmit_local_variables(false)
            .with_filtered_keys(["password"]);

        let config = SenderConfig::merged(options);

        assert_eq!(config.userversion, "2.0.0");
        assert!(!config.transmit_local_variables);
        assert_eq!(config.filtered_keys, vec!["password".to_string()]);
        assert!(config.transmit_global_variables);
        assert_eq!(config.http_timeout, 10.0);
        assert!(config.ignored_exceptions.is_empty());
    }

    #[test]
    fn test_independent_configs_do_not_share_state() {
        let mut first = SenderConfig::default();
        let second = SenderConfig::default();

        first.filtered_keys.push("secret".to_string());

        assert!(second.filtered_keys.is_empty());
        assert!(SenderConfig::default().filtered_keys.is_empty());
    }

    #[test]
    fn test_from_json_drops_malformed_values() {
        let options = ConfigOptions::from_json(&json!({
            "filtered_keys": "password",
            "ignored_exceptions": ["ParseIntError"],
            "http_timeout": "soon",
            "userversion": 12,
            "transmit_local_variables": false,
            "unknown_option": true
        }));

        assert!(options.filtered_keys.is_none());
        assert_eq!(
            options.ignored_exceptions,
            Some(vec!["ParseIntError".to_string()])
        );
        assert!(options.http_timeout.is_none());
        assert!(options.userversion.is_none());
        assert_eq!(options.transmit_local_variables, Some(false));
    }

    #[test]
    fn test_apply_json_rejects_wrong_shape_without_change() {
        let mut config = SenderConfig::default();
        config.filtered_keys = vec!["token".to_string()];

        assert!(!config.apply_json("filtered_keys", &json!("password")));
        assert_eq!(config.filtered_keys, vec!["token".to_string()]);

        assert!(!config.apply_json("userversion", &json!(["1.0"])));
        assert_eq!(config.userversion, "Not defined");

        assert!(config.apply_json("filtered_keys", &json!(["password"])));
        assert_eq!(config.filtered_keys, vec!["password".to_string()]);
    }

    #[test]
    fn test_invalid_timeout_falls_back_to_default() {
        let mut config = SenderConfig::default();
        config.http_timeout = -1.0;
        assert_eq!(config.timeout(), Duration::from_secs(10));

        config.http_timeout = 2.5;
        assert_eq!(config.timeout(), Duration::from_millis(2500));
    }

    #[test]
    fn test_proxy_url() {
        let proxy = Proxy {
            host: "proxy.internal".to_string(),
            port: 3128,
        };
        assert_eq!(proxy.url(), "http://proxy.internal:3128");

        let proxy = Proxy {
            host: "socks5://proxy.internal".to_string(),
            port: 1080,
        };
        assert_eq!(proxy.url(), "socks5://proxy.internal:1080");
    }

    #[test]
    fn test_options_deserialize_from_toml() {
        let options: ConfigOptions = toml::from_str(
            r#"
            filtered_keys = ["password", "request.headers.Authorization"]
            userversion = "3.1.0"
            http_timeout = 4.0

            [proxy]
            host = "proxy.internal"
            port = 8080
            "#,
        )
        .unwrap();

        let config = SenderConfig::merged(options);
        assert_eq!(config.filtered_keys.len(), 2);
        assert_eq!(config.userversion, "3.1.0");
        assert_eq!(config.http_timeout, 4.0);
        assert_eq!(config.proxy.unwrap().port, 8080);
        assert!(config.transmit_local_variables);
    }
}
