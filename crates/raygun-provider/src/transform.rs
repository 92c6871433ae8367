//! Transform pipeline applied to every report before transmission.
//!
//! Steps run in a fixed order: ignore filter, key filter, grouping key,
//! before-send callback. The ignore filter and the before-send callback can
//! veto the report, in which case nothing further runs.

use raygun_core::config::{BeforeSendCallback, GroupingKeyCallback, SenderConfig};
use raygun_core::exception::Variables;
use raygun_core::message::{ReportDetails, ReportDocument};
use raygun_core::{RaygunError, Result};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Replacement for filtered values.
pub const FILTERED_VALUE: &str = "<filtered>";

/// Run every step. `Ok(None)` means the report was suppressed.
pub fn apply(config: &SenderConfig, document: ReportDocument) -> Result<Option<ReportDocument>> {
    let Some(mut document) = ignore_exceptions(&config.ignored_exceptions, document) else {
        return Ok(None);
    };

    filter_keys(&config.filtered_keys, &mut document.details);
    document.details.grouping_key =
        execute_grouping_key(config.grouping_key_callback.as_ref(), &document)?;

    Ok(execute_before_send(
        config.before_send_callback.as_ref(),
        document,
    ))
}

/// Drop the report when its error class is listed in `ignored`.
pub fn ignore_exceptions(ignored: &[String], document: ReportDocument) -> Option<ReportDocument> {
    let class_name = document
        .details
        .error
        .as_ref()
        .map(|error| error.class_name.as_str());

    match class_name {
        Some(class_name) if ignored.iter().any(|entry| entry == class_name) => {
            debug!(class_name, "Report suppressed by ignored exceptions");
            None
        }
        _ => Some(document),
    }
}

/// Compute the grouping key, if a callback is configured. Callback errors
/// are returned to the caller.
pub fn execute_grouping_key(
    callback: Option<&GroupingKeyCallback>,
    document: &ReportDocument,
) -> Result<Option<String>> {
    let Some(callback) = callback else {
        return Ok(None);
    };
    callback(document)
        .map(Some)
        .map_err(|source| RaygunError::GroupingKey { source })
}

/// Hand the details to the before-send callback. `None` from the callback
/// suppresses the report.
pub fn execute_before_send(
    callback: Option<&BeforeSendCallback>,
    mut document: ReportDocument,
) -> Option<ReportDocument> {
    let Some(callback) = callback else {
        return Some(document);
    };

    match callback(document.details) {
        Some(details) => {
            document.details = details;
            Some(document)
        }
        None => {
            debug!("Report suppressed by before-send callback");
            None
        }
    }
}

/// Redact every entry addressed by `keys`.
///
/// A dotted key is a path from `details` to any entry (`user.email`,
/// `userCustomData.card.number`, `error.stackTrace.0.localVariables.token`);
/// numeric segments index arrays. A bare key matches at any depth inside
/// custom data, request headers, query string and form, and the variable
/// snapshots; `pass*` and `*token` match by prefix and suffix. Header names
/// match without regard to case.
pub fn filter_keys(keys: &[String], details: &mut ReportDetails) {
    for key in keys {
        if key.contains('.') {
            filter_path(key, details);
        } else {
            filter_everywhere(&KeyPattern::parse(key), details);
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum KeyPattern<'a> {
    Exact(&'a str),
    Prefix(&'a str),
    Suffix(&'a str),
}

impl<'a> KeyPattern<'a> {
    fn parse(key: &'a str) -> Self {
        if let Some(prefix) = key.strip_suffix('*') {
            KeyPattern::Prefix(prefix)
        } else if let Some(suffix) = key.strip_prefix('*') {
            KeyPattern::Suffix(suffix)
        } else {
            KeyPattern::Exact(key)
        }
    }

    fn matches(&self, key: &str) -> bool {
        match self {
            KeyPattern::Exact(exact) => key == *exact,
            KeyPattern::Prefix(prefix) => key.starts_with(prefix),
            KeyPattern::Suffix(suffix) => key.ends_with(suffix),
        }
    }

    /// Like [`KeyPattern::matches`], ignoring ASCII case.
    fn matches_header(&self, name: &str) -> bool {
        match self {
            KeyPattern::Exact(exact) => name.eq_ignore_ascii_case(exact),
            KeyPattern::Prefix(prefix) => name
                .get(..prefix.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(prefix)),
            KeyPattern::Suffix(suffix) => name
                .len()
                .checked_sub(suffix.len())
                .and_then(|start| name.get(start..))
                .is_some_and(|tail| tail.eq_ignore_ascii_case(suffix)),
        }
    }
}

fn filter_path(path: &str, details: &mut ReportDetails) {
    let segments: Vec<&str> = path.split('.').collect();
    let Ok(mut value) = serde_json::to_value(&*details) else {
        return;
    };
    if !redact_path(&mut value, &segments, 0) {
        return;
    }

    match serde_json::from_value(value) {
        Ok(filtered) => *details = filtered,
        Err(e) => warn!(path, error = %e, "Filtered report could not be rebuilt"),
    }
}

/// Redact the entry at `path` inside `value`, starting from `path[depth]`.
/// String leaves, and any leaf under `userCustomData`, become
/// [`FILTERED_VALUE`]; other leaves are removed. Header names compare
/// case-insensitively. Returns whether anything changed.
fn redact_path(value: &mut Value, path: &[&str], depth: usize) -> bool {
    let Some(segment) = path.get(depth) else {
        return false;
    };
    let last = depth + 1 == path.len();
    let free_form = path.first() == Some(&"userCustomData");

    match value {
        Value::Object(map) => {
            let key = if path[..depth] == ["request", "headers"] {
                map.keys().find(|key| key.eq_ignore_ascii_case(segment)).cloned()
            } else {
                map.contains_key(*segment).then(|| segment.to_string())
            };
            let Some(key) = key else {
                return false;
            };

            if !last {
                return map
                    .get_mut(&key)
                    .is_some_and(|inner| redact_path(inner, path, depth + 1));
            }
            if free_form || map.get(&key).is_some_and(Value::is_string) {
                map.insert(key, Value::String(FILTERED_VALUE.to_string()));
            } else {
                map.remove(&key);
            }
            true
        }
        Value::Array(items) => {
            let Some(index) = segment.parse::<usize>().ok().filter(|i| *i < items.len()) else {
                return false;
            };

            if !last {
                return redact_path(&mut items[index], path, depth + 1);
            }
            if free_form || items[index].is_string() {
                items[index] = Value::String(FILTERED_VALUE.to_string());
            } else {
                items.remove(index);
            }
            true
        }
        _ => false,
    }
}

fn filter_everywhere(pattern: &KeyPattern<'_>, details: &mut ReportDetails) {
    if let Some(data) = details.user_custom_data.as_mut() {
        redact_matching_values(data, pattern);
    }

    if let Some(request) = details.request.as_mut() {
        if let Some(headers) = request.headers.as_mut() {
            for (name, value) in headers.iter_mut() {
                if pattern.matches_header(name) {
                    *value = FILTERED_VALUE.to_string();
                }
            }
        }
        for map in [&mut request.query_string, &mut request.form]
            .into_iter()
            .flatten()
        {
            redact_matching_strings(map, pattern);
        }
    }

    let mut error = details.error.as_mut();
    while let Some(current) = error {
        if let Some(globals) = current.global_variables.as_mut() {
            redact_matching_strings(globals, pattern);
        }
        for frame in current.stack_trace.iter_mut() {
            if let Some(locals) = frame.local_variables.as_mut() {
                redact_matching_strings(locals, pattern);
            }
        }
        error = current.inner_error.as_deref_mut();
    }
}

fn redact_matching_values(map: &mut Map<String, Value>, pattern: &KeyPattern<'_>) {
    for (key, value) in map.iter_mut() {
        if pattern.matches(key) {
            *value = Value::String(FILTERED_VALUE.to_string());
        } else {
            redact_nested(value, pattern);
        }
    }
}

fn redact_nested(value: &mut Value, pattern: &KeyPattern<'_>) {
    match value {
        Value::Object(map) => redact_matching_values(map, pattern),
        Value::Array(items) => {
            for item in items.iter_mut() {
                redact_nested(item, pattern);
            }
        }
        _ => {}
    }
}

fn redact_matching_strings(map: &mut Variables, pattern: &KeyPattern<'_>) {
    for (key, value) in map.iter_mut() {
        if pattern.matches(key) {
            *value = FILTERED_VALUE.to_string();
        }
    }
}
