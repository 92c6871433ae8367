//! Exception normalization.
//!
//! Turns a Rust error value, its `source()` chain and an optional stack trace
//! into the [`ErrorMessage`] carried by a report. Variable snapshots are
//! delegated to a [`VariableCapture`] implementation and gated by
//! [`CaptureOptions`].

use crate::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::backtrace::{Backtrace, BacktraceStatus};
use std::collections::BTreeMap;
use std::error::Error;
use std::sync::OnceLock;

/// Maximum depth of the `innerError` chain.
pub const MAX_INNER_DEPTH: usize = 32;

/// Captured variables, name to rendered value.
pub type Variables = BTreeMap<String, String>;

/// Normalized error as it appears in `details.error`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ErrorMessage {
    pub class_name: String,
    pub message: String,
    pub stack_trace: Vec<StackFrame>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub inner_error: Option<Box<ErrorMessage>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_variables: Option<Variables>,
}

impl ErrorMessage {
    pub fn new(class_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            message: message.into(),
            ..Default::default()
        }
    }

    /// Stand-in used when a report is sent without any error value.
    pub fn placeholder() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StackFrame {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u32>,
    pub class_name: String,
    pub file_name: String,
    pub method_name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_variables: Option<Variables>,
}

/// One unresolved stack level: the demangled symbol plus its source location.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFrame {
    pub function: String,
    pub file: Option<String>,
    pub line: Option<u32>,
}

impl RawFrame {
    pub fn new(function: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            ..Default::default()
        }
    }

    pub fn at(mut self, file: impl Into<String>, line: u32) -> Self {
        self.file = Some(file.into());
        self.line = Some(line);
        self
    }
}

/// Ordered stack levels, innermost first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackTrace {
    frames: Vec<RawFrame>,
}

impl StackTrace {
    pub fn from_frames(frames: Vec<RawFrame>) -> Self {
        Self { frames }
    }

    /// Capture the caller's stack, dropping the frames that belong to the
    /// capture itself.
    pub fn capture() -> Self {
        Self::from_backtrace(&Backtrace::force_capture()).without_capture_frames()
    }

    /// Drop the leading frames that belong to stack capture helpers.
    pub fn without_capture_frames(mut self) -> Self {
        let machinery = self
            .frames
            .iter()
            .take_while(|frame| is_capture_machinery(&frame.function))
            .count();
        self.frames.drain(..machinery);
        self
    }

    /// Build from a std backtrace. Disabled or unsupported backtraces yield an
    /// empty trace.
    pub fn from_backtrace(backtrace: &Backtrace) -> Self {
        match backtrace.status() {
            BacktraceStatus::Captured => Self::parse(&backtrace.to_string()),
            _ => Self::default(),
        }
    }

    /// Parse the textual rendering of a std backtrace:
    ///
    /// ```text
    ///    0: app::orders::submit
    ///              at ./src/orders.rs:42:9
    /// ```
    pub fn parse(text: &str) -> Self {
        let (frame_re, location_re) = backtrace_patterns();
        let mut frames: Vec<RawFrame> = Vec::new();

        for line in text.lines() {
            if let Some(caps) = frame_re.captures(line) {
                frames.push(RawFrame::new(strip_symbol_hash(&caps[1])));
            } else if let Some(caps) = location_re.captures(line) {
                if let Some(frame) = frames.last_mut() {
                    if frame.file.is_none() {
                        frame.file = Some(caps[1].to_string());
                        frame.line = caps[2].parse().ok();
                    }
                }
            }
        }

        Self { frames }
    }

    pub fn frames(&self) -> &[RawFrame] {
        &self.frames
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

fn backtrace_patterns() -> (&'static Regex, &'static Regex) {
    static FRAME: OnceLock<Regex> = OnceLock::new();
    static LOCATION: OnceLock<Regex> = OnceLock::new();

    let frame = FRAME.get_or_init(|| {
        Regex::new(r"^\s*\d+:\s+(.+?)\s*$").expect("frame pattern is valid")
    });
    let location = LOCATION.get_or_init(|| {
        Regex::new(r"^\s*at\s+(.+?):(\d+)(?::\d+)?\s*$").expect("location pattern is valid")
    });
    (frame, location)
}

fn is_capture_machinery(function: &str) -> bool {
    function.starts_with("std::backtrace")
        || function.starts_with("<std::backtrace")
        || function.contains("StackTrace::capture")
        || function.contains("SendOptions::with_current_stack")
}

fn strip_symbol_hash(symbol: &str) -> &str {
    match symbol.rsplit_once("::h") {
        Some((head, hash)) if hash.len() == 16 && hash.chars().all(|c| c.is_ascii_hexdigit()) => {
            head
        }
        _ => symbol,
    }
}

/// Split `path::to::Type::method` into (`path::to::Type`, `method`), ignoring
/// separators nested inside `<...>`.
pub fn split_symbol(symbol: &str) -> (String, String) {
    let mut depth = 0usize;
    let mut split_at = None;
    let bytes = symbol.as_bytes();

    for (index, byte) in bytes.iter().enumerate() {
        match byte {
            b'<' => depth += 1,
            b'>' => depth = depth.saturating_sub(1),
            b':' if depth == 0 && bytes.get(index + 1) == Some(&b':') => split_at = Some(index),
            _ => {}
        }
    }

    match split_at {
        Some(index) => (symbol[..index].to_string(), symbol[index + 2..].to_string()),
        None => (String::new(), symbol.to_string()),
    }
}

/// Which variable snapshots may be attached to a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureOptions {
    pub transmit_local_variables: bool,
    pub transmit_global_variables: bool,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            transmit_local_variables: true,
            transmit_global_variables: true,
        }
    }
}

/// Host-specific source of variable snapshots.
///
/// Rust cannot introspect frame locals by itself, so the mechanism is left to
/// the embedding application. A failure for one frame only drops that
/// frame's snapshot.
pub trait VariableCapture: Send + Sync {
    fn locals(&self, frame: &RawFrame) -> Result<Variables>;

    fn globals(&self) -> Result<Variables> {
        Ok(Variables::new())
    }
}

/// Captures nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoVariableCapture;

impl VariableCapture for NoVariableCapture {
    fn locals(&self, _frame: &RawFrame) -> Result<Variables> {
        Ok(Variables::new())
    }
}

/// Reports a fixed set of application-registered globals.
#[derive(Debug, Clone, Default)]
pub struct StaticGlobals {
    globals: Variables,
}

impl StaticGlobals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.globals.insert(name.into(), value.to_string());
        self
    }
}

impl VariableCapture for StaticGlobals {
    fn locals(&self, _frame: &RawFrame) -> Result<Variables> {
        Ok(Variables::new())
    }

    fn globals(&self) -> Result<Variables> {
        Ok(self.globals.clone())
    }
}

/// Class name for a concrete error type.
///
/// Trait objects carry no useful type name, so those fall back to
/// [`class_name_from_debug`].
pub fn class_name_of<E: Error + ?Sized + 'static>(error: &E) -> String {
    let full = std::any::type_name::<E>();
    if full.contains("dyn ") {
        return class_name_from_rendered(&format!("{:?}", error));
    }
    short_type_name(full)
}

/// Leading type identifier of an error's `Debug` rendering, e.g.
/// `ParseIntError { kind: InvalidDigit }` gives `ParseIntError`.
pub fn class_name_from_debug(error: &dyn Error) -> String {
    class_name_from_rendered(&format!("{:?}", error))
}

fn class_name_from_rendered(rendered: &str) -> String {
    let ident: String = rendered
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    let rest = &rendered[ident.len()..];

    let starts_upper = ident.chars().next().is_some_and(|c| c.is_uppercase());
    if starts_upper && (rest.is_empty() || rest.starts_with('(') || rest.starts_with(" {")) {
        ident
    } else {
        "Error".to_string()
    }
}

fn short_type_name(full: &str) -> String {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}

/// Converts errors into [`ErrorMessage`]s.
pub struct ExceptionNormalizer<'a> {
    options: CaptureOptions,
    capture: &'a dyn VariableCapture,
}

impl<'a> ExceptionNormalizer<'a> {
    pub fn new(options: CaptureOptions, capture: &'a dyn VariableCapture) -> Self {
        Self { options, capture }
    }

    /// Normalize a concrete error, naming it after its Rust type.
    pub fn normalize_typed<E: Error + 'static>(
        &self,
        error: &E,
        stack: Option<&StackTrace>,
    ) -> ErrorMessage {
        self.normalize(error, class_name_of(error), stack)
    }

    /// Normalize an error with an explicit class name. Sources are chained
    /// into `innerError`.
    pub fn normalize(
        &self,
        error: &(dyn Error + 'static),
        class_name: String,
        stack: Option<&StackTrace>,
    ) -> ErrorMessage {
        let mut message = ErrorMessage::new(class_name, error.to_string());
        message.stack_trace = stack.map(|stack| self.frames(stack)).unwrap_or_default();
        message.global_variables = self.capture_globals();
        message.inner_error = self.inner(error.source(), 1);
        message
    }

    /// Normalize whatever is available; no error at all yields the
    /// placeholder.
    pub fn normalize_optional(
        &self,
        error: Option<&(dyn Error + 'static)>,
        stack: Option<&StackTrace>,
    ) -> ErrorMessage {
        match error {
            Some(error) => self.normalize(error, class_name_from_debug(error), stack),
            None => {
                let mut message = ErrorMessage::placeholder();
                message.stack_trace = stack.map(|stack| self.frames(stack)).unwrap_or_default();
                message
            }
        }
    }

    fn inner(&self, source: Option<&(dyn Error + 'static)>, depth: usize) -> Option<Box<ErrorMessage>> {
        let source = source?;
        if depth > MAX_INNER_DEPTH {
            return None;
        }

        let mut inner = ErrorMessage::new(class_name_from_debug(source), source.to_string());
        inner.inner_error = self.inner(source.source(), depth + 1);
        Some(Box::new(inner))
    }

    fn frames(&self, stack: &StackTrace) -> Vec<StackFrame> {
        stack
            .frames()
            .iter()
            .map(|raw| {
                let (class_name, method_name) = split_symbol(&raw.function);
                StackFrame {
                    line_number: raw.line,
                    class_name,
                    file_name: raw.file.clone().unwrap_or_default(),
                    method_name,
                    local_variables: self.capture_locals(raw),
                }
            })
            .collect()
    }

    fn capture_locals(&self, frame: &RawFrame) -> Option<Variables> {
        if !self.options.transmit_local_variables {
            return None;
        }
        self.capture.locals(frame).ok().filter(|vars| !vars.is_empty())
    }

    fn capture_globals(&self) -> Option<Variables> {
        if !self.options.transmit_global_variables {
            return None;
        }
        self.capture.globals().ok().filter(|vars| !vars.is_empty())
    }
}
