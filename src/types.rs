// src/types.rs

//! Request / response types shared by every layer of the dispatcher.

use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;

/// Unique, monotonically increasing id assigned by `submit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Why a command did not succeed.
///
/// Every variant is delivered as an ordinary [`CommandResponse`]; none of
/// them makes the caller's future fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The submitted text was empty or whitespace only.
    EmptyCommand,
    /// No handler is registered under the command name.
    UnknownCommand,
    /// The handler returned an error or panicked.
    HandlerExecutionError,
    /// The handler exceeded its deadline and was cancelled.
    HandlerTimeout,
    /// `submit` was called before `start()` or after `stop()`.
    ManagerNotRunning,
    /// The request was queued or running when `stop()` was called.
    ShutdownInProgress,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::EmptyCommand => "empty_command",
            ErrorKind::UnknownCommand => "unknown_command",
            ErrorKind::HandlerExecutionError => "handler_execution_error",
            ErrorKind::HandlerTimeout => "handler_timeout",
            ErrorKind::ManagerNotRunning => "manager_not_running",
            ErrorKind::ShutdownInProgress => "shutdown_in_progress",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of a request while it holds an execution slot.
///
/// `Dispatched -> Running -> {Completed | TimedOut | Failed}`, or `Cancelled`
/// when the manager stops first. Queued requests only show up in
/// `queue_size`; a resolved request leaves the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    Dispatched,
    Running,
    Completed,
    TimedOut,
    Failed,
    Cancelled,
}

/// One submitted command.
#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub id: RequestId,
    /// Label of the calling surface (`"ui"`, `"cli"`, `"api"`, ...).
    pub origin: String,
    /// The text exactly as submitted.
    pub raw: String,
    /// First whitespace-separated token, lower-cased.
    pub command: String,
    /// Everything after the first token, trimmed.
    pub args: String,
    /// Optional caller context (e.g. selected market token ids).
    pub session: Option<serde_json::Value>,
    pub submitted_at: Instant,
}

impl CommandRequest {
    /// Argument words, split on whitespace.
    pub fn arg_words(&self) -> impl Iterator<Item = &str> {
        self.args.split_whitespace()
    }
}

/// Split command text into `(command, args)`.
///
/// Returns `None` for empty or whitespace-only input. The command name is
/// lower-cased; the arguments keep their original spelling.
pub fn parse_command_text(text: &str) -> Option<(String, String)> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    let (head, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (trimmed, ""),
    };

    Some((head.to_lowercase(), rest.to_string()))
}

/// What a handler reports back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerOutcome {
    pub message: String,
    pub success: bool,
    /// Screen the UI should switch to, if any.
    pub navigation: Option<String>,
}

impl HandlerOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            success: true,
            navigation: None,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            success: false,
            navigation: None,
        }
    }

    pub fn navigate_to(mut self, screen: impl Into<String>) -> Self {
        self.navigation = Some(screen.into());
        self
    }
}

/// Structured result delivered to the caller and to every subscriber.
///
/// Serializes to the JSON shape consumed by the HTTP facade:
/// `{success, message, command, origin, execution_time_ms, navigation, error}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandResponse {
    #[serde(skip)]
    pub request_id: RequestId,
    pub success: bool,
    pub message: String,
    /// The submitted command text.
    pub command: String,
    pub origin: String,
    pub execution_time_ms: f64,
    pub navigation: Option<String>,
    #[serde(rename = "error")]
    pub error_kind: Option<ErrorKind>,
}

impl CommandResponse {
    pub(crate) fn from_outcome(
        request: &CommandRequest,
        outcome: HandlerOutcome,
        elapsed: Duration,
    ) -> Self {
        Self {
            request_id: request.id,
            success: outcome.success,
            message: outcome.message,
            command: request.raw.clone(),
            origin: request.origin.clone(),
            execution_time_ms: millis(elapsed),
            navigation: outcome.navigation,
            error_kind: None,
        }
    }

    pub(crate) fn failure(
        request_id: RequestId,
        command: &str,
        origin: &str,
        kind: ErrorKind,
        message: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            request_id,
            success: false,
            message: message.into(),
            command: command.to_string(),
            origin: origin.to_string(),
            execution_time_ms: millis(elapsed),
            navigation: None,
            error_kind: Some(kind),
        }
    }

    pub fn is_error(&self, kind: ErrorKind) -> bool {
        self.error_kind == Some(kind)
    }
}

/// Per-call overrides for [`CommandManager::submit_with`](crate::engine::CommandManager::submit_with).
#[derive(Debug, Clone, Default)]
pub struct SubmitOptions {
    /// Replaces the manager-wide handler timeout for this request.
    pub timeout: Option<Duration>,
    pub session: Option<serde_json::Value>,
}

pub(crate) fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}
