//! Error types for RouterOS session management and command dispatch.
//!
//! Every variant carries its context as plain strings so the error stays
//! `Clone` and never holds on to credentials. The Display output of an error
//! is safe to log and to hand back to a dashboard.

use std::io;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Coarse reason a session could not be established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The device actively refused the TCP connection.
    Refused,
    /// The host name could not be resolved.
    HostNotFound,
    /// Connecting or negotiating took longer than the configured timeout.
    TimedOut,
    /// Anything else (protocol errors, algorithm mismatch, ...).
    Other,
}

/// Errors that can occur while talking to a RouterOS device.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectError {
    /// The session could not be established.
    #[error("failed to connect to router {target}: {cause}")]
    Connect {
        target: String,
        kind: FailureKind,
        cause: String,
    },

    /// The device rejected the supplied username or password.
    #[error("Authentication failed for router {target}: {cause}")]
    Authentication { target: String, cause: String },

    /// The device rejected the command or the channel failed mid-command.
    #[error("command execution failed: {command}: {cause}")]
    Execution { command: String, cause: String },

    /// Command execution did not complete within the configured timeout.
    #[error("exec command timeout after {}ms: {command}", .timeout.as_millis())]
    ExecTimeout { command: String, timeout: Duration },

    /// The pooled connection has been closed.
    #[error("connect closed")]
    ConnectClosedError,

    /// An entry addressed by its natural key does not exist on the device.
    #[error("{0} not found")]
    NotFound(String),

    /// The target failed validation before any connection was attempted.
    #[error("invalid router configuration: {}", .0.join(", "))]
    InvalidTarget(Vec<String>),
}

impl ConnectError {
    /// Builds a connection error from a transport failure, classifying it as
    /// an authentication failure or a [`FailureKind`].
    pub fn from_transport(target: &str, err: &(dyn std::error::Error + 'static)) -> Self {
        let cause = err.to_string();
        if is_authentication_failure(err) {
            return ConnectError::Authentication {
                target: target.to_string(),
                cause,
            };
        }
        ConnectError::Connect {
            target: target.to_string(),
            kind: failure_kind(err),
            cause,
        }
    }

    /// A connection error for a handshake that exceeded its deadline.
    pub fn connect_timeout(target: &str, timeout: Duration) -> Self {
        ConnectError::Connect {
            target: target.to_string(),
            kind: FailureKind::TimedOut,
            cause: format!("connection timed out after {}ms", timeout.as_millis()),
        }
    }

    /// Maps the error onto the status class reported at the HTTP boundary.
    pub fn classify(&self) -> ErrorClass {
        let details = self.to_string();
        match self {
            ConnectError::Connect {
                kind: FailureKind::Refused,
                ..
            } => ErrorClass::new(
                503,
                "Connection refused",
                "Unable to connect to the router. Please check the IP address and ensure SSH is enabled.",
                details,
            ),
            ConnectError::Connect {
                kind: FailureKind::HostNotFound,
                ..
            } => ErrorClass::new(
                404,
                "Host not found",
                "The specified router IP address could not be resolved.",
                details,
            ),
            ConnectError::Connect {
                kind: FailureKind::TimedOut,
                ..
            }
            | ConnectError::ExecTimeout { .. } => ErrorClass::new(
                408,
                "Connection timeout",
                "Connection to the router timed out. Please check the network connectivity.",
                details,
            ),
            ConnectError::Authentication { .. } => ErrorClass::new(
                401,
                "Authentication failed",
                "Invalid username or password for the router.",
                details,
            ),
            ConnectError::NotFound(_) => ErrorClass::new(
                404,
                "Not found",
                "The requested entry does not exist on the router.",
                details,
            ),
            ConnectError::InvalidTarget(_) => ErrorClass::new(
                400,
                "Validation error",
                "The router configuration is invalid.",
                details,
            ),
            ConnectError::Connect { .. }
            | ConnectError::Execution { .. }
            | ConnectError::ConnectClosedError => ErrorClass::new(
                500,
                "Internal server error",
                "An unexpected error occurred",
                details,
            ),
        }
    }
}

/// Caller-facing classification of a [`ConnectError`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorClass {
    /// HTTP status code equivalent.
    #[serde(skip)]
    pub status: u16,
    pub error: &'static str,
    pub message: &'static str,
    pub details: String,
}

impl ErrorClass {
    fn new(status: u16, error: &'static str, message: &'static str, details: String) -> Self {
        Self {
            status,
            error,
            message,
            details,
        }
    }

    /// Renders the JSON response body.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "error": self.error,
            "message": self.message,
            "details": self.details,
        })
    }
}

fn is_authentication_failure(err: &(dyn std::error::Error + 'static)) -> bool {
    if matches!(
        err.downcast_ref::<async_ssh2_tokio::Error>(),
        Some(async_ssh2_tokio::Error::PasswordWrong)
    ) {
        return true;
    }
    error_chain(err).any(|e| e.to_string().to_ascii_lowercase().contains("authentication"))
}

fn failure_kind(err: &(dyn std::error::Error + 'static)) -> FailureKind {
    for e in error_chain(err) {
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            match io_err.kind() {
                io::ErrorKind::ConnectionRefused => return FailureKind::Refused,
                io::ErrorKind::TimedOut => return FailureKind::TimedOut,
                _ => {}
            }
        }
    }
    let text = error_chain(err)
        .map(|e| e.to_string().to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join(" ");
    if text.contains("refused") {
        FailureKind::Refused
    } else if text.contains("timed out") || text.contains("timeout") {
        FailureKind::TimedOut
    } else if text.contains("lookup address")
        || text.contains("name or service not known")
        || text.contains("no such host")
    {
        FailureKind::HostNotFound
    } else {
        FailureKind::Other
    }
}

fn error_chain<'a>(
    err: &'a (dyn std::error::Error + 'static),
) -> impl Iterator<Item = &'a (dyn std::error::Error + 'static)> {
    std::iter::successors(Some(err), |e| e.source())
}
