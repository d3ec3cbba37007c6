//! Error taxonomy: one error type shared by every subsystem, carrying an
//! `ErrorKind`, an optional server status code/response, and a remediation
//! hint.

use std::fmt;
use std::io;

/// The kind of failure an operation produced. Kept exhaustive even though
/// this crate never produces `RateLimit` / `PoolExhausted` / `PluginError`
/// itself — those belong to facade/plugin/pool layers built on top of this
/// client — so a caller can serialize the full taxonomy without
/// re-declaring it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    ConnectionFailed,
    ConnectionTimeout,
    AuthFailed,
    TlsFailed,
    InvalidRecipient,
    InvalidSender,
    MessageRejected,
    RateLimit,
    PoolExhausted,
    InvalidConfig,
    EncodingError,
    PluginError,
    SmtpError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::ConnectionFailed => "CONNECTION_FAILED",
            ErrorKind::ConnectionTimeout => "CONNECTION_TIMEOUT",
            ErrorKind::AuthFailed => "AUTH_FAILED",
            ErrorKind::TlsFailed => "TLS_FAILED",
            ErrorKind::InvalidRecipient => "INVALID_RECIPIENT",
            ErrorKind::InvalidSender => "INVALID_SENDER",
            ErrorKind::MessageRejected => "MESSAGE_REJECTED",
            ErrorKind::RateLimit => "RATE_LIMIT",
            ErrorKind::PoolExhausted => "POOL_EXHAUSTED",
            ErrorKind::InvalidConfig => "INVALID_CONFIG",
            ErrorKind::EncodingError => "ENCODING_ERROR",
            ErrorKind::PluginError => "PLUGIN_ERROR",
            ErrorKind::SmtpError => "SMTP_ERROR",
        };
        f.write_str(s)
    }
}

/// Error carrying a message, kind, and optional server context.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SmtpError {
    pub kind: ErrorKind,
    pub message: String,
    pub status_code: Option<u16>,
    pub response: Option<String>,
    pub solution: Option<String>,
}

impl SmtpError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status_code: None,
            response: None,
            solution: None,
        }
    }

    pub fn with_status(mut self, code: u16, response: impl Into<String>) -> Self {
        self.status_code = Some(code);
        self.response = Some(response.into());
        self
    }

    pub fn with_solution(mut self, solution: impl Into<String>) -> Self {
        self.solution = Some(solution.into());
        self
    }

    /// Build an `SmtpError` kind from a rejected command response, carrying
    /// the status code and the raw response text.
    pub fn smtp(code: u16, response: impl Into<String>) -> Self {
        let response = response.into();
        Self::new(ErrorKind::SmtpError, format!("{} {}", code, response)).with_status(code, response)
    }

    /// Wrap an SMTP-level auth rejection into `AuthFailed`, attaching a
    /// remediation hint.
    pub fn auth_failed(inner: SmtpError, solution: &str) -> Self {
        Self {
            kind: ErrorKind::AuthFailed,
            message: inner.message.clone(),
            status_code: inner.status_code,
            response: inner.response.clone(),
            solution: Some(solution.to_string()),
        }
    }
}

impl fmt::Display for SmtpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for SmtpError {}

impl From<io::Error> for SmtpError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::TimedOut {
            SmtpError::new(ErrorKind::ConnectionTimeout, e.to_string())
        } else {
            SmtpError::new(ErrorKind::ConnectionFailed, e.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, SmtpError>;
