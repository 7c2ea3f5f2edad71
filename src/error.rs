/// Error types for kitapi operations
use std::fmt;
use thiserror::Error;

/// Classification of a failed API or token operation
///
/// The pipeline reacts to the kind, never to the message text:
/// `TokenExpired` triggers one refresh and retry, `TokenInvalid` and
/// `RefreshGrantInvalid` wipe the stored credential, everything else is
/// surfaced without touching credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    TokenExpired,
    TokenInvalid,
    RefreshGrantInvalid,
    RemoteError { status: u16 },
    TransportError { timed_out: bool },
    Storage,
}

impl ErrorKind {
    /// Whether this failure removes the stored credential
    pub fn clears_credentials(&self) -> bool {
        matches!(self, ErrorKind::TokenInvalid | ErrorKind::RefreshGrantInvalid)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::TokenExpired => f.write_str("access token expired"),
            ErrorKind::TokenInvalid => f.write_str("access token invalid"),
            ErrorKind::RefreshGrantInvalid => f.write_str("refresh grant rejected"),
            ErrorKind::RemoteError { status } => write!(f, "remote error (HTTP {})", status),
            ErrorKind::TransportError { timed_out: true } => f.write_str("request timed out"),
            ErrorKind::TransportError { timed_out: false } => f.write_str("transport error"),
            ErrorKind::Storage => f.write_str("credential storage error"),
        }
    }
}

/// Failure outcome of every public client operation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn token_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TokenInvalid, message)
    }

    pub fn remote(status: u16, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RemoteError { status }, message)
    }

    /// Message suitable for showing to an end user
    ///
    /// With `debug` set the raw remote message is returned so site owners can
    /// diagnose the failure; otherwise a generic sentence is used.
    pub fn user_message(&self, debug: bool) -> String {
        if debug {
            return self.message.clone();
        }

        match self.kind {
            ErrorKind::TokenInvalid | ErrorKind::RefreshGrantInvalid => {
                "The connection to your account has expired. Please reconnect.".to_string()
            }
            _ => "Something went wrong. Please try again later.".to_string(),
        }
    }
}

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        Self::new(
            ErrorKind::TransportError {
                timed_out: err.timed_out,
            },
            err.message,
        )
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self::new(ErrorKind::Storage, err.to_string())
    }
}

/// A single HTTP exchange that produced no response
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
    pub timed_out: bool,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timed_out: false,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timed_out: true,
        }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("Could not determine data directory")]
    NoDataDir,
}

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Job table {0} is owned by another process")]
    AlreadyOwned(String),

    #[error("Scheduler worker has stopped")]
    Stopped,
}

/// Programmer error detected while constructing a client
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Timeout must be greater than zero")]
    ZeroTimeout,

    #[error("HTTP client construction failed: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Explicit outcome returned by every public operation
pub type Outcome<T> = std::result::Result<T, ApiError>;
