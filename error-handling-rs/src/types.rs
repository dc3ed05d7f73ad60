//! # Standardized Error Types
//!
//! The error taxonomy surfaced by the product composite. Every error carries
//! its kind, the request path it was raised for and the original failure
//! message from the collaborator that produced it.

use std::error::Error as StdError;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A type alias for Result with the error type defaulting to our Error
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Categorizes the errors surfaced to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Malformed request, e.g. a non-positive product id
    InvalidInput,
    /// The requested entity does not exist
    NotFound,
    /// Breaker open, retries exhausted or deadline expired with no fallback
    ServiceUnavailable,
    /// The authorization gate denied the operation
    Unauthorized,
    /// Unclassified downstream or internal failure
    Internal,
    /// Invalid or missing configuration
    Configuration,
    /// Failure while bootstrapping logging or other process-wide facilities
    Initialization,
}

impl ErrorKind {
    /// HTTP status code an edge layer should answer with for this kind
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorKind::InvalidInput => 422,
            ErrorKind::NotFound => 404,
            ErrorKind::ServiceUnavailable => 503,
            ErrorKind::Unauthorized => 403,
            ErrorKind::Internal | ErrorKind::Configuration | ErrorKind::Initialization => 500,
        }
    }

    /// Reason phrase matching [`ErrorKind::http_status`]
    pub fn reason_phrase(&self) -> &'static str {
        match self.http_status() {
            422 => "Unprocessable Entity",
            404 => "Not Found",
            503 => "Service Unavailable",
            403 => "Forbidden",
            _ => "Internal Server Error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::InvalidInput => write!(f, "Invalid Input"),
            ErrorKind::NotFound => write!(f, "Not Found"),
            ErrorKind::ServiceUnavailable => write!(f, "Service Unavailable"),
            ErrorKind::Unauthorized => write!(f, "Unauthorized"),
            ErrorKind::Internal => write!(f, "Internal Error"),
            ErrorKind::Configuration => write!(f, "Configuration Error"),
            ErrorKind::Initialization => write!(f, "Initialization Error"),
        }
    }
}

/// Core error type for the product composite
///
/// `Clone` is implemented manually: clones keep every structured field but
/// drop the opaque `cause`.
#[derive(Debug, Serialize, Deserialize)]
pub struct Error {
    /// A unique identifier for this error instance
    pub id: Uuid,
    /// The kind of error that occurred
    pub kind: ErrorKind,
    /// Original failure message
    pub message: String,
    /// Request path or identifier the error was raised for
    pub path: Option<String>,
    /// The downstream service the failure originated from, if any
    pub service: Option<String>,
    /// The time when the error occurred
    pub timestamp: DateTime<Utc>,
    /// Additional context as key-value pairs
    #[serde(default)]
    pub context: serde_json::Map<String, serde_json::Value>,
    /// Underlying cause (not serialized)
    #[serde(skip)]
    pub cause: Option<Box<dyn StdError + Send + Sync>>,
}

impl Clone for Error {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            kind: self.kind,
            message: self.message.clone(),
            path: self.path.clone(),
            service: self.service.clone(),
            timestamp: self.timestamp,
            context: self.context.clone(),
            cause: None,
        }
    }
}

impl Error {
    /// Creates a new error with the specified kind and message
    pub fn new<S: Into<String>>(kind: ErrorKind, message: S) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            message: message.into(),
            path: None,
            service: None,
            timestamp: Utc::now(),
            context: serde_json::Map::new(),
            cause: None,
        }
    }

    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }

    pub fn not_found<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn unavailable<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::ServiceUnavailable, message)
    }

    pub fn unauthorized<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Sets the request path
    pub fn path<S: Into<String>>(mut self, path: S) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Sets the originating service name
    pub fn service<S: Into<String>>(mut self, service: S) -> Self {
        self.service = Some(service.into());
        self
    }

    /// Adds context information to the error
    pub fn context<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Serialize,
    {
        if let Ok(value) = serde_json::to_value(value) {
            self.context.insert(key.into(), value);
        }
        self
    }

    /// Chains this error with its cause
    pub fn cause<E>(mut self, cause: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.cause = Some(Box::new(cause));
        self
    }

    /// HTTP status code for this error
    pub fn http_status(&self) -> u16 {
        self.kind.http_status()
    }

    /// Builds the error body an edge layer returns to clients
    pub fn to_http_error_info(&self) -> HttpErrorInfo {
        HttpErrorInfo {
            timestamp: self.timestamp,
            path: self.path.clone().unwrap_or_default(),
            status: self.http_status(),
            error: self.kind.reason_phrase().to_string(),
            message: self.message.clone(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;

        if let Some(path) = &self.path {
            write!(f, " [Path: {}]", path)?;
        }

        if let Some(service) = &self.service {
            write!(f, " [Service: {}]", service)?;
        }

        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause.as_ref().map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::internal(format!("JSON error: {}", err)).cause(err)
    }
}

/// Error body returned across the HTTP boundary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpErrorInfo {
    pub timestamp: DateTime<Utc>,
    pub path: String,
    pub status: u16,
    pub error: String,
    pub message: String,
}
