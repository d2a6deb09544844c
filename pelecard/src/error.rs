//! Error types for Pelecard gateway operations.
//!
//! Three kinds are raised by the SDK itself: authentication (missing or
//! invalid credentials), validation (detected before any network call) and
//! payment (a gateway decline, surfaced only when the caller asks for it via
//! [`Response::error_for_status`](crate::response::Response::error_for_status)).
//! Transport failures wrap the underlying HTTP client error.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map, Value};

/// Boxed error returned by host-supplied lookups (credential stores, resolver callbacks).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Base error type for Pelecard operations.
#[derive(Debug, thiserror::Error)]
pub enum PelecardError {
    /// Missing or invalid API credentials.
    #[error("{0}")]
    Authentication(#[from] AuthenticationError),

    /// Missing or invalid request field.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// Gateway-reported decline.
    #[error("{0}")]
    Payment(#[from] PaymentError),

    /// HTTP transport failure.
    #[error("HTTP request failed: {message}")]
    Transport {
        /// Message of the underlying transport error.
        message: String,
        /// HTTP status code if one was received, otherwise 0.
        code: u16,
        /// The underlying transport error.
        #[source]
        source: BoxError,
    },

    /// A credential store or resolver callback failed.
    #[error("credential lookup failed: {0}")]
    CredentialLookup(#[source] BoxError),

    /// Configuration could not be loaded.
    #[error("{0}")]
    Config(#[from] ConfigError),
}

impl PelecardError {
    /// Wraps a transport error, keeping its message and status code.
    pub fn transport<E>(code: u16, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Transport {
            message: source.to_string(),
            code,
            source: Box::new(source),
        }
    }

    /// Numeric code of the error, in the gateway's convention.
    #[must_use]
    pub fn code(&self) -> i64 {
        match self {
            Self::Authentication(e) => e.code(),
            Self::Validation(e) => e.code(),
            Self::Payment(e) => e.code,
            Self::Transport { code, .. } => i64::from(*code),
            Self::CredentialLookup(_) | Self::Config(_) => 0,
        }
    }
}

/// Missing or invalid gateway credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthenticationError {
    /// No credentials configured (terminal, user or password empty).
    MissingCredentials,
    /// The gateway rejected the credentials.
    InvalidCredentials,
}

impl AuthenticationError {
    /// HTTP-style code attached to authentication failures.
    #[must_use]
    pub const fn code(&self) -> i64 {
        401
    }
}

impl fmt::Display for AuthenticationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingCredentials => f.write_str(
                "Pelecard API credentials are missing. Please configure your credentials.",
            ),
            Self::InvalidCredentials => f.write_str("Invalid Pelecard API credentials provided."),
        }
    }
}

impl std::error::Error for AuthenticationError {}

/// A request failed local validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Human-readable message.
    pub message: String,
    /// Per-field messages.
    pub errors: BTreeMap<String, Vec<String>>,
}

impl ValidationError {
    /// A required field is absent or empty.
    #[must_use]
    pub fn missing_field(field: impl Into<String>) -> Self {
        let field = field.into();
        let mut errors = BTreeMap::new();
        errors.insert(field.clone(), vec![format!("The {field} field is required.")]);
        Self {
            message: format!("Required field '{field}' is missing."),
            errors,
        }
    }

    /// A field is present but its value is not acceptable.
    #[must_use]
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        let field = field.into();
        let reason = reason.into();
        let mut errors = BTreeMap::new();
        errors.insert(field.clone(), vec![reason.clone()]);
        Self {
            message: format!("Invalid value for field '{field}': {reason}"),
            errors,
        }
    }

    /// Code attached to validation failures.
    #[must_use]
    pub const fn code(&self) -> i64 {
        422
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ValidationError {}

impl From<serde_json::Error> for ValidationError {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid_field("request", err.to_string())
    }
}

/// The gateway declined the operation.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentError {
    /// Gateway error message.
    pub message: String,
    /// Gateway status code.
    pub code: i64,
    /// Full response data of the declined call.
    pub details: Map<String, Value>,
}

impl PaymentError {
    /// Creates a payment error without details.
    #[must_use]
    pub fn new(message: impl Into<String>, code: i64) -> Self {
        Self {
            message: message.into(),
            code,
            details: Map::new(),
        }
    }

    /// Generic decline.
    #[must_use]
    pub fn declined(reason: impl Into<String>) -> Self {
        Self::new(reason, 402)
    }

    /// Decline due to insufficient funds.
    #[must_use]
    pub fn insufficient_funds() -> Self {
        Self::new("Insufficient funds for this transaction.", 402)
    }

    /// Card details rejected.
    #[must_use]
    pub fn invalid_card(reason: impl Into<String>) -> Self {
        Self::new(reason, 400)
    }

    /// Attaches the response data.
    #[must_use]
    pub fn with_details(mut self, details: Map<String, Value>) -> Self {
        self.details = details;
        self
    }
}

impl fmt::Display for PaymentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for PaymentError {}

/// Configuration could not be read or holds an invalid value.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// Path of the file.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The configuration file is not valid TOML for [`PelecardConfig`](crate::config::PelecardConfig).
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    /// A value is out of its allowed range.
    #[error("invalid value for {key}: {value}")]
    InvalidValue {
        /// Setting name.
        key: &'static str,
        /// Offending value.
        value: String,
    },
}
