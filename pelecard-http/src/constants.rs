//! HTTP-level constants for talking to the gateway.

use std::time::Duration;

/// Timeout applied to every gateway request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Media type of request and response bodies.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Replacement for sensitive values in logged payloads.
pub const REDACTED: &str = "***REDACTED***";

/// Payload keys never written to logs, in both key styles.
pub const SENSITIVE_KEYS: &[&str] = &[
    "password",
    "card_number",
    "cvv",
    "Password",
    "CardNumber",
    "Cvv",
];
