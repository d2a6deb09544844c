//! Inbound gateway notifications.
//!
//! The gateway posts the outcome of a transaction to a webhook URL. The
//! payload is classified by its status code and turned into a
//! [`BillingEvent`].

use std::fmt;

use serde_json::{Map, Value};

use crate::events::BillingEvent;
use crate::response::{Response, is_success_status};

/// Outcome reported by a webhook payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WebhookEventType {
    /// `StatusCode` is the success sentinel.
    PaymentSucceeded,
    /// Any other status, or none.
    PaymentFailed,
}

impl WebhookEventType {
    /// Dotted event name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PaymentSucceeded => "payment.succeeded",
            Self::PaymentFailed => "payment.failed",
        }
    }
}

impl fmt::Display for WebhookEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies a payload by `StatusCode`, falling back to `status_code`.
#[must_use]
pub fn classify(payload: &Map<String, Value>) -> WebhookEventType {
    let status = payload
        .get("StatusCode")
        .filter(|v| !v.is_null())
        .or_else(|| payload.get("status_code"));
    match status {
        Some(value) if is_success_status(value) => WebhookEventType::PaymentSucceeded,
        _ => WebhookEventType::PaymentFailed,
    }
}

/// Turns a payload into the payment event to dispatch.
#[must_use]
pub fn into_event(payload: Map<String, Value>) -> BillingEvent {
    let kind = classify(&payload);
    let response = Response::new(payload, 200);
    match kind {
        WebhookEventType::PaymentSucceeded => BillingEvent::PaymentSucceeded {
            owner_id: None,
            response,
        },
        WebhookEventType::PaymentFailed => BillingEvent::PaymentFailed {
            owner_id: None,
            response,
        },
    }
}

/// Checks the webhook signature.
///
/// The gateway does not document a signature scheme, so every payload is
/// accepted.
#[must_use]
pub const fn verify_signature(_signature: Option<&str>, _body: &[u8]) -> bool {
    true
}
