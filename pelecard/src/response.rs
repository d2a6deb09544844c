//! Gateway responses.
//!
//! [`Response`] is a read-only view over the JSON object returned by the
//! gateway. Success is decided by the `StatusCode` field; declines are not
//! raised automatically, call [`Response::error_for_status`] to turn one
//! into a [`PaymentError`].

use serde_json::{Map, Value};

use crate::error::PaymentError;

/// `StatusCode` value the gateway uses for success.
pub const SUCCESS_STATUS_CODE: &str = "000";

const TRANSACTION_ID_KEYS: &[&str] = &["PelecardTransactionId", "TransactionId", "transaction_id"];
const AUTHORIZATION_NUMBER_KEYS: &[&str] = &[
    "AuthorizationNumber",
    "ConfirmationNumber",
    "authorization_number",
];
const ERROR_MESSAGE_KEYS: &[&str] = &["ErrorMessage", "Error", "error_message", "message"];
const ERROR_CODE_KEYS: &[&str] = &["StatusCode", "ErrorCode", "error_code"];

/// Code used when a failed response carries no error code.
const UNKNOWN_ERROR_CODE: i64 = 999;

/// A parsed gateway reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    data: Map<String, Value>,
    status_code: u16,
    raw_body: Option<String>,
}

impl Response {
    /// Wraps response data received with HTTP status `status_code`.
    #[must_use]
    pub const fn new(data: Map<String, Value>, status_code: u16) -> Self {
        Self {
            data,
            status_code,
            raw_body: None,
        }
    }

    /// Builds a response from a raw HTTP body.
    ///
    /// A body that is not a JSON object yields empty data.
    #[must_use]
    pub fn from_body(body: String, status_code: u16) -> Self {
        let data = match serde_json::from_str::<Value>(&body) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        Self {
            data,
            status_code,
            raw_body: Some(body),
        }
    }

    /// Whether the gateway reported success.
    ///
    /// A non-2xx HTTP status is always a failure. Otherwise the `StatusCode`
    /// field decides when present and non-null, and the HTTP status when it
    /// is not.
    #[must_use]
    pub fn successful(&self) -> bool {
        if !(200..300).contains(&self.status_code) {
            return false;
        }
        self.get("StatusCode").is_none_or(is_success_status)
    }

    /// Negation of [`Self::successful`].
    #[must_use]
    pub fn failed(&self) -> bool {
        !self.successful()
    }

    /// The full response data.
    #[must_use]
    pub const fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    /// Consumes the response, returning its data.
    #[must_use]
    pub fn into_data(self) -> Map<String, Value> {
        self.data
    }

    /// A single field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key).filter(|v| !v.is_null())
    }

    /// A single field rendered as text (strings as-is, numbers and booleans formatted).
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<String> {
        self.get(key).and_then(value_to_string)
    }

    /// First non-null field among `keys`, rendered as text.
    #[must_use]
    pub fn first_of(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|k| self.get_str(k))
    }

    /// Gateway transaction id.
    #[must_use]
    pub fn transaction_id(&self) -> Option<String> {
        self.first_of(TRANSACTION_ID_KEYS)
    }

    /// Authorization (confirmation) number.
    #[must_use]
    pub fn authorization_number(&self) -> Option<String> {
        self.first_of(AUTHORIZATION_NUMBER_KEYS)
    }

    /// Error message reported by the gateway.
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        self.first_of(ERROR_MESSAGE_KEYS)
    }

    /// Error code reported by the gateway.
    #[must_use]
    pub fn error_code(&self) -> Option<String> {
        self.first_of(ERROR_CODE_KEYS)
    }

    /// HTTP status the response arrived with.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        self.status_code
    }

    /// Raw HTTP body, if the response came from the network.
    #[must_use]
    pub fn raw_body(&self) -> Option<&str> {
        self.raw_body.as_deref()
    }

    /// Converts a failed response into a [`PaymentError`].
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError`] carrying the gateway message, the numeric
    /// prefix of the error code (999 when absent) and the full data.
    pub fn error_for_status(self) -> Result<Self, PaymentError> {
        if self.successful() {
            return Ok(self);
        }
        let message = self
            .error_message()
            .unwrap_or_else(|| "Unknown error occurred".to_owned());
        let code = self
            .error_code()
            .map_or(UNKNOWN_ERROR_CODE, |c| leading_integer(&c));
        Err(PaymentError::new(message, code).with_details(self.data))
    }

    /// Returns the data of a successful response.
    ///
    /// # Errors
    ///
    /// Same as [`Self::error_for_status`].
    pub fn into_data_or_error(self) -> Result<Map<String, Value>, PaymentError> {
        self.error_for_status().map(Self::into_data)
    }

    /// The data serialized as JSON.
    #[must_use]
    pub fn to_json(&self) -> String {
        Value::Object(self.data.clone()).to_string()
    }
}

/// Whether a status value equals the success sentinel (`"000"` or `0`).
#[must_use]
pub fn is_success_status(value: &Value) -> bool {
    match value {
        Value::String(s) => s == SUCCESS_STATUS_CODE,
        Value::Number(n) => n.as_i64() == Some(0),
        _ => false,
    }
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Parses the leading (optionally signed) integer of `s`; 0 when there is none.
fn leading_integer(s: &str) -> i64 {
    let s = s.trim_start();
    let (sign, digits) = match s.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, s.strip_prefix('+').unwrap_or(s)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().map_or(0, |n| sign * n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(value: Value, status: u16) -> Response {
        match value {
            Value::Object(map) => Response::new(map, status),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_successful_response() {
        let r = response(json!({"StatusCode": "000"}), 200);
        assert!(r.successful());
        assert!(!r.failed());

        let r = response(json!({"StatusCode": 0}), 200);
        assert!(r.successful());
    }

    #[test]
    fn test_failed_response() {
        let r = response(json!({"StatusCode": "001", "ErrorMessage": "Payment declined"}), 200);
        assert!(r.failed());
        assert!(!r.successful());

        let r = response(json!({"StatusCode": "0"}), 200);
        assert!(r.failed());
    }

    #[test]
    fn test_http_status_fallback() {
        assert!(response(json!({}), 200).successful());
        assert!(response(json!({}), 500).failed());
        assert!(response(json!({"StatusCode": "000"}), 503).failed());
    }

    #[test]
    fn test_null_status_code_is_absent() {
        assert!(response(json!({"StatusCode": null}), 200).successful());
        assert!(response(json!({"StatusCode": null}), 502).failed());
    }

    #[test]
    fn test_transaction_id_first_non_null() {
        let r = response(json!({"PelecardTransactionId": "123456"}), 200);
        assert_eq!(r.transaction_id().as_deref(), Some("123456"));

        let r = response(
            json!({"PelecardTransactionId": null, "TransactionId": 42, "transaction_id": "x"}),
            200,
        );
        assert_eq!(r.transaction_id().as_deref(), Some("42"));
    }

    #[test]
    fn test_error_fields() {
        let r = response(json!({"Error": "Invalid card", "ErrorCode": "033"}), 200);
        assert_eq!(r.error_message().as_deref(), Some("Invalid card"));
        assert_eq!(r.error_code().as_deref(), Some("033"));

        let r = response(json!({"ConfirmationNumber": "0123"}), 200);
        assert_eq!(r.authorization_number().as_deref(), Some("0123"));
    }

    #[test]
    fn test_error_for_status() {
        let r = response(json!({"StatusCode": "001", "ErrorMessage": "Failed"}), 200);
        let err = r.error_for_status().unwrap_err();
        assert_eq!(err.message, "Failed");
        assert_eq!(err.code, 1);
        assert_eq!(err.details["StatusCode"], json!("001"));
    }

    #[test]
    fn test_error_for_status_defaults() {
        let r = response(json!({}), 500);
        let err = r.error_for_status().unwrap_err();
        assert_eq!(err.message, "Unknown error occurred");
        assert_eq!(err.code, 999);
    }

    #[test]
    fn test_error_for_status_passes_success() {
        let r = response(json!({"StatusCode": "000", "Token": "abc"}), 200);
        let data = r.into_data_or_error().unwrap();
        assert_eq!(data["Token"], json!("abc"));
    }

    #[test]
    fn test_from_body() {
        let r = Response::from_body(r#"{"StatusCode":"000"}"#.to_owned(), 200);
        assert!(r.successful());
        assert_eq!(r.raw_body(), Some(r#"{"StatusCode":"000"}"#));

        let r = Response::from_body("<html>oops</html>".to_owned(), 200);
        assert!(r.data().is_empty());
        let r = Response::from_body("[1,2]".to_owned(), 200);
        assert!(r.data().is_empty());
    }

    #[test]
    fn test_leading_integer() {
        assert_eq!(leading_integer("001"), 1);
        assert_eq!(leading_integer("12abc"), 12);
        assert_eq!(leading_integer("abc"), 0);
        assert_eq!(leading_integer("-5"), -5);
    }
}
