//! Outbound request payloads.
//!
//! A [`Request`] is a flat map of snake_case keys to JSON values. Before it
//! is sent, keys are renamed to the gateway's PascalCase convention with
//! [`Request::to_pelecard_format`].

use serde::Serialize;
use serde_json::{Map, Value};

use crate::credentials::Credentials;
use crate::error::ValidationError;

/// A gateway request under construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Request {
    data: Map<String, Value>,
    required: Vec<String>,
}

impl Request {
    /// Creates an empty request.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a request from an existing map.
    #[must_use]
    pub fn from_map(data: Map<String, Value>) -> Self {
        Self {
            data,
            required: Vec::new(),
        }
    }

    /// Serializes `value` into a request, dropping `null` fields.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] if `value` does not serialize to a JSON object.
    pub fn from_serializable<T: Serialize + ?Sized>(value: &T) -> Result<Self, ValidationError> {
        match serde_json::to_value(value)? {
            Value::Object(map) => Ok(Self::from_map(
                map.into_iter().filter(|(_, v)| !v.is_null()).collect(),
            )),
            other => Err(ValidationError::invalid_field(
                "request",
                format!("expected an object, got {other}"),
            )),
        }
    }

    /// Sets a field.
    #[must_use]
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Sets a field in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(key.into(), value.into());
    }

    /// Sets a field only when `value` is `Some`.
    #[must_use]
    pub fn set_opt(self, key: impl Into<String>, value: Option<impl Into<Value>>) -> Self {
        match value {
            Some(value) => self.set(key, value),
            None => self,
        }
    }

    /// Returns a field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Merges every field of `other` into this request, overwriting on conflict.
    #[must_use]
    pub fn extend(mut self, other: Self) -> Self {
        self.data.extend(other.data);
        self
    }

    /// Adds the terminal credentials, overwriting caller-supplied values.
    #[must_use]
    pub fn with_credentials(self, credentials: &Credentials) -> Self {
        self.set("terminal", credentials.terminal())
            .set("user", credentials.user())
            .set("password", credentials.password())
    }

    /// Declares fields that must be present and non-empty.
    #[must_use]
    pub fn require<S: AsRef<str>>(mut self, fields: &[S]) -> Self {
        for field in fields {
            let field = field.as_ref();
            if !self.required.iter().any(|f| f == field) {
                self.required.push(field.to_owned());
            }
        }
        self
    }

    /// Fields declared as required.
    #[must_use]
    pub fn required_fields(&self) -> &[String] {
        &self.required
    }

    /// Checks that every required field is present, non-null and not an empty string.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::missing_field`] for the first offending field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for field in &self.required {
            match self.data.get(field) {
                None | Some(Value::Null) => return Err(ValidationError::missing_field(field)),
                Some(Value::String(s)) if s.is_empty() => {
                    return Err(ValidationError::missing_field(field));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// The snake_case payload.
    #[must_use]
    pub const fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    /// Consumes the request, returning its snake_case payload.
    #[must_use]
    pub fn into_data(self) -> Map<String, Value> {
        self.data
    }

    /// The payload with every key converted to PascalCase.
    #[must_use]
    pub fn to_pelecard_format(&self) -> Map<String, Value> {
        self.data
            .iter()
            .map(|(k, v)| (to_pascal_case(k), v.clone()))
            .collect()
    }
}

impl From<Map<String, Value>> for Request {
    fn from(data: Map<String, Value>) -> Self {
        Self::from_map(data)
    }
}

/// Converts a snake_case key to PascalCase.
///
/// The first character and every character following an underscore are
/// upper-cased; underscores are dropped and all other characters are kept
/// as they are.
#[must_use]
pub fn to_pascal_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper_next = true;
    for ch in key.chars() {
        if ch == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}
