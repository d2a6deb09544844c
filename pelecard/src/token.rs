//! Card tokens and stored payment methods.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::response::Response;

const TOKEN_KEYS: &[&str] = &["Token", "token", "CreditCardToken", "CardToken"];

/// Card token of a successful response.
///
/// Returns the first non-empty of `Token`, `token`, `CreditCardToken` and
/// `CardToken`, or `None` when the response failed.
#[must_use]
pub fn extract_token(response: &Response) -> Option<String> {
    if !response.successful() {
        return None;
    }
    TOKEN_KEYS
        .iter()
        .filter_map(|key| response.get_str(key))
        .find(|token| !token.is_empty())
}

/// Whether [`extract_token`] finds a token.
#[must_use]
pub fn has_token(response: &Response) -> bool {
    extract_token(response).is_some()
}

/// Card details reported alongside a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardDetails {
    /// Last four digits of the card number.
    pub last_four: Option<String>,
    /// Card brand, `unknown` when not reported.
    pub brand: String,
    /// Expiry month.
    pub exp_month: Option<String>,
    /// Expiry year.
    pub exp_year: Option<String>,
    /// Card holder name.
    pub card_holder: Option<String>,
}

/// Card details of a response, whether or not it succeeded.
#[must_use]
pub fn extract_card_details(response: &Response) -> CardDetails {
    CardDetails {
        last_four: response.first_of(&["Last4Digits", "CreditCardNumber4Digits"]),
        brand: response
            .first_of(&["CardBrand", "CreditCardCompany"])
            .unwrap_or_else(|| "unknown".to_owned()),
        exp_month: response.get_str("ExpiryMonth"),
        exp_year: response.get_str("ExpiryYear"),
        card_holder: response.get_str("CardHolderName"),
    }
}

/// A stored payment method.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethod {
    /// Gateway card token.
    pub token: Option<String>,
    /// Method type, e.g. `card`.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Last four digits.
    pub last_four: Option<String>,
    /// Card brand.
    pub brand: Option<String>,
    /// Expiry month (`1`-`12`, optionally zero padded).
    pub expiry_month: Option<String>,
    /// Expiry year, two or four digits.
    pub expiry_year: Option<String>,
}

impl PaymentMethod {
    /// Builds a card payment method from a tokenization response.
    ///
    /// Returns `None` when the response carries no token.
    #[must_use]
    pub fn from_response(response: &Response) -> Option<Self> {
        let token = extract_token(response)?;
        let details = extract_card_details(response);
        Some(Self {
            token: Some(token),
            kind: Some("card".to_owned()),
            last_four: details.last_four,
            brand: Some(details.brand),
            expiry_month: details.exp_month,
            expiry_year: details.exp_year,
        })
    }

    /// Whether the card expired before `now`.
    ///
    /// A card is valid through the last day of its expiry month. A missing
    /// or unparsable expiry never counts as expired.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let Some((year, month)) = self.expiry() else {
            return false;
        };
        (now.year(), now.month()) > (year, month)
    }

    fn expiry(&self) -> Option<(i32, u32)> {
        let month: u32 = self.expiry_month.as_deref()?.trim().parse().ok()?;
        let year: i32 = self.expiry_year.as_deref()?.trim().parse().ok()?;
        if !(1..=12).contains(&month) {
            return None;
        }
        let year = if year < 100 { 2000 + year } else { year };
        Some((year, month))
    }
}
