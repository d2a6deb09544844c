//! Typed request data for the common gateway operations.
//!
//! Each struct serializes to the snake_case payload of one endpoint. Absent
//! optional fields are dropped. [`RequestData::to_request`] runs the extra
//! checks of the struct and declares its required fields, so the resulting
//! [`Request`] is ready for the client.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::endpoints::{self, Endpoint};
use crate::error::ValidationError;
use crate::request::Request;

/// Typed payload of a single gateway operation.
pub trait RequestData: Serialize {
    /// snake_case fields that must be present and non-empty.
    fn required_fields(&self) -> &'static [&'static str];

    /// Checks beyond required-field presence.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] describing the first offending field.
    fn check(&self) -> Result<(), ValidationError> {
        Ok(())
    }

    /// Endpoint this payload is sent to.
    fn endpoint(&self) -> &'static Endpoint;

    /// Runs [`Self::check`] and builds the request with its required fields declared.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] if a check fails or the payload cannot be serialized.
    fn to_request(&self) -> Result<Request, ValidationError> {
        self.check()?;
        Ok(Request::from_serializable(self)?.require(self.required_fields()))
    }
}

fn positive_amount(amount: i64) -> Result<(), ValidationError> {
    if amount <= 0 {
        return Err(ValidationError::invalid_field(
            "amount",
            "Amount must be greater than 0",
        ));
    }
    Ok(())
}

fn is_blank(value: Option<&String>) -> bool {
    value.is_none_or(String::is_empty)
}

/// Card authorization without capture (J5).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AuthorizeRequest {
    /// Amount in minor units (agorot).
    pub amount: i64,
    /// ISO 4217 currency.
    pub currency: String,
    /// Card number.
    pub card_number: String,
    /// Two-digit expiry month.
    pub expiry_month: String,
    /// Four-digit expiry year.
    pub expiry_year: String,
    /// Card verification value.
    pub cvv: String,
    /// Card holder name.
    pub card_holder_name: Option<String>,
    /// Card holder national id.
    pub card_holder_id: Option<String>,
    /// Customer email.
    pub email: Option<String>,
    /// Customer phone.
    pub phone: Option<String>,
    /// Free-form metadata passed through to the gateway.
    pub metadata: Option<Map<String, Value>>,
    /// Merchant tracking parameter.
    pub param_x: Option<String>,
    /// Secondary tracking parameter.
    pub param_z: Option<String>,
}

impl AuthorizeRequest {
    /// Creates an authorization with the mandatory card details.
    #[must_use]
    pub fn new(
        amount: i64,
        currency: impl Into<String>,
        card_number: impl Into<String>,
        expiry_month: impl Into<String>,
        expiry_year: impl Into<String>,
        cvv: impl Into<String>,
    ) -> Self {
        Self {
            amount,
            currency: currency.into(),
            card_number: card_number.into(),
            expiry_month: expiry_month.into(),
            expiry_year: expiry_year.into(),
            cvv: cvv.into(),
            ..Self::default()
        }
    }
}

impl RequestData for AuthorizeRequest {
    fn required_fields(&self) -> &'static [&'static str] {
        endpoints::AUTHORIZE.required
    }

    fn check(&self) -> Result<(), ValidationError> {
        positive_amount(self.amount)?;
        if self.expiry_month.chars().count() != 2 {
            return Err(ValidationError::invalid_field(
                "expiry_month",
                "Expiry month must be 2 digits",
            ));
        }
        if self.expiry_year.chars().count() != 4 {
            return Err(ValidationError::invalid_field(
                "expiry_year",
                "Expiry year must be 4 digits",
            ));
        }
        Ok(())
    }

    fn endpoint(&self) -> &'static Endpoint {
        &endpoints::AUTHORIZE
    }
}

/// Regular debit (J4), by card or by token.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChargeRequest {
    /// Amount in minor units (agorot).
    pub amount: i64,
    /// ISO 4217 currency.
    pub currency: String,
    /// Card number.
    pub card_number: Option<String>,
    /// Stored card token.
    pub token: Option<String>,
    /// Two-digit expiry month.
    pub expiry_month: Option<String>,
    /// Four-digit expiry year.
    pub expiry_year: Option<String>,
    /// Card verification value.
    pub cvv: Option<String>,
    /// Customer email.
    pub email: Option<String>,
    /// Sent to the gateway as `customer_name`.
    #[serde(rename = "customer_name")]
    pub card_holder_name: Option<String>,
    /// Number of installments (default: 1).
    pub payments: Option<u32>,
    /// Customer phone.
    pub phone: Option<String>,
    /// Card holder national id.
    pub card_holder_id: Option<String>,
    /// Free-form metadata passed through to the gateway.
    pub metadata: Option<Map<String, Value>>,
    /// Merchant tracking parameter.
    pub param_x: Option<String>,
    /// Secondary tracking parameter.
    pub param_z: Option<String>,
}

impl ChargeRequest {
    /// Charges a card.
    #[must_use]
    pub fn card(
        amount: i64,
        currency: impl Into<String>,
        card_number: impl Into<String>,
        expiry_month: impl Into<String>,
        expiry_year: impl Into<String>,
        cvv: impl Into<String>,
    ) -> Self {
        Self {
            card_number: Some(card_number.into()),
            expiry_month: Some(expiry_month.into()),
            expiry_year: Some(expiry_year.into()),
            cvv: Some(cvv.into()),
            ..Self::empty(amount, currency.into())
        }
    }

    /// Charges a stored card token.
    #[must_use]
    pub fn token(amount: i64, currency: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..Self::empty(amount, currency.into())
        }
    }

    const fn empty(amount: i64, currency: String) -> Self {
        Self {
            amount,
            currency,
            card_number: None,
            token: None,
            expiry_month: None,
            expiry_year: None,
            cvv: None,
            email: None,
            card_holder_name: None,
            payments: Some(1),
            phone: None,
            card_holder_id: None,
            metadata: None,
            param_x: None,
            param_z: None,
        }
    }
}

impl RequestData for ChargeRequest {
    fn required_fields(&self) -> &'static [&'static str] {
        endpoints::CHARGE.required
    }

    fn check(&self) -> Result<(), ValidationError> {
        positive_amount(self.amount)?;
        let has_card = !is_blank(self.card_number.as_ref());
        if !has_card && is_blank(self.token.as_ref()) {
            return Err(ValidationError::missing_field("card_number or token"));
        }
        if has_card
            && (is_blank(self.expiry_month.as_ref())
                || is_blank(self.expiry_year.as_ref())
                || is_blank(self.cvv.as_ref()))
        {
            return Err(ValidationError::missing_field(
                "expiry_month, expiry_year, and cvv are required when using card_number",
            ));
        }
        Ok(())
    }

    fn endpoint(&self) -> &'static Endpoint {
        &endpoints::CHARGE
    }
}

/// Full or partial refund of a transaction.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RefundRequest {
    /// Gateway transaction id.
    #[serde(rename = "pelecard_transaction_id")]
    pub transaction_id: String,
    /// Partial amount; the full amount when absent.
    pub amount: Option<i64>,
    /// ISO 4217 currency.
    pub currency: Option<String>,
    /// Refund reason.
    pub reason: Option<String>,
    /// Free-form metadata passed through to the gateway.
    pub metadata: Option<Map<String, Value>>,
    /// Merchant tracking parameter.
    pub param_x: Option<String>,
    /// Secondary tracking parameter.
    pub param_z: Option<String>,
}

impl RefundRequest {
    /// Refunds the full amount of `transaction_id`.
    #[must_use]
    pub fn new(transaction_id: impl Into<String>) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            ..Self::default()
        }
    }

    /// Refunds only `amount`.
    #[must_use]
    pub const fn with_amount(mut self, amount: i64) -> Self {
        self.amount = Some(amount);
        self
    }
}

impl RequestData for RefundRequest {
    fn required_fields(&self) -> &'static [&'static str] {
        endpoints::REFUND_BY_ID.required
    }

    fn check(&self) -> Result<(), ValidationError> {
        self.amount.map_or(Ok(()), positive_amount)
    }

    fn endpoint(&self) -> &'static Endpoint {
        &endpoints::REFUND_BY_ID
    }
}

/// Card tokenization.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TokenRequest {
    /// Card number.
    pub card_number: String,
    /// Two-digit expiry month.
    pub expiry_month: String,
    /// Four-digit expiry year.
    pub expiry_year: String,
    /// Card holder name.
    pub card_holder_name: Option<String>,
    /// Card holder national id.
    pub card_holder_id: Option<String>,
    /// Tokenize without the gateway's card validity check.
    #[serde(skip)]
    pub skip_validation: bool,
    /// Merchant tracking parameter.
    pub param_x: Option<String>,
    /// Secondary tracking parameter.
    pub param_z: Option<String>,
}

impl TokenRequest {
    /// Creates a tokenization request.
    #[must_use]
    pub fn new(
        card_number: impl Into<String>,
        expiry_month: impl Into<String>,
        expiry_year: impl Into<String>,
    ) -> Self {
        Self {
            card_number: card_number.into(),
            expiry_month: expiry_month.into(),
            expiry_year: expiry_year.into(),
            ..Self::default()
        }
    }
}

impl RequestData for TokenRequest {
    fn required_fields(&self) -> &'static [&'static str] {
        endpoints::CONVERT_TO_TOKEN.required
    }

    fn endpoint(&self) -> &'static Endpoint {
        if self.skip_validation {
            &endpoints::CONVERT_TO_TOKEN_NO_CHECK
        } else {
            &endpoints::CONVERT_TO_TOKEN
        }
    }
}

/// Debit with a Google Pay payment token.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GooglePayRequest {
    /// Amount in minor units (agorot).
    pub amount: i64,
    /// ISO 4217 currency.
    pub currency: String,
    /// Google Pay payment token.
    pub google_pay_token: String,
    /// Customer email.
    pub email: Option<String>,
    /// Customer phone.
    pub phone: Option<String>,
    /// Number of installments (default: 1).
    pub payments: Option<u32>,
    /// Free-form metadata passed through to the gateway.
    pub metadata: Option<Map<String, Value>>,
    /// Merchant tracking parameter.
    pub param_x: Option<String>,
    /// Secondary tracking parameter.
    pub param_z: Option<String>,
}

impl GooglePayRequest {
    /// Creates a Google Pay debit of a single installment.
    #[must_use]
    pub fn new(amount: i64, currency: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            amount,
            currency: currency.into(),
            google_pay_token: token.into(),
            email: None,
            phone: None,
            payments: Some(1),
            metadata: None,
            param_x: None,
            param_z: None,
        }
    }
}

impl RequestData for GooglePayRequest {
    fn required_fields(&self) -> &'static [&'static str] {
        endpoints::DEBIT_BY_GOOGLE_PAY.required
    }

    fn check(&self) -> Result<(), ValidationError> {
        positive_amount(self.amount)?;
        if self.google_pay_token.is_empty() {
            return Err(ValidationError::missing_field("google_pay_token"));
        }
        Ok(())
    }

    fn endpoint(&self) -> &'static Endpoint {
        &endpoints::DEBIT_BY_GOOGLE_PAY
    }
}

/// Start of a 3-D Secure authentication.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ThreeDsRequest {
    /// Amount in minor units (agorot).
    pub amount: i64,
    /// ISO 4217 currency.
    pub currency: String,
    /// Card number.
    pub card_number: String,
    /// Two-digit expiry month.
    pub expiry_month: String,
    /// Four-digit expiry year.
    pub expiry_year: String,
    /// Card verification value.
    pub cvv: Option<String>,
    /// Card holder name.
    pub card_holder_name: Option<String>,
    /// Customer email.
    pub email: Option<String>,
    /// Redirect after successful authentication.
    pub success_url: Option<String>,
    /// Redirect after failed authentication.
    pub error_url: Option<String>,
    /// Free-form metadata passed through to the gateway.
    pub metadata: Option<Map<String, Value>>,
    /// Merchant tracking parameter.
    pub param_x: Option<String>,
    /// Secondary tracking parameter.
    pub param_z: Option<String>,
}

impl ThreeDsRequest {
    /// Creates a 3-D Secure request for a card.
    #[must_use]
    pub fn new(
        amount: i64,
        currency: impl Into<String>,
        card_number: impl Into<String>,
        expiry_month: impl Into<String>,
        expiry_year: impl Into<String>,
    ) -> Self {
        Self {
            amount,
            currency: currency.into(),
            card_number: card_number.into(),
            expiry_month: expiry_month.into(),
            expiry_year: expiry_year.into(),
            ..Self::default()
        }
    }
}

impl RequestData for ThreeDsRequest {
    fn required_fields(&self) -> &'static [&'static str] {
        endpoints::INITIATE_3DS.required
    }

    fn check(&self) -> Result<(), ValidationError> {
        positive_amount(self.amount)
    }

    fn endpoint(&self) -> &'static Endpoint {
        &endpoints::INITIATE_3DS
    }
}

/// Invoicing provider integrated with the gateway.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InvoiceKind {
    /// iCount.
    #[default]
    ICount,
    /// EZCount.
    EzCount,
    /// Payper.
    Payper,
}

/// Invoice issued through one of the gateway's invoicing integrations.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InvoiceRequest {
    /// Customer name.
    pub customer_name: String,
    /// Amount in minor units (agorot).
    pub amount: i64,
    /// ISO 4217 currency.
    pub currency: String,
    /// Invoice lines, passed through as-is.
    pub items: Vec<Value>,
    /// Customer email.
    pub customer_email: Option<String>,
    /// Customer phone.
    pub customer_phone: Option<String>,
    /// Customer address.
    pub customer_address: Option<String>,
    /// Free-form metadata passed through to the gateway.
    pub metadata: Option<Map<String, Value>>,
    #[serde(skip)]
    pub kind: InvoiceKind,
    /// Merchant tracking parameter.
    pub param_x: Option<String>,
    /// Secondary tracking parameter.
    pub param_z: Option<String>,
}

impl RequestData for InvoiceRequest {
    fn required_fields(&self) -> &'static [&'static str] {
        &["customer_name", "amount", "items"]
    }

    fn check(&self) -> Result<(), ValidationError> {
        if self.items.is_empty() {
            return Err(ValidationError::missing_field("items"));
        }
        Ok(())
    }

    fn endpoint(&self) -> &'static Endpoint {
        match self.kind {
            InvoiceKind::ICount => &endpoints::CREATE_ICOUNT_INVOICE,
            InvoiceKind::EzCount => &endpoints::CREATE_EZCOUNT_INVOICE,
            InvoiceKind::Payper => &endpoints::CREATE_PAYPER_INVOICE,
        }
    }
}

/// Transaction data lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TransactionQuery {
    #[serde(rename = "pelecard_transaction_id")]
    pub transaction_id: Option<String>,
    /// Merchant unique id.
    pub unique_id: Option<String>,
    /// Gateway UID.
    pub uid: Option<String>,
    /// Range start.
    pub from_date: Option<String>,
    /// Range end.
    pub to_date: Option<String>,
    /// Extra filters.
    pub filters: Option<Map<String, Value>>,
    /// Merchant tracking parameter.
    pub param_x: Option<String>,
    /// Secondary tracking parameter.
    pub param_z: Option<String>,
}

impl RequestData for TransactionQuery {
    fn required_fields(&self) -> &'static [&'static str] {
        endpoints::GET_TRANS_DATA.required
    }

    fn check(&self) -> Result<(), ValidationError> {
        let identified = [
            &self.transaction_id,
            &self.unique_id,
            &self.uid,
            &self.from_date,
        ]
        .into_iter()
        .any(|v| !is_blank(v.as_ref()));
        if !identified {
            return Err(ValidationError::invalid_field(
                "query",
                "At least one identifier or date filter is required",
            ));
        }
        Ok(())
    }

    fn endpoint(&self) -> &'static Endpoint {
        &endpoints::GET_TRANS_DATA
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_authorize_checks() {
        let ok = AuthorizeRequest::new(1000, "ILS", "4580000000000000", "12", "2030", "123");
        let request = ok.to_request().unwrap();
        assert_eq!(request.get("card_number"), Some(&json!("4580000000000000")));
        assert!(request.get("email").is_none());
        assert!(request.validate().is_ok());
        assert_eq!(ok.endpoint().path, "AuthorizeCreditCard");

        let bad_month = AuthorizeRequest::new(1000, "ILS", "4580", "1", "2030", "123");
        let err = bad_month.to_request().unwrap_err();
        assert!(err.errors.contains_key("expiry_month"));

        let bad_year = AuthorizeRequest::new(1000, "ILS", "4580", "01", "30", "123");
        assert!(bad_year.to_request().unwrap_err().errors.contains_key("expiry_year"));

        let zero = AuthorizeRequest::new(0, "ILS", "4580", "01", "2030", "123");
        assert_eq!(
            zero.to_request().unwrap_err().to_string(),
            "Invalid value for field 'amount': Amount must be greater than 0"
        );
    }

    #[test]
    fn test_charge_by_card_maps_holder_name() {
        let mut charge = ChargeRequest::card(5000, "ILS", "4580000000000000", "12", "2030", "123");
        charge.card_holder_name = Some("Dana Levi".to_owned());
        charge.param_x = Some("order-17".to_owned());
        let request = charge.to_request().unwrap();
        assert_eq!(request.get("customer_name"), Some(&json!("Dana Levi")));
        assert!(request.get("card_holder_name").is_none());
        assert_eq!(request.get("payments"), Some(&json!(1)));
        assert_eq!(request.get("param_x"), Some(&json!("order-17")));
        assert_eq!(
            request.to_pelecard_format()["CustomerName"],
            json!("Dana Levi")
        );
    }

    #[test]
    fn test_charge_requires_card_or_token() {
        let mut charge = ChargeRequest::token(5000, "ILS", "");
        let err = charge.to_request().unwrap_err();
        assert_eq!(err.to_string(), "Required field 'card_number or token' is missing.");

        charge.token = Some("tok_1".to_owned());
        assert!(charge.to_request().is_ok());

        let mut by_card = ChargeRequest::card(5000, "ILS", "4580", "12", "2030", "123");
        by_card.cvv = None;
        assert!(by_card.to_request().is_err());
    }

    #[test]
    fn test_refund() {
        let refund = RefundRequest::new("tx-1").with_amount(500);
        let request = refund.to_request().unwrap();
        assert_eq!(request.get("pelecard_transaction_id"), Some(&json!("tx-1")));
        assert_eq!(refund.endpoint().path, "RefundByID");
        assert!(RefundRequest::new("tx-1").with_amount(-1).to_request().is_err());
        assert!(RefundRequest::new("tx-1").to_request().unwrap().get("amount").is_none());
    }

    #[test]
    fn test_token_endpoint_choice() {
        let mut token = TokenRequest::new("4580", "12", "2030");
        assert_eq!(token.endpoint().path, "ConvertToToken");
        token.skip_validation = true;
        assert_eq!(token.endpoint().path, "ConvertToTokenNoCheck");
        assert!(token.to_request().unwrap().get("skip_validation").is_none());
    }

    #[test]
    fn test_google_pay() {
        let pay = GooglePayRequest::new(100, "ILS", "");
        assert!(pay.to_request().is_err());
        let pay = GooglePayRequest::new(100, "ILS", "gp-token");
        assert_eq!(
            pay.to_request().unwrap().required_fields(),
            ["amount", "currency", "google_pay_token"]
        );
    }

    #[test]
    fn test_three_ds() {
        let req = ThreeDsRequest::new(0, "ILS", "4580", "12", "2030");
        assert!(req.to_request().is_err());
        let req = ThreeDsRequest::new(10, "ILS", "4580", "12", "2030");
        assert_eq!(req.endpoint().path, "Initiate3DSAuthenticationProcess");
    }

    #[test]
    fn test_invoice_kind() {
        let mut invoice = InvoiceRequest {
            customer_name: "Acme".to_owned(),
            amount: 1000,
            currency: "ILS".to_owned(),
            items: vec![json!({"description": "Widget", "price": 1000, "quantity": 1})],
            ..InvoiceRequest::default()
        };
        assert_eq!(invoice.endpoint().path, "CreateICountInvoice");
        invoice.kind = InvoiceKind::Payper;
        assert_eq!(invoice.endpoint().path, "CreatePayperInvoice");
        assert!(invoice.to_request().unwrap().validate().is_ok());

        invoice.items.clear();
        assert!(invoice.to_request().is_err());
    }

    #[test]
    fn test_transaction_query() {
        assert!(TransactionQuery::default().to_request().is_err());
        let query = TransactionQuery {
            from_date: Some("2024-01-01".to_owned()),
            ..TransactionQuery::default()
        };
        let request = query.to_request().unwrap();
        assert_eq!(request.data().len(), 1);
        assert_eq!(query.endpoint().path, "GetTransData");
    }
}
