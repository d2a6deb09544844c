//! Hosted payment page (iframe) URLs.
//!
//! [`PaymentPage`] turns a [`PaymentPageRequest`] into the gateway's
//! `PaymentPage` URL, an `<iframe>` tag embedding it, a redirect
//! `<form>` posting to the payment gateway, or a [`PaymentSession`]. Appearance, behaviour and wallet options are passed
//! as snake_case keys in [`PaymentPageRequest::options`] and mapped to the
//! gateway's query parameters through a fixed table.

use std::fmt;

use rand::{RngExt, rng};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::form_urlencoded;

use crate::credentials::{Credentials, Environment};
use crate::error::ValidationError;

/// Default shop number.
pub const DEFAULT_SHOP_NUMBER: &str = "001";

/// Transaction type performed by the payment page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionType {
    /// Registry check only.
    #[default]
    J2,
    /// Registry check with card swipe.
    J2S,
    /// Debit.
    J4,
    /// Authorization.
    J5,
    /// Hidden authorization.
    J5h,
}

impl ActionType {
    /// Gateway code of the action.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::J2 => "J2",
            Self::J2S => "J2S",
            Self::J4 => "J4",
            Self::J5 => "J5",
            Self::J5h => "J5h",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an option value is rendered in the query string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Style {
    /// Truthiness as `1` / `0`.
    OneZero,
    /// Truthiness as `True` / `False`.
    TrueFalse,
    /// The value as text.
    Raw,
}

/// Options always sent, empty when absent: (key, parameter, style).
const BASE_OPTIONS: &[(&str, &str, Style)] = &[
    ("auth_num", "authNum", Style::Raw),
    ("first_payment", "firstPayment", Style::Raw),
    ("first_payment_lock", "firstPaymentLock", Style::OneZero),
    ("free_total", "freeTotal", Style::Raw),
    ("min_payments_for_credit", "minPaymentsForCredit", Style::Raw),
    ("sapak_no", "sapakNo", Style::Raw),
    ("disabled_payment_numbers", "disabledPaymentNumbers", Style::Raw),
];

/// Options sent only when present.
const OPTIONS: &[(&str, &str, Style)] = &[
    // appearance
    ("top_text", "topText", Style::Raw),
    ("bottom_text", "bottomText", Style::Raw),
    ("logo_url", "logo", Style::Raw),
    ("hide_pelecard_logo", "hidePelecardLogo", Style::OneZero),
    ("show_confirmation", "showConfirmationCheckbox", Style::OneZero),
    ("min_payments", "minPayments", Style::Raw),
    ("max_payments", "maxPayments", Style::Raw),
    ("business_name", "bussinessName", Style::Raw),
    ("caption_exp_input", "captionExpInput", Style::Raw),
    ("confirmation_link", "confirmationLink", Style::Raw),
    ("css_url", "cssURL", Style::Raw),
    ("cvv_image_url", "cvvImageUrl", Style::Raw),
    ("disable_zoom", "disableZoom", Style::OneZero),
    ("hidden_pci_logo", "hiddenPciLogo", Style::OneZero),
    ("hidden_ssl_seal", "hiddenSslSeal", Style::OneZero),
    ("force_tov_card", "forceTovCard", Style::OneZero),
    ("hide_fields", "hideFields", Style::Raw),
    ("id_cvv_input_type", "idCvvInputType", Style::Raw),
    ("logo_alt_text", "logoAltText", Style::Raw),
    ("numeric_input_mode", "numericInputMode", Style::Raw),
    ("open_confirmation_box_in_modal", "openConfirmationBoxInModal", Style::OneZero),
    ("placeholder_captions", "placeholderCaptions", Style::OneZero),
    ("placeholder_cc_number", "placeholderCCNumber", Style::Raw),
    ("set_focus", "setFocus", Style::Raw),
    ("show_brand_logo", "showBrandLogo", Style::TrueFalse),
    ("show_submit_button", "showSubmitButton", Style::OneZero),
    ("show_x_param", "showXParam", Style::OneZero),
    ("default_tab_button", "defaultTabButton", Style::Raw),
    ("credit_card_expiry_date_min_days", "creditCardExpiryDateMinDays", Style::Raw),
    ("text_after_confirmation_link", "textAfterConfirmationLink", Style::Raw),
    ("text_before_confirmation_link", "textBeforeConfirmationLink", Style::Raw),
    ("text_on_confirmation_box", "textOnConfirmationBox", Style::Raw),
    ("split_cc_number", "splitCCNumber", Style::Raw),
    ("user_no_scalable", "userNoScalable", Style::OneZero),
    // behaviour
    ("add_holder_name_to_x_param", "addHolderNameToXParam", Style::OneZero),
    ("add_remarks_to_x_param", "addRemarksToXParam", Style::OneZero),
    ("allowed_bins", "allowedBINs", Style::Raw),
    ("blocked_bins", "blockedBINs", Style::Raw),
    ("j5_as_j2_for_bins", "j5AsJ2ForBINS", Style::OneZero),
    ("input_error_display_by_field", "inputErrorDisplayByField", Style::OneZero),
    ("custom_error_handling", "customErrorHandling", Style::Raw),
    ("error_class", "errorClass", Style::Raw),
    ("required_validated_class", "requiredValidatedClass", Style::Raw),
    ("user_key", "userKey", Style::Raw),
    ("take_ishur_pop_up", "takeIshurPopUp", Style::OneZero),
    // wallets
    ("supported_cards", "supportedCards", Style::Raw),
    ("enable_bit", "bit", Style::TrueFalse),
    ("bit_btn_text", "bit_btn_text", Style::Raw),
    ("bit_pop_up_confirmation_text", "bit_pop_up_confirmation_text", Style::Raw),
    ("google_pay", "googlePay", Style::TrueFalse),
    ("apple_pay", "applePay", Style::TrueFalse),
];

/// Redirect form target on the test gateway.
pub const SANDBOX_FORM_ACTION: &str = "https://gateway20.pelecard.biz/PaymentGW/PaymentGateway";

/// Redirect form target on the live gateway.
pub const PRODUCTION_FORM_ACTION: &str = "https://gateway21.pelecard.biz/PaymentGW/PaymentGateway";

/// Redirect form hidden fields taken from options: (key, field, default).
const FORM_OPTIONS: &[(&str, &str, &str)] = &[
    ("top_text", "TopText", ""),
    ("bottom_text", "BottomText", ""),
    ("logo_url", "Logo", ""),
    ("hide_pelecard_logo", "HiddenPelecardLogo", "0"),
    ("show_confirmation", "ShowConfirmationCheckbox", "1"),
    ("min_payments", "MinPayments", "1"),
    ("max_payments", "MaxPayments", "1"),
];

const DEFAULT_IFRAME_ATTRIBUTES: &[(&str, &str)] = &[
    ("width", "100%"),
    ("height", "600"),
    ("frameborder", "0"),
    ("scrolling", "auto"),
];

/// Parameters of a payment page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentPageRequest {
    /// Amount in minor units.
    pub amount: i64,
    /// Currency; the page builder's default when absent.
    pub currency: Option<String>,
    /// Redirect after a successful payment.
    pub success_url: Option<String>,
    /// Redirect after a failed payment.
    pub error_url: Option<String>,
    /// Redirect after cancellation.
    pub cancel_url: Option<String>,
    /// Page language; the page builder's default when absent.
    pub language: Option<String>,
    /// Merchant tracking parameter, also used as session id.
    pub param_x: Option<String>,
    /// Secondary tracking parameter.
    pub param_z: Option<String>,
    /// Transaction type (default: J2).
    pub action_type: ActionType,
    /// Shop number (default: `001`).
    pub shop_number: Option<String>,
    /// Stored card token to prefill.
    pub token: Option<String>,
    /// Require 3-D Secure.
    pub use_3ds: bool,
    /// Appearance, behaviour and wallet options by snake_case key.
    pub options: Map<String, Value>,
}

impl PaymentPageRequest {
    /// A page charging `amount`.
    #[must_use]
    pub fn new(amount: i64) -> Self {
        Self {
            amount,
            ..Self::default()
        }
    }

    /// Sets the redirect URLs.
    #[must_use]
    pub fn with_urls(
        mut self,
        success_url: impl Into<String>,
        error_url: impl Into<String>,
        cancel_url: impl Into<String>,
    ) -> Self {
        self.success_url = Some(success_url.into());
        self.error_url = Some(error_url.into());
        self.cancel_url = Some(cancel_url.into());
        self
    }

    /// Sets an option.
    #[must_use]
    pub fn option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }
}

/// An iframe payment session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSession {
    /// Payment page URL.
    pub iframe_url: String,
    /// `param_x` of the request, or a random `pelecard_<hex>` id.
    pub session_id: String,
}

/// Builds payment page URLs for one terminal.
#[derive(Debug, Clone)]
pub struct PaymentPage {
    credentials: Credentials,
    base_url: String,
    currency: String,
    language: String,
}

impl PaymentPage {
    /// Creates a builder for `credentials` against `base_url`.
    #[must_use]
    pub fn new(credentials: Credentials, base_url: impl Into<String>) -> Self {
        Self {
            credentials,
            base_url: base_url.into(),
            currency: "ILS".to_owned(),
            language: "he".to_owned(),
        }
    }

    /// Sets the default currency.
    #[must_use]
    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    /// Sets the default language.
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// The payment page URL.
    #[must_use]
    pub fn url(&self, request: &PaymentPageRequest) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        let or_empty = |v: &Option<String>| v.clone().unwrap_or_default();

        query
            .append_pair("terminalNumber", self.credentials.terminal())
            .append_pair("user", self.credentials.user())
            .append_pair("password", self.credentials.password())
            .append_pair(
                "shopNo",
                request.shop_number.as_deref().unwrap_or(DEFAULT_SHOP_NUMBER),
            )
            .append_pair("total", &request.amount.to_string())
            .append_pair(
                "currency",
                request.currency.as_deref().unwrap_or(&self.currency),
            )
            .append_pair("goodUrl", &or_empty(&request.success_url))
            .append_pair("errorUrl", &or_empty(&request.error_url))
            .append_pair("cancelUrl", &or_empty(&request.cancel_url))
            .append_pair(
                "lang",
                request.language.as_deref().unwrap_or(&self.language),
            )
            .append_pair("paramX", &or_empty(&request.param_x))
            .append_pair("actionType", request.action_type.as_str());

        for (key, param, style) in BASE_OPTIONS {
            let value = present(&request.options, key)
                .map(|v| render(v, *style))
                .unwrap_or_default();
            query.append_pair(param, &value);
        }

        if let Some(token) = &request.token {
            query.append_pair("token", token);
        }

        for (key, param, style) in OPTIONS {
            if let Some(value) = present(&request.options, key) {
                query.append_pair(param, &render(value, *style));
            }
        }

        if let Some(param_z) = &request.param_z {
            query.append_pair("paramZ", param_z);
        }

        if request.use_3ds {
            query.append_pair("use3ds", "1").append_pair("use3DS", "1");
        }

        format!("{}/PaymentPage?{}", self.base_url, query.finish())
    }

    /// An `<iframe>` tag embedding the payment page.
    ///
    /// `attributes` override or extend the defaults (`width="100%"`,
    /// `height="600"`, `frameborder="0"`, `scrolling="auto"`).
    #[must_use]
    pub fn iframe(&self, request: &PaymentPageRequest, attributes: &[(&str, &str)]) -> String {
        format!(
            "<iframe src=\"{}\"{}></iframe>",
            escape_html(&self.url(request)),
            attributes_html(DEFAULT_IFRAME_ATTRIBUTES, attributes)
        )
    }

    /// Redirect form target for the terminal's environment.
    #[must_use]
    pub const fn form_action(&self) -> &'static str {
        match self.credentials.environment() {
            Environment::Sandbox => SANDBOX_FORM_ACTION,
            Environment::Production => PRODUCTION_FORM_ACTION,
        }
    }

    /// A self-contained `<form>` posting `request` to the payment gateway
    /// as hidden fields, for the redirect flow.
    ///
    /// `attributes` override or extend the defaults (`method="POST"`,
    /// `action` per environment, `id="pelecard-payment-form"`). Names and
    /// values are HTML-escaped.
    #[must_use]
    pub fn form(&self, request: &PaymentPageRequest, attributes: &[(&str, &str)]) -> String {
        let defaults = [
            ("method", "POST"),
            ("action", self.form_action()),
            ("id", "pelecard-payment-form"),
        ];
        let or_empty = |v: &Option<String>| v.clone().unwrap_or_default();

        let mut fields = vec![
            ("terminal", self.credentials.terminal().to_owned()),
            ("user", self.credentials.user().to_owned()),
            ("total", request.amount.to_string()),
            (
                "currency",
                request.currency.clone().unwrap_or_else(|| self.currency.clone()),
            ),
            (
                "lang",
                request.language.clone().unwrap_or_else(|| self.language.clone()),
            ),
            ("ParamX", or_empty(&request.param_x)),
            ("GoodUrl", or_empty(&request.success_url)),
            ("ErrorUrl", or_empty(&request.error_url)),
            ("CancelUrl", or_empty(&request.cancel_url)),
        ];
        for &(key, field, default) in FORM_OPTIONS {
            let value = present(&request.options, key)
                .map_or_else(|| default.to_owned(), |v| render(v, Style::Raw));
            fields.push((field, value));
        }

        let inputs: String = fields
            .iter()
            .map(|(name, value)| {
                format!(
                    "<input type=\"hidden\" name=\"{}\" value=\"{}\">",
                    escape_html(name),
                    escape_html(value)
                )
            })
            .collect();
        format!(
            "<form{}>{}<button type=\"submit\">Pay Now</button></form>",
            attributes_html(&defaults, attributes),
            inputs
        )
    }

    /// A payment session for `request`.
    #[must_use]
    pub fn session(&self, request: &PaymentPageRequest) -> PaymentSession {
        let session_id = request.param_x.clone().unwrap_or_else(|| {
            let id: u64 = rng().random();
            format!("pelecard_{id:016x}")
        });
        PaymentSession {
            iframe_url: self.url(request),
            session_id,
        }
    }
}

/// Typed iframe payment parameters with validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IframePaymentRequest {
    /// Amount in minor units.
    pub amount: i64,
    /// ISO 4217 currency.
    pub currency: String,
    /// Redirect after a successful payment.
    pub success_url: String,
    /// Redirect after a failed payment.
    pub error_url: String,
    /// Redirect after cancellation.
    pub cancel_url: String,
    /// Page language (default: `he`).
    pub language: String,
    /// Merchant tracking parameter.
    pub param_x: Option<String>,
    /// Text above the form.
    pub top_text: Option<String>,
    /// Text below the form.
    pub bottom_text: Option<String>,
    /// Merchant logo.
    pub logo_url: Option<String>,
    /// Hide the gateway logo.
    pub hide_pelecard_logo: bool,
    /// Show the confirmation checkbox.
    pub show_confirmation: bool,
    /// Minimum installments offered.
    pub min_payments: u32,
    /// Maximum installments offered.
    pub max_payments: u32,
    /// Customer name.
    pub customer_name: Option<String>,
    /// Customer email.
    pub email: Option<String>,
    /// Customer phone.
    pub phone: Option<String>,
}

impl IframePaymentRequest {
    /// A single-payment page with the default look.
    #[must_use]
    pub fn new(
        amount: i64,
        currency: impl Into<String>,
        success_url: impl Into<String>,
        error_url: impl Into<String>,
        cancel_url: impl Into<String>,
    ) -> Self {
        Self {
            amount,
            currency: currency.into(),
            success_url: success_url.into(),
            error_url: error_url.into(),
            cancel_url: cancel_url.into(),
            language: "he".to_owned(),
            param_x: None,
            top_text: None,
            bottom_text: None,
            logo_url: None,
            hide_pelecard_logo: false,
            show_confirmation: true,
            min_payments: 1,
            max_payments: 1,
            customer_name: None,
            email: None,
            phone: None,
        }
    }

    /// Checks the amount, the redirect URLs and the installment range.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] for the first offending field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, value) in [
            ("currency", &self.currency),
            ("success_url", &self.success_url),
            ("error_url", &self.error_url),
            ("cancel_url", &self.cancel_url),
        ] {
            if value.is_empty() {
                return Err(ValidationError::missing_field(field));
            }
        }
        if self.amount <= 0 {
            return Err(ValidationError::invalid_field(
                "amount",
                "Amount must be greater than 0",
            ));
        }
        if self.min_payments > self.max_payments {
            return Err(ValidationError::invalid_field(
                "min_payments",
                "Min payments cannot be greater than max payments",
            ));
        }
        Ok(())
    }

    /// Validates and converts into page parameters.
    ///
    /// # Errors
    ///
    /// Same as [`Self::validate`].
    pub fn into_page_request(self) -> Result<PaymentPageRequest, ValidationError> {
        self.validate()?;
        let mut options = Map::new();
        let mut put = |key: &str, value: Option<Value>| {
            if let Some(value) = value {
                options.insert(key.to_owned(), value);
            }
        };
        put("top_text", self.top_text.map(Value::from));
        put("bottom_text", self.bottom_text.map(Value::from));
        put("logo_url", self.logo_url.map(Value::from));
        put("hide_pelecard_logo", Some(self.hide_pelecard_logo.into()));
        put("show_confirmation", Some(self.show_confirmation.into()));
        put("min_payments", Some(self.min_payments.into()));
        put("max_payments", Some(self.max_payments.into()));
        put("customer_name", self.customer_name.map(Value::from));
        put("email", self.email.map(Value::from));
        put("phone", self.phone.map(Value::from));

        Ok(PaymentPageRequest {
            amount: self.amount,
            currency: Some(self.currency),
            success_url: Some(self.success_url),
            error_url: Some(self.error_url),
            cancel_url: Some(self.cancel_url),
            language: Some(self.language),
            param_x: self.param_x,
            options,
            ..PaymentPageRequest::default()
        })
    }
}

fn present<'a>(options: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    options.get(key).filter(|v| !v.is_null())
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn render(value: &Value, style: Style) -> String {
    match style {
        Style::OneZero => flag(truthy(value), "1", "0"),
        Style::TrueFalse => flag(truthy(value), "True", "False"),
        Style::Raw => match value {
            Value::String(s) => s.clone(),
            Value::Bool(b) => flag(*b, "1", "0"),
            Value::Null => String::new(),
            other => other.to_string(),
        },
    }
}

fn flag(on: bool, yes: &str, no: &str) -> String {
    let text = if on { yes } else { no };
    text.to_owned()
}

/// Renders `defaults` with `overrides` applied, as ` name="value"` pairs.
fn attributes_html<'a>(
    defaults: &[(&'a str, &'a str)],
    overrides: &[(&'a str, &'a str)],
) -> String {
    let mut merged = defaults.to_vec();
    for &(name, value) in overrides {
        match merged.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => merged.push((name, value)),
        }
    }
    merged
        .iter()
        .map(|(name, value)| format!(" {}=\"{}\"", escape_html(name), escape_html(value)))
        .collect()
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
    out
}
