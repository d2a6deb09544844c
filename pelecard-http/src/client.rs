//! Gateway client over `reqwest`.
//!
//! [`PelecardClient`] issues one JSON `POST` per operation. Every call goes
//! through [`PelecardClient::call`]: credentials are merged in, required
//! fields are checked before anything touches the network, keys are
//! converted to the gateway's PascalCase and the reply is wrapped in a
//! [`Response`]. Declines are not errors; use
//! [`Response::error_for_status`] for that.
//!
//! There is no retry and no backoff. Each request times out after
//! [`REQUEST_TIMEOUT`].

use http::header::{ACCEPT, CONTENT_TYPE};
use pelecard::config::PelecardConfig;
use pelecard::credentials::{Credentials, Environment};
use pelecard::endpoints::{self, Endpoint};
use pelecard::error::PelecardError;
use pelecard::payment_page::PaymentPage;
use pelecard::request::Request;
use pelecard::requests::RequestData;
use pelecard::resolver::{CredentialsResolver, Tenant};
use pelecard::response::Response;
use reqwest::Client;
use serde_json::{Map, Value};

#[cfg(feature = "telemetry")]
use tracing::instrument;

use crate::constants::{JSON_CONTENT_TYPE, REDACTED, REQUEST_TIMEOUT, SENSITIVE_KEYS};

/// Operations taking a free-form payload.
macro_rules! data_operations {
    ($($(#[$meta:meta])* $method:ident => $endpoint:ident;)*) => {
        $(
            $(#[$meta])*
            ///
            /// # Errors
            ///
            /// Returns [`PelecardError`] if validation or the HTTP request fails.
            pub async fn $method(&self, data: Request) -> Result<Response, PelecardError> {
                self.call(&endpoints::$endpoint, data).await
            }
        )*
    };
}

/// Operations keyed by a single string argument.
macro_rules! keyed_operations {
    ($($(#[$meta:meta])* $method:ident($arg:ident) => $endpoint:ident;)*) => {
        $(
            $(#[$meta])*
            ///
            /// # Errors
            ///
            /// Returns [`PelecardError`] if validation or the HTTP request fails.
            pub async fn $method(&self, $arg: &str) -> Result<Response, PelecardError> {
                self.call(&endpoints::$endpoint, Request::new().set(stringify!($arg), $arg))
                    .await
            }
        )*
    };
}

/// Operations without arguments.
macro_rules! bare_operations {
    ($($(#[$meta:meta])* $method:ident => $endpoint:ident;)*) => {
        $(
            $(#[$meta])*
            ///
            /// # Errors
            ///
            /// Returns [`PelecardError`] if the HTTP request fails.
            pub async fn $method(&self) -> Result<Response, PelecardError> {
                self.call(&endpoints::$endpoint, Request::new()).await
            }
        )*
    };
}

/// A client bound to one terminal.
#[derive(Clone, Debug)]
pub struct PelecardClient {
    credentials: Credentials,
    base_url: String,
    currency: String,
    language: String,
    log_payloads: bool,
    client: Client,
}

impl PelecardClient {
    /// Creates a client for `credentials` against their environment's default URL.
    ///
    /// # Errors
    ///
    /// Returns [`PelecardError::Authentication`] if terminal, user or
    /// password is empty.
    pub fn try_new(credentials: Credentials) -> Result<Self, PelecardError> {
        credentials.ensure_complete()?;
        Ok(Self {
            base_url: credentials.environment().default_base_url().to_owned(),
            credentials,
            currency: "ILS".to_owned(),
            language: "he".to_owned(),
            log_payloads: false,
            client: Client::new(),
        })
    }

    /// Creates a client from the global configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PelecardError::Authentication`] if the configured
    /// credentials are incomplete.
    pub fn from_config(config: &PelecardConfig) -> Result<Self, PelecardError> {
        Self::try_new(config.credentials()?).map(|client| client.configured(config))
    }

    /// Creates a client for `tenant`.
    ///
    /// With multi-tenancy disabled the global credentials are used;
    /// otherwise `resolver` picks them. The gateway URL follows the
    /// environment of the resolved credentials.
    ///
    /// # Errors
    ///
    /// Returns [`PelecardError`] if resolution fails or yields incomplete
    /// credentials.
    pub async fn for_tenant(
        tenant: &dyn Tenant,
        resolver: &CredentialsResolver,
    ) -> Result<Self, PelecardError> {
        let config = resolver.config();
        if !config.multi_tenant {
            return Self::from_config(config);
        }
        let credentials = resolver.resolve(tenant).await?;
        Ok(Self::try_new(credentials)?.configured(config))
    }

    fn configured(self, config: &PelecardConfig) -> Self {
        let base_url = config
            .gateway_urls
            .get(self.credentials.environment())
            .to_owned();
        self.with_base_url(base_url)
            .with_currency(&config.currency)
            .with_language(&config.language)
            .with_payload_logging(config.logging.enabled)
    }

    /// Overrides the gateway base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the currency used when an operation does not name one.
    #[must_use]
    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    /// Sets the language used by [`Self::get_error_message`] and the payment page.
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Enables debug logging of (sanitized) payloads.
    #[must_use]
    pub const fn with_payload_logging(mut self, enabled: bool) -> Self {
        self.log_payloads = enabled;
        self
    }

    /// Replaces the underlying HTTP client.
    #[must_use]
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Terminal number.
    #[must_use]
    pub fn terminal(&self) -> &str {
        self.credentials.terminal()
    }

    /// Gateway environment.
    #[must_use]
    pub const fn environment(&self) -> Environment {
        self.credentials.environment()
    }

    /// Gateway base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Credentials sent with every request.
    #[must_use]
    pub const fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Default currency.
    #[must_use]
    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Whether payloads are logged.
    #[must_use]
    pub const fn logs_payloads(&self) -> bool {
        self.log_payloads
    }

    /// Payment page builder for this terminal.
    #[must_use]
    pub fn payment_page(&self) -> PaymentPage {
        PaymentPage::new(self.credentials.clone(), &self.base_url)
            .with_currency(&self.currency)
            .with_language(&self.language)
    }

    /// Full URL of `endpoint`.
    #[must_use]
    pub fn endpoint_url(&self, endpoint: &Endpoint) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), endpoint.path)
    }

    /// Sends `request` to `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`PelecardError::Validation`] without sending anything if a
    /// required field is missing, and [`PelecardError::Transport`] if the
    /// HTTP exchange fails.
    #[cfg_attr(
        feature = "telemetry",
        instrument(
            name = "pelecard.client.call",
            skip_all,
            fields(
                endpoint = endpoint.name,
                environment = %self.credentials.environment(),
                http.status_code = tracing::field::Empty,
            )
        )
    )]
    pub async fn call(&self, endpoint: &Endpoint, request: Request) -> Result<Response, PelecardError> {
        let request = request
            .with_credentials(&self.credentials)
            .require(endpoint.required);
        request.validate()?;
        self.post(endpoint, request.to_pelecard_format()).await
    }

    /// Sends typed request data to its endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`PelecardError::Validation`] if the data fails its checks,
    /// otherwise as [`Self::call`].
    pub async fn submit<T>(&self, data: &T) -> Result<Response, PelecardError>
    where
        T: RequestData + Sync,
    {
        let request = data.to_request()?;
        self.call(data.endpoint(), request).await
    }

    async fn post(
        &self,
        endpoint: &Endpoint,
        payload: Map<String, Value>,
    ) -> Result<Response, PelecardError> {
        #[cfg(feature = "telemetry")]
        if self.log_payloads {
            tracing::debug!(
                endpoint = endpoint.path,
                payload = %serde_json::Value::Object(sanitize(&payload)),
                "Pelecard API request"
            );
        }

        let result = self.send(endpoint, &payload).await;
        record_result_on_span(endpoint, &result, self.log_payloads);
        result
    }

    async fn send(
        &self,
        endpoint: &Endpoint,
        payload: &Map<String, Value>,
    ) -> Result<Response, PelecardError> {
        let http_response = self
            .client
            .post(self.endpoint_url(endpoint))
            .header(ACCEPT, JSON_CONTENT_TYPE)
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .timeout(REQUEST_TIMEOUT)
            .json(payload)
            .send()
            .await
            .map_err(|e| PelecardError::transport(e.status().map_or(0, |s| s.as_u16()), e))?;

        let status = http_response.status().as_u16();
        let body = http_response
            .text()
            .await
            .map_err(|e| PelecardError::transport(status, e))?;
        Ok(Response::from_body(body, status))
    }

    data_operations! {
        /// Authorizes a card without capturing funds.
        authorize => AUTHORIZE;
        /// Regular debit.
        charge => CHARGE;
        /// Tokenizes a card.
        create_token => CREATE_TOKEN;
        /// Starts 3-D Secure authentication.
        initiate_3ds => INITIATE_3DS;
        /// Debits a Google Pay token.
        debit_by_google_pay => DEBIT_BY_GOOGLE_PAY;
        /// Converts a card to a token.
        convert_to_token => CONVERT_TO_TOKEN;
        /// Converts a card to a token without a validity check.
        convert_to_token_no_check => CONVERT_TO_TOKEN_NO_CHECK;
        /// Whether a card can be tokenized.
        check_credit_card_for_token => CHECK_CREDIT_CARD_FOR_TOKEN;
        /// Complete transaction data, filtered by `data`.
        get_complete_trans_data => GET_COMPLETE_TRANS_DATA;
        /// Issues an iCount invoice.
        create_icount_invoice => CREATE_ICOUNT_INVOICE;
        /// Issues an EZcount invoice.
        create_ezcount_invoice => CREATE_EZCOUNT_INVOICE;
        /// Issues a Payper invoice.
        create_payper_invoice => CREATE_PAYPER_INVOICE;
        /// Balance of a prepaid or gift card.
        check_card_balance => CHECK_CARD_BALANCE;
        /// Starts a bank transfer.
        initiate_bank_transfer => INITIATE_BANK_TRANSFER;
        /// Credit-plan debit.
        debit_credit_type => DEBIT_CREDIT_TYPE;
        /// Installments debit.
        debit_payments_type => DEBIT_PAYMENTS_TYPE;
        /// Credit-plan authorization.
        authorize_credit_type => AUTHORIZE_CREDIT_TYPE;
        /// Installments authorization.
        authorize_payments_type => AUTHORIZE_PAYMENTS_TYPE;
        /// Attaches a receipt to a debit.
        add_debit_trx_receipt => ADD_DEBIT_TRX_RECEIPT;
        /// Isracredit authorization.
        authorize_isracredit_card => AUTHORIZE_ISRACREDIT_CARD;
        /// Sends a broadcast to SHVA.
        broadcast_to_shva => BROADCAST_TO_SHVA;
        /// Ashrait check.
        check_ashrait => CHECK_ASHRAIT;
        /// Contactless debit.
        contact_less_debit => CONTACT_LESS_DEBIT;
        /// Internal-input debit.
        debit_by_int_in => DEBIT_BY_INT_IN;
        /// Internal-input EMV debit.
        debit_by_int_in_emv => DEBIT_BY_INT_IN_EMV;
        /// Isracredit debit.
        debit_isracredit_type => DEBIT_ISRACREDIT_TYPE;
        /// Deleted transactions.
        get_deleted_trans_data => GET_DELETED_TRANS_DATA;
        /// Statistics record.
        get_statis_record => GET_STATIS_RECORD;
        /// Track 2 data from PeleCloud.
        get_track2_by_pelecloud => GET_TRACK2_BY_PELECLOUD;
        /// Transaction data, filtered by `data`.
        get_trans_data => GET_TRANS_DATA;
        /// Report data before broadcast.
        get_trans_report_data_before_bc => GET_TRANS_REPORT_DATA_BEFORE_BC;
    }

    keyed_operations! {
        /// Voids an authorization.
        void(pelecard_transaction_id) => VOID;
        /// Current status of a transaction.
        get_transaction_status(pelecard_transaction_id) => GET_TRANSACTION_STATUS;
        /// 3-D Secure data of a transaction.
        get_3ds_data(pelecard_transaction_id) => GET_3DS_DATA;
        /// Transaction data by id.
        get_trans_data_by_trx_id(pelecard_transaction_id) => GET_TRANS_DATA_BY_TRX_ID;
        /// EMV details of a transaction.
        get_trans_details_emv(pelecard_transaction_id) => GET_TRANS_DETAILS_EMV;
        /// Cancels a transaction.
        cancel_transaction(pelecard_transaction_id) => CANCEL_TRANSACTION;
        /// Aborts a transaction.
        abort_transaction(pelecard_transaction_id) => ABORT_TRANSACTION;
        /// Deletes an approval.
        delete_ishur(pelecard_transaction_id) => DELETE_ISHUR;
        /// Deletes a transaction.
        delete_tran(pelecard_transaction_id) => DELETE_TRAN;
        /// Reverses an EMV transaction.
        emv_reversal(pelecard_transaction_id) => EMV_REVERSAL;
        /// Switch details of a transaction.
        get_trans_details_switch(pelecard_transaction_id) => GET_TRANS_DETAILS_SWITCH;
        /// Card details behind a token.
        retrieve_token(token) => RETRIEVE_TOKEN;
        /// Transaction by unique id.
        get_transaction(unique_id) => GET_TRANSACTION;
        /// Transaction by UID.
        get_transaction_by_uid(uid) => GET_TRANSACTION_BY_UID;
        /// Validates a transaction by unique key.
        validate_by_unique_key(unique_key) => VALIDATE_BY_UNIQUE_KEY;
        /// Hebrew text of an error code.
        get_error_message_he(error_code) => GET_ERROR_MESSAGE_HE;
        /// English text of an error code.
        get_error_message_en(error_code) => GET_ERROR_MESSAGE_EN;
        /// Whether a `ParamX` value is acceptable.
        check_good_param_x(param_x) => CHECK_GOOD_PARAM_X;
        /// EMV variant of [`Self::check_good_param_x`].
        check_good_param_x_emv(param_x) => CHECK_GOOD_PARAM_X_EMV;
        /// A single broadcast.
        get_broadcast(broadcast_id) => GET_BROADCAST;
        /// Transactions of one broadcast date.
        get_complete_trans_data_by_broadcast_date(broadcast_date) => GET_COMPLETE_TRANS_DATA_BY_BROADCAST_DATE;
        /// Transactions of one batch number.
        get_trans_data_by_ricuz_no(ricuz_no) => GET_TRANS_DATA_BY_RICUZ_NO;
    }

    bare_operations! {
        /// Ashrait version of the terminal.
        get_ashrait_version => GET_ASHRAIT_VERSION;
        /// Company phone number.
        get_company_phone_number => GET_COMPANY_PHONE_NUMBER;
        /// Supplier number.
        get_sapak_number => GET_SAPAK_NUMBER;
        /// Terminal substitutes.
        get_terminal_muhlafim => GET_TERMINAL_MUHLAFIM;
    }

    /// Refunds `amount` of a transaction, in the client currency unless given.
    ///
    /// # Errors
    ///
    /// Returns [`PelecardError`] if validation or the HTTP request fails.
    pub async fn refund(
        &self,
        pelecard_transaction_id: &str,
        amount: i64,
        currency: Option<&str>,
    ) -> Result<Response, PelecardError> {
        let request = Request::new()
            .set("pelecard_transaction_id", pelecard_transaction_id)
            .set("amount", amount)
            .set("currency", currency.unwrap_or(&self.currency));
        self.call(&endpoints::REFUND, request).await
    }

    /// Captures `amount` of an authorization.
    ///
    /// # Errors
    ///
    /// Returns [`PelecardError`] if validation or the HTTP request fails.
    pub async fn capture(
        &self,
        pelecard_transaction_id: &str,
        amount: i64,
    ) -> Result<Response, PelecardError> {
        let request = Request::new()
            .set("pelecard_transaction_id", pelecard_transaction_id)
            .set("amount", amount);
        self.call(&endpoints::CAPTURE, request).await
    }

    /// Charges a stored card token, in the client currency unless given.
    ///
    /// # Errors
    ///
    /// Returns [`PelecardError`] if validation or the HTTP request fails.
    pub async fn charge_token(
        &self,
        token: &str,
        amount: i64,
        currency: Option<&str>,
    ) -> Result<Response, PelecardError> {
        let request = Request::new()
            .set("token", token)
            .set("amount", amount)
            .set("currency", currency.unwrap_or(&self.currency));
        self.call(&endpoints::CHARGE_TOKEN, request).await
    }

    /// Replaces the card behind `token`.
    ///
    /// # Errors
    ///
    /// Returns [`PelecardError`] if validation or the HTTP request fails.
    pub async fn update_token(&self, token: &str, data: Request) -> Result<Response, PelecardError> {
        let request = Request::new().set("token", token).extend(data);
        self.call(&endpoints::UPDATE_TOKEN, request).await
    }

    /// Replaces the card behind `token` without a validity check.
    ///
    /// # Errors
    ///
    /// Returns [`PelecardError`] if validation or the HTTP request fails.
    pub async fn update_token_no_check(
        &self,
        token: &str,
        data: Request,
    ) -> Result<Response, PelecardError> {
        let request = Request::new().set("token", token).extend(data);
        self.call(&endpoints::UPDATE_TOKEN_NO_CHECK, request).await
    }

    /// Refunds a transaction by id, fully unless `amount` is given.
    ///
    /// # Errors
    ///
    /// Returns [`PelecardError`] if validation or the HTTP request fails.
    pub async fn refund_by_id(
        &self,
        pelecard_transaction_id: &str,
        amount: Option<i64>,
    ) -> Result<Response, PelecardError> {
        let request = Request::new()
            .set("pelecard_transaction_id", pelecard_transaction_id)
            .set_opt("amount", amount);
        self.call(&endpoints::REFUND_BY_ID, request).await
    }

    /// EMV refund by id, fully unless `amount` is given.
    ///
    /// # Errors
    ///
    /// Returns [`PelecardError`] if validation or the HTTP request fails.
    pub async fn refund_by_id_emv(
        &self,
        pelecard_transaction_id: &str,
        amount: Option<i64>,
    ) -> Result<Response, PelecardError> {
        let request = Request::new()
            .set("pelecard_transaction_id", pelecard_transaction_id)
            .set_opt("amount", amount);
        self.call(&endpoints::REFUND_BY_ID_EMV, request).await
    }

    /// Completes a partially approved transaction.
    ///
    /// # Errors
    ///
    /// Returns [`PelecardError`] if validation or the HTTP request fails.
    pub async fn complete_partial_approval(
        &self,
        pelecard_transaction_id: &str,
        amount: i64,
    ) -> Result<Response, PelecardError> {
        let request = Request::new()
            .set("pelecard_transaction_id", pelecard_transaction_id)
            .set("amount", amount);
        self.call(&endpoints::COMPLETE_PARTIAL_APPROVAL, request).await
    }

    /// Completes a debit started with a UID.
    ///
    /// # Errors
    ///
    /// Returns [`PelecardError`] if validation or the HTTP request fails.
    pub async fn complete_debit_by_uid(&self, uid: &str, amount: i64) -> Result<Response, PelecardError> {
        let request = Request::new().set("uid", uid).set("amount", amount);
        self.call(&endpoints::COMPLETE_DEBIT_BY_UID, request).await
    }

    /// Checks several `ParamX` values at once.
    ///
    /// # Errors
    ///
    /// Returns [`PelecardError`] if validation or the HTTP request fails.
    pub async fn check_good_param_x_list(
        &self,
        param_x_list: &[&str],
    ) -> Result<Response, PelecardError> {
        let request = Request::new().set("param_x_list", param_x_list.to_vec());
        self.call(&endpoints::CHECK_GOOD_PARAM_X_LIST, request).await
    }

    /// Broadcasts between two dates.
    ///
    /// # Errors
    ///
    /// Returns [`PelecardError`] if validation or the HTTP request fails.
    pub async fn get_broadcasts_by_date(
        &self,
        from_date: &str,
        to_date: &str,
    ) -> Result<Response, PelecardError> {
        let request = Request::new().set("from_date", from_date).set("to_date", to_date);
        self.call(&endpoints::GET_BROADCASTS_BY_DATE, request).await
    }

    /// Broadcast summary between two dates.
    ///
    /// # Errors
    ///
    /// Returns [`PelecardError`] if validation or the HTTP request fails.
    pub async fn get_broadcasts_summary_by_date(
        &self,
        from_date: &str,
        to_date: &str,
    ) -> Result<Response, PelecardError> {
        let request = Request::new().set("from_date", from_date).set("to_date", to_date);
        self.call(&endpoints::GET_BROADCASTS_SUMMARY_BY_DATE, request)
            .await
    }

    /// Text of an error code in `language`, or the client language.
    ///
    /// `en` selects English, anything else Hebrew.
    ///
    /// # Errors
    ///
    /// Returns [`PelecardError`] if validation or the HTTP request fails.
    pub async fn get_error_message(
        &self,
        error_code: &str,
        language: Option<&str>,
    ) -> Result<Response, PelecardError> {
        if language.unwrap_or(&self.language) == "en" {
            self.get_error_message_en(error_code).await
        } else {
            self.get_error_message_he(error_code).await
        }
    }
}

/// Copy of `payload` with sensitive values replaced by [`REDACTED`].
#[must_use]
pub fn sanitize(payload: &Map<String, Value>) -> Map<String, Value> {
    let mut sanitized = payload.clone();
    for key in SENSITIVE_KEYS {
        if let Some(value) = sanitized.get_mut(*key) {
            *value = Value::String(REDACTED.to_owned());
        }
    }
    sanitized
}

/// Records the outcome of a call on the current span.
#[cfg(feature = "telemetry")]
fn record_result_on_span(
    endpoint: &Endpoint,
    result: &Result<Response, PelecardError>,
    log_payloads: bool,
) {
    match result {
        Ok(response) => {
            tracing::Span::current().record("http.status_code", response.status_code());
            if log_payloads {
                tracing::debug!(
                    endpoint = endpoint.path,
                    status = response.status_code(),
                    payload = %serde_json::Value::Object(sanitize(response.data())),
                    "Pelecard API response"
                );
            }
        }
        Err(err) => {
            tracing::error!(
                endpoint = endpoint.path,
                code = err.code(),
                error = %err,
                "Pelecard API error"
            );
        }
    }
}

/// Records the outcome of a call on the current span.
/// Noop if telemetry feature is off.
#[cfg(not(feature = "telemetry"))]
const fn record_result_on_span(
    _endpoint: &Endpoint,
    _result: &Result<Response, PelecardError>,
    _log_payloads: bool,
) {
}
