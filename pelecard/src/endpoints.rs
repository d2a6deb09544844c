//! Gateway operation descriptors.
//!
//! Each Pelecard service operation is described by an [`Endpoint`]: the
//! operation name used in code and on the command line, the gateway path,
//! and the snake_case fields that must be present. [`ENDPOINTS`] lists every
//! operation and [`endpoint_by_name`] looks one up.

use std::fmt;

/// A gateway service operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    /// snake_case operation name (e.g. `"charge"`).
    pub name: &'static str,
    /// Path relative to the gateway base URL (e.g. `"DebitRegularType"`).
    pub path: &'static str,
    /// snake_case fields that must be present and non-empty.
    pub required: &'static [&'static str],
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (/{})", self.name, self.path)
    }
}

macro_rules! endpoints {
    ($( $(#[$doc:meta])* $konst:ident => $name:literal, $path:literal, [$($req:literal),* $(,)?]; )*) => {
        $(
            $(#[$doc])*
            pub const $konst: Endpoint = Endpoint {
                name: $name,
                path: $path,
                required: &[$($req),*],
            };
        )*

        /// Every gateway operation, in declaration order.
        pub const ENDPOINTS: &[Endpoint] = &[$($konst),*];
    };
}

endpoints! {
    /// Authorize a card without capturing funds.
    AUTHORIZE => "authorize", "AuthorizeCreditCard",
        ["amount", "currency", "card_number", "expiry_month", "expiry_year", "cvv"];
    /// Regular debit (J4).
    CHARGE => "charge", "DebitRegularType", ["amount", "currency"];
    /// Refund (credit) a transaction.
    REFUND => "refund", "CreditTransaction", ["pelecard_transaction_id", "amount", "currency"];
    /// Void an authorization.
    VOID => "void", "VoidTransaction", ["pelecard_transaction_id"];
    /// Capture a pre-authorized amount.
    CAPTURE => "capture", "CaptureTransaction", ["pelecard_transaction_id", "amount"];
    /// Status of a transaction.
    GET_TRANSACTION_STATUS => "get_transaction_status", "GetTransactionStatus",
        ["pelecard_transaction_id"];
    /// Create a card token for recurring charges.
    CREATE_TOKEN => "create_token", "CreateToken", ["card_number", "expiry_month", "expiry_year"];
    /// Charge a stored token.
    CHARGE_TOKEN => "charge_token", "ChargeToken", ["token", "amount", "currency"];
    /// Start 3-D Secure authentication.
    INITIATE_3DS => "initiate_3ds", "Initiate3DSAuthenticationProcess",
        ["amount", "currency", "card_number", "expiry_month", "expiry_year"];
    /// 3-D Secure data of a transaction.
    GET_3DS_DATA => "get_3ds_data", "Get3dsData", ["pelecard_transaction_id"];
    /// Debit with a Google Pay token.
    DEBIT_BY_GOOGLE_PAY => "debit_by_google_pay", "DebitByGooglePay",
        ["amount", "currency", "google_pay_token"];
    /// Convert a card to a token after a validity check.
    CONVERT_TO_TOKEN => "convert_to_token", "ConvertToToken",
        ["card_number", "expiry_month", "expiry_year"];
    /// Convert a card to a token without a validity check.
    CONVERT_TO_TOKEN_NO_CHECK => "convert_to_token_no_check", "ConvertToTokenNoCheck",
        ["card_number", "expiry_month", "expiry_year"];
    /// Card details behind a token.
    RETRIEVE_TOKEN => "retrieve_token", "RetrieveToken", ["token"];
    /// Update the card behind a token.
    UPDATE_TOKEN => "update_token", "UpdateToken", ["token"];
    /// Update the card behind a token without a validity check.
    UPDATE_TOKEN_NO_CHECK => "update_token_no_check", "UpdateTokenNoCheck", ["token"];
    /// Whether a card can be tokenized.
    CHECK_CREDIT_CARD_FOR_TOKEN => "check_credit_card_for_token", "CheckCreditCardForToken",
        ["card_number"];
    /// Transaction by unique id.
    GET_TRANSACTION => "get_transaction", "GetTransaction", ["unique_id"];
    /// Transaction by UID.
    GET_TRANSACTION_BY_UID => "get_transaction_by_uid", "GetTransactionByUid", ["uid"];
    /// Complete transaction data, filtered.
    GET_COMPLETE_TRANS_DATA => "get_complete_trans_data", "GetCompleteTransData", [];
    /// Transaction data by transaction id.
    GET_TRANS_DATA_BY_TRX_ID => "get_trans_data_by_trx_id", "GetTransDataByTrxId",
        ["pelecard_transaction_id"];
    /// EMV transaction details.
    GET_TRANS_DETAILS_EMV => "get_trans_details_emv", "GetTransDetailsEMV",
        ["pelecard_transaction_id"];
    /// Refund by transaction id, optionally partial.
    REFUND_BY_ID => "refund_by_id", "RefundByID", ["pelecard_transaction_id"];
    /// EMV refund by transaction id, optionally partial.
    REFUND_BY_ID_EMV => "refund_by_id_emv", "RefundByIdEmv", ["pelecard_transaction_id"];
    /// Cancel a transaction.
    CANCEL_TRANSACTION => "cancel_transaction", "CancelTransaction", ["pelecard_transaction_id"];
    /// Issue an iCount invoice.
    CREATE_ICOUNT_INVOICE => "create_icount_invoice", "CreateICountInvoice", [];
    /// Issue an EZCount invoice.
    CREATE_EZCOUNT_INVOICE => "create_ezcount_invoice", "CreateEZCountInvoice", [];
    /// Issue a Payper invoice.
    CREATE_PAYPER_INVOICE => "create_payper_invoice", "CreatePayperInvoice", [];
    /// Balance of a prepaid card.
    CHECK_CARD_BALANCE => "check_card_balance", "CheckCardBalance", ["card_number"];
    /// Validate a transaction by unique key.
    VALIDATE_BY_UNIQUE_KEY => "validate_by_unique_key", "ValidateByUniqueKey", ["unique_key"];
    /// Complete a partially approved transaction.
    COMPLETE_PARTIAL_APPROVAL => "complete_partial_approval", "CompletePartialApproval",
        ["pelecard_transaction_id", "amount"];
    /// Start a bank transfer.
    INITIATE_BANK_TRANSFER => "initiate_bank_transfer", "InitiateBankTransfer", [];
    /// Credit-type debit (J4).
    DEBIT_CREDIT_TYPE => "debit_credit_type", "DebitCreditType", ["amount", "currency"];
    /// Installments debit (J4).
    DEBIT_PAYMENTS_TYPE => "debit_payments_type", "DebitPaymentsType",
        ["amount", "currency", "payments"];
    /// Credit-type authorization (J5).
    AUTHORIZE_CREDIT_TYPE => "authorize_credit_type", "AuthorizeCreditType", ["amount", "currency"];
    /// Installments authorization (J5).
    AUTHORIZE_PAYMENTS_TYPE => "authorize_payments_type", "AuthorizePaymentsType",
        ["amount", "currency", "payments"];
    /// Error message text in Hebrew.
    GET_ERROR_MESSAGE_HE => "get_error_message_he", "GetErrorMessage", ["error_code"];
    /// Error message text in English.
    GET_ERROR_MESSAGE_EN => "get_error_message_en", "GetErrorMessageEN", ["error_code"];
    /// Abort a transaction.
    ABORT_TRANSACTION => "abort_transaction", "AbortTransaction", ["pelecard_transaction_id"];
    /// Attach a receipt to a debit.
    ADD_DEBIT_TRX_RECEIPT => "add_debit_trx_receipt", "AddDebitTrxReceipt", [];
    /// Isracard authorization (J5).
    AUTHORIZE_ISRACREDIT_CARD => "authorize_isracredit_card", "AuthorizeIsracreditCard",
        ["amount", "currency"];
    /// Broadcast pending transactions to Shva.
    BROADCAST_TO_SHVA => "broadcast_to_shva", "BroadcastToShva", [];
    /// Ashrait check.
    CHECK_ASHRAIT => "check_ashrait", "CheckAshrait", [];
    /// Whether a ParamX value was used by a good transaction.
    CHECK_GOOD_PARAM_X => "check_good_param_x", "CheckGoodParamX", ["param_x"];
    /// EMV variant of [`CHECK_GOOD_PARAM_X`].
    CHECK_GOOD_PARAM_X_EMV => "check_good_param_x_emv", "CheckGoodParamXEMV", ["param_x"];
    /// Batch variant of [`CHECK_GOOD_PARAM_X`].
    CHECK_GOOD_PARAM_X_LIST => "check_good_param_x_list", "CheckGoodParamXList", ["param_x_list"];
    /// Complete a debit by UID.
    COMPLETE_DEBIT_BY_UID => "complete_debit_by_uid", "CompleteDebitByUid", ["uid", "amount"];
    /// Contactless debit.
    CONTACT_LESS_DEBIT => "contact_less_debit", "ContactLessDebit", ["amount", "currency"];
    /// Debit by IntIn.
    DEBIT_BY_INT_IN => "debit_by_int_in", "DebitByIntIn", ["amount", "currency"];
    /// EMV debit by IntIn.
    DEBIT_BY_INT_IN_EMV => "debit_by_int_in_emv", "DebitByIntInEmv", ["amount", "currency"];
    /// Isracard debit (J4).
    DEBIT_ISRACREDIT_TYPE => "debit_isracredit_type", "DebitIsracreditType", ["amount", "currency"];
    /// Delete an authorization (ishur).
    DELETE_ISHUR => "delete_ishur", "DeleteIshur", ["pelecard_transaction_id"];
    /// Delete a transaction.
    DELETE_TRAN => "delete_tran", "DeleteTran", ["pelecard_transaction_id"];
    /// EMV reversal.
    EMV_REVERSAL => "emv_reversal", "EmvReversal", ["pelecard_transaction_id"];
    /// Ashrait protocol version.
    GET_ASHRAIT_VERSION => "get_ashrait_version", "GetAshraitVersion", [];
    /// A single broadcast.
    GET_BROADCAST => "get_broadcast", "GetBroadcast", ["broadcast_id"];
    /// Broadcasts in a date range.
    GET_BROADCASTS_BY_DATE => "get_broadcasts_by_date", "GetBroadcastsByDate",
        ["from_date", "to_date"];
    /// Broadcast summaries in a date range.
    GET_BROADCASTS_SUMMARY_BY_DATE => "get_broadcasts_summary_by_date",
        "GetBroadcastsSummaryByDate", ["from_date", "to_date"];
    /// Card company phone number.
    GET_COMPANY_PHONE_NUMBER => "get_company_phone_number", "GetCompanyPhoneNumber", [];
    /// Complete transaction data of a broadcast date.
    GET_COMPLETE_TRANS_DATA_BY_BROADCAST_DATE => "get_complete_trans_data_by_broadcast_date",
        "GetCompleteTransDataByBroadcastDate", ["broadcast_date"];
    /// Deleted transaction data, filtered.
    GET_DELETED_TRANS_DATA => "get_deleted_trans_data", "GetDeletedTransData", [];
    /// Supplier (sapak) number of the terminal.
    GET_SAPAK_NUMBER => "get_sapak_number", "GetSapakNumber", [];
    /// Statistics record, filtered.
    GET_STATIS_RECORD => "get_statis_record", "GetStatisRecord", [];
    /// Alternate terminals (muhlafim).
    GET_TERMINAL_MUHLAFIM => "get_terminal_muhlafim", "GetTerminalMuhlafim", [];
    /// Track2 data by Pelecloud (J20).
    GET_TRACK2_BY_PELECLOUD => "get_track2_by_pelecloud", "GetTrack2ByPelecloud", [];
    /// Transaction data, filtered.
    GET_TRANS_DATA => "get_trans_data", "GetTransData", [];
    /// Transaction data by ricuz (batch) number.
    GET_TRANS_DATA_BY_RICUZ_NO => "get_trans_data_by_ricuz_no", "GetTransDataByRicuzNo",
        ["ricuz_no"];
    /// Switch transaction details.
    GET_TRANS_DETAILS_SWITCH => "get_trans_details_switch", "GetTransDetailsSwitch",
        ["pelecard_transaction_id"];
    /// Transaction report data before broadcast.
    GET_TRANS_REPORT_DATA_BEFORE_BC => "get_trans_report_data_before_bc",
        "GetTransReportDataBeforeBc", [];
}

/// Looks up an endpoint by operation name or by gateway path.
#[must_use]
pub fn endpoint_by_name(name: &str) -> Option<&'static Endpoint> {
    ENDPOINTS
        .iter()
        .find(|e| e.name == name || e.path.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_names_and_paths_unique() {
        let names: HashSet<_> = ENDPOINTS.iter().map(|e| e.name).collect();
        let paths: HashSet<_> = ENDPOINTS.iter().map(|e| e.path).collect();
        assert_eq!(names.len(), ENDPOINTS.len());
        assert_eq!(paths.len(), ENDPOINTS.len());
    }

    #[test]
    fn test_lookup_by_name_and_path() {
        assert_eq!(endpoint_by_name("charge"), Some(&CHARGE));
        assert_eq!(endpoint_by_name("DebitRegularType"), Some(&CHARGE));
        assert_eq!(endpoint_by_name("getransdetailsemv"), None);
        assert_eq!(endpoint_by_name("gettransdetailsemv"), Some(&GET_TRANS_DETAILS_EMV));
        assert_eq!(endpoint_by_name("nope"), None);
    }

    #[test]
    fn test_required_fields() {
        assert_eq!(
            AUTHORIZE.required,
            ["amount", "currency", "card_number", "expiry_month", "expiry_year", "cvv"]
        );
        assert!(GET_ASHRAIT_VERSION.required.is_empty());
        assert_eq!(DEBIT_PAYMENTS_TYPE.required, ["amount", "currency", "payments"]);
    }

    #[test]
    fn test_display() {
        assert_eq!(CHARGE.to_string(), "charge (/DebitRegularType)");
    }
}
