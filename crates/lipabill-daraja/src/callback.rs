//! Strict schema for the STK Push result callback.
//!
//! Daraja delivers the asynchronous outcome of an initiation as a JSON
//! document nested under `Body.stkCallback`. Deserialization is strict:
//! a payload missing `CheckoutRequestID`, `ResultCode`, or `ResultDesc`
//! does not parse, and the webhook rejects it rather than guessing.

use serde::Deserialize;

/// Top-level callback document: `{ "Body": { "stkCallback": { ... } } }`.
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackEnvelope {
    #[serde(rename = "Body")]
    pub body: CallbackBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackBody {
    #[serde(rename = "stkCallback")]
    pub stk_callback: StkCallback,
}

/// The result of one STK Push, keyed by the `CheckoutRequestID` returned
/// at initiation time.
#[derive(Debug, Clone, Deserialize)]
pub struct StkCallback {
    #[serde(rename = "MerchantRequestID", default)]
    pub merchant_request_id: Option<String>,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    /// `0` means the payer completed the payment; anything else is a
    /// failure (cancelled prompt, insufficient funds, timeout, ...).
    #[serde(rename = "ResultCode")]
    pub result_code: i64,
    #[serde(rename = "ResultDesc")]
    pub result_desc: String,
    /// Present only on success.
    #[serde(rename = "CallbackMetadata", default)]
    pub callback_metadata: Option<CallbackMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackMetadata {
    #[serde(rename = "Item", default)]
    pub items: Vec<MetadataItem>,
}

/// One name/value pair from the success metadata. `Value` is absent for
/// some items (Daraja sends `Balance` with no value), hence the option.
#[derive(Debug, Clone, Deserialize)]
pub struct MetadataItem {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value", default)]
    pub value: Option<serde_json::Value>,
}

impl StkCallback {
    /// Whether the payer completed the payment.
    pub fn is_success(&self) -> bool {
        self.result_code == 0
    }

    /// The M-Pesa receipt number from the success metadata, if present.
    pub fn receipt_number(&self) -> Option<String> {
        let metadata = self.callback_metadata.as_ref()?;
        metadata
            .items
            .iter()
            .find(|item| item.name == "MpesaReceiptNumber")
            .and_then(|item| item.value.as_ref())
            .and_then(|value| value.as_str())
            .map(str::to_string)
    }
}
