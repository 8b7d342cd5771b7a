//! # Callback Reconciler
//!
//! Applies the provider's asynchronous STK Push result to the matching
//! payment and its bill. The webhook is unauthenticated (the provider
//! cannot present this service's bearer token) and delivery is
//! at-least-once, so reconciliation must be safe to invoke repeatedly
//! with the same payload.
//!
//! ## Idempotence
//!
//! The lookup key is `payment_reference`, which a successful
//! reconciliation rewrites to the permanent receipt number. A redelivered
//! success callback therefore no longer finds the payment and resolves to
//! a definitive 404 instead of a second state change. Payments found in a
//! terminal state (failure redelivery, or a success without a receipt to
//! rewrite) are reported as a 409 conflict without reapplying the
//! transition.

use lipabill_core::Payment;
use lipabill_daraja::StkCallback;

use crate::error::AppError;
use crate::store::BillingStore;

/// What a callback did to the matching payment.
#[derive(Debug)]
pub enum ReconcileOutcome {
    /// The payer completed the payment: payment `Completed`, reference
    /// rewritten to the receipt, bill `Paid` — all in one transaction.
    Completed(Payment),
    /// The payer declined or the prompt expired: payment `Failed`, bill
    /// left `Pending` so the payer can retry. Carries the provider's
    /// `ResultDesc` for the webhook response.
    Failed {
        payment: Payment,
        result_desc: String,
    },
}

/// Apply one parsed callback. Parsing happened at the route boundary;
/// a payload that reaches here is structurally complete.
pub async fn reconcile(
    store: &dyn BillingStore,
    callback: &StkCallback,
) -> Result<ReconcileOutcome, AppError> {
    let payment = store
        .payment_by_reference(&callback.checkout_request_id)
        .await?
        .ok_or_else(|| {
            // Unknown references get a definitive 404, never a 500 — a
            // permanently unresolvable callback must not make the
            // provider retry forever.
            AppError::NotFound(format!(
                "no payment with reference {}",
                callback.checkout_request_id
            ))
        })?;

    if callback.is_success() {
        let receipt = callback.receipt_number();
        let completed = store
            .complete_payment(payment.id, receipt.as_deref())
            .await?;
        tracing::info!(
            payment_id = %completed.id,
            bill_id = %completed.bill_id,
            receipt = completed.mpesa_receipt_number.as_deref().unwrap_or("-"),
            "payment completed"
        );
        Ok(ReconcileOutcome::Completed(completed))
    } else {
        let failed = store.fail_payment(payment.id).await?;
        tracing::warn!(
            payment_id = %failed.id,
            result_code = callback.result_code,
            result_desc = %callback.result_desc,
            "payment failed"
        );
        Ok(ReconcileOutcome::Failed {
            payment: failed,
            result_desc: callback.result_desc.clone(),
        })
    }
}
