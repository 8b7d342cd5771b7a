//! Payments: provider-accepted STK Push attempts against a bill.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle status of a payment.
///
/// `Pending` is the only non-terminal state; the callback reconciler moves
/// a payment to `Completed` or `Failed` exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum PaymentStatus {
    /// STK prompt accepted by the provider; awaiting the payer's response.
    Pending,
    /// Provider confirmed the money moved.
    Completed,
    /// Payer declined, timed out, or the provider reported an error.
    Failed,
}

impl PaymentStatus {
    /// String form used in persistence and API payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
        }
    }

    /// Whether this status admits no further transition.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A payment record, created only after Daraja has accepted an STK Push
/// initiation request.
///
/// `payment_reference` starts as the provider's transient
/// `CheckoutRequestID` — the join key the callback reconciler looks up —
/// and is overwritten with the permanent M-Pesa receipt number as part of
/// the `Pending → Completed` transition. Consuming the lookup key this way
/// is what makes a redelivered success callback resolve to "payment not
/// found" instead of a second state change.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Payment {
    pub id: Uuid,
    /// The bill this payment settles.
    pub bill_id: Uuid,
    /// The paying user; always the bill's owner.
    pub user_id: Uuid,
    /// Amount submitted to the provider, in KES.
    pub amount_paid: Decimal,
    /// Provider join key; rewritten to the receipt number on completion.
    pub payment_reference: String,
    /// Permanent M-Pesa transaction code, known only after completion.
    pub mpesa_receipt_number: Option<String>,
    pub status: PaymentStatus,
    /// When the initiation was accepted.
    pub paid_at: DateTime<Utc>,
}

impl Payment {
    /// Record a freshly accepted initiation in `Pending` state.
    pub fn pending(
        bill_id: Uuid,
        user_id: Uuid,
        amount_paid: Decimal,
        checkout_request_id: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            bill_id,
            user_id,
            amount_paid,
            payment_reference: checkout_request_id.into(),
            mpesa_receipt_number: None,
            status: PaymentStatus::Pending,
            paid_at: Utc::now(),
        }
    }
}
