//! # Payment Orchestrator
//!
//! Turns an authenticated "pay this bill" request into an STK Push
//! initiation and a `Pending` payment row. Three variants: single bill,
//! explicit multi-bill, and all of the user's pending bills.
//!
//! ## Batch semantics
//!
//! Ownership is checked for the whole set before any provider call is
//! made (fail fast, no side effects). After that, each bill gets its own
//! provider call — every bill carries its own payment instruction
//! (Paybill vs Till), so amounts cannot be aggregated into one prompt.
//! A failure partway through must not abandon prompts already in flight
//! on the payer's phone: per-bill failures are recorded and every
//! accepted initiation is committed, in one transaction, at the end.
//! Partial success is a first-class outcome, not an error.

use lipabill_core::{normalize_msisdn, Bill, Payment, User};
use lipabill_daraja::{StkGateway, StkOutcome, StkPush};
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AppError;
use crate::store::BillingStore;

/// One bill that could not be initiated within a batch.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BillFailure {
    pub bill_id: Uuid,
    pub reason: String,
}

/// Result of a batch initiation: the payments that were accepted and
/// persisted, and the bills that failed.
#[derive(Debug, Serialize, ToSchema)]
pub struct BatchOutcome {
    pub initiated: Vec<Payment>,
    pub failures: Vec<BillFailure>,
}

impl BatchOutcome {
    /// A batch where nothing succeeded is reported to the caller as an
    /// overall failure (502) with the same structured body.
    pub fn is_total_failure(&self) -> bool {
        self.initiated.is_empty()
    }
}

/// Pay a single bill. On provider acceptance, exactly one `Pending`
/// payment row is written, referenced by the provider's checkout request
/// id. On rejection or infrastructure failure nothing is written.
pub async fn pay_one(
    store: &dyn BillingStore,
    gateway: &dyn StkGateway,
    user_id: Uuid,
    bill_id: Uuid,
) -> Result<Payment, AppError> {
    let bill = store
        .bill_for_user(bill_id, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("bill {bill_id} not found")))?;
    let user = load_payer(store, user_id).await?;

    let push = build_push(&bill, &user)?;
    match gateway.initiate(&push).await? {
        StkOutcome::Accepted {
            checkout_request_id,
            ..
        } => {
            let payment = Payment::pending(bill.id, user.id, bill.amount, checkout_request_id);
            store.insert_payments(std::slice::from_ref(&payment)).await?;
            tracing::info!(
                bill_id = %bill.id,
                reference = %payment.payment_reference,
                "payment initiated"
            );
            Ok(payment)
        }
        StkOutcome::Rejected { reason } => Err(AppError::UpstreamRejected(reason)),
    }
}

/// Pay an explicit set of bills. The whole request fails before any
/// provider call if any id is duplicated, absent, or owned by someone
/// else.
pub async fn pay_multiple(
    store: &dyn BillingStore,
    gateway: &dyn StkGateway,
    user_id: Uuid,
    bill_ids: &[Uuid],
) -> Result<BatchOutcome, AppError> {
    if bill_ids.is_empty() {
        return Err(AppError::Validation("bill_ids must be non-empty".into()));
    }
    // The request is a set: a duplicated id would otherwise count twice
    // and could double-prompt the payer for the same bill.
    let mut seen = std::collections::HashSet::with_capacity(bill_ids.len());
    if !bill_ids.iter().all(|id| seen.insert(id)) {
        return Err(AppError::Validation("bill_ids contains duplicate ids".into()));
    }

    let bills = store.bills_for_user(bill_ids, user_id).await?;
    if bills.len() != bill_ids.len() {
        return Err(AppError::NotFound(format!(
            "{} of {} bills not found or not owned by the caller",
            bill_ids.len() - bills.len(),
            bill_ids.len()
        )));
    }

    let user = load_payer(store, user_id).await?;
    initiate_batch(store, gateway, &user, &bills).await
}

/// Pay all of the user's pending bills. Fails with 404 before contacting
/// the provider when there is nothing to pay.
pub async fn pay_all(
    store: &dyn BillingStore,
    gateway: &dyn StkGateway,
    user_id: Uuid,
) -> Result<BatchOutcome, AppError> {
    let bills = store.pending_bills(user_id).await?;
    if bills.is_empty() {
        return Err(AppError::NotFound("no pending bills".into()));
    }

    let user = load_payer(store, user_id).await?;
    initiate_batch(store, gateway, &user, &bills).await
}

/// One provider call per bill; accepted initiations accumulate and are
/// committed together at the end.
async fn initiate_batch(
    store: &dyn BillingStore,
    gateway: &dyn StkGateway,
    user: &User,
    bills: &[Bill],
) -> Result<BatchOutcome, AppError> {
    let mut initiated = Vec::new();
    let mut failures = Vec::new();

    for bill in bills {
        let push = match build_push(bill, user) {
            Ok(push) => push,
            Err(err) => {
                failures.push(BillFailure {
                    bill_id: bill.id,
                    reason: err.to_string(),
                });
                continue;
            }
        };
        match gateway.initiate(&push).await {
            Ok(StkOutcome::Accepted {
                checkout_request_id,
                ..
            }) => {
                initiated.push(Payment::pending(
                    bill.id,
                    user.id,
                    bill.amount,
                    checkout_request_id,
                ));
            }
            Ok(StkOutcome::Rejected { reason }) => {
                failures.push(BillFailure {
                    bill_id: bill.id,
                    reason,
                });
            }
            Err(err) => {
                tracing::warn!(bill_id = %bill.id, error = %err, "initiation failed mid-batch");
                failures.push(BillFailure {
                    bill_id: bill.id,
                    reason: err.to_string(),
                });
            }
        }
    }

    // Prompts for the accepted subset are already on the payer's phone;
    // their payment rows must be committed even when other bills failed.
    if !initiated.is_empty() {
        store.insert_payments(&initiated).await?;
    }
    tracing::info!(
        initiated = initiated.len(),
        failed = failures.len(),
        "batch initiation finished"
    );

    Ok(BatchOutcome {
        initiated,
        failures,
    })
}

/// The caller is authenticated, so a missing user row is a referential
/// integrity fault, not a client error.
async fn load_payer(store: &dyn BillingStore, user_id: Uuid) -> Result<User, AppError> {
    store
        .user(user_id)
        .await?
        .ok_or_else(|| AppError::Integrity(format!("authenticated user {user_id} has no record")))
}

fn build_push(bill: &Bill, user: &User) -> Result<StkPush, AppError> {
    // Daraja takes whole shillings; fractional amounts are truncated the
    // same way at initiation and at reconciliation.
    let amount = bill
        .amount
        .trunc()
        .to_i64()
        .filter(|amount| *amount > 0)
        .ok_or_else(|| {
            AppError::Validation(format!(
                "bill {} amount {} does not truncate to a positive whole amount",
                bill.id, bill.amount
            ))
        })?;
    Ok(StkPush {
        amount,
        msisdn: normalize_msisdn(&user.phone),
        instruction: bill.instruction.clone(),
        description: format!("Payment of {} bill", bill.bill_type),
    })
}
