//! # Billing Store
//!
//! The persistent store is the only shared mutable resource in the
//! system. [`BillingStore`] is the unit-of-work boundary: every operation
//! that touches more than one row happens inside one store call and is
//! committed or rolled back as a whole.
//!
//! Two implementations:
//!
//! - [`MemoryStore`] — a single `parking_lot::RwLock` over all tables,
//!   used when `DATABASE_URL` is not set (development and tests).
//! - [`PgStore`] — SQLx Postgres with explicit transactions and embedded
//!   migrations.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use lipabill_core::{Bill, Payment, PaymentStatus, User};
use thiserror::Error;
use uuid::Uuid;

/// Failures from the billing store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No payment matches the given id or reconciliation reference.
    #[error("payment {0} not found")]
    PaymentNotFound(String),

    /// A payment references a bill that no longer exists. The enclosing
    /// transaction has been rolled back.
    #[error("bill {0} referenced by payment is missing")]
    BillMissing(Uuid),

    /// The payment already reached a terminal state; the transition was
    /// not reapplied.
    #[error("payment {payment_id} is already {status}")]
    AlreadyReconciled {
        payment_id: Uuid,
        status: PaymentStatus,
    },

    /// Underlying database failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Async store abstraction over users, bills, and payments.
///
/// Object-safe so it can sit behind an `Arc<dyn BillingStore>` in shared
/// application state.
#[async_trait]
pub trait BillingStore: Send + Sync {
    async fn insert_user(&self, user: &User) -> Result<(), StoreError>;

    async fn insert_bill(&self, bill: &Bill) -> Result<(), StoreError>;

    /// Fetch a user by id.
    async fn user(&self, user_id: Uuid) -> Result<Option<User>, StoreError>;

    /// Fetch a bill by id, scoped to its owner. A bill owned by someone
    /// else is indistinguishable from an absent one.
    async fn bill_for_user(&self, bill_id: Uuid, user_id: Uuid)
        -> Result<Option<Bill>, StoreError>;

    /// Fetch the subset of `bill_ids` owned by `user_id`. Callers compare
    /// the returned count against the requested count to detect ownership
    /// mismatches.
    async fn bills_for_user(
        &self,
        bill_ids: &[Uuid],
        user_id: Uuid,
    ) -> Result<Vec<Bill>, StoreError>;

    /// All of the user's bills still in `Pending` status.
    async fn pending_bills(&self, user_id: Uuid) -> Result<Vec<Bill>, StoreError>;

    /// Insert a batch of payment rows in a single transaction. All rows
    /// commit or none do.
    async fn insert_payments(&self, payments: &[Payment]) -> Result<(), StoreError>;

    /// Look up a payment by its reconciliation reference (the provider's
    /// checkout request id, or the receipt number after completion).
    async fn payment_by_reference(&self, reference: &str)
        -> Result<Option<Payment>, StoreError>;

    /// Atomically complete a pending payment and mark its bill paid.
    ///
    /// Within one transaction: verifies the payment is still `Pending`
    /// (else [`StoreError::AlreadyReconciled`]), marks it `Completed`,
    /// rewrites `payment_reference` to `receipt` and backfills
    /// `mpesa_receipt_number` when a receipt is present, and transitions
    /// the referenced bill to `Paid`. A missing bill rolls the whole
    /// transaction back ([`StoreError::BillMissing`]) and the payment
    /// stays `Pending`.
    async fn complete_payment(
        &self,
        payment_id: Uuid,
        receipt: Option<&str>,
    ) -> Result<Payment, StoreError>;

    /// Transition a pending payment to `Failed`. Terminal payments are
    /// not reapplied ([`StoreError::AlreadyReconciled`]).
    async fn fail_payment(&self, payment_id: Uuid) -> Result<Payment, StoreError>;

    /// The user's most recent payments, newest first, each with its bill
    /// when the bill still exists.
    async fn recent_payments(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<(Payment, Option<Bill>)>, StoreError>;
}
