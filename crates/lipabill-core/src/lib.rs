//! # lipabill-core — Domain Types
//!
//! Shared domain model for the lipabill bill-payment backend.
//!
//! ## Contents
//!
//! - [`Bill`] / [`BillStatus`] — a payable obligation owned by a user
//! - [`PaymentInstruction`] — tagged Paybill/Till merchant instruction
//! - [`Payment`] / [`PaymentStatus`] — a provider-accepted STK Push attempt
//! - [`User`] — payer record (source of the destination phone number)
//! - [`phone::normalize_msisdn`] — local → international phone formatting
//!
//! ## Crate Policy
//!
//! - No I/O, no async, no HTTP types. Pure data and pure functions.
//! - State transitions (Pending → Completed/Failed, Pending → Paid) are
//!   enforced by the persistence layer, not here; this crate only makes
//!   invalid *shapes* unrepresentable (e.g. a bill cannot carry both a
//!   Paybill and a Till instruction).

pub mod bill;
pub mod payment;
pub mod phone;
pub mod user;

pub use bill::{Bill, BillStatus, PaymentInstruction};
pub use payment::{Payment, PaymentStatus};
pub use phone::normalize_msisdn;
pub use user::User;

use thiserror::Error;

/// Validation failures when constructing domain values.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A money amount was zero or negative.
    #[error("amount must be positive, got {amount}")]
    NonPositiveAmount {
        /// The offending amount, as supplied.
        amount: rust_decimal::Decimal,
    },

    /// A required text field was empty.
    #[error("{field} must be non-empty")]
    EmptyField {
        /// Name of the offending field.
        field: &'static str,
    },
}
