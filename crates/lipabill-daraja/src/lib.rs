//! # lipabill-daraja — Safaricom Daraja Client
//!
//! Typed client for the two Daraja endpoints this system touches:
//!
//! - **OAuth token** — `GET /oauth/v1/generate?grant_type=client_credentials`
//!   with Basic auth, exchanged per request (no token caching).
//! - **STK Push** — `POST /mpesa/stkpush/v1/processrequest` with the
//!   short-lived bearer token, triggering a payment prompt on the payer's
//!   phone.
//!
//! ## Architecture
//!
//! The [`StkGateway`] trait abstracts over the provider. Production uses
//! [`HttpStkGateway`] (reqwest, bounded timeout, single attempt); tests use
//! [`MockStkGateway`]. A `ResponseCode` other than `"0"` is a *business*
//! rejection and comes back as [`StkOutcome::Rejected`], never as an error;
//! only infrastructure failures (auth, network, timeout) are [`DarajaError`].
//!
//! ## Callback
//!
//! The asynchronous result of an STK Push arrives later at an application
//! webhook. [`callback`] holds the strict schema for that payload; parsing
//! it is the webhook's job, so the types live here next to the request
//! types they mirror.

pub mod callback;
pub mod client;
pub mod config;
pub mod gateway;

pub use callback::{CallbackEnvelope, StkCallback};
pub use client::HttpStkGateway;
pub use config::{DarajaConfig, DarajaEnvironment};
pub use gateway::{MockStkGateway, StkGateway, StkOutcome, StkPush};

use thiserror::Error;

/// Infrastructure failures talking to Daraja.
///
/// Business-level rejections are not errors — see [`StkOutcome::Rejected`].
#[derive(Debug, Error)]
pub enum DarajaError {
    /// Credential exchange failed: network error or non-2xx from the token
    /// endpoint.
    #[error("Daraja auth failure: {reason}")]
    AuthFailure {
        /// What went wrong, for logs. Never shown to end users.
        reason: String,
    },

    /// The STK Push request itself failed at the transport/HTTP level.
    #[error("Daraja request failure: {reason}")]
    RequestFailure {
        /// What went wrong, for logs.
        reason: String,
    },

    /// The request exceeded the configured client timeout.
    #[error("Daraja request timed out after {elapsed_secs}s")]
    Timeout {
        /// Configured timeout that was exceeded.
        elapsed_secs: u64,
    },

    /// Required configuration is missing or malformed.
    #[error("Daraja client not configured: {reason}")]
    NotConfigured {
        /// Which piece of configuration is missing.
        reason: String,
    },
}
