//! HTTP route handlers.
//!
//! Payment initiation and history are authenticated; the provider
//! callback is mounted outside the auth middleware (the provider cannot
//! present this service's bearer token).

pub mod callback;
pub mod history;
pub mod payments;
