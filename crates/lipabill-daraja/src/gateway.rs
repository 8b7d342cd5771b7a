//! The STK Push gateway abstraction and its scripted mock.

use async_trait::async_trait;
use lipabill_core::PaymentInstruction;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::DarajaError;

/// One STK Push to submit: the payer's phone, the amount, and the bill's
/// merchant instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StkPush {
    /// Whole KES. Daraja rejects fractional amounts.
    pub amount: i64,
    /// Destination phone in international format (`2547XXXXXXXX`).
    pub msisdn: String,
    /// Selects the transaction type and whether an account reference is sent.
    pub instruction: PaymentInstruction,
    /// Free-text `TransactionDesc` shown to the payer.
    pub description: String,
}

/// Result of a provider-acknowledged initiation attempt.
///
/// `Accepted` means "prompt is on its way to the payer's phone", not
/// "money moved" — the final outcome arrives later via the callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StkOutcome {
    /// Daraja accepted the request (`ResponseCode == "0"`).
    Accepted {
        /// Transient identifier echoed back in the result callback.
        checkout_request_id: String,
        /// Human-readable acknowledgement for the caller.
        customer_message: String,
    },
    /// Daraja rejected the request at the business level.
    Rejected {
        /// Provider's `ResponseDescription`.
        reason: String,
    },
}

/// Adapter trait over the STK Push provider.
///
/// Object-safe and `Send + Sync` so it can sit behind an `Arc` in shared
/// application state. Implementations make exactly one attempt per call;
/// retrying would risk double prompts on the payer's phone, so retry policy
/// deliberately does not live here.
#[async_trait]
pub trait StkGateway: Send + Sync {
    /// Submit one STK Push initiation request.
    async fn initiate(&self, push: &StkPush) -> Result<StkOutcome, DarajaError>;

    /// Human-readable adapter name, for logs.
    fn gateway_name(&self) -> &str;
}

/// Scripted mock gateway for tests.
///
/// Outcomes are served from a queue; when the queue is empty every push is
/// accepted with a deterministic `ws_CO_<n>` checkout request id. All
/// received pushes are recorded so tests can assert what was (or was not)
/// sent to the provider.
#[derive(Default)]
pub struct MockStkGateway {
    scripted: Mutex<VecDeque<Result<StkOutcome, DarajaError>>>,
    received: Mutex<Vec<StkPush>>,
    counter: AtomicU64,
}

impl MockStkGateway {
    /// A mock that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an outcome to serve for the next call.
    pub fn script(&self, outcome: Result<StkOutcome, DarajaError>) {
        self.scripted.lock().push_back(outcome);
    }

    /// Queue a business rejection for the next call.
    pub fn script_rejection(&self, reason: impl Into<String>) {
        self.script(Ok(StkOutcome::Rejected {
            reason: reason.into(),
        }));
    }

    /// Every push this mock has received, in order.
    pub fn received(&self) -> Vec<StkPush> {
        self.received.lock().clone()
    }
}

#[async_trait]
impl StkGateway for MockStkGateway {
    async fn initiate(&self, push: &StkPush) -> Result<StkOutcome, DarajaError> {
        self.received.lock().push(push.clone());
        if let Some(outcome) = self.scripted.lock().pop_front() {
            return outcome;
        }
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(StkOutcome::Accepted {
            checkout_request_id: format!("ws_CO_{n:06}"),
            customer_message: "Success. Request accepted for processing".into(),
        })
    }

    fn gateway_name(&self) -> &str {
        "MockStkGateway"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push(amount: i64) -> StkPush {
        StkPush {
            amount,
            msisdn: "254712345678".into(),
            instruction: PaymentInstruction::Paybill {
                paybill_number: "888880".into(),
                account_number: "ACC-1".into(),
            },
            description: "Payment of water bill".into(),
        }
    }

    #[tokio::test]
    async fn mock_accepts_by_default_with_unique_ids() {
        let gateway = MockStkGateway::new();
        let first = gateway.initiate(&push(100)).await.expect("accepted");
        let second = gateway.initiate(&push(200)).await.expect("accepted");
        let ids: Vec<String> = [first, second]
            .into_iter()
            .map(|o| match o {
                StkOutcome::Accepted {
                    checkout_request_id,
                    ..
                } => checkout_request_id,
                StkOutcome::Rejected { .. } => panic!("unexpected rejection"),
            })
            .collect();
        assert_ne!(ids[0], ids[1]);
    }

    #[tokio::test]
    async fn mock_serves_scripted_outcomes_in_order() {
        let gateway = MockStkGateway::new();
        gateway.script_rejection("insufficient balance");
        gateway.script(Err(DarajaError::Timeout { elapsed_secs: 30 }));

        let first = gateway.initiate(&push(100)).await.expect("business-level");
        assert!(matches!(first, StkOutcome::Rejected { .. }));

        let second = gateway.initiate(&push(100)).await;
        assert!(matches!(second, Err(DarajaError::Timeout { .. })));

        // Queue drained — back to accepting.
        let third = gateway.initiate(&push(100)).await.expect("accepted");
        assert!(matches!(third, StkOutcome::Accepted { .. }));
    }

    #[tokio::test]
    async fn mock_records_received_pushes() {
        let gateway = MockStkGateway::new();
        gateway.initiate(&push(100)).await.expect("accepted");
        gateway.initiate(&push(250)).await.expect("accepted");
        let received = gateway.received();
        assert_eq!(received.len(), 2);
        assert_eq!(received[0].amount, 100);
        assert_eq!(received[1].amount, 250);
    }

    #[test]
    fn gateway_trait_is_object_safe() {
        let gateway: Box<dyn StkGateway> = Box::new(MockStkGateway::new());
        assert_eq!(gateway.gateway_name(), "MockStkGateway");
    }
}
