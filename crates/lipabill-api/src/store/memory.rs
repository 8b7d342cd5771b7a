//! In-memory billing store.
//!
//! A single `RwLock` guards all tables, so every store call observes and
//! mutates a consistent snapshot. The lock is never held across an
//! `.await`; all methods complete synchronously inside the guard.

use async_trait::async_trait;
use lipabill_core::{Bill, BillStatus, Payment, PaymentStatus, User};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use super::{BillingStore, StoreError};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    bills: HashMap<Uuid, Bill>,
    payments: HashMap<Uuid, Payment>,
    /// payment_reference → payment id. Kept in lockstep with `payments`;
    /// the key moves when a completed payment's reference is rewritten.
    by_reference: HashMap<String, Uuid>,
}

/// In-memory [`BillingStore`] for development and tests.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BillingStore for MemoryStore {
    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        self.tables.write().users.insert(user.id, user.clone());
        Ok(())
    }

    async fn insert_bill(&self, bill: &Bill) -> Result<(), StoreError> {
        self.tables.write().bills.insert(bill.id, bill.clone());
        Ok(())
    }

    async fn user(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.tables.read().users.get(&user_id).cloned())
    }

    async fn bill_for_user(
        &self,
        bill_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Bill>, StoreError> {
        Ok(self
            .tables
            .read()
            .bills
            .get(&bill_id)
            .filter(|bill| bill.user_id == user_id)
            .cloned())
    }

    async fn bills_for_user(
        &self,
        bill_ids: &[Uuid],
        user_id: Uuid,
    ) -> Result<Vec<Bill>, StoreError> {
        // Set semantics: each requested id matches at most one bill, no
        // matter how often it appears in the input.
        let unique: HashSet<&Uuid> = bill_ids.iter().collect();
        let tables = self.tables.read();
        Ok(unique
            .into_iter()
            .filter_map(|id| tables.bills.get(id))
            .filter(|bill| bill.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn pending_bills(&self, user_id: Uuid) -> Result<Vec<Bill>, StoreError> {
        let tables = self.tables.read();
        let mut bills: Vec<Bill> = tables
            .bills
            .values()
            .filter(|bill| bill.user_id == user_id && bill.status == BillStatus::Pending)
            .cloned()
            .collect();
        bills.sort_by_key(|bill| bill.created_at);
        Ok(bills)
    }

    async fn insert_payments(&self, payments: &[Payment]) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        for payment in payments {
            tables
                .by_reference
                .insert(payment.payment_reference.clone(), payment.id);
            tables.payments.insert(payment.id, payment.clone());
        }
        Ok(())
    }

    async fn payment_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Payment>, StoreError> {
        let tables = self.tables.read();
        Ok(tables
            .by_reference
            .get(reference)
            .and_then(|id| tables.payments.get(id))
            .cloned())
    }

    async fn complete_payment(
        &self,
        payment_id: Uuid,
        receipt: Option<&str>,
    ) -> Result<Payment, StoreError> {
        let mut tables = self.tables.write();

        // Validate everything before mutating anything, so a failure
        // leaves the snapshot untouched (both-or-neither).
        let payment = tables
            .payments
            .get(&payment_id)
            .ok_or_else(|| StoreError::PaymentNotFound(payment_id.to_string()))?;
        if payment.status.is_terminal() {
            return Err(StoreError::AlreadyReconciled {
                payment_id,
                status: payment.status,
            });
        }
        let bill_id = payment.bill_id;
        if !tables.bills.contains_key(&bill_id) {
            return Err(StoreError::BillMissing(bill_id));
        }

        let old_reference = {
            let payment = tables
                .payments
                .get_mut(&payment_id)
                .ok_or_else(|| StoreError::PaymentNotFound(payment_id.to_string()))?;
            payment.status = PaymentStatus::Completed;
            match receipt {
                Some(receipt) => {
                    let old = std::mem::replace(&mut payment.payment_reference, receipt.to_string());
                    payment.mpesa_receipt_number = Some(receipt.to_string());
                    Some(old)
                }
                None => None,
            }
        };
        if let Some(old) = old_reference {
            tables.by_reference.remove(&old);
            if let Some(receipt) = receipt {
                tables.by_reference.insert(receipt.to_string(), payment_id);
            }
        }
        if let Some(bill) = tables.bills.get_mut(&bill_id) {
            bill.status = BillStatus::Paid;
        }

        Ok(tables.payments[&payment_id].clone())
    }

    async fn fail_payment(&self, payment_id: Uuid) -> Result<Payment, StoreError> {
        let mut tables = self.tables.write();
        let payment = tables
            .payments
            .get_mut(&payment_id)
            .ok_or_else(|| StoreError::PaymentNotFound(payment_id.to_string()))?;
        if payment.status.is_terminal() {
            return Err(StoreError::AlreadyReconciled {
                payment_id,
                status: payment.status,
            });
        }
        payment.status = PaymentStatus::Failed;
        Ok(payment.clone())
    }

    async fn recent_payments(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<(Payment, Option<Bill>)>, StoreError> {
        let tables = self.tables.read();
        let mut payments: Vec<Payment> = tables
            .payments
            .values()
            .filter(|payment| payment.user_id == user_id)
            .cloned()
            .collect();
        payments.sort_by(|a, b| b.paid_at.cmp(&a.paid_at));
        payments.truncate(limit);
        Ok(payments
            .into_iter()
            .map(|payment| {
                let bill = tables.bills.get(&payment.bill_id).cloned();
                (payment, bill)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use lipabill_core::PaymentInstruction;
    use rust_decimal::Decimal;

    fn user() -> User {
        User::new(
            "Wanjiku Kamau",
            "wanjiku@example.com",
            "0712345678",
            "argon2-hash",
        )
    }

    fn bill(user_id: Uuid) -> Bill {
        Bill::new(
            user_id,
            "water",
            Decimal::from(500),
            PaymentInstruction::Paybill {
                paybill_number: "888880".into(),
                account_number: "ACC-1".into(),
            },
            NaiveDate::from_ymd_opt(2026, 9, 1).expect("valid date"),
        )
        .expect("valid bill")
    }

    async fn seeded() -> (MemoryStore, User, Bill, Payment) {
        let store = MemoryStore::new();
        let user = user();
        let bill = bill(user.id);
        store.insert_user(&user).await.expect("insert user");
        store.insert_bill(&bill).await.expect("insert bill");
        let payment = Payment::pending(bill.id, user.id, bill.amount, "ws_CO_1");
        store
            .insert_payments(std::slice::from_ref(&payment))
            .await
            .expect("insert payment");
        (store, user, bill, payment)
    }

    #[tokio::test]
    async fn bill_for_user_hides_other_owners() {
        let (store, _, bill, _) = seeded().await;
        let stranger = Uuid::new_v4();
        assert!(store
            .bill_for_user(bill.id, stranger)
            .await
            .expect("lookup")
            .is_none());
    }

    #[tokio::test]
    async fn bills_for_user_returns_each_bill_once_for_repeated_ids() {
        let (store, _, bill, _) = seeded().await;
        let bills = store
            .bills_for_user(&[bill.id, bill.id, bill.id], bill.user_id)
            .await
            .expect("lookup");
        assert_eq!(bills.len(), 1);
        assert_eq!(bills[0].id, bill.id);
    }

    #[tokio::test]
    async fn complete_payment_rewrites_reference_and_pays_bill() {
        let (store, _, bill, payment) = seeded().await;

        let completed = store
            .complete_payment(payment.id, Some("NLJ7RT61SV"))
            .await
            .expect("complete");
        assert_eq!(completed.status, PaymentStatus::Completed);
        assert_eq!(completed.payment_reference, "NLJ7RT61SV");
        assert_eq!(completed.mpesa_receipt_number.as_deref(), Some("NLJ7RT61SV"));

        // The old reference no longer resolves; the receipt does.
        assert!(store
            .payment_by_reference("ws_CO_1")
            .await
            .expect("lookup")
            .is_none());
        assert!(store
            .payment_by_reference("NLJ7RT61SV")
            .await
            .expect("lookup")
            .is_some());

        let bill = store
            .bill_for_user(bill.id, bill.user_id)
            .await
            .expect("lookup")
            .expect("bill exists");
        assert_eq!(bill.status, BillStatus::Paid);
    }

    #[tokio::test]
    async fn complete_payment_without_receipt_keeps_reference() {
        let (store, _, _, payment) = seeded().await;
        let completed = store
            .complete_payment(payment.id, None)
            .await
            .expect("complete");
        assert_eq!(completed.payment_reference, "ws_CO_1");
        assert!(completed.mpesa_receipt_number.is_none());
    }

    #[tokio::test]
    async fn complete_payment_twice_reports_already_reconciled() {
        let (store, _, _, payment) = seeded().await;
        store
            .complete_payment(payment.id, Some("NLJ7RT61SV"))
            .await
            .expect("first completion");
        let second = store.complete_payment(payment.id, Some("NLJ7RT61SV")).await;
        assert!(matches!(
            second,
            Err(StoreError::AlreadyReconciled {
                status: PaymentStatus::Completed,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn complete_payment_with_missing_bill_leaves_payment_pending() {
        let store = MemoryStore::new();
        let user = user();
        store.insert_user(&user).await.expect("insert user");
        // Payment references a bill that was never inserted.
        let payment = Payment::pending(Uuid::new_v4(), user.id, Decimal::from(500), "ws_CO_9");
        store
            .insert_payments(std::slice::from_ref(&payment))
            .await
            .expect("insert payment");

        let result = store.complete_payment(payment.id, Some("NLJ7RT61SV")).await;
        assert!(matches!(result, Err(StoreError::BillMissing(_))));

        let after = store
            .payment_by_reference("ws_CO_9")
            .await
            .expect("lookup")
            .expect("still findable under original reference");
        assert_eq!(after.status, PaymentStatus::Pending);
        assert!(after.mpesa_receipt_number.is_none());
    }

    #[tokio::test]
    async fn fail_payment_is_terminal_once() {
        let (store, _, bill, payment) = seeded().await;
        let failed = store.fail_payment(payment.id).await.expect("fail");
        assert_eq!(failed.status, PaymentStatus::Failed);

        // Bill stays pending so the payer can retry.
        let bill = store
            .bill_for_user(bill.id, bill.user_id)
            .await
            .expect("lookup")
            .expect("bill exists");
        assert_eq!(bill.status, BillStatus::Pending);

        let again = store.fail_payment(payment.id).await;
        assert!(matches!(again, Err(StoreError::AlreadyReconciled { .. })));
    }

    #[tokio::test]
    async fn recent_payments_newest_first_and_capped() {
        let (store, user, bill, first) = seeded().await;
        let mut later = Payment::pending(bill.id, user.id, bill.amount, "ws_CO_2");
        later.paid_at = first.paid_at + Duration::seconds(10);
        let mut latest = Payment::pending(bill.id, user.id, bill.amount, "ws_CO_3");
        latest.paid_at = first.paid_at + Duration::seconds(20);
        store
            .insert_payments(&[later, latest])
            .await
            .expect("insert payments");

        let history = store
            .recent_payments(user.id, 2)
            .await
            .expect("history");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].0.payment_reference, "ws_CO_3");
        assert_eq!(history[1].0.payment_reference, "ws_CO_2");
        assert!(history[0].1.is_some(), "bill embedded when present");
    }

    #[tokio::test]
    async fn recent_payments_ignores_other_users() {
        let (store, user, _, _) = seeded().await;
        let history = store
            .recent_payments(Uuid::new_v4(), 5)
            .await
            .expect("history");
        assert!(history.is_empty());
        let own = store.recent_payments(user.id, 5).await.expect("history");
        assert_eq!(own.len(), 1);
    }
}
