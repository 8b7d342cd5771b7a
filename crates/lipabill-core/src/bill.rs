//! Bills and their merchant payment instructions.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::ValidationError;

/// How a bill is paid on the M-Pesa network.
///
/// Daraja distinguishes two merchant modes with different transaction-type
/// codes and request shapes. Modeling this as a tagged union makes the
/// "both populated" and "neither populated" states unrepresentable;
/// construction of a bill forces exactly one variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "payment_option", rename_all = "snake_case")]
pub enum PaymentInstruction {
    /// Paybill (business) payment: shortcode plus an account reference.
    Paybill {
        /// The merchant's Paybill number.
        paybill_number: String,
        /// Account number quoted with the payment.
        account_number: String,
    },
    /// Till (buy-goods) payment: till number only, no account reference.
    Till {
        /// The merchant's Till number.
        till_number: String,
    },
}

impl PaymentInstruction {
    /// Daraja `TransactionType` code for this instruction.
    pub fn transaction_type(&self) -> &'static str {
        match self {
            Self::Paybill { .. } => "CustomerPayBillOnline",
            Self::Till { .. } => "CustomerBuyGoodsOnline",
        }
    }

    /// Daraja `AccountReference` field. Only Paybill payments carry one.
    pub fn account_reference(&self) -> Option<&str> {
        match self {
            Self::Paybill { account_number, .. } => Some(account_number),
            Self::Till { .. } => None,
        }
    }
}

/// Lifecycle status of a bill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum BillStatus {
    /// Awaiting payment.
    Pending,
    /// Settled via a completed payment.
    Paid,
}

impl BillStatus {
    /// String form used in persistence and API payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Paid => "Paid",
        }
    }
}

impl fmt::Display for BillStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A payable obligation owned by a user.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Bill {
    pub id: Uuid,
    /// Owning user. Payments against this bill must come from this user.
    pub user_id: Uuid,
    /// Free-text category ("rent", "electricity", ...).
    pub bill_type: String,
    /// Amount due, in KES. Always positive.
    pub amount: Decimal,
    /// How the merchant is paid.
    #[serde(flatten)]
    pub instruction: PaymentInstruction,
    pub due_date: NaiveDate,
    pub status: BillStatus,
    pub created_at: DateTime<Utc>,
}

impl Bill {
    /// Create a new pending bill. Rejects non-positive amounts and empty
    /// bill types.
    pub fn new(
        user_id: Uuid,
        bill_type: impl Into<String>,
        amount: Decimal,
        instruction: PaymentInstruction,
        due_date: NaiveDate,
    ) -> Result<Self, ValidationError> {
        if amount <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveAmount { amount });
        }
        let bill_type = bill_type.into();
        if bill_type.trim().is_empty() {
            return Err(ValidationError::EmptyField { field: "bill_type" });
        }
        Ok(Self {
            id: Uuid::new_v4(),
            user_id,
            bill_type,
            amount,
            instruction,
            due_date,
            status: BillStatus::Pending,
            created_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paybill() -> PaymentInstruction {
        PaymentInstruction::Paybill {
            paybill_number: "888880".into(),
            account_number: "ACC-001".into(),
        }
    }

    #[test]
    fn new_bill_starts_pending() {
        let amount = Decimal::from(500);
        let bill = Bill::new(
            Uuid::new_v4(),
            "water",
            amount,
            paybill(),
            NaiveDate::from_ymd_opt(2026, 9, 1).expect("valid date"),
        )
        .expect("valid bill");
        assert_eq!(bill.status, BillStatus::Pending);
        assert_eq!(bill.amount, amount);
    }

    #[test]
    fn new_bill_rejects_non_positive_amount() {
        for raw in ["0", "-12.50"] {
            let amount: Decimal = raw.parse().expect("valid decimal");
            let result = Bill::new(
                Uuid::new_v4(),
                "rent",
                amount,
                paybill(),
                NaiveDate::from_ymd_opt(2026, 9, 1).expect("valid date"),
            );
            assert!(matches!(
                result,
                Err(ValidationError::NonPositiveAmount { .. })
            ));
        }
    }

    #[test]
    fn new_bill_rejects_blank_type() {
        let amount = Decimal::from(100);
        let result = Bill::new(
            Uuid::new_v4(),
            "   ",
            amount,
            paybill(),
            NaiveDate::from_ymd_opt(2026, 9, 1).expect("valid date"),
        );
        assert!(matches!(result, Err(ValidationError::EmptyField { .. })));
    }

    #[test]
    fn paybill_instruction_shape() {
        let instruction = paybill();
        assert_eq!(instruction.transaction_type(), "CustomerPayBillOnline");
        assert_eq!(instruction.account_reference(), Some("ACC-001"));
    }

    #[test]
    fn till_instruction_shape() {
        let instruction = PaymentInstruction::Till {
            till_number: "555111".into(),
        };
        assert_eq!(instruction.transaction_type(), "CustomerBuyGoodsOnline");
        assert_eq!(instruction.account_reference(), None);
    }

    #[test]
    fn instruction_serde_is_tagged() {
        let json = serde_json::to_value(paybill()).expect("serialize");
        assert_eq!(json["payment_option"], "paybill");
        assert_eq!(json["paybill_number"], "888880");

        let till = PaymentInstruction::Till {
            till_number: "555111".into(),
        };
        let json = serde_json::to_value(&till).expect("serialize");
        assert_eq!(json["payment_option"], "till");
        assert!(json.get("account_number").is_none());
    }

    #[test]
    fn instruction_tag_selects_exactly_one_shape() {
        // Stray fields from the other variant are dropped; the parsed value
        // can only ever hold one instruction shape.
        let raw = serde_json::json!({
            "payment_option": "till",
            "till_number": "555111",
            "paybill_number": "888880"
        });
        let parsed: PaymentInstruction = serde_json::from_value(raw).expect("till parses");
        assert_eq!(parsed.account_reference(), None);
    }

    #[test]
    fn instruction_deserialization_rejects_missing_tag() {
        let raw = serde_json::json!({ "paybill_number": "888880", "account_number": "A" });
        let parsed: Result<PaymentInstruction, _> = serde_json::from_value(raw);
        assert!(parsed.is_err());
    }
}
