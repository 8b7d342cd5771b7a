//! Postgres billing store.
//!
//! State machine constraints (pending-only transitions) are enforced at
//! the application layer inside `FOR UPDATE` transactions, not in SQL.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use lipabill_core::{Bill, BillStatus, Payment, PaymentInstruction, PaymentStatus, User};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use uuid::Uuid;

use super::{BillingStore, StoreError};

/// Initialize the database connection pool and run embedded migrations.
///
/// Returns `None` if `DATABASE_URL` is not set (in-memory-only mode).
/// Returns `Err` if the URL is set but the connection or migration fails.
pub async fn init_pool() -> Result<Option<PgPool>, sqlx::Error> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            tracing::warn!(
                "DATABASE_URL not set — running in-memory only mode. \
                 State will not survive restarts."
            );
            return Ok(None);
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(&url)
        .await?;

    tracing::info!("Connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(Some(pool))
}

/// Postgres-backed [`BillingStore`].
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const BILL_COLUMNS: &str = "id, user_id, bill_type, amount, payment_option, paybill_number, \
     account_number, till_number, due_date, status, created_at";

const PAYMENT_COLUMNS: &str = "id, bill_id, user_id, amount_paid, payment_reference, \
     mpesa_receipt_number, status, paid_at";

#[async_trait]
impl BillingStore for PgStore {
    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO users (id, full_name, email, phone, password_hash, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(user.id)
        .bind(&user.full_name)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_bill(&self, bill: &Bill) -> Result<(), StoreError> {
        let (option, paybill_number, account_number, till_number) = instruction_columns(bill);
        sqlx::query(
            "INSERT INTO bills (id, user_id, bill_type, amount, payment_option, paybill_number,
                                account_number, till_number, due_date, status, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(bill.id)
        .bind(bill.user_id)
        .bind(&bill.bill_type)
        .bind(bill.amount)
        .bind(option)
        .bind(paybill_number)
        .bind(account_number)
        .bind(till_number)
        .bind(bill.due_date)
        .bind(bill.status.as_str())
        .bind(bill.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn user(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, full_name, email, phone, password_hash, created_at
             FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(UserRow::into_user))
    }

    async fn bill_for_user(
        &self,
        bill_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Bill>, StoreError> {
        let row = sqlx::query_as::<_, BillRow>(&format!(
            "SELECT {BILL_COLUMNS} FROM bills WHERE id = $1 AND user_id = $2"
        ))
        .bind(bill_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(BillRow::into_bill).transpose()
    }

    async fn bills_for_user(
        &self,
        bill_ids: &[Uuid],
        user_id: Uuid,
    ) -> Result<Vec<Bill>, StoreError> {
        let rows = sqlx::query_as::<_, BillRow>(&format!(
            "SELECT {BILL_COLUMNS} FROM bills WHERE id = ANY($1) AND user_id = $2"
        ))
        .bind(bill_ids)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(BillRow::into_bill).collect()
    }

    async fn pending_bills(&self, user_id: Uuid) -> Result<Vec<Bill>, StoreError> {
        let rows = sqlx::query_as::<_, BillRow>(&format!(
            "SELECT {BILL_COLUMNS} FROM bills
             WHERE user_id = $1 AND status = 'Pending' ORDER BY created_at"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(BillRow::into_bill).collect()
    }

    async fn insert_payments(&self, payments: &[Payment]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        for payment in payments {
            sqlx::query(
                "INSERT INTO payments (id, bill_id, user_id, amount_paid, payment_reference,
                                       mpesa_receipt_number, status, paid_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(payment.id)
            .bind(payment.bill_id)
            .bind(payment.user_id)
            .bind(payment.amount_paid)
            .bind(&payment.payment_reference)
            .bind(&payment.mpesa_receipt_number)
            .bind(payment.status.as_str())
            .bind(payment.paid_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn payment_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Payment>, StoreError> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE payment_reference = $1"
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await?;
        row.map(PaymentRow::into_payment).transpose()
    }

    async fn complete_payment(
        &self,
        payment_id: Uuid,
        receipt: Option<&str>,
    ) -> Result<Payment, StoreError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1 FOR UPDATE"
        ))
        .bind(payment_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::PaymentNotFound(payment_id.to_string()))?;
        let payment = row.into_payment()?;

        if payment.status.is_terminal() {
            return Err(StoreError::AlreadyReconciled {
                payment_id,
                status: payment.status,
            });
        }

        let bill_updated = sqlx::query("UPDATE bills SET status = 'Paid' WHERE id = $1")
            .bind(payment.bill_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if bill_updated == 0 {
            // Dropping `tx` rolls back; the payment stays Pending.
            return Err(StoreError::BillMissing(payment.bill_id));
        }

        let mut payment = payment;
        payment.status = PaymentStatus::Completed;
        if let Some(receipt) = receipt {
            payment.payment_reference = receipt.to_string();
            payment.mpesa_receipt_number = Some(receipt.to_string());
        }

        sqlx::query(
            "UPDATE payments SET status = 'Completed', payment_reference = $1,
                    mpesa_receipt_number = COALESCE($2, mpesa_receipt_number)
             WHERE id = $3",
        )
        .bind(&payment.payment_reference)
        .bind(receipt)
        .bind(payment_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(payment)
    }

    async fn fail_payment(&self, payment_id: Uuid) -> Result<Payment, StoreError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1 FOR UPDATE"
        ))
        .bind(payment_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::PaymentNotFound(payment_id.to_string()))?;
        let payment = row.into_payment()?;

        if payment.status.is_terminal() {
            return Err(StoreError::AlreadyReconciled {
                payment_id,
                status: payment.status,
            });
        }

        sqlx::query("UPDATE payments SET status = 'Failed' WHERE id = $1")
            .bind(payment_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        let mut payment = payment;
        payment.status = PaymentStatus::Failed;
        Ok(payment)
    }

    async fn recent_payments(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<(Payment, Option<Bill>)>, StoreError> {
        let rows = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments
             WHERE user_id = $1 ORDER BY paid_at DESC LIMIT $2"
        ))
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let payment = row.into_payment()?;
            let bill = sqlx::query_as::<_, BillRow>(&format!(
                "SELECT {BILL_COLUMNS} FROM bills WHERE id = $1"
            ))
            .bind(payment.bill_id)
            .fetch_optional(&self.pool)
            .await?
            .map(BillRow::into_bill)
            .transpose()?;
            out.push((payment, bill));
        }
        Ok(out)
    }
}

fn instruction_columns(
    bill: &Bill,
) -> (&'static str, Option<&String>, Option<&String>, Option<&String>) {
    match &bill.instruction {
        PaymentInstruction::Paybill {
            paybill_number,
            account_number,
        } => ("paybill", Some(paybill_number), Some(account_number), None),
        PaymentInstruction::Till { till_number } => ("till", None, None, Some(till_number)),
    }
}

fn protocol_error(message: String) -> StoreError {
    StoreError::Database(sqlx::Error::Protocol(message))
}

/// Internal row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    full_name: String,
    email: String,
    phone: String,
    password_hash: String,
    created_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self) -> User {
        User {
            id: self.id,
            full_name: self.full_name,
            email: self.email,
            phone: self.phone,
            password_hash: self.password_hash,
            created_at: self.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct BillRow {
    id: Uuid,
    user_id: Uuid,
    bill_type: String,
    amount: Decimal,
    payment_option: String,
    paybill_number: Option<String>,
    account_number: Option<String>,
    till_number: Option<String>,
    due_date: NaiveDate,
    status: String,
    created_at: DateTime<Utc>,
}

impl BillRow {
    fn into_bill(self) -> Result<Bill, StoreError> {
        let instruction = match self.payment_option.as_str() {
            "paybill" => PaymentInstruction::Paybill {
                paybill_number: self.paybill_number.ok_or_else(|| {
                    protocol_error(format!("bill {}: paybill row missing paybill_number", self.id))
                })?,
                account_number: self.account_number.ok_or_else(|| {
                    protocol_error(format!("bill {}: paybill row missing account_number", self.id))
                })?,
            },
            "till" => PaymentInstruction::Till {
                till_number: self.till_number.ok_or_else(|| {
                    protocol_error(format!("bill {}: till row missing till_number", self.id))
                })?,
            },
            other => {
                return Err(protocol_error(format!(
                    "bill {}: unknown payment_option '{other}'",
                    self.id
                )))
            }
        };
        let status = match self.status.as_str() {
            "Pending" => BillStatus::Pending,
            "Paid" => BillStatus::Paid,
            other => {
                return Err(protocol_error(format!(
                    "bill {}: unknown status '{other}'",
                    self.id
                )))
            }
        };
        Ok(Bill {
            id: self.id,
            user_id: self.user_id,
            bill_type: self.bill_type,
            amount: self.amount,
            instruction,
            due_date: self.due_date,
            status,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    bill_id: Uuid,
    user_id: Uuid,
    amount_paid: Decimal,
    payment_reference: String,
    mpesa_receipt_number: Option<String>,
    status: String,
    paid_at: DateTime<Utc>,
}

impl PaymentRow {
    fn into_payment(self) -> Result<Payment, StoreError> {
        let status = match self.status.as_str() {
            "Pending" => PaymentStatus::Pending,
            "Completed" => PaymentStatus::Completed,
            "Failed" => PaymentStatus::Failed,
            other => {
                return Err(protocol_error(format!(
                    "payment {}: unknown status '{other}'",
                    self.id
                )))
            }
        };
        Ok(Payment {
            id: self.id,
            bill_id: self.bill_id,
            user_id: self.user_id,
            amount_paid: self.amount_paid,
            payment_reference: self.payment_reference,
            mpesa_receipt_number: self.mpesa_receipt_number,
            status,
            paid_at: self.paid_at,
        })
    }
}
