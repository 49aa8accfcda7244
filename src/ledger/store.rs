//! Ledger store: loan and payment access for one city shard.

use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{SettlementError, SettlementResult};
use crate::ledger::{Loan, NewLoan, Payment, PaymentType};
use crate::settlement::PaymentRequest;

/// Days a renewal pushes the due date forward.
pub const RENEWAL_EXTENSION_DAYS: i64 = 30;

/// Next due date after an interest renewal. Always computed from the loan's
/// current due date, so an overdue loan still gets the full extension.
pub fn renewed_due_date(current: NaiveDate) -> NaiveDate {
    current + Duration::days(RENEWAL_EXTENSION_DAYS)
}

/// Store client for one city's loan/payment ledger.
pub struct LedgerStore {
    pool: PgPool,
}

impl LedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a loan row. Used by origination tooling and test fixtures.
    pub async fn insert_loan(&self, new: NewLoan) -> SettlementResult<Loan> {
        let loan = sqlx::query_as::<_, Loan>(
            r#"
            INSERT INTO loans (client_id, original_amount, interest_rate, total_amount, loan_date, due_date, status)
            VALUES ($1, $2, $3, $4, $5, $6, 'active')
            RETURNING *
            "#,
        )
        .bind(new.client_id)
        .bind(new.original_amount)
        .bind(new.interest_rate)
        .bind(new.total_amount)
        .bind(new.loan_date)
        .bind(new.due_date)
        .fetch_one(&self.pool)
        .await?;

        Ok(loan)
    }

    /// Fetch a loan only while it is still active. A settled or missing
    /// loan looks the same to the caller.
    pub async fn fetch_active_loan(&self, id: Uuid) -> SettlementResult<Option<Loan>> {
        let loan =
            sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1 AND status = 'active'")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(loan)
    }

    /// Fetch a loan regardless of status.
    pub async fn fetch_loan(&self, id: Uuid) -> SettlementResult<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(loan)
    }

    /// Payment previously written for a given payment-request id, if any.
    pub async fn payment_by_settlement_ref(
        &self,
        reference: Uuid,
    ) -> SettlementResult<Option<Payment>> {
        let payment =
            sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE settlement_ref = $1")
                .bind(reference)
                .fetch_optional(&self.pool)
                .await?;

        Ok(payment)
    }

    /// Apply an approved payment request to this shard.
    ///
    /// One shard-local transaction: insert the Payment row, then mutate the
    /// loan (renewal advances the due date 30 days from its current value;
    /// settlement marks the loan paid). The loan row is re-read under
    /// `FOR UPDATE` so concurrent settlements of the same loan serialize,
    /// and the settlement_ref check makes a replayed request a no-op that
    /// returns the already-written Payment.
    pub async fn settle(&self, request: &PaymentRequest, notes: &str) -> SettlementResult<Payment> {
        let mut tx = self.pool.begin().await?;

        let loan = sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1 FOR UPDATE")
            .bind(request.loan_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(SettlementError::LoanNotFound)?;

        if let Some(existing) =
            sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE settlement_ref = $1")
                .bind(request.id)
                .fetch_optional(&mut *tx)
                .await?
        {
            // A prior attempt already reached this shard.
            tx.rollback().await?;
            return Ok(existing);
        }

        let payment = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (loan_id, amount, payment_date, payment_type, notes, fine_amount, settlement_ref)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(request.loan_id)
        .bind(request.amount)
        .bind(Utc::now().date_naive())
        .bind(request.payment_type)
        .bind(notes)
        .bind(Decimal::ZERO)
        .bind(request.id)
        .fetch_one(&mut *tx)
        .await?;

        match request.payment_type {
            PaymentType::InterestRenewal => {
                sqlx::query("UPDATE loans SET due_date = $1 WHERE id = $2")
                    .bind(renewed_due_date(loan.due_date))
                    .bind(loan.id)
                    .execute(&mut *tx)
                    .await?;
            }
            PaymentType::FullSettlement => {
                sqlx::query("UPDATE loans SET status = 'paid' WHERE id = $1")
                    .bind(loan.id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;

        Ok(payment)
    }
}
