//! Hub store: payment request and receipt records.
//!
//! Every status transition here is a conditional update with an
//! affected-rows check, so concurrent callers race at the store instead of
//! in application code: exactly one wins, the rest observe zero rows.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::SettlementResult;
use crate::settlement::{CreatePaymentRequest, PaymentRequest, Receipt, ReceiptRef};

/// Store client for the shared hub.
#[derive(Clone)]
pub struct RequestStore {
    pool: PgPool,
}

impl RequestStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Persist a new pending request with its amount snapshot.
    pub async fn insert(
        &self,
        req: &CreatePaymentRequest,
        amount: Decimal,
    ) -> SettlementResult<PaymentRequest> {
        let request = sqlx::query_as::<_, PaymentRequest>(
            r#"
            INSERT INTO payment_requests (loan_id, city, client_identifier, client_note, amount, payment_type, status)
            VALUES ($1, $2, $3, $4, $5, $6, 'pending')
            RETURNING *
            "#,
        )
        .bind(req.loan_id)
        .bind(req.city)
        .bind(&req.client_identifier)
        .bind(&req.client_note)
        .bind(amount)
        .bind(req.payment_type)
        .fetch_one(&self.pool)
        .await?;

        Ok(request)
    }

    /// Fetch a request only while it is still pending. Processed and
    /// missing requests are indistinguishable to the caller.
    pub async fn fetch_pending(&self, id: Uuid) -> SettlementResult<Option<PaymentRequest>> {
        let request = sqlx::query_as::<_, PaymentRequest>(
            "SELECT * FROM payment_requests WHERE id = $1 AND status = 'pending'",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(request)
    }

    /// Atomically claim a pending request for settlement. Returns false if
    /// the request is no longer pending or some other approval already
    /// holds the claim.
    pub async fn claim(&self, id: Uuid, token: Uuid, approver: Uuid) -> SettlementResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE payment_requests
            SET settlement_token = $2, approved_by = $3, claimed_at = $4
            WHERE id = $1 AND status = 'pending' AND settlement_token IS NULL
            "#,
        )
        .bind(id)
        .bind(token)
        .bind(approver)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Terminal transition to approved, guarded by the claim token.
    pub async fn finalize_approval(&self, id: Uuid, token: Uuid) -> SettlementResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE payment_requests
            SET status = 'approved', approved_at = $3
            WHERE id = $1 AND settlement_token = $2 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(token)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Release a claim whose shard write never happened, so the request can
    /// be approved (or rejected) again.
    pub async fn release_claim(&self, id: Uuid, token: Uuid) -> SettlementResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE payment_requests
            SET settlement_token = NULL, approved_by = NULL, claimed_at = NULL
            WHERE id = $1 AND settlement_token = $2 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(token)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Terminal transition to rejected. A claimed request cannot be
    /// rejected: an approval is in flight and the sweeper owns the
    /// outcome.
    pub async fn reject(&self, id: Uuid, reason: &str) -> SettlementResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE payment_requests
            SET status = 'rejected', rejected_at = $3, admin_note = $2
            WHERE id = $1 AND status = 'pending' AND settlement_token IS NULL
            "#,
        )
        .bind(id)
        .bind(reason)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Pending requests claimed before `cutoff`, the reconciliation candidates.
    pub async fn stale_claims(
        &self,
        cutoff: DateTime<Utc>,
    ) -> SettlementResult<Vec<PaymentRequest>> {
        let requests = sqlx::query_as::<_, PaymentRequest>(
            r#"
            SELECT * FROM payment_requests
            WHERE status = 'pending' AND settlement_token IS NOT NULL AND claimed_at < $1
            ORDER BY claimed_at
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        Ok(requests)
    }

    /// Attach proof-of-payment metadata to a request.
    pub async fn attach_receipt(
        &self,
        request_id: Uuid,
        receipt: &ReceiptRef,
    ) -> SettlementResult<Receipt> {
        let receipt = sqlx::query_as::<_, Receipt>(
            r#"
            INSERT INTO receipts (payment_request_id, storage_path, mime_type)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(request_id)
        .bind(&receipt.storage_path)
        .bind(&receipt.mime_type)
        .fetch_one(&self.pool)
        .await?;

        Ok(receipt)
    }

    /// Receipts for a request, in upload order.
    pub async fn receipts_for(&self, request_id: Uuid) -> SettlementResult<Vec<Receipt>> {
        let receipts = sqlx::query_as::<_, Receipt>(
            "SELECT * FROM receipts WHERE payment_request_id = $1 ORDER BY uploaded_at",
        )
        .bind(request_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(receipts)
    }
}
