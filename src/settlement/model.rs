//! Hub-owned settlement models and DTOs.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::city::CityKey;
use crate::ledger::PaymentType;

/// Payment request status enum
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "request_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

/// Canonical settlement record, owned by the hub for the request's
/// lifetime. amount, payment_type, loan_id and city are immutable after
/// creation; status only ever moves pending → approved or pending →
/// rejected, and stays there.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct PaymentRequest {
    pub id: Uuid,
    pub loan_id: Uuid,
    pub city: CityKey,
    pub client_identifier: Option<String>,
    pub client_note: Option<String>,
    /// Snapshot taken at creation; later loan mutations never change it.
    pub amount: Decimal,
    pub payment_type: PaymentType,
    pub status: RequestStatus,
    /// Idempotency claim written before any shard work begins.
    pub settlement_token: Option<Uuid>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub approved_by: Option<Uuid>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub admin_note: Option<String>,
}

/// Receipt metadata attached to a payment request. The engine never reads
/// file bytes; binary storage is an external collaborator.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Receipt {
    pub id: Uuid,
    pub payment_request_id: Uuid,
    pub storage_path: String,
    pub mime_type: String,
    pub uploaded_at: DateTime<Utc>,
}

/// Admin identity, validated upstream by the auth collaborator. The engine
/// trusts it and only uses it for attribution.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AdminIdentity {
    pub id: Uuid,
    pub email: String,
    pub role: String,
}

/// Request DTO for creating a payment request
#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    pub loan_id: Uuid,
    pub payment_type: PaymentType,
    pub city: CityKey,
    pub client_identifier: Option<String>,
    pub client_note: Option<String>,
}

/// Response DTO for request creation: the stored id plus the encoded
/// payment instruction the borrower scans.
#[derive(Debug, Serialize)]
pub struct CreatedPaymentRequest {
    pub id: Uuid,
    pub amount: Decimal,
    pub pix_payload: String,
}

/// Receipt metadata reference handed over by the storage collaborator.
#[derive(Debug, Deserialize)]
pub struct ReceiptRef {
    pub storage_path: String,
    pub mime_type: String,
}
