//! Shard-owned ledger models.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;

/// Loan status enum
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "loan_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Active,
    Paid,
}

/// Payment type, shared vocabulary between the hub and every shard.
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "payment_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    /// Pays only accrued interest and pushes the due date forward 30 days.
    InterestRenewal,
    /// Pays principal plus interest and terminates the loan.
    FullSettlement,
}

/// Loan model
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Loan {
    pub id: Uuid,
    pub client_id: Uuid,
    pub original_amount: Decimal,
    pub interest_rate: Decimal, // percent
    /// Principal plus interest accrued at origination.
    pub total_amount: Decimal,
    pub loan_date: NaiveDate,
    pub due_date: NaiveDate,
    pub status: LoanStatus,
    pub created_at: DateTime<Utc>,
}

/// Payment model. Append-only ledger rows, never mutated or deleted.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Payment {
    pub id: Uuid,
    pub loan_id: Uuid,
    pub amount: Decimal,
    pub payment_date: NaiveDate,
    pub payment_type: PaymentType,
    pub notes: String,
    pub fine_amount: Decimal,
    /// Originating payment-request id; UNIQUE, so a request can settle at
    /// most once per shard.
    pub settlement_ref: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a new loan row.
#[derive(Debug, Deserialize)]
pub struct NewLoan {
    pub client_id: Uuid,
    pub original_amount: Decimal,
    pub interest_rate: Decimal,
    pub total_amount: Decimal,
    pub loan_date: NaiveDate,
    pub due_date: NaiveDate,
}
