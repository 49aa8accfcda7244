//! Settlement lifecycle orchestration.
//!
//! Drives a payment request from creation through approval or rejection,
//! writing to the hub and the owning city shard with no shared transaction.
//! Step order within one operation is strictly sequential; nothing is
//! retried, and the first failing step aborts the rest.

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use uuid::Uuid;

use crate::audit::AuditTrail;
use crate::error::{SettlementError, SettlementResult};
use crate::ledger::{Loan, PaymentType};
use crate::pix::{self, PixConfig};
use crate::settlement::{
    AdminIdentity, CreatePaymentRequest, CreatedPaymentRequest, PaymentRequest, RequestStore,
};
use crate::shard::ShardRouter;

/// Orchestrator for the payment-request lifecycle.
pub struct SettlementService {
    requests: RequestStore,
    router: ShardRouter,
    audit: AuditTrail,
    pix: PixConfig,
}

impl SettlementService {
    pub fn new(
        requests: RequestStore,
        router: ShardRouter,
        audit: AuditTrail,
        pix: PixConfig,
    ) -> Self {
        Self {
            requests,
            router,
            audit,
            pix,
        }
    }

    /// Create a pending payment request and its scannable payload.
    pub async fn create_request(
        &self,
        req: CreatePaymentRequest,
    ) -> SettlementResult<CreatedPaymentRequest> {
        let ledger = self.router.resolve(req.city)?;

        let loan = ledger
            .fetch_active_loan(req.loan_id)
            .await?
            .ok_or(SettlementError::LoanNotFound)?;

        let amount = owed_amount(req.payment_type, &loan);

        // Encode before persisting: a stored request without a valid
        // payload must not exist.
        let pix_payload = pix::build_payload(&self.pix, Some(amount))?;

        let stored = self.requests.insert(&req, amount).await?;

        tracing::info!(
            request_id = %stored.id,
            loan_id = %req.loan_id,
            city = %req.city,
            amount = %amount,
            "payment request created"
        );

        Ok(CreatedPaymentRequest {
            id: stored.id,
            amount,
            pix_payload,
        })
    }

    /// Approve a pending request: settle on the owning shard, then finalize
    /// the hub record and append the audit entry.
    pub async fn approve(&self, request_id: Uuid, admin: &AdminIdentity) -> SettlementResult<()> {
        let request = self
            .requests
            .fetch_pending(request_id)
            .await?
            .ok_or(SettlementError::RequestNotPending)?;

        // A stored request whose city no longer routes is a configuration
        // error, never a silent skip.
        let ledger = self
            .router
            .resolve(request.city)
            .map_err(|_| SettlementError::ShardUnconfigured(request.city))?;

        ledger
            .fetch_loan(request.loan_id)
            .await?
            .ok_or(SettlementError::LoanNotFound)?;

        // Claim before any shard write. Losing the race here means another
        // approval already owns this request.
        let token = Uuid::new_v4();
        if !self.requests.claim(request_id, token, admin.id).await? {
            return Err(SettlementError::RequestNotPending);
        }

        let notes = ledger_notes(&request, &admin.email);
        ledger.settle(&request, &notes).await?;

        if !self.requests.finalize_approval(request_id, token).await? {
            // The shard settled but the hub row moved under us; the sweeper
            // owns this edge.
            tracing::warn!(
                request_id = %request_id,
                "shard settled but hub finalize matched no row"
            );
        }

        self.audit
            .record(
                "approve_payment",
                "payment_request",
                request_id,
                &admin.email,
                json!({
                    "loan_id": request.loan_id,
                    "amount": request.amount,
                    "payment_type": request.payment_type,
                }),
            )
            .await?;

        tracing::info!(request_id = %request_id, admin = %admin.email, "payment request approved");

        Ok(())
    }

    /// Reject a pending request. Hub-only; the shard is never touched.
    pub async fn reject(
        &self,
        request_id: Uuid,
        admin: &AdminIdentity,
        reason: &str,
    ) -> SettlementResult<()> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(SettlementError::Validation(
                "rejection reason must not be empty".to_string(),
            ));
        }

        let request = self
            .requests
            .fetch_pending(request_id)
            .await?
            .ok_or(SettlementError::RequestNotPending)?;

        if !self.requests.reject(request_id, reason).await? {
            return Err(SettlementError::RequestNotPending);
        }

        self.audit
            .record(
                "reject_payment",
                "payment_request",
                request_id,
                &admin.email,
                json!({ "reason": reason, "loan_id": request.loan_id }),
            )
            .await?;

        tracing::info!(request_id = %request_id, admin = %admin.email, "payment request rejected");

        Ok(())
    }

    /// One reconciliation pass over stale claims.
    ///
    /// A claim older than `grace` means an approval died between the hub
    /// claim and the hub finalize. If the shard holds a Payment for the
    /// request, the settlement happened and the hub row is finalized; if
    /// not, the shard was never reached and the claim is released for
    /// retry. Returns the
    /// number of rows healed either way.
    pub async fn reconcile_stale_claims(&self, grace: Duration) -> SettlementResult<u64> {
        let cutoff = Utc::now() - grace;
        let stale = self.requests.stale_claims(cutoff).await?;

        let mut healed = 0;
        for request in stale {
            let Some(token) = request.settlement_token else {
                continue;
            };

            let ledger = match self.router.resolve(request.city) {
                Ok(ledger) => ledger,
                Err(e) => {
                    tracing::warn!(
                        request_id = %request.id,
                        error = %e,
                        "stale claim on unresolvable shard, skipping"
                    );
                    continue;
                }
            };

            match ledger.payment_by_settlement_ref(request.id).await {
                Ok(Some(_)) => {
                    if self.requests.finalize_approval(request.id, token).await? {
                        self.audit
                            .record(
                                "reconcile_payment",
                                "payment_request",
                                request.id,
                                "reconciler",
                                json!({
                                    "loan_id": request.loan_id,
                                    "amount": request.amount,
                                    "payment_type": request.payment_type,
                                }),
                            )
                            .await?;
                        tracing::info!(
                            request_id = %request.id,
                            "stale claim finalized from shard payment"
                        );
                        healed += 1;
                    }
                }
                Ok(None) => {
                    if self.requests.release_claim(request.id, token).await? {
                        tracing::info!(request_id = %request.id, "stale claim released");
                        healed += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        request_id = %request.id,
                        error = %e,
                        "shard unreachable during reconciliation"
                    );
                }
            }
        }

        Ok(healed)
    }
}

/// Amount owed for a payment type, snapshotted at request creation and
/// never recomputed afterwards.
pub fn owed_amount(payment_type: PaymentType, loan: &Loan) -> Decimal {
    let amount = match payment_type {
        PaymentType::InterestRenewal => {
            loan.original_amount * loan.interest_rate / Decimal::ONE_HUNDRED
        }
        PaymentType::FullSettlement => loan.total_amount,
    };
    amount.round_dp(2)
}

/// Ledger note naming the method, the approver, and any client note.
fn ledger_notes(request: &PaymentRequest, admin_email: &str) -> String {
    let client = request
        .client_note
        .as_deref()
        .map(|note| format!(" | Cliente: {note}"))
        .unwrap_or_default();

    match request.payment_type {
        PaymentType::InterestRenewal => format!(
            "RENOVAÇÃO +30 DIAS - Somente Juros | Método: pix | Aprovado pelo admin {admin_email}{client}"
        ),
        PaymentType::FullSettlement => format!(
            "QUITAÇÃO - Capital + Juros | Método: pix | Aprovado pelo admin {admin_email}{client}"
        ),
    }
}
