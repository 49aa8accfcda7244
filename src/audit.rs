//! Append-only audit trail.

use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::SettlementResult;

/// Writer for the hub's audit log. Entries are never updated or deleted,
/// and nothing in the engine reads them back; they exist for after-the-fact
/// reconstruction of who approved or rejected what, and why.
#[derive(Clone)]
pub struct AuditTrail {
    pool: PgPool,
}

impl AuditTrail {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn record(
        &self,
        action: &str,
        entity: &str,
        entity_id: Uuid,
        performed_by: &str,
        metadata: Value,
    ) -> SettlementResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (action, entity, entity_id, performed_by, metadata)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(action)
        .bind(entity)
        .bind(entity_id)
        .bind(performed_by)
        .bind(metadata)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
