//! Background reconciliation sweeper.
//!
//! An approval writes to two stores with no shared transaction; a crash
//! between the shard settle and the hub finalize leaves a claimed-but-still-
//! pending hub row behind. This task periodically heals those rows.

use std::sync::Arc;
use std::time::Duration;

use crate::settlement::SettlementService;

/// Background job sweeping stale settlement claims.
pub async fn reconciliation_sweeper(
    service: Arc<SettlementService>,
    interval: Duration,
    grace: chrono::Duration,
) {
    tracing::info!("Starting reconciliation sweeper");

    loop {
        tokio::time::sleep(interval).await;

        match service.reconcile_stale_claims(grace).await {
            Ok(0) => {}
            Ok(healed) => {
                tracing::info!(healed, "reconciliation pass healed stale claims");
            }
            Err(e) => {
                tracing::error!("Error reconciling stale claims: {}", e);
            }
        }
    }
}
