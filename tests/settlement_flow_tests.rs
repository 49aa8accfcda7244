//! End-to-end settlement flow tests.
//!
//! Database-backed tests are ignored by default and expect two *distinct*
//! databases (the hub and one shard), pointed at by TEST_HUB_DATABASE_URL
//! and TEST_SHARD_DATABASE_URL. Routing and validation tests run without
//! any database because they fail before the first store call.

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use sqlx::PgPool;
    use uuid::Uuid;

    use pix_settlement::audit::AuditTrail;
    use pix_settlement::city::CityKey;
    use pix_settlement::config::Config;
    use pix_settlement::db;
    use pix_settlement::error::SettlementError;
    use pix_settlement::ledger::{LedgerStore, LoanStatus, NewLoan, PaymentType};
    use pix_settlement::pix::{self, PixConfig};
    use pix_settlement::settlement::{
        AdminIdentity, CreatePaymentRequest, ReceiptRef, RequestStore, SettlementService,
    };
    use pix_settlement::shard::ShardRouter;

    const TEST_CITY: CityKey = CityKey::PraiaGrande;

    fn hub_url() -> String {
        std::env::var("TEST_HUB_DATABASE_URL")
            .unwrap_or_else(|_| "postgresql://localhost/settlement_hub_test".to_string())
    }

    fn shard_url() -> String {
        std::env::var("TEST_SHARD_DATABASE_URL")
            .unwrap_or_else(|_| "postgresql://localhost/settlement_shard_test".to_string())
    }

    fn test_pix_config() -> PixConfig {
        PixConfig {
            key: "+5511999990000".to_string(),
            merchant_name: "LOJA DE TESTE LTDA".to_string(),
            merchant_city: "SAO PAULO".to_string(),
        }
    }

    fn test_config(shard: Option<(CityKey, String)>) -> Config {
        Config {
            hub_database_url: hub_url(),
            shard_database_urls: shard.into_iter().collect::<HashMap<_, _>>(),
            db_max_connections: 2,
            log_level: "info".to_string(),
            pix: test_pix_config(),
            reconcile_interval_secs: 60,
            reconcile_grace_secs: 0,
        }
    }

    /// Service wired against live test databases, migrations applied.
    async fn setup_service() -> (SettlementService, PgPool, PgPool) {
        let hub_pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(2)
            .connect(&hub_url())
            .await
            .expect("Failed to connect to test hub database");
        db::check_health(&hub_pool).await.expect("hub healthy");
        db::run_hub_migrations(&hub_pool)
            .await
            .expect("hub migrations");

        let shard_pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(2)
            .connect(&shard_url())
            .await
            .expect("Failed to connect to test shard database");
        db::run_shard_migrations(&shard_pool)
            .await
            .expect("shard migrations");

        let config = test_config(Some((TEST_CITY, shard_url())));
        let router = ShardRouter::from_config(&config).expect("router");

        let service = SettlementService::new(
            RequestStore::new(hub_pool.clone()),
            router,
            AuditTrail::new(hub_pool.clone()),
            config.pix.clone(),
        );

        (service, hub_pool, shard_pool)
    }

    /// Service whose pools are never dialed, for tests that fail before
    /// the first store call.
    fn setup_offline_service(shard: Option<(CityKey, String)>) -> SettlementService {
        let config = test_config(shard);
        let hub_pool = db::create_lazy_pool(&config.hub_database_url, 1).expect("lazy hub pool");
        let router = ShardRouter::from_config(&config).expect("router");

        SettlementService::new(
            RequestStore::new(hub_pool.clone()),
            router,
            AuditTrail::new(hub_pool),
            config.pix.clone(),
        )
    }

    async fn seed_loan(
        shard_pool: &PgPool,
        original: Decimal,
        rate: Decimal,
        total: Decimal,
    ) -> Uuid {
        let store = LedgerStore::new(shard_pool.clone());
        let loan = store
            .insert_loan(NewLoan {
                client_id: Uuid::new_v4(),
                original_amount: original,
                interest_rate: rate,
                total_amount: total,
                loan_date: Utc::now().date_naive() - Duration::days(30),
                due_date: Utc::now().date_naive() + Duration::days(5),
            })
            .await
            .expect("seed loan");
        loan.id
    }

    fn create_dto(loan_id: Uuid, payment_type: PaymentType) -> CreatePaymentRequest {
        CreatePaymentRequest {
            loan_id,
            payment_type,
            city: TEST_CITY,
            client_identifier: Some("047.123.456-00".to_string()),
            client_note: Some("comprovante enviado".to_string()),
        }
    }

    fn admin() -> AdminIdentity {
        AdminIdentity {
            id: Uuid::new_v4(),
            email: "admin@loja.com".to_string(),
            role: "admin".to_string(),
        }
    }

    async fn payments_for_loan(shard_pool: &PgPool, loan_id: Uuid) -> i64 {
        sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM payments WHERE loan_id = $1")
            .bind(loan_id)
            .fetch_one(shard_pool)
            .await
            .expect("count payments")
            .0
    }

    // ===== Tests that need no database =====

    #[tokio::test]
    async fn test_create_for_unlisted_city_is_unroutable() {
        let service = setup_offline_service(None);

        let result = service
            .create_request(CreatePaymentRequest {
                loan_id: Uuid::new_v4(),
                payment_type: PaymentType::InterestRenewal,
                city: CityKey::Outro,
                client_identifier: None,
                client_note: None,
            })
            .await;

        assert!(matches!(result, Err(SettlementError::UnroutableCity(_))));
    }

    #[tokio::test]
    async fn test_create_for_unconfigured_city_is_config_error() {
        // Only Praia Grande is configured; Mogiana is recognised but bare.
        let service = setup_offline_service(Some((TEST_CITY, shard_url())));

        let result = service
            .create_request(CreatePaymentRequest {
                loan_id: Uuid::new_v4(),
                payment_type: PaymentType::FullSettlement,
                city: CityKey::Mogiana,
                client_identifier: None,
                client_note: None,
            })
            .await;

        assert!(matches!(
            result,
            Err(SettlementError::ShardUnconfigured(CityKey::Mogiana))
        ));
    }

    #[tokio::test]
    async fn test_reject_requires_non_blank_reason() {
        let service = setup_offline_service(None);

        for reason in ["", "   ", "\t\n"] {
            let result = service.reject(Uuid::new_v4(), &admin(), reason).await;
            assert!(
                matches!(result, Err(SettlementError::Validation(_))),
                "reason {reason:?} should fail validation"
            );
        }
    }

    // ===== Database-backed flows =====

    #[tokio::test]
    #[ignore] // Requires hub and shard databases
    async fn test_create_renewal_snapshots_interest_and_encodes_payload() {
        let (service, _hub, shard_pool) = setup_service().await;
        let loan_id = seed_loan(&shard_pool, dec!(1000.00), dec!(10.00), dec!(1100.00)).await;

        let created = service
            .create_request(create_dto(loan_id, PaymentType::InterestRenewal))
            .await
            .expect("create request");

        assert_eq!(created.amount, dec!(100.00));
        assert!(!created.pix_payload.is_empty());
        assert!(created.pix_payload.is_ascii());

        // The last four characters are the checksum of everything before
        // them.
        let (body, crc) = created.pix_payload.split_at(created.pix_payload.len() - 4);
        assert_eq!(crc, pix::crc16_ccitt(body));
        assert!(created.pix_payload.contains("5406100.00"));
    }

    #[tokio::test]
    #[ignore] // Requires hub and shard databases
    async fn test_create_for_settled_loan_looks_missing() {
        let (service, _hub, shard_pool) = setup_service().await;
        let loan_id = seed_loan(&shard_pool, dec!(500.00), dec!(8.00), dec!(540.00)).await;

        sqlx::query("UPDATE loans SET status = 'paid' WHERE id = $1")
            .bind(loan_id)
            .execute(&shard_pool)
            .await
            .expect("settle loan");

        let result = service
            .create_request(create_dto(loan_id, PaymentType::InterestRenewal))
            .await;

        assert!(matches!(result, Err(SettlementError::LoanNotFound)));
    }

    #[tokio::test]
    #[ignore] // Requires hub and shard databases
    async fn test_renewal_approval_advances_due_date_thirty_days() {
        let (service, _hub, shard_pool) = setup_service().await;
        let loan_id = seed_loan(&shard_pool, dec!(1000.00), dec!(10.00), dec!(1100.00)).await;

        let store = LedgerStore::new(shard_pool.clone());
        let due_before = store
            .fetch_loan(loan_id)
            .await
            .unwrap()
            .unwrap()
            .due_date;

        let created = service
            .create_request(create_dto(loan_id, PaymentType::InterestRenewal))
            .await
            .expect("create request");
        service.approve(created.id, &admin()).await.expect("approve");

        let loan = store.fetch_loan(loan_id).await.unwrap().unwrap();
        assert_eq!(loan.due_date, due_before + Duration::days(30));
        assert_eq!(loan.status, LoanStatus::Active);

        let payment = store
            .payment_by_settlement_ref(created.id)
            .await
            .unwrap()
            .expect("payment row");
        assert_eq!(payment.amount, dec!(100.00));
        assert_eq!(payment.fine_amount, Decimal::ZERO);
        assert!(payment.notes.contains("admin@loja.com"));
    }

    #[tokio::test]
    #[ignore] // Requires hub and shard databases
    async fn test_full_settlement_uses_creation_snapshot() {
        let (service, _hub, shard_pool) = setup_service().await;
        let loan_id = seed_loan(&shard_pool, dec!(2000.00), dec!(5.00), dec!(2100.00)).await;

        let created = service
            .create_request(create_dto(loan_id, PaymentType::FullSettlement))
            .await
            .expect("create request");
        assert_eq!(created.amount, dec!(2100.00));

        // Mutating the loan after creation must not affect the settlement
        // amount.
        sqlx::query("UPDATE loans SET total_amount = $1 WHERE id = $2")
            .bind(dec!(9999.99))
            .bind(loan_id)
            .execute(&shard_pool)
            .await
            .expect("mutate total");

        service.approve(created.id, &admin()).await.expect("approve");

        let store = LedgerStore::new(shard_pool.clone());
        let loan = store.fetch_loan(loan_id).await.unwrap().unwrap();
        assert_eq!(loan.status, LoanStatus::Paid);

        assert_eq!(payments_for_loan(&shard_pool, loan_id).await, 1);
        let payment = store
            .payment_by_settlement_ref(created.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(payment.amount, dec!(2100.00));
    }

    #[tokio::test]
    #[ignore] // Requires hub and shard databases
    async fn test_second_approval_observes_terminal_state() {
        let (service, _hub, shard_pool) = setup_service().await;
        let loan_id = seed_loan(&shard_pool, dec!(1000.00), dec!(10.00), dec!(1100.00)).await;

        let created = service
            .create_request(create_dto(loan_id, PaymentType::InterestRenewal))
            .await
            .expect("create request");

        service.approve(created.id, &admin()).await.expect("first approve");

        let second = service.approve(created.id, &admin()).await;
        assert!(matches!(second, Err(SettlementError::RequestNotPending)));
        assert_eq!(payments_for_loan(&shard_pool, loan_id).await, 1);
    }

    #[tokio::test]
    #[ignore] // Requires hub and shard databases
    async fn test_reject_is_terminal_and_touches_no_shard_state() {
        let (service, hub_pool, shard_pool) = setup_service().await;
        let loan_id = seed_loan(&shard_pool, dec!(1000.00), dec!(10.00), dec!(1100.00)).await;

        let created = service
            .create_request(create_dto(loan_id, PaymentType::InterestRenewal))
            .await
            .expect("create request");

        // Blank reason changes nothing.
        let blank = service.reject(created.id, &admin(), "   ").await;
        assert!(matches!(blank, Err(SettlementError::Validation(_))));
        let store = RequestStore::new(hub_pool.clone());
        assert!(store.fetch_pending(created.id).await.unwrap().is_some());

        service
            .reject(created.id, &admin(), "comprovante ilegível")
            .await
            .expect("reject");

        assert!(store.fetch_pending(created.id).await.unwrap().is_none());
        assert_eq!(payments_for_loan(&shard_pool, loan_id).await, 0);

        // Terminal: neither approve nor a second reject may proceed.
        let approve = service.approve(created.id, &admin()).await;
        assert!(matches!(approve, Err(SettlementError::RequestNotPending)));
        let again = service.reject(created.id, &admin(), "de novo").await;
        assert!(matches!(again, Err(SettlementError::RequestNotPending)));
    }

    #[tokio::test]
    #[ignore] // Requires hub and shard databases
    async fn test_receipts_attach_in_upload_order_and_are_optional() {
        let (service, hub_pool, shard_pool) = setup_service().await;
        let loan_id = seed_loan(&shard_pool, dec!(1000.00), dec!(10.00), dec!(1100.00)).await;

        let created = service
            .create_request(create_dto(loan_id, PaymentType::InterestRenewal))
            .await
            .expect("create request");

        let store = RequestStore::new(hub_pool.clone());
        store
            .attach_receipt(
                created.id,
                &ReceiptRef {
                    storage_path: "receipts/a.jpg".to_string(),
                    mime_type: "image/jpeg".to_string(),
                },
            )
            .await
            .expect("first receipt");
        store
            .attach_receipt(
                created.id,
                &ReceiptRef {
                    storage_path: "receipts/b.pdf".to_string(),
                    mime_type: "application/pdf".to_string(),
                },
            )
            .await
            .expect("second receipt");

        let receipts = store.receipts_for(created.id).await.expect("list receipts");
        assert_eq!(receipts.len(), 2);
        assert_eq!(receipts[0].storage_path, "receipts/a.jpg");
        assert_eq!(receipts[1].mime_type, "application/pdf");

        // Approval never requires receipts; a request without any still
        // settles.
        let bare_loan = seed_loan(&shard_pool, dec!(300.00), dec!(10.00), dec!(330.00)).await;
        let bare = service
            .create_request(create_dto(bare_loan, PaymentType::InterestRenewal))
            .await
            .expect("create bare request");
        service.approve(bare.id, &admin()).await.expect("approve bare");
    }

    #[tokio::test]
    #[ignore] // Requires hub and shard databases
    async fn test_reconciler_finalizes_claim_with_shard_payment() {
        let (service, hub_pool, shard_pool) = setup_service().await;
        let loan_id = seed_loan(&shard_pool, dec!(1000.00), dec!(10.00), dec!(1100.00)).await;

        let created = service
            .create_request(create_dto(loan_id, PaymentType::InterestRenewal))
            .await
            .expect("create request");

        // Simulate an approval that died after the shard settle: claim the
        // hub row and settle the shard by hand, skipping the finalize.
        let store = RequestStore::new(hub_pool.clone());
        let request = store.fetch_pending(created.id).await.unwrap().unwrap();
        let token = Uuid::new_v4();
        assert!(store.claim(created.id, token, admin().id).await.unwrap());

        let ledger = LedgerStore::new(shard_pool.clone());
        ledger
            .settle(&request, "RENOVAÇÃO +30 DIAS - Somente Juros | Método: pix")
            .await
            .expect("shard settle");

        let healed = service
            .reconcile_stale_claims(Duration::seconds(0))
            .await
            .expect("reconcile");
        assert!(healed >= 1);

        // Healed to approved, still exactly one payment.
        assert!(store.fetch_pending(created.id).await.unwrap().is_none());
        assert_eq!(payments_for_loan(&shard_pool, loan_id).await, 1);
    }

    #[tokio::test]
    #[ignore] // Requires hub and shard databases
    async fn test_reconciler_releases_claim_without_shard_payment() {
        let (service, hub_pool, shard_pool) = setup_service().await;
        let loan_id = seed_loan(&shard_pool, dec!(1000.00), dec!(10.00), dec!(1100.00)).await;

        let created = service
            .create_request(create_dto(loan_id, PaymentType::InterestRenewal))
            .await
            .expect("create request");

        // Claim written, shard never reached.
        let store = RequestStore::new(hub_pool.clone());
        let token = Uuid::new_v4();
        assert!(store.claim(created.id, token, admin().id).await.unwrap());

        let healed = service
            .reconcile_stale_claims(Duration::seconds(0))
            .await
            .expect("reconcile");
        assert!(healed >= 1);

        // The claim is gone and a normal approval goes through.
        let request = store.fetch_pending(created.id).await.unwrap().unwrap();
        assert!(request.settlement_token.is_none());
        service.approve(created.id, &admin()).await.expect("approve");
        assert_eq!(payments_for_loan(&shard_pool, loan_id).await, 1);
    }
}
