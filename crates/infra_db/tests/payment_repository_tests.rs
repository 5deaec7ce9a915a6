//! PostgreSQL adapter tests
//!
//! These start a PostgreSQL container and are ignored by default. Run with
//! `cargo test -p infra_db -- --ignored` on a machine with Docker.

use chrono::Duration;
use rust_decimal_macros::dec;

use core_kernel::{Currency, HealthCheckable};
use domain_payment::{
    Dimension, Pagination, PaymentFilter, PaymentFrequency, PaymentMethod, PaymentQuery,
    PaymentRepository, PaymentStatus, PaymentType, SortDirection, SortField,
};
use infra_db::PostgresPaymentAdapter;
use test_utils::{
    assert_net_consistent, assert_page_consistent, create_isolated_test_database,
    IdFixtures, TemporalFixtures, TestDatabase, TestPaymentBuilder,
};

async fn setup() -> (TestDatabase, PostgresPaymentAdapter) {
    let db = create_isolated_test_database()
        .await
        .expect("Failed to create test database");
    let adapter = PostgresPaymentAdapter::new(db.pool().clone());
    (db, adapter)
}

// ============================================================================
// Writes and lookups
// ============================================================================

mod write_tests {
    use super::*;

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_insert_and_find_round_trips_every_field() {
        let (_db, adapter) = setup().await;
        let payment = TestPaymentBuilder::new()
            .with_fee(dec!(12.50))
            .with_currency(Currency::EUR)
            .recurring(PaymentFrequency::Monthly, TemporalFixtures::rent_due())
            .with_remaining_payments(6)
            .build();

        adapter.insert(&payment).await.unwrap();
        let stored = adapter.find_by_id(payment.id).await.unwrap().unwrap();

        assert_eq!(stored.reference, payment.reference);
        assert_eq!(stored.currency, Currency::EUR);
        assert_eq!(stored.net_amount.amount(), dec!(937.50));
        assert_eq!(stored.frequency, Some(PaymentFrequency::Monthly));
        assert_eq!(stored.remaining_payments, Some(6));
        assert_eq!(stored.payer_id, IdFixtures::tenant_id());
        assert_net_consistent(&stored);
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_update_persists_status() {
        let (_db, adapter) = setup().await;
        let mut payment = TestPaymentBuilder::new().build();
        adapter.insert(&payment).await.unwrap();

        payment
            .settle_manually(IdFixtures::agent_id(), TemporalFixtures::now())
            .unwrap();
        adapter.update(&payment).await.unwrap();

        let stored = adapter.find_by_id(payment.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Completed);
        assert!(stored.is_manual);
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_update_missing_payment_is_not_found() {
        let (_db, adapter) = setup().await;
        let payment = TestPaymentBuilder::new().build();

        let err = adapter.update(&payment).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_duplicate_gateway_intent_is_conflict() {
        let (_db, adapter) = setup().await;
        let first = TestPaymentBuilder::new()
            .with_method(PaymentMethod::Card)
            .with_intent("pi_shared")
            .with_status(PaymentStatus::Processing)
            .build();
        let second = TestPaymentBuilder::new()
            .with_method(PaymentMethod::Card)
            .with_intent("pi_shared")
            .with_status(PaymentStatus::Processing)
            .build();

        adapter.insert(&first).await.unwrap();
        let err = adapter.insert(&second).await.unwrap_err();
        assert!(matches!(err, core_kernel::PortError::Conflict { .. }));

        let found = adapter.find_by_gateway_intent("pi_shared").await.unwrap().unwrap();
        assert_eq!(found.id, first.id);
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_record_cycle_links_successor() {
        let (_db, adapter) = setup().await;
        let mut anchor = TestPaymentBuilder::new()
            .recurring(PaymentFrequency::Monthly, TemporalFixtures::month_end())
            .with_status(PaymentStatus::Completed)
            .build();
        adapter.insert(&anchor).await.unwrap();

        let due = TemporalFixtures::month_end();
        let successor = anchor.successor(due, TemporalFixtures::now()).unwrap();
        anchor.next_payment_date = Some(due + Duration::days(29));
        adapter.record_cycle(&anchor, &successor).await.unwrap();

        let relations = adapter.load_relations(&anchor).await.unwrap();
        assert_eq!(relations.children.len(), 1);
        assert_eq!(relations.children[0].id, successor.id);
        assert_eq!(relations.children[0].parent_payment_id, Some(anchor.id));
    }
}

// ============================================================================
// Relations
// ============================================================================

mod relation_tests {
    use super::*;

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_load_relations_resolves_seeded_rows() {
        let (db, adapter) = setup().await;
        let tenant = db.seed_user("tenant").await.unwrap();
        let landlord = db.seed_user("landlord").await.unwrap();
        let property = db.seed_property("Flat 2", Some(landlord)).await.unwrap();
        let tenancy = db.seed_tenancy(property, tenant).await.unwrap();

        let mut payment = TestPaymentBuilder::new()
            .with_payer(tenant)
            .with_property(Some(property))
            .build();
        payment.recipient_id = Some(landlord);
        payment.tenancy_id = Some(tenancy.into());
        adapter.insert(&payment).await.unwrap();

        let relations = adapter.load_relations(&payment).await.unwrap();
        assert_eq!(relations.payer.map(|u| u.id), Some(tenant));
        assert_eq!(relations.recipient.map(|u| u.id), Some(landlord));
        assert_eq!(relations.property.map(|p| p.title), Some("Flat 2".to_string()));
        assert_eq!(relations.tenancy.map(|t| t.id), Some(tenancy));
        assert!(relations.booking.is_none());
        assert!(relations.parent.is_none());
    }
}

// ============================================================================
// Search
// ============================================================================

mod search_tests {
    use super::*;

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_find_many_filters_and_paginates() {
        let (_db, adapter) = setup().await;
        for i in 0..5 {
            let payment = TestPaymentBuilder::new()
                .with_title(format!("Rent {}", i))
                .with_amount(dec!(100.00) * rust_decimal::Decimal::from(i + 1))
                .build();
            adapter.insert(&payment).await.unwrap();
        }
        let deposit = TestPaymentBuilder::new()
            .with_type(PaymentType::Deposit)
            .with_title("Deposit")
            .build();
        adapter.insert(&deposit).await.unwrap();

        let query = PaymentQuery {
            filter: PaymentFilter {
                payment_type: Some(PaymentType::Rent),
                ..PaymentFilter::default()
            },
            pagination: Pagination::new(Some(1), Some(2)),
            sort: SortField::Amount,
            direction: SortDirection::Desc,
        };
        let page = adapter.find_many(&query).await.unwrap();

        assert_eq!(page.total, 5);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.data.len(), 2);
        assert_eq!(page.data[0].amount.amount(), dec!(500.00));
        assert_page_consistent(&page);
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_search_matches_title_and_reference() {
        let (_db, adapter) = setup().await;
        let boiler = TestPaymentBuilder::new()
            .with_type(PaymentType::Maintenance)
            .with_title("Boiler repair 100%")
            .build();
        adapter.insert(&boiler).await.unwrap();
        adapter.insert(&TestPaymentBuilder::new().build()).await.unwrap();

        let mut query = PaymentQuery::default();
        query.filter.search = Some("100%".to_string());
        let page = adapter.find_many(&query).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.data[0].id, boiler.id);

        query.filter.search = Some(boiler.reference.to_lowercase());
        let page = adapter.find_many(&query).await.unwrap();
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_due_recurring_window() {
        let (_db, adapter) = setup().await;
        let due = TestPaymentBuilder::new()
            .recurring(PaymentFrequency::Weekly, TemporalFixtures::now())
            .with_status(PaymentStatus::Completed)
            .build();
        let later = TestPaymentBuilder::new()
            .recurring(PaymentFrequency::Weekly, TemporalFixtures::now() + Duration::days(3))
            .with_status(PaymentStatus::Completed)
            .build();
        let pending = TestPaymentBuilder::new()
            .recurring(PaymentFrequency::Weekly, TemporalFixtures::now())
            .build();
        for p in [&due, &later, &pending] {
            adapter.insert(p).await.unwrap();
        }

        let found = adapter
            .due_recurring(
                TemporalFixtures::now() - Duration::hours(24),
                TemporalFixtures::now(),
            )
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, due.id);
    }
}

// ============================================================================
// Aggregates
// ============================================================================

mod aggregate_tests {
    use super::*;

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_summarize_and_breakdown_skip_deleted() {
        let (_db, adapter) = setup().await;
        let completed = TestPaymentBuilder::new()
            .with_amount(dec!(200.00))
            .with_status(PaymentStatus::Completed)
            .build();
        let pending = TestPaymentBuilder::new().with_amount(dec!(50.00)).build();
        let mut deleted = TestPaymentBuilder::new().with_amount(dec!(999.00)).build();
        deleted
            .soft_delete(IdFixtures::agent_id(), TemporalFixtures::now())
            .unwrap();
        for p in [&completed, &pending, &deleted] {
            adapter.insert(p).await.unwrap();
        }

        let summary = adapter.summarize(&PaymentFilter::default()).await.unwrap();
        assert_eq!(summary.count, 2);
        assert_eq!(summary.amount, dec!(250.00));
        assert_eq!(summary.completed_count, 1);
        assert_eq!(summary.completed_amount, dec!(200.00));

        let by_status = adapter.breakdown(Dimension::Status).await.unwrap();
        let completed_row = by_status.iter().find(|r| r.key == "completed").unwrap();
        assert_eq!(completed_row.count, 1);
        assert!(by_status.iter().all(|r| r.amount != dec!(999.00)));
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_top_properties_and_recent() {
        let (db, adapter) = setup().await;
        let big = db.seed_property("Harbour House", None).await.unwrap();
        let small = db.seed_property("Mill Cottage", None).await.unwrap();

        adapter
            .insert(&TestPaymentBuilder::new().with_property(Some(big)).with_amount(dec!(2000)).build())
            .await
            .unwrap();
        adapter
            .insert(&TestPaymentBuilder::new().with_property(Some(small)).with_amount(dec!(300)).build())
            .await
            .unwrap();

        let top = adapter.top_properties(10).await.unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].property_id, big);
        assert_eq!(top[0].title.as_deref(), Some("Harbour House"));

        let recent = adapter.recent(1).await.unwrap();
        assert_eq!(recent.len(), 1);
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_health_check() {
        let (_db, adapter) = setup().await;
        let health = adapter.health_check().await;
        assert!(health.is_healthy());
    }
}
