// PostgreSQL repository tests; run with DATABASE_URL set and `--ignored`
mod helpers;

use chrono::{Duration, Utc};
use helpers::*;
use sqlx::PgPool;
use sum28_backend::models::*;
use sum28_backend::error::{AppError, RepositoryError};

// ============================================================================
// Schema
// ============================================================================

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn test_migrations_ran(pool: PgPool) {
    let tables = vec![
        "users",
        "wallet_accounts",
        "wallet_ledger",
        "lotteries",
        "play_types",
        "rounds",
        "orders",
        "order_items",
    ];

    for table in tables {
        let exists: (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT FROM information_schema.tables WHERE table_name = $1)",
        )
        .bind(table)
        .fetch_one(&pool)
        .await
        .expect("Failed to query information_schema");

        assert!(exists.0, "Table {} should exist", table);
    }
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn test_database_ping(pool: PgPool) {
    let db = TestDatabase::from_pool(pool).await;
    let database = db.state.database.as_ref().expect("Postgres state has a database");

    database.ping().await.expect("Ping failed");
    assert!(!database.pool().is_closed());
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn test_wallet_balances_cannot_go_negative(pool: PgPool) {
    let db = TestDatabase::from_pool(pool).await;
    let user_id = db.funded_user("constraint", 1_00).await;

    let result = sqlx::query("UPDATE wallet_accounts SET available = -1 WHERE user_id = $1")
        .bind(user_id)
        .execute(&db.pool)
        .await;
    assert!(result.is_err());
}

// ============================================================================
// Rounds
// ============================================================================

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn test_pending_insert_never_clobbers_drawn_round(pool: PgPool) {
    let db = TestDatabase::from_pool(pool).await;
    let now = Utc::now();

    let drawn = db
        .state
        .rounds
        .upsert_drawn_round(&DrawnRound {
            lottery_code: LOTTERY.to_string(),
            round_code: "100".to_string(),
            open_time: now,
            close_time: now - Duration::seconds(3),
            outcome: Outcome::from_numbers(1, 2, 3).expect("outcome"),
            raw_payload: "{}".to_string(),
        })
        .await
        .expect("Failed to upsert drawn round");
    assert!(drawn.is_drawn());

    let again = db
        .state
        .rounds
        .ensure_pending_round(&PendingRound {
            lottery_code: LOTTERY.to_string(),
            round_code: "100".to_string(),
            open_time: now + Duration::seconds(60),
            close_time: now + Duration::seconds(57),
        })
        .await
        .expect("Failed to ensure pending round");

    assert_eq!(again.id, drawn.id);
    assert!(again.is_drawn());
    assert_eq!(again.sum_value, Some(6));
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn test_corrected_draw_overwrites_round(pool: PgPool) {
    let db = TestDatabase::from_pool(pool).await;

    let first = db
        .state
        .issues
        .ingest_draw(&serde_json::json!({ "issue": "200", "code": "1,1,1" }))
        .await
        .expect("Ingest failed")
        .expect("Payload skipped");
    let corrected = db
        .state
        .issues
        .ingest_draw(&serde_json::json!({ "issue": "200", "code": "9,9,9" }))
        .await
        .expect("Ingest failed")
        .expect("Payload skipped");

    assert_eq!(corrected.id, first.id);
    assert_eq!(corrected.sum_value, Some(27));
    assert_eq!(corrected.extreme.as_deref(), Some("extreme-big"));

    let pending = db
        .state
        .rounds
        .find_round(LOTTERY, "201")
        .await
        .expect("Failed to find round")
        .expect("Next round missing");
    assert_eq!(pending.status_enum(), RoundStatus::Pending);
}

// ============================================================================
// Orders and wallets
// ============================================================================

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn test_place_and_settle_order(pool: PgPool) {
    let db = TestDatabase::from_pool(pool).await;
    let user_id = db.funded_user("pg_alice", 100_00).await;
    db.open_round("12345", 60).await;

    let placed = db
        .state
        .order_service
        .place_order(order_request(
            user_id,
            "12345",
            vec![pick("big", 10_00), pick("7", 5_00)],
        ))
        .await
        .expect("Failed to place order");

    let wallet = db.wallet(user_id).await;
    assert_eq!(wallet.available, money(85_00));
    assert_eq!(wallet.frozen, money(15_00));

    db.state
        .issues
        .ingest_draw(&serde_json::json!({ "issue": "12345", "code": "9,8,7" }))
        .await
        .expect("Ingest failed");

    let report = db.state.settlement.run_cycle().await.expect("Settlement failed");
    assert_eq!(report.settled, 1);
    assert_eq!(report.total_paid, money(19_80));

    let detail = db
        .state
        .order_service
        .get_order(user_id, placed.order_id)
        .await
        .expect("Failed to load order");
    assert_eq!(detail.order.status_enum(), OrderStatus::Paid);
    assert_eq!(detail.order.win_amount, money(19_80));
    assert_eq!(detail.items.len(), 2);

    let wallet = db.wallet(user_id).await;
    assert_eq!(wallet.available, money(104_80));
    assert_eq!(wallet.frozen, money(0));

    let again = db.state.settlement.run_cycle().await.expect("Settlement failed");
    assert_eq!(again.candidates, 0);

    let kinds: Vec<String> = db
        .state
        .wallets
        .ledger(user_id, 10)
        .await
        .expect("Failed to load ledger")
        .into_iter()
        .map(|e| e.biz_type)
        .collect();
    assert_eq!(kinds, vec!["payout", "bet", "deposit"]);
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn test_concurrent_orders_lock_the_wallet(pool: PgPool) {
    let db = TestDatabase::from_pool(pool).await;
    let user_id = db.funded_user("pg_carol", 10_00).await;
    db.open_round("777", 60).await;

    let service = db.state.order_service.clone();
    let (a, b) = tokio::join!(
        service.place_order(order_request(user_id, "777", vec![pick("odd", 8_00)])),
        service.place_order(order_request(user_id, "777", vec![pick("even", 8_00)])),
    );

    let results = [a, b];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        results
            .iter()
            .filter(|r| matches!(r, Err(AppError::InsufficientFunds { .. })))
            .count(),
        1
    );

    let wallet = db.wallet(user_id).await;
    assert_eq!(wallet.available, money(2_00));
    assert_eq!(wallet.frozen, money(8_00));
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn test_duplicate_idempotency_key_is_rejected_by_store(pool: PgPool) {
    let db = TestDatabase::from_pool(pool).await;
    let user_id = db.funded_user("pg_dave", 100_00).await;
    db.open_round("900", 60).await;

    let draft = OrderDraft {
        user_id,
        lottery_code: LOTTERY.to_string(),
        round_code: "900".to_string(),
        items: vec![DraftItem {
            selection: Selection::Big,
            odds: money(1_98),
            stake: money(10_00),
        }],
        total_amount: money(10_00),
        idempotency_key: Some("same-key".to_string()),
        channel: None,
        client_ip: None,
        auto_advance: true,
    };

    db.state.orders.place_order(&draft).await.expect("First placement failed");
    let err = db
        .state
        .orders
        .place_order(&draft)
        .await
        .expect_err("Second placement should fail");
    assert!(matches!(err, RepositoryError::Duplicate(_)));

    // The failed insert rolled back its freeze
    let wallet = db.wallet(user_id).await;
    assert_eq!(wallet.available, money(90_00));
    assert_eq!(wallet.frozen, money(10_00));
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn test_cancel_submitted_order(pool: PgPool) {
    let db = TestDatabase::from_pool(pool).await;
    let user_id = db.funded_user("pg_grace", 100_00).await;
    db.open_round("1001", 60).await;

    let draft = OrderDraft {
        user_id,
        lottery_code: LOTTERY.to_string(),
        round_code: "1001".to_string(),
        items: vec![DraftItem {
            selection: Selection::Sum(13),
            odds: money(26_00),
            stake: money(6_00),
        }],
        total_amount: money(6_00),
        idempotency_key: None,
        channel: None,
        client_ip: None,
        auto_advance: false,
    };
    let order = db.state.orders.place_order(&draft).await.expect("Placement failed");
    assert_eq!(order.status_enum(), OrderStatus::Submitted);

    let cancelled = db
        .state
        .orders
        .cancel_order(user_id, order.id)
        .await
        .expect("Cancel failed");
    assert_eq!(cancelled.status_enum(), OrderStatus::Cancelled);

    let wallet = db.wallet(user_id).await;
    assert_eq!(wallet.available, money(100_00));
    assert_eq!(wallet.frozen, money(0));

    let err = db
        .state
        .orders
        .cancel_order(user_id, order.id)
        .await
        .expect_err("Second cancel should fail");
    assert!(matches!(err, RepositoryError::InvalidState(_)));
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn test_order_of_deleted_user_is_voided(pool: PgPool) {
    let db = TestDatabase::from_pool(pool).await;
    let user_id = db.funded_user("pg_sam", 100_00).await;
    db.open_round("7000", 60).await;

    let placed = db
        .state
        .order_service
        .place_order(order_request(user_id, "7000", vec![pick("big", 10_00)]))
        .await
        .expect("Placement failed");

    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(&db.pool)
        .await
        .expect("Failed to delete user");

    db.state
        .issues
        .ingest_draw(&serde_json::json!({ "issue": "7000", "code": "9,8,7" }))
        .await
        .expect("Ingest failed");

    let report = db.state.settlement.run_cycle().await.expect("Settlement failed");
    assert_eq!(report.voided, 1);

    let order = db
        .state
        .orders
        .find_order(placed.order_id)
        .await
        .expect("Failed to load order")
        .expect("Order missing");
    assert_eq!(order.status_enum(), OrderStatus::Void);
}
