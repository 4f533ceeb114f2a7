mod helpers;

use helpers::*;
use std::sync::Arc;
use sum28_backend::config::CollectorConfig;
use sum28_backend::models::*;
use sum28_backend::scheduler::jobs::{
    standard_scheduler, BETTING_WINDOW_JOB, COLLECTOR_JOB, SETTLEMENT_JOB,
};
use sum28_backend::scheduler::RunOutcome;
use sum28_backend::services::DrawCollector;

fn unreachable_collector() -> CollectorConfig {
    CollectorConfig {
        url: "http://127.0.0.1:1/data/last.json".to_string(),
        timeout_secs: 1,
        ..CollectorConfig::default()
    }
}

/// End-to-end test: draw, bet on the next round, settle through the scheduled jobs
#[tokio::test]
async fn test_complete_round_flow_through_jobs() {
    let app = TestApp::new().await;
    let collector_config = unreachable_collector();
    let collector = Arc::new(
        DrawCollector::new(&collector_config, app.state.issues.clone())
            .expect("Failed to build collector"),
    );
    let scheduler = standard_scheduler(
        &app.config.scheduler,
        &collector_config,
        collector,
        app.state.issues.clone(),
        app.state.settlement.clone(),
    );
    assert_eq!(
        scheduler.job_names(),
        vec![COLLECTOR_JOB, BETTING_WINDOW_JOB, SETTLEMENT_JOB]
    );

    // Step 1: A draw arrives and opens the next round
    app.draw("10000", "0,0,0").await;
    let current = app
        .state
        .issues
        .current_round()
        .await
        .expect("Failed to read current round")
        .expect("No current round");
    assert_eq!(current.round_code, "10001");
    assert!(current.allow_bet);

    // Step 2: Two players bet on it
    let alice = app.funded_user("alice", 50_00).await;
    let bob = app.funded_user("bob", 50_00).await;

    let alice_order = app
        .state
        .order_service
        .place_order(order_request(alice, "10001", vec![pick("13", 2_00), pick("big", 10_00)]))
        .await
        .expect("Alice's order failed");
    let bob_order = app
        .state
        .order_service
        .place_order(order_request(bob, "10001", vec![pick("small", 20_00)]))
        .await
        .expect("Bob's order failed");

    // Step 3: Jobs tick before the draw; nothing settles yet
    assert_eq!(
        scheduler.trigger(BETTING_WINDOW_JOB).await,
        Some(RunOutcome::Completed)
    );
    assert_eq!(
        scheduler.trigger(SETTLEMENT_JOB).await,
        Some(RunOutcome::Completed)
    );
    assert_eq!(
        app.order(alice_order.order_id).await.status_enum(),
        OrderStatus::AwaitingSettlement
    );

    // Step 4: The round is drawn, 5+4+4=13
    let round = app.draw("10001", "5,4,4").await;
    assert_eq!(round.sum_value, Some(13));
    assert_eq!(round.odd_even.as_deref(), Some("odd"));

    assert_eq!(
        scheduler.trigger(SETTLEMENT_JOB).await,
        Some(RunOutcome::Completed)
    );

    // Step 5: Alice hit the exact sum, Bob hit small
    let alice_detail = app
        .state
        .order_service
        .get_order(alice, alice_order.order_id)
        .await
        .expect("Failed to load order");
    assert_eq!(alice_detail.order.status_enum(), OrderStatus::Paid);
    assert_eq!(alice_detail.order.win_amount, money(52_00));

    let bob_detail = app
        .state
        .order_service
        .get_order(bob, bob_order.order_id)
        .await
        .expect("Failed to load order");
    assert_eq!(bob_detail.order.status_enum(), OrderStatus::Paid);
    assert_eq!(bob_detail.order.win_amount, money(39_60));

    assert_eq!(app.wallet(alice).await.available, money(90_00));
    assert_eq!(app.wallet(bob).await.available, money(69_60));

    // Step 6: History reflects both draws, newest first
    let history = app.state.issues.history(10).await.expect("Failed to read history");
    let codes: Vec<&str> = history.iter().map(|s| s.round_code.as_str()).collect();
    assert_eq!(codes, vec!["10001", "10000"]);

    // A provider outage is logged and swallowed
    assert_eq!(
        scheduler.trigger(COLLECTOR_JOB).await,
        Some(RunOutcome::Failed)
    );
    assert_eq!(scheduler.trigger("no_such_job").await, None);
}

#[tokio::test]
async fn test_scheduler_starts_and_shuts_down() {
    let app = TestApp::new().await;
    let collector_config = unreachable_collector();
    let collector = Arc::new(
        DrawCollector::new(&collector_config, app.state.issues.clone())
            .expect("Failed to build collector"),
    );
    let scheduler = standard_scheduler(
        &app.config.scheduler,
        &collector_config,
        collector,
        app.state.issues.clone(),
        app.state.settlement.clone(),
    );

    let handle = scheduler.start();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    tokio::time::timeout(std::time::Duration::from_secs(5), handle.shutdown())
        .await
        .expect("Scheduler did not shut down");
}
