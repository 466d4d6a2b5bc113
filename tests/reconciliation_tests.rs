mod common;

use cardlink::application::engine::LinkEvent;
use cardlink::domain::session::LinkStatus;
use cardlink::infrastructure::in_memory::{InMemoryCheckoutExecutor, InMemoryLinkGateway};
use common::{account, engine_with, fast_config, method, next_status};
use std::time::Duration;
use tokio::time::sleep;

// The baseline snapshot is fetch #1; poll ticks fetch from #2 onwards.

#[tokio::test(start_paused = true)]
async fn confirms_after_webhook_lands_mid_flight() {
    let gateway = InMemoryLinkGateway::new();
    // Unchanged for the first two poll ticks, new card visible on the third.
    gateway.stage_methods_after(3, vec![method("pm_1")]).await;
    let (engine, mut events) =
        engine_with(&gateway, InMemoryCheckoutExecutor::pending(), fast_config());

    let session = engine
        .initiate_link(account("acct_1"), None)
        .await
        .unwrap();
    assert_eq!(session.reference().as_str(), "R1");
    assert_eq!(session.status(), LinkStatus::Pending);

    assert_eq!(next_status(&mut events).await, LinkStatus::Pending);
    assert_eq!(next_status(&mut events).await, LinkStatus::Verifying);
    assert_eq!(next_status(&mut events).await, LinkStatus::Confirmed);
    match events.recv().await.unwrap() {
        LinkEvent::NewMethodsDetected(methods) => {
            assert_eq!(methods.len(), 1);
            assert_eq!(methods[0].id, "pm_1");
            assert_eq!(methods[0].last4, "4242");
        }
        other => panic!("expected method detection, got {other:?}"),
    }

    assert_eq!(session.status(), LinkStatus::Confirmed);
    assert!(engine.current_session().await.is_none());

    // The loop is gone: no further fetches, no further events.
    let fetches = gateway.fetch_count().await;
    sleep(Duration::from_secs(10)).await;
    assert_eq!(gateway.fetch_count().await, fetches);
    assert!(events.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn times_out_when_snapshot_never_changes() {
    let gateway = InMemoryLinkGateway::new();
    let mut config = fast_config();
    config.timeout_budget = Duration::from_secs(5);
    let (engine, mut events) =
        engine_with(&gateway, InMemoryCheckoutExecutor::pending(), config);

    let session = engine
        .initiate_link(account("acct_1"), None)
        .await
        .unwrap();
    assert_eq!(next_status(&mut events).await, LinkStatus::Pending);
    assert_eq!(next_status(&mut events).await, LinkStatus::Verifying);

    // Indeterminate, not failed: the backend may still confirm later.
    assert_eq!(next_status(&mut events).await, LinkStatus::TimedOut);
    assert_eq!(session.status(), LinkStatus::TimedOut);
    assert!(engine.current_session().await.is_none());

    let fetches = gateway.fetch_count().await;
    sleep(Duration::from_secs(10)).await;
    assert_eq!(gateway.fetch_count().await, fetches);
    assert!(events.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn gives_up_after_persistent_fetch_failures() {
    let gateway = InMemoryLinkGateway::new();
    let (engine, mut events) =
        engine_with(&gateway, InMemoryCheckoutExecutor::pending(), fast_config());

    let session = engine
        .initiate_link(account("acct_1"), None)
        .await
        .unwrap();
    assert_eq!(next_status(&mut events).await, LinkStatus::Pending);
    assert_eq!(next_status(&mut events).await, LinkStatus::Verifying);
    gateway.fail_all_fetches(true).await;

    assert_eq!(next_status(&mut events).await, LinkStatus::TimedOut);
    assert_eq!(session.status(), LinkStatus::TimedOut);
    // Baseline fetch plus max_consecutive_failures + 1 failing ticks.
    assert_eq!(gateway.fetch_count().await, 5);
}

#[tokio::test(start_paused = true)]
async fn transient_fetch_failures_are_retried_silently() {
    let gateway = InMemoryLinkGateway::new();
    let (engine, mut events) =
        engine_with(&gateway, InMemoryCheckoutExecutor::pending(), fast_config());

    let session = engine
        .initiate_link(account("acct_1"), None)
        .await
        .unwrap();
    assert_eq!(next_status(&mut events).await, LinkStatus::Pending);
    assert_eq!(next_status(&mut events).await, LinkStatus::Verifying);

    // Two failures, under the bound of three, then the card appears.
    gateway.fail_next_fetches(2).await;
    gateway.set_payment_methods(vec![method("pm_1")]).await;

    assert_eq!(next_status(&mut events).await, LinkStatus::Confirmed);
    assert_eq!(session.status(), LinkStatus::Confirmed);
}

#[tokio::test(start_paused = true)]
async fn cancel_halts_polling_within_one_interval() {
    let gateway = InMemoryLinkGateway::new();
    let (engine, mut events) =
        engine_with(&gateway, InMemoryCheckoutExecutor::pending(), fast_config());

    let session = engine
        .initiate_link(account("acct_1"), None)
        .await
        .unwrap();
    assert_eq!(next_status(&mut events).await, LinkStatus::Pending);
    assert_eq!(next_status(&mut events).await, LinkStatus::Verifying);
    sleep(Duration::from_millis(2500)).await;

    assert!(engine.cancel_link().await);
    // Store is empty immediately, before the loop even wakes.
    assert!(engine.current_session().await.is_none());
    assert_eq!(next_status(&mut events).await, LinkStatus::Cancelled);
    assert_eq!(session.status(), LinkStatus::Cancelled);

    let fetches = gateway.fetch_count().await;
    sleep(Duration::from_secs(5)).await;
    assert_eq!(gateway.fetch_count().await, fetches);
    assert!(!engine.cancel_link().await);
}

#[tokio::test(start_paused = true)]
async fn polling_cadence_is_single() {
    let gateway = InMemoryLinkGateway::new();
    let (engine, mut events) =
        engine_with(&gateway, InMemoryCheckoutExecutor::pending(), fast_config());

    engine
        .initiate_link(account("acct_1"), None)
        .await
        .unwrap();
    assert_eq!(next_status(&mut events).await, LinkStatus::Pending);
    assert_eq!(next_status(&mut events).await, LinkStatus::Verifying);

    let start = gateway.fetch_count().await;
    sleep(Duration::from_millis(5500)).await;
    // One fetch per tick: five ticks, five fetches, no doubled cadence.
    assert_eq!(gateway.fetch_count().await, start + 5);
}

#[tokio::test(start_paused = true)]
async fn verification_runs_on_its_own_interval_and_failures_are_ignored() {
    let gateway = InMemoryLinkGateway::new();
    gateway.fail_verify(true).await;
    let (engine, mut events) =
        engine_with(&gateway, InMemoryCheckoutExecutor::pending(), fast_config());

    let session = engine
        .initiate_link(account("acct_1"), None)
        .await
        .unwrap();
    assert_eq!(next_status(&mut events).await, LinkStatus::Pending);
    assert_eq!(next_status(&mut events).await, LinkStatus::Verifying);

    // verify_interval is 3s against a 1s poll: nudges at ~3s and ~6s.
    sleep(Duration::from_millis(7500)).await;
    assert_eq!(gateway.verify_count().await, 2);
    assert_eq!(session.status(), LinkStatus::Verifying);

    // Failing verification never aborts reconciliation.
    gateway.set_payment_methods(vec![method("pm_1")]).await;
    assert_eq!(next_status(&mut events).await, LinkStatus::Confirmed);
}
