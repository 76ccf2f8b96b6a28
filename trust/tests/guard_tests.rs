
use mocks::MemoryTrustStore;
use std::sync::Arc;
use trust::engine::ScoreEngine;
use trust::error::TrustError;
use trust::guard::CancellationGuard;
use trust::model::{Identity, NewOrder, Order, OrderStatus, TrustTier};
use trust::policy::ScorePolicy;
use trust::storage::{HistoryLedger, OrderStore, ScoreStore};

fn new_order(phone: &str) -> NewOrder {
    NewOrder {
        order_number: format!("ORD-{phone}"),
        user_id: Some(7),
        guest_email: Some("owner@example.com".to_string()),
        guest_phone: phone.to_string(),
        customer_name: Some("Owner".to_string()),
        total_amount: 42.0,
    }
}

fn owner() -> Identity {
    Identity {
        user_id: Some(7),
        email: None,
    }
}

async fn setup() -> (Arc<MemoryTrustStore>, CancellationGuard) {
    let store = Arc::new(MemoryTrustStore::new());
    let engine = Arc::new(ScoreEngine::new(
        store.clone(),
        store.clone(),
        ScorePolicy::default(),
    ));
    let guard = CancellationGuard::new(store.clone(), engine);
    (store, guard)
}

async fn place(store: &Arc<MemoryTrustStore>, phone: &str) -> Order {
    store.save_order(&new_order(phone)).await.unwrap()
}

#[tokio::test]
async fn owner_can_cancel_a_pending_order() {
    let (store, guard) = setup().await;
    let order = place(&store, "0552000001").await;

    let cancelled = guard.cancel(order.id, &owner()).await.unwrap();

    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    let stored = store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Cancelled);

    // The cancellation reached the score.
    let score = store.get_score("0552000001").await.unwrap().unwrap();
    assert_eq!(score.trust_score, 85);
    assert_eq!(score.total_returns, 1);
    assert_eq!(store.list_recent("0552000001", 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn guest_email_also_counts_as_ownership() {
    let (store, guard) = setup().await;
    let order = place(&store, "0552000002").await;

    let identity = Identity {
        user_id: None,
        email: Some("OWNER@example.com".to_string()),
    };
    let cancelled = guard.cancel(order.id, &identity).await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
}

#[tokio::test]
async fn second_cancellation_fails_with_invalid_state() {
    let (store, guard) = setup().await;
    let order = place(&store, "0552000003").await;

    guard.cancel(order.id, &owner()).await.unwrap();
    let second = guard.cancel(order.id, &owner()).await;

    assert!(matches!(
        second,
        Err(TrustError::InvalidState {
            status: OrderStatus::Cancelled,
            ..
        })
    ));

    // Penalized exactly once.
    let score = store.get_score("0552000003").await.unwrap().unwrap();
    assert_eq!(score.total_returns, 1);
}

#[tokio::test]
async fn non_owner_is_forbidden_and_nothing_mutates() {
    let (store, guard) = setup().await;
    let order = place(&store, "0552000004").await;

    let stranger = Identity {
        user_id: Some(8),
        email: Some("stranger@example.com".to_string()),
    };
    let result = guard.cancel(order.id, &stranger).await;
    assert!(matches!(result, Err(TrustError::Forbidden(_))));

    let stored = store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Pending);
    assert!(store.get_score("0552000004").await.unwrap().is_none());
}

#[tokio::test]
async fn missing_order_is_not_found() {
    let (_store, guard) = setup().await;
    let result = guard.cancel(9999, &owner()).await;
    assert!(matches!(result, Err(TrustError::OrderNotFound(9999))));
}

#[tokio::test]
async fn anonymous_caller_is_unauthorized() {
    let (store, guard) = setup().await;
    let order = place(&store, "0552000005").await;

    let result = guard.cancel(order.id, &Identity::default()).await;
    assert!(matches!(result, Err(TrustError::Unauthorized)));

    let stored = store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Pending);
}

#[tokio::test]
async fn fulfilled_orders_cannot_be_cancelled() {
    let (store, guard) = setup().await;
    let order = place(&store, "0552000006").await;
    store.mark_fulfilled(order.id).await.unwrap();

    let result = guard.cancel(order.id, &owner()).await;
    assert!(matches!(
        result,
        Err(TrustError::InvalidState {
            status: OrderStatus::Fulfilled,
            ..
        })
    ));
}

#[tokio::test]
async fn repeated_cancellations_drive_the_tier_down() {
    let (store, guard) = setup().await;
    let phone = "0552000007";

    for _ in 0..4 {
        let order = place(&store, phone).await;
        guard.cancel(order.id, &owner()).await.unwrap();
    }

    let score = store.get_score(phone).await.unwrap().unwrap();
    assert_eq!(score.trust_score, 40);
    assert_eq!(score.status, TrustTier::Watch);
    assert_eq!(score.total_returns, 4);
}
