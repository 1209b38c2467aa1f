//! # Session Store Tests
//!
//! Integration tests for shared per-user session state: tracked bot
//! messages, active chats, media-group accumulators and per-user locks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crm_bot::session::SessionStore;
use teloxide::types::{MessageId, UserId};

fn user(n: u64) -> UserId {
    UserId(n)
}

#[tokio::test]
async fn test_last_message_replaced_per_user() {
    let store = SessionStore::new();

    store.set_last_message_id(user(1), MessageId(10)).await;
    store.set_last_message_id(user(1), MessageId(11)).await;
    store.set_last_message_id(user(2), MessageId(99)).await;

    assert_eq!(store.last_message_id(user(1)).await, Some(MessageId(11)));
    assert_eq!(store.last_message_id(user(2)).await, Some(MessageId(99)));

    store.clear_last_message_id(user(1)).await;
    assert_eq!(store.last_message_id(user(1)).await, None);
    assert_eq!(store.last_message_id(user(2)).await, Some(MessageId(99)));
}

#[tokio::test]
async fn test_active_chat_lifecycle() {
    let store = SessionStore::new();
    assert!(!store.is_user_in_chat(user(1), "order-1").await);

    store.set_active_chat(user(1), "order-1").await;
    assert_eq!(store.active_chat(user(1)).await, Some("order-1".to_string()));
    assert!(store.is_user_in_chat(user(1), "order-1").await);
    assert!(!store.is_user_in_chat(user(1), "order-2").await);

    // Entering another chat replaces the previous one
    store.set_active_chat(user(1), "order-2").await;
    assert!(store.is_user_in_chat(user(1), "order-2").await);
    assert!(!store.is_user_in_chat(user(1), "order-1").await);

    store.clear_active_chat(user(1)).await;
    assert_eq!(store.active_chat(user(1)).await, None);
}

#[tokio::test]
async fn test_language_preference() {
    let store = SessionStore::new();
    assert_eq!(store.language(user(1)).await, None);

    store.set_language(user(1), "ru").await;
    assert_eq!(store.language(user(1)).await, Some("ru".to_string()));
}

#[tokio::test]
async fn test_orders_view_cache() {
    let store = SessionStore::new();

    let view = store.orders_view(user(1)).await;
    assert!(view.orders.is_empty());
    assert_eq!(view.page, 0);

    store.set_orders_view(user(1), Vec::new(), 3).await;
    assert_eq!(store.orders_view(user(1)).await.page, 3);

    store.clear_orders_view(user(1)).await;
    assert_eq!(store.orders_view(user(1)).await.page, 0);
}

/// Only the first message of a media-group burst opens the accumulator;
/// whoever opened it owns the flush timer.
#[tokio::test]
async fn test_media_group_accumulation() {
    let store = SessionStore::new();

    assert!(
        store
            .push_media(user(1), "g1", Some("https://cdn.example.com/1.jpg".into()), None)
            .await
    );
    assert!(
        !store
            .push_media(
                user(1),
                "g1",
                Some("https://cdn.example.com/2.jpg".into()),
                Some("two photos"),
            )
            .await
    );
    assert!(!store.push_media(user(1), "g1", None, None).await);

    let group = store.take_media_group("g1").await.expect("group should exist");
    assert_eq!(
        group.image_urls,
        vec!["https://cdn.example.com/1.jpg", "https://cdn.example.com/2.jpg"]
    );
    assert_eq!(group.caption, "two photos");

    // Taken once, the accumulator is gone
    assert!(store.take_media_group("g1").await.is_none());
}

#[tokio::test]
async fn test_leaving_chat_drops_pending_media() {
    let store = SessionStore::new();

    store.set_active_chat(user(1), "order-1").await;
    store
        .push_media(user(1), "g1", Some("https://cdn.example.com/1.jpg".into()), None)
        .await;
    store
        .push_media(user(2), "g2", Some("https://cdn.example.com/2.jpg".into()), None)
        .await;

    store.clear_active_chat(user(1)).await;

    // User 1's unfinished burst is discarded, user 2's survives
    assert!(store.take_media_group("g1").await.is_none());
    assert!(store.take_media_group("g2").await.is_some());
}

#[tokio::test]
async fn test_user_guard_serializes_same_user() {
    let store = Arc::new(SessionStore::new());
    let entered = Arc::new(AtomicBool::new(false));

    let guard = store.user_guard(user(1)).await;

    let store2 = Arc::clone(&store);
    let entered2 = Arc::clone(&entered);
    let waiter = tokio::spawn(async move {
        let _guard = store2.user_guard(user(1)).await;
        entered2.store(true, Ordering::SeqCst);
    });

    tokio::task::yield_now().await;
    assert!(!entered.load(Ordering::SeqCst));

    drop(guard);
    waiter.await.expect("waiter task panicked");
    assert!(entered.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_user_guard_independent_users() {
    let store = SessionStore::new();

    // Guards for different users never contend
    let _one = store.user_guard(user(1)).await;
    let _two = store.user_guard(user(2)).await;
}
