//! # Session Store Module
//!
//! Per-user runtime state shared by the Telegram dispatcher and the
//! webhook server: the last tracked bot message, the active support chat,
//! the language cache and in-flight media-group accumulators. One instance
//! is built in `main` and injected everywhere, so tests can run against
//! their own store instead of process-wide globals.

use std::collections::HashMap;
use std::sync::Arc;
use teloxide::types::{MessageId, UserId};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::crm::Order;

/// Snapshot of the "My Orders" screen: the fetched list plus the page the
/// user is currently looking at
#[derive(Debug, Clone, Default)]
pub struct OrdersView {
    pub orders: Vec<Order>,
    pub page: usize,
}

/// Accumulator for a burst of photos sharing one media group id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingMediaGroup {
    /// Resolved image URLs in arrival order
    pub image_urls: Vec<String>,
    /// Caption, last captioned message in the burst wins
    pub caption: String,
}

#[derive(Debug, Clone)]
struct MediaGroupEntry {
    owner: UserId,
    group: PendingMediaGroup,
}

/// Shared per-user state. Cheap to clone via `Arc`.
#[derive(Default)]
pub struct SessionStore {
    last_messages: RwLock<HashMap<UserId, MessageId>>,
    active_chats: RwLock<HashMap<UserId, String>>,
    languages: RwLock<HashMap<UserId, String>>,
    orders_views: RwLock<HashMap<UserId, OrdersView>>,
    media_groups: Mutex<HashMap<String, MediaGroupEntry>>,
    user_locks: Mutex<HashMap<UserId, Arc<Mutex<()>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize handler bodies per user: at most one in-flight mutation
    /// for a given user while the returned guard is held.
    pub async fn user_guard(&self, user_id: UserId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.user_locks.lock().await;
            locks
                .entry(user_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    // Last tracked bot message

    pub async fn last_message_id(&self, user_id: UserId) -> Option<MessageId> {
        self.last_messages.read().await.get(&user_id).copied()
    }

    pub async fn set_last_message_id(&self, user_id: UserId, message_id: MessageId) {
        self.last_messages.write().await.insert(user_id, message_id);
    }

    pub async fn clear_last_message_id(&self, user_id: UserId) {
        self.last_messages.write().await.remove(&user_id);
    }

    // Active support chat

    pub async fn active_chat(&self, user_id: UserId) -> Option<String> {
        self.active_chats.read().await.get(&user_id).cloned()
    }

    pub async fn set_active_chat(&self, user_id: UserId, order_id: &str) {
        self.active_chats
            .write()
            .await
            .insert(user_id, order_id.to_string());
    }

    /// Clear the active chat along with any media-group accumulators the
    /// user still has in flight, so a pending flush cannot relay into a
    /// chat that was just left.
    pub async fn clear_active_chat(&self, user_id: UserId) {
        self.active_chats.write().await.remove(&user_id);
        self.media_groups
            .lock()
            .await
            .retain(|_, entry| entry.owner != user_id);
    }

    pub async fn is_user_in_chat(&self, user_id: UserId, order_id: &str) -> bool {
        self.active_chats.read().await.get(&user_id).map(String::as_str) == Some(order_id)
    }

    // Language cache

    pub async fn language(&self, user_id: UserId) -> Option<String> {
        self.languages.read().await.get(&user_id).cloned()
    }

    pub async fn set_language(&self, user_id: UserId, language: &str) {
        self.languages
            .write()
            .await
            .insert(user_id, language.to_string());
    }

    // "My Orders" screen snapshot

    /// Current list snapshot, or an empty first page when the user has
    /// none cached.
    pub async fn orders_view(&self, user_id: UserId) -> OrdersView {
        self.orders_views
            .read()
            .await
            .get(&user_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn set_orders_view(&self, user_id: UserId, orders: Vec<Order>, page: usize) {
        self.orders_views
            .write()
            .await
            .insert(user_id, OrdersView { orders, page });
    }

    pub async fn clear_orders_view(&self, user_id: UserId) {
        self.orders_views.write().await.remove(&user_id);
    }

    // Media-group accumulators

    /// Record one message of a media-group burst. Returns `true` when this
    /// message opened a new accumulator, meaning the caller owns the flush
    /// timer for the burst.
    pub async fn push_media(
        &self,
        user_id: UserId,
        group_id: &str,
        image_url: Option<String>,
        caption: Option<&str>,
    ) -> bool {
        let mut groups = self.media_groups.lock().await;
        let created = !groups.contains_key(group_id);
        let entry = groups
            .entry(group_id.to_string())
            .or_insert_with(|| MediaGroupEntry {
                owner: user_id,
                group: PendingMediaGroup::default(),
            });
        if let Some(url) = image_url {
            entry.group.image_urls.push(url);
        }
        if let Some(caption) = caption {
            entry.group.caption = caption.to_string();
        }
        created
    }

    /// Remove and return an accumulator once its collection window closed
    pub async fn take_media_group(&self, group_id: &str) -> Option<PendingMediaGroup> {
        self.media_groups
            .lock()
            .await
            .remove(group_id)
            .map(|entry| entry.group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(n: u64) -> UserId {
        UserId(n)
    }

    #[tokio::test]
    async fn test_last_message_tracking() {
        let store = SessionStore::new();
        assert_eq!(store.last_message_id(user(1)).await, None);

        store.set_last_message_id(user(1), MessageId(42)).await;
        assert_eq!(store.last_message_id(user(1)).await, Some(MessageId(42)));

        store.set_last_message_id(user(1), MessageId(43)).await;
        assert_eq!(store.last_message_id(user(1)).await, Some(MessageId(43)));

        store.clear_last_message_id(user(1)).await;
        assert_eq!(store.last_message_id(user(1)).await, None);
    }

    #[tokio::test]
    async fn test_active_chat_is_single_entry_per_user() {
        let store = SessionStore::new();
        store.set_active_chat(user(1), "order-a").await;
        store.set_active_chat(user(1), "order-b").await;

        assert_eq!(store.active_chat(user(1)).await.as_deref(), Some("order-b"));
        assert!(store.is_user_in_chat(user(1), "order-b").await);
        assert!(!store.is_user_in_chat(user(1), "order-a").await);
        assert!(!store.is_user_in_chat(user(2), "order-b").await);

        store.clear_active_chat(user(1)).await;
        assert_eq!(store.active_chat(user(1)).await, None);
    }

    #[tokio::test]
    async fn test_language_cache() {
        let store = SessionStore::new();
        assert_eq!(store.language(user(1)).await, None);
        store.set_language(user(1), "ru").await;
        assert_eq!(store.language(user(1)).await.as_deref(), Some("ru"));
    }

    #[tokio::test]
    async fn test_media_group_accumulation_caption_last_write_wins() {
        let store = SessionStore::new();

        let first = store
            .push_media(user(1), "g1", Some("url1".into()), None)
            .await;
        let second = store
            .push_media(user(1), "g1", Some("url2".into()), Some("hello"))
            .await;
        let third = store
            .push_media(user(1), "g1", Some("url3".into()), None)
            .await;

        assert!(first);
        assert!(!second);
        assert!(!third);

        let group = store.take_media_group("g1").await.unwrap();
        assert_eq!(group.image_urls, vec!["url1", "url2", "url3"]);
        assert_eq!(group.caption, "hello");

        assert_eq!(store.take_media_group("g1").await, None);
    }

    #[tokio::test]
    async fn test_media_group_reopens_after_flush() {
        let store = SessionStore::new();
        assert!(store.push_media(user(1), "g1", Some("a".into()), None).await);
        store.take_media_group("g1").await;

        // A late arrival starts a fresh accumulator
        assert!(store.push_media(user(1), "g1", Some("b".into()), None).await);
        let group = store.take_media_group("g1").await.unwrap();
        assert_eq!(group.image_urls, vec!["b"]);
    }

    #[tokio::test]
    async fn test_clear_active_chat_drops_pending_media() {
        let store = SessionStore::new();
        store.set_active_chat(user(1), "order-a").await;
        store.push_media(user(1), "g1", Some("a".into()), None).await;
        store.push_media(user(2), "g2", Some("b".into()), None).await;

        store.clear_active_chat(user(1)).await;

        assert_eq!(store.take_media_group("g1").await, None);
        assert!(store.take_media_group("g2").await.is_some());
    }

    #[tokio::test]
    async fn test_user_guard_serializes_same_user() {
        let store = Arc::new(SessionStore::new());

        let guard = store.user_guard(user(1)).await;
        // A different user is not blocked
        let other = store.user_guard(user(2)).await;
        drop(other);

        let store2 = Arc::clone(&store);
        let contending = tokio::spawn(async move {
            let _guard = store2.user_guard(user(1)).await;
        });

        tokio::task::yield_now().await;
        assert!(!contending.is_finished());

        drop(guard);
        contending.await.unwrap();
    }
}
