use crate::domain::message::{Message, MessageStatus, NewMessage};
use crate::error::PersistenceError;
use crate::services::message_store::MessageStore;
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use time::OffsetDateTime;
use uuid::Uuid;

/// Process-local message store.
///
/// Records are inserted into the map only once fully built, so readers never observe a
/// partially constructed message.
#[derive(Debug)]
pub struct InMemoryMessageStore {
    messages: DashMap<Uuid, Message>,
    next_id: AtomicI64,
    available: AtomicBool,
    failing_creates: AtomicUsize,
}

impl Default for InMemoryMessageStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryMessageStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            messages: DashMap::new(),
            next_id: AtomicI64::new(1),
            available: AtomicBool::new(true),
            failing_creates: AtomicUsize::new(0),
        }
    }

    /// Stores a record with an explicit uuid and status, bypassing the send pipeline.
    pub fn seed(&self, uuid: Uuid, text: &str, status: MessageStatus) -> Message {
        let message =
            NewMessage { uuid, text: text.to_string(), status, created_at: OffsetDateTime::now_utc() };
        self.insert(&message)
    }

    /// Marks the store as reachable or unreachable for every operation.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Makes the next `count` calls to `create` fail as if the store were unreachable.
    pub fn fail_next_creates(&self, count: usize) {
        self.failing_creates.store(count, Ordering::SeqCst);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn check_available(&self) -> Result<(), PersistenceError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(PersistenceError::Unavailable("in-memory store is offline".to_string()))
        }
    }

    fn insert(&self, message: &NewMessage) -> Message {
        match self.messages.entry(message.uuid()) {
            Entry::Occupied(existing) => existing.get().clone(),
            Entry::Vacant(slot) => {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                slot.insert(Message::from_new(id, message.clone())).clone()
            }
        }
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn create(&self, message: &NewMessage) -> Result<Message, PersistenceError> {
        self.check_available()?;

        let injected = self
            .failing_creates
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| remaining.checked_sub(1))
            .is_ok();
        if injected {
            return Err(PersistenceError::Unavailable("injected create failure".to_string()));
        }

        Ok(self.insert(message))
    }

    async fn list_by_status(&self, status: Option<MessageStatus>) -> Result<Vec<Message>, PersistenceError> {
        self.check_available()?;

        let mut messages: Vec<Message> = self
            .messages
            .iter()
            .filter(|entry| status.is_none_or(|s| entry.value().status() == s))
            .map(|entry| entry.value().clone())
            .collect();
        messages.sort_by_key(Message::id);

        Ok(messages)
    }

    async fn ping(&self) -> Result<(), PersistenceError> {
        self.check_available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::message::MessageText;

    fn new_message(text: &str) -> NewMessage {
        NewMessage::new(MessageText::parse(text.to_string(), 255).unwrap(), OffsetDateTime::now_utc())
    }

    #[tokio::test]
    async fn test_create_assigns_increasing_ids() {
        let store = InMemoryMessageStore::new();

        let first = store.create(&new_message("one")).await.unwrap();
        let second = store.create(&new_message("two")).await.unwrap();

        assert_eq!(first.id(), 1);
        assert_eq!(second.id(), 2);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_create_is_idempotent_per_uuid() {
        let store = InMemoryMessageStore::new();
        let message = new_message("once");

        let first = store.create(&message).await.unwrap();
        let again = store.create(&message).await.unwrap();

        assert_eq!(first, again);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_list_filters_by_status() {
        let store = InMemoryMessageStore::new();
        let sent = store.seed(Uuid::now_v7(), "A message with sent status", MessageStatus::Sent);
        let read = store.seed(Uuid::now_v7(), "A message with read status", MessageStatus::Read);

        assert_eq!(store.list_by_status(None).await.unwrap(), vec![sent.clone(), read.clone()]);
        assert_eq!(store.list_by_status(Some(MessageStatus::Sent)).await.unwrap(), vec![sent]);
        assert_eq!(store.list_by_status(Some(MessageStatus::Read)).await.unwrap(), vec![read]);
    }

    #[tokio::test]
    async fn test_injected_failures_are_consumed() {
        let store = InMemoryMessageStore::new();
        store.fail_next_creates(1);
        let message = new_message("retry me");

        assert!(store.create(&message).await.is_err());
        assert!(store.create(&message).await.is_ok());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_offline_store_rejects_everything() {
        let store = InMemoryMessageStore::new();
        store.set_available(false);

        assert!(store.ping().await.is_err());
        assert!(store.list_by_status(None).await.is_err());
        assert!(store.create(&new_message("nope")).await.is_err());
    }
}
