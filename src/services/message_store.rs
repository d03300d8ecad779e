use crate::domain::message::{Message, MessageStatus, NewMessage};
use crate::error::PersistenceError;
use async_trait::async_trait;

#[async_trait]
pub trait MessageStore: Send + Sync + std::fmt::Debug {
    /// Persists a fully constructed message and assigns its surrogate id.
    ///
    /// Creating a message whose uuid is already stored returns the stored record instead of
    /// inserting a duplicate.
    ///
    /// # Errors
    /// Returns `PersistenceError` if the underlying storage is unavailable or rejects the write.
    async fn create(&self, message: &NewMessage) -> Result<Message, PersistenceError>;

    /// Lists messages with the given status, or every message when `status` is `None`,
    /// ordered by surrogate id.
    ///
    /// # Errors
    /// Returns `PersistenceError` if the underlying storage cannot be queried.
    async fn list_by_status(&self, status: Option<MessageStatus>) -> Result<Vec<Message>, PersistenceError>;

    /// Checks that the store is reachable.
    ///
    /// # Errors
    /// Returns `PersistenceError` if the store cannot serve requests.
    async fn ping(&self) -> Result<(), PersistenceError>;
}
