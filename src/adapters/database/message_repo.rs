use crate::adapters::database::DbPool;
use crate::adapters::database::records::MessageRecord;
use crate::domain::message::{Message, MessageStatus, NewMessage};
use crate::error::PersistenceError;
use crate::services::message_store::MessageStore;
use async_trait::async_trait;

/// Postgres-backed message store.
#[derive(Clone, Debug)]
pub struct MessageRepository {
    pool: DbPool,
}

impl MessageRepository {
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageStore for MessageRepository {
    #[tracing::instrument(level = "debug", skip(self, message), fields(message.uuid = %message.uuid()))]
    async fn create(&self, message: &NewMessage) -> Result<Message, PersistenceError> {
        let mut conn = self.pool.acquire().await?;

        // The second branch only sees rows committed before this statement, so it yields the
        // existing record exactly when the insert hit the uuid constraint.
        let record = sqlx::query_as::<_, MessageRecord>(
            r"
            WITH inserted AS (
                INSERT INTO messages (uuid, text, status, created_at)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (uuid) DO NOTHING
                RETURNING id, uuid, text, status, created_at
            )
            SELECT id, uuid, text, status, created_at FROM inserted
            UNION ALL
            SELECT id, uuid, text, status, created_at FROM messages WHERE uuid = $1
            LIMIT 1
            ",
        )
        .bind(message.uuid())
        .bind(message.text())
        .bind(message.status())
        .bind(message.created_at())
        .fetch_one(&mut *conn)
        .await?;

        Ok(record.into())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn list_by_status(&self, status: Option<MessageStatus>) -> Result<Vec<Message>, PersistenceError> {
        let mut conn = self.pool.acquire().await?;

        let records = match status {
            Some(status) => {
                sqlx::query_as::<_, MessageRecord>(
                    r"
                    SELECT id, uuid, text, status, created_at
                    FROM messages
                    WHERE status = $1
                    ORDER BY id ASC
                    ",
                )
                .bind(status)
                .fetch_all(&mut *conn)
                .await?
            }
            None => {
                sqlx::query_as::<_, MessageRecord>(
                    r"
                    SELECT id, uuid, text, status, created_at
                    FROM messages
                    ORDER BY id ASC
                    ",
                )
                .fetch_all(&mut *conn)
                .await?
            }
        };

        Ok(records.into_iter().map(Into::into).collect())
    }

    async fn ping(&self) -> Result<(), PersistenceError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
