use crate::domain::message::{Message, MessageStatus};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
pub struct MessageRecord {
    pub(crate) id: i64,
    pub(crate) uuid: Uuid,
    pub(crate) text: String,
    pub(crate) status: MessageStatus,
    pub(crate) created_at: OffsetDateTime,
}

impl From<MessageRecord> for Message {
    fn from(record: MessageRecord) -> Self {
        Self {
            id: record.id,
            uuid: record.uuid,
            text: record.text,
            status: record.status,
            created_at: record.created_at,
        }
    }
}
