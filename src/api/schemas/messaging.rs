use crate::domain::message::{Message, MessageStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
pub struct SendMessageParams {
    pub text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListMessagesParams {
    pub status: Option<String>,
}

/// Public view of a stored message. The surrogate id and timestamp stay internal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageView {
    pub uuid: Uuid,
    pub text: String,
    pub status: MessageStatus,
}

impl From<Message> for MessageView {
    fn from(message: Message) -> Self {
        Self { uuid: message.uuid, text: message.text, status: message.status }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageListResponse {
    pub messages: Vec<MessageView>,
}

impl From<Vec<Message>> for MessageListResponse {
    fn from(messages: Vec<Message>) -> Self {
        Self { messages: messages.into_iter().map(Into::into).collect() }
    }
}
