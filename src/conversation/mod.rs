//! Conversation types and transcript management

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// How the presentation shell should render a message
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    Suggestion,
    Form,
    Quote,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageMetadata {
    #[serde(rename = "type")]
    pub kind: MessageKind,

    /// Quick-reply chips, in display order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

impl MessageMetadata {
    pub fn text() -> Self {
        Self::default()
    }

    pub fn suggestion<I, S>(options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind: MessageKind::Suggestion,
            options: options.into_iter().map(Into::into).collect(),
        }
    }
}

/// One immutable turn of the transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content, Some(MessageMetadata::text()))
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content, Some(MessageMetadata::text()))
    }

    /// Assistant message carrying quick-reply options
    pub fn suggestion<I, S>(content: impl Into<String>, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            Role::Assistant,
            content,
            Some(MessageMetadata::suggestion(options)),
        )
    }

    fn new(role: Role, content: impl Into<String>, mut metadata: Option<MessageMetadata>) -> Self {
        // Only the assistant offers quick replies.
        if role != Role::Assistant {
            if let Some(metadata) = metadata.as_mut() {
                metadata.options.clear();
            }
        }
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            metadata,
        }
    }

    pub fn options(&self) -> &[String] {
        self.metadata
            .as_ref()
            .map(|m| m.options.as_slice())
            .unwrap_or(&[])
    }
}

/// Append-only transcript, ordered by creation time
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message, nudging its timestamp forward if the clock went backwards
    pub fn push(&mut self, mut message: ChatMessage) -> &ChatMessage {
        if let Some(last) = self.messages.last() {
            if message.timestamp <= last.timestamp {
                message.timestamp = last.timestamp + Duration::microseconds(1);
            }
        }
        self.messages.push(message);
        &self.messages[self.messages.len() - 1]
    }

    pub fn extend(&mut self, messages: impl IntoIterator<Item = ChatMessage>) {
        for message in messages {
            self.push(message);
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn last_assistant(&self) -> Option<&ChatMessage> {
        self.messages.iter().rev().find(|m| m.role == Role::Assistant)
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_is_monotonic() {
        let mut transcript = Transcript::new();
        let first = ChatMessage::assistant("hola");
        let mut second = ChatMessage::user("hola");
        second.timestamp = first.timestamp - Duration::seconds(5);

        transcript.push(first);
        transcript.push(second);

        let messages = transcript.messages();
        assert!(messages[1].timestamp > messages[0].timestamp);
    }

    #[test]
    fn test_user_messages_never_carry_options() {
        let msg = ChatMessage::new(
            Role::User,
            "Sí",
            Some(MessageMetadata::suggestion(["a", "b"])),
        );
        assert!(msg.options().is_empty());

        let bot = ChatMessage::suggestion("¿Esto coincide?", ["Sí, es correcto", "Corregir"]);
        assert_eq!(bot.metadata.as_ref().unwrap().kind, MessageKind::Suggestion);
        assert_eq!(bot.options().len(), 2);
    }

    #[test]
    fn test_metadata_serialization() {
        let msg = ChatMessage::suggestion("Elige", ["Uno"]);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "assistant");
        assert_eq!(json["metadata"]["type"], "suggestion");
        assert_eq!(json["metadata"]["options"][0], "Uno");
    }
}
