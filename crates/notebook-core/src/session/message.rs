//! Chat message types.
//!
//! This module contains types for representing the turns of a chat session.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Represents the author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Message typed by the user.
    User,
    /// Reply produced by the model.
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            other => Err(format!("unknown message role '{}'", other)),
        }
    }
}

/// A single turn of a chat session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Opaque unique identifier.
    pub id: String,
    /// Conversation round; a user message and its reply share a turn.
    pub turn: u32,
    pub role: MessageRole,
    /// Message text, always stored trimmed.
    pub content: String,
    /// Informational token count reported by the tokenizer.
    pub token_count: u64,
    /// Creation timestamp (ISO 8601 format).
    pub created_at: String,
}

/// The caller-supplied part of a message appended through the store.
///
/// The store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    pub turn: u32,
    pub role: MessageRole,
    pub content: String,
    pub token_count: u64,
}

impl NewMessage {
    pub fn new(turn: u32, role: MessageRole, content: impl Into<String>, token_count: u64) -> Self {
        Self {
            turn,
            role,
            content: content.into(),
            token_count,
        }
    }

    /// Completes the message with an id and creation time.
    pub fn into_message(self, id: String, created_at: String) -> Message {
        Message {
            id,
            turn: self.turn,
            role: self.role,
            content: self.content.trim().to_string(),
            token_count: self.token_count,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trips_through_str() {
        for role in [MessageRole::User, MessageRole::Assistant] {
            assert_eq!(role.as_str().parse::<MessageRole>().unwrap(), role);
        }
        assert!("system".parse::<MessageRole>().is_err());
    }

    #[test]
    fn test_into_message_trims_content() {
        let message = NewMessage::new(1, MessageRole::User, "  Hi \n", 2)
            .into_message("m-1".to_string(), "2025-01-01T00:00:00.000Z".to_string());
        assert_eq!(message.content, "Hi");
        assert_eq!(message.turn, 1);
        assert_eq!(message.token_count, 2);
    }
}
