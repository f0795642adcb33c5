//! Session domain model.
//!
//! A session is either a chat (metadata plus an ordered list of messages) or a
//! note (metadata plus free text). Both are identified by the path of their
//! backing file relative to the notebook root.

use super::message::Message;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Model used for new chats when nothing else is configured.
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash-latest";

/// Sampling temperature used for new chats when nothing else is configured.
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Distinguishes chats from notes in the metadata block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    Chat,
    Note,
}

/// A persisted chat conversation.
///
/// The message list is append-only: there is no way to edit or remove a past
/// message through this type. The total token count is derived from the
/// messages on every read and therefore cannot drift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    /// File path relative to the notebook root (doubles as primary key)
    pub id: String,
    pub title: String,
    pub model: String,
    /// Sampling temperature, recommended domain [0.0, 2.0]
    pub temperature: f64,
    messages: Vec<Message>,
    /// Creation timestamp (ISO 8601 format)
    pub created_at: String,
    /// Files attached as prompt context. Session-local, never persisted.
    #[serde(default)]
    pub context_file_paths: Vec<String>,
}

impl ChatSession {
    /// Creates an empty chat.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        model: impl Into<String>,
        temperature: f64,
        created_at: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            model: model.into(),
            temperature,
            messages: Vec::new(),
            created_at: created_at.into(),
            context_file_paths: Vec::new(),
        }
    }

    /// Builds a chat with an existing history, e.g. when decoding a file.
    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Appends a message at the end of the history.
    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Sum of all message token counts, saturating at `u64::MAX`.
    pub fn total_token_count(&self) -> u64 {
        self.messages
            .iter()
            .fold(0u64, |total, m| total.saturating_add(m.token_count))
    }

    /// Highest turn number in the history, or 0 for an empty chat.
    pub fn last_turn(&self) -> u32 {
        self.messages.last().map(|m| m.turn).unwrap_or(0)
    }

    pub fn label(&self) -> &str {
        label_from_id(&self.id)
    }
}

/// Metadata kept in a note's header block.
///
/// Keys this crate does not know about (tags, aliases, ...) are carried in
/// `extra` so that rewriting a note never drops them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// A free-text markdown note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    /// File path relative to the notebook root
    pub id: String,
    pub metadata: NoteMetadata,
    /// Note body (everything after the metadata block); authoritative
    pub raw_content: String,
}

impl Note {
    pub fn new(id: impl Into<String>, metadata: NoteMetadata, raw_content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            metadata,
            raw_content: raw_content.into(),
        }
    }

    /// File name without directory and extension; the name wiki-links use.
    pub fn label(&self) -> &str {
        label_from_id(&self.id)
    }
}

/// Anything the notebook loads from disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Session {
    Chat(ChatSession),
    Note(Note),
}

impl Session {
    pub fn id(&self) -> &str {
        match self {
            Session::Chat(chat) => &chat.id,
            Session::Note(note) => &note.id,
        }
    }

    pub fn label(&self) -> &str {
        label_from_id(self.id())
    }

    pub fn kind(&self) -> SessionKind {
        match self {
            Session::Chat(_) => SessionKind::Chat,
            Session::Note(_) => SessionKind::Note,
        }
    }

    pub fn as_chat(&self) -> Option<&ChatSession> {
        match self {
            Session::Chat(chat) => Some(chat),
            Session::Note(_) => None,
        }
    }

    pub fn as_note(&self) -> Option<&Note> {
        match self {
            Session::Note(note) => Some(note),
            Session::Chat(_) => None,
        }
    }
}

impl From<ChatSession> for Session {
    fn from(chat: ChatSession) -> Self {
        Session::Chat(chat)
    }
}

impl From<Note> for Session {
    fn from(note: Note) -> Self {
        Session::Note(note)
    }
}

/// Strips directory prefix and extension from a file id.
///
/// `"notes/Project Plan.md"` becomes `"Project Plan"`.
pub fn label_from_id(id: &str) -> &str {
    let file_name = id.rsplit(['/', '\\']).next().unwrap_or(id);
    match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file_name,
    }
}
