//! Metadata block DTO.
//!
//! The block between the leading `---` fences of a session file. Chats and
//! notes share one shape; which fields matter depends on `type`. Notes may
//! use `type` for their own purposes (`type: reference`); such values are not
//! a session kind and are kept as ordinary note metadata.

use notebook_core::session::{
    ChatSession, DEFAULT_MODEL, DEFAULT_TEMPERATURE, NoteMetadata, SessionKind, label_from_id,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const TYPE_KEY: &str = "type";
const MODEL_KEY: &str = "model";
const TEMPERATURE_KEY: &str = "temperature";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrontmatterDto {
    /// Absent in files written before the discriminator existed
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<serde_yaml::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl FrontmatterDto {
    /// Header for a chat. Context attachments are session-local and not written.
    pub fn from_chat(chat: &ChatSession) -> Self {
        Self {
            kind: Some(kind_value(SessionKind::Chat)),
            title: Some(chat.title.clone()),
            model: Some(chat.model.clone()),
            temperature: Some(chat.temperature),
            created_at: Some(chat.created_at.clone()),
            extra: BTreeMap::new(),
        }
    }

    /// Header for a note. A user-defined `type` is written back in place of
    /// the discriminator.
    pub fn from_note(metadata: &NoteMetadata) -> Self {
        let mut extra = metadata.extra.clone();
        let kind = extra
            .remove(TYPE_KEY)
            .unwrap_or_else(|| kind_value(SessionKind::Note));
        Self {
            kind: Some(kind),
            title: metadata.title.clone(),
            model: None,
            temperature: None,
            created_at: metadata.created_at.clone(),
            extra,
        }
    }

    /// The declared session kind, if `type` holds one.
    pub fn session_kind(&self) -> Option<SessionKind> {
        match self.kind.as_ref()?.as_str()? {
            "chat" => Some(SessionKind::Chat),
            "note" => Some(SessionKind::Note),
            _ => None,
        }
    }

    /// Builds an empty chat from the header, filling gaps left by older files.
    pub fn into_chat(self, id: &str) -> ChatSession {
        ChatSession::new(
            id,
            self.title.unwrap_or_else(|| label_from_id(id).to_string()),
            self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            self.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            self.created_at.unwrap_or_default(),
        )
    }

    /// Note metadata; chat-only keys a user typed into a note are kept verbatim.
    pub fn into_note_metadata(self) -> NoteMetadata {
        let declared = self.session_kind();
        let mut extra = self.extra;
        if let (None, Some(kind)) = (declared, self.kind) {
            extra.insert(TYPE_KEY.to_string(), kind);
        }
        if let Some(model) = self.model {
            extra.insert(MODEL_KEY.to_string(), serde_yaml::Value::String(model));
        }
        if let Some(temperature) = self.temperature {
            extra.insert(
                TEMPERATURE_KEY.to_string(),
                serde_yaml::Value::Number(temperature.into()),
            );
        }
        NoteMetadata {
            title: self.title,
            created_at: self.created_at,
            extra,
        }
    }
}

fn kind_value(kind: SessionKind) -> serde_yaml::Value {
    let name = match kind {
        SessionKind::Chat => "chat",
        SessionKind::Note => "note",
    };
    serde_yaml::Value::String(name.to_string())
}
