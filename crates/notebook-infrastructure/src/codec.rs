//! Session file codec.
//!
//! A session file is a YAML metadata block fenced by `---` lines, followed
//! either by free text (a note) or by a sequence of message blocks (a chat):
//!
//! ```text
//! ---
//! type: chat
//! title: Project Plan
//! model: gemini-1.5-flash-latest
//! temperature: 0.7
//! createdAt: 2025-03-01T09:30:00.000Z
//! ---
//!
//! ### 1:user
//! --- | tokens: 2 | created: 2025-03-01T09:31:00.000Z | id: 5b0c...
//! Hi
//!
//! ### 1:assistant
//! --- | tokens: 3 | created: 2025-03-01T09:31:02.000Z | id: 9e41...
//! Hello!
//! ```
//!
//! `parse_session(id, serialize_session(s))` reconstructs `s` apart from
//! message content whitespace, which is trimmed on both sides.

use crate::dto::FrontmatterDto;
use notebook_core::error::{NotebookError, Result};
use notebook_core::session::{ChatSession, Message, MessageRole, Note, Session, SessionKind};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

const FENCE: &str = "---";

static HEADER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^###\s+(\d+):(user|assistant)\s*$").unwrap());

static META_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^---\s*\|\s*tokens:\s*(\d+)\s*\|\s*created:\s*([^|]*?)\s*(?:\|\s*id:\s*(\S+)\s*)?$",
    )
    .unwrap()
});

/// Why a file could not be decoded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("missing metadata block")]
    MissingMetadata,

    #[error("metadata block is not closed")]
    UnterminatedMetadata,

    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),
}

impl ParseError {
    pub fn into_notebook_error(self, id: &str) -> NotebookError {
        NotebookError::parse(id, self.to_string())
    }
}

/// Decodes the text of a session file.
///
/// The kind comes from the `type` key when it names one; otherwise a body holding at least
/// one message block is a chat and anything else is a note. Text that does
/// not form a message block is dropped from chats.
pub fn parse_session(id: &str, raw: &str) -> std::result::Result<Session, ParseError> {
    let text = raw.strip_prefix('\u{feff}').unwrap_or(raw).replace("\r\n", "\n");

    let (yaml, body) = split_metadata(&text).inspect_err(|e| {
        tracing::debug!("[Codec] {}: {}", id, e);
    })?;

    let dto: FrontmatterDto = if yaml.trim().is_empty() {
        FrontmatterDto::default()
    } else {
        serde_yaml::from_str(yaml).map_err(|e| {
            tracing::debug!("[Codec] {}: bad metadata: {}", id, e);
            ParseError::InvalidMetadata(e.to_string())
        })?
    };

    let messages = parse_messages(body);
    let kind = dto.session_kind().unwrap_or(if messages.is_empty() {
        SessionKind::Note
    } else {
        SessionKind::Chat
    });

    let session = match kind {
        SessionKind::Chat => Session::Chat(dto.into_chat(id).with_messages(messages)),
        SessionKind::Note => {
            // The writer puts one blank line between the fence and the body.
            let content = body.strip_prefix('\n').unwrap_or(body);
            Session::Note(Note::new(id, dto.into_note_metadata(), content))
        }
    };
    Ok(session)
}

/// Encodes a session into the text of its file.
pub fn serialize_session(session: &Session) -> Result<String> {
    match session {
        Session::Chat(chat) => serialize_chat(chat),
        Session::Note(note) => {
            let yaml = serde_yaml::to_string(&FrontmatterDto::from_note(&note.metadata))?;
            Ok(format!("{FENCE}\n{yaml}{FENCE}\n\n{}", note.raw_content))
        }
    }
}

fn serialize_chat(chat: &ChatSession) -> Result<String> {
    let yaml = serde_yaml::to_string(&FrontmatterDto::from_chat(chat))?;
    let blocks = chat
        .messages()
        .iter()
        .map(|m| {
            format!(
                "### {}:{}\n{FENCE} | tokens: {} | created: {} | id: {}\n{}",
                m.turn,
                m.role,
                m.token_count,
                m.created_at,
                m.id,
                m.content.trim()
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");
    Ok(format!("{FENCE}\n{yaml}{FENCE}\n\n{blocks}"))
}

/// Splits `text` into the metadata source and everything after the closing fence.
fn split_metadata(text: &str) -> std::result::Result<(&str, &str), ParseError> {
    let text = text.trim_start();
    let rest = match text.split_once('\n') {
        Some((first, rest)) if first.trim_end() == FENCE => rest,
        None if text.trim_end() == FENCE => return Err(ParseError::UnterminatedMetadata),
        _ => return Err(ParseError::MissingMetadata),
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == FENCE {
            return Ok((&rest[..offset], &rest[offset + line.len()..]));
        }
        offset += line.len();
    }
    Err(ParseError::UnterminatedMetadata)
}

/// A header line followed by a meta line opens a block; the block's content
/// runs up to the next such pair.
fn parse_messages(body: &str) -> Vec<Message> {
    let lines: Vec<&str> = body.lines().collect();
    let mut messages = Vec::new();
    let mut current: Option<(Message, Vec<&str>)> = None;

    let mut i = 0;
    while i < lines.len() {
        let opened = lines
            .get(i + 1)
            .and_then(|meta| {
                block_start(lines[i], meta, messages.len() + usize::from(current.is_some()))
            });
        match opened {
            Some(message) => {
                if let Some(done) = current.take() {
                    messages.push(finish(done));
                }
                current = Some((message, Vec::new()));
                i += 2;
            }
            None => {
                if let Some((_, content)) = current.as_mut() {
                    content.push(lines[i]);
                }
                i += 1;
            }
        }
    }
    if let Some(done) = current.take() {
        messages.push(finish(done));
    }
    messages
}

fn block_start(header: &str, meta: &str, index: usize) -> Option<Message> {
    let header = HEADER_RE.captures(header)?;
    let meta = META_RE.captures(meta)?;

    let turn: u32 = header[1].parse().ok()?;
    let role: MessageRole = header[2].parse().ok()?;
    let token_count: u64 = meta[1].parse().ok()?;
    let id = meta
        .get(3)
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| format!("msg-{}-{}-{}", turn, role, index));

    Some(Message {
        id,
        turn,
        role,
        content: String::new(),
        token_count,
        created_at: meta[2].to_string(),
    })
}

fn finish((mut message, content): (Message, Vec<&str>)) -> Message {
    message.content = content.join("\n").trim().to_string();
    message
}
