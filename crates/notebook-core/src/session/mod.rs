//! Session domain module.
//!
//! # Module Structure
//!
//! - `model`: Chats, notes and the `Session` sum type
//! - `message`: Chat message types (`MessageRole`, `Message`, `NewMessage`)

mod message;
mod model;

pub use message::{Message, MessageRole, NewMessage};
pub use model::{
    ChatSession, DEFAULT_MODEL, DEFAULT_TEMPERATURE, Note, NoteMetadata, Session, SessionKind,
    label_from_id,
};
