//! Application layer of the notebook.
//!
//! `SessionStore` is the single in-memory source of truth for loaded chats
//! and notes. It keeps the backlink index current and writes every change
//! through to the injected `FileSystem`.

pub mod session;

pub use session::{LoadReport, NoteResolution, SessionStore, SkippedFile, WriteThrough};
