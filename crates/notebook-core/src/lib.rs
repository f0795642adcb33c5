//! Domain layer of the notebook.
//!
//! Holds the session model (chats and notes), the wiki-link grammar, the
//! backlink index and the collaborator traits (`FileSystem`, `Clock`) the
//! other crates implement or consume. Nothing in here performs I/O.

pub mod clock;
pub mod config;
pub mod error;
pub mod link;
pub mod session;
pub mod storage;

// Re-export common types
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::NotebookConfig;
pub use error::{NotebookError, Result};
pub use storage::{FileEntry, FileSystem};
