//! Infrastructure layer of the notebook.
//!
//! Encodes sessions into their on-disk text form and provides concrete
//! `FileSystem` implementations, platform paths, configuration loading and
//! logging setup.

pub mod codec;
pub mod config_service;
pub mod dto;
pub mod local_file_system;
pub mod logging;
pub mod memory_file_system;
pub mod paths;

pub use crate::codec::{ParseError, parse_session, serialize_session};
pub use crate::config_service::ConfigService;
pub use crate::local_file_system::LocalFileSystem;
pub use crate::memory_file_system::MemoryFileSystem;
pub use crate::paths::NotebookPaths;
