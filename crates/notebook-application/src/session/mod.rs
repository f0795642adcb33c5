//! Session application services.
//!
//! # Module Structure
//!
//! - `store`: `SessionStore`, the repository of loaded sessions
//! - `outcome`: values returned by store operations

mod outcome;
mod store;

#[cfg(test)]
mod store_test;

pub use outcome::{LoadReport, NoteResolution, SkippedFile, WriteThrough};
pub use store::SessionStore;
