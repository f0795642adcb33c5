//! Wiki-link grammar and the backlink index built on top of it.

mod backlinks;
mod grammar;

pub use backlinks::{Backlink, BacklinksIndex};
pub use grammar::{WikiLink, heading_slug, index_key, sanitize_file_name, wiki_links};
