//! On-disk representations of domain types.

mod frontmatter;

pub use frontmatter::FrontmatterDto;
