//! Wiki-link grammar.
//!
//! Recognises `[[relation::Note Name#Heading|Alias]]` tokens in free text:
//!
//! ```text
//! link     = "[[" [ relation "::" ] note [ "#" heading ] [ "|" alias ] "]]"
//! relation = 1*( letter | " " )
//! note     = 1*( any char except "[" "]" "|" "#" newline )
//! heading  = 1*( any char except "[" "]" "|" newline )
//! alias    = 1*( any char except "[" "]" newline )
//! ```
//!
//! Excluding `[` from every group means a `]]` always closes the nearest
//! preceding `[[`. Text that does not fit the grammar stays literal.

use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;

static WIKI_LINK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[\[(?:([\p{L} ]+)::)?([^\[\]|#\n]+)(?:#([^\[\]|\n]+))?(?:\|([^\[\]\n]+))?\]\]")
        .expect("wiki-link pattern is valid")
});

static WHITESPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// Characters that are not allowed in file names on common platforms.
const ILLEGAL_FILE_NAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// One `[[...]]` token found in a text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WikiLink<'a> {
    relation: Option<&'a str>,
    target: &'a str,
    heading: Option<&'a str>,
    alias: Option<&'a str>,
    range: Range<usize>,
}

impl<'a> WikiLink<'a> {
    /// Semantic relation label such as `supports`, if present.
    pub fn relation(&self) -> Option<&'a str> {
        non_empty(self.relation)
    }

    /// The note name exactly as written.
    pub fn target(&self) -> &'a str {
        self.target
    }

    /// The note name with illegal file-name characters removed.
    pub fn note_name(&self) -> String {
        sanitize_file_name(self.target)
    }

    /// Case-insensitive key used by the backlink index.
    pub fn index_key(&self) -> String {
        index_key(self.target)
    }

    pub fn heading(&self) -> Option<&'a str> {
        non_empty(self.heading)
    }

    /// Scroll anchor for the heading, e.g. `Key Finding` -> `key-finding`.
    pub fn heading_slug(&self) -> Option<String> {
        self.heading().map(heading_slug)
    }

    pub fn alias(&self) -> Option<&'a str> {
        non_empty(self.alias)
    }

    /// What an editor should show in place of the token.
    pub fn display_text(&self) -> &'a str {
        self.alias().unwrap_or_else(|| self.target.trim())
    }

    /// Byte range of the whole token in the scanned text.
    pub fn range(&self) -> Range<usize> {
        self.range.clone()
    }
}

/// Lazily scans `text` for wiki-link tokens, left to right.
pub fn wiki_links(text: &str) -> impl Iterator<Item = WikiLink<'_>> {
    WIKI_LINK_RE.captures_iter(text).filter_map(|caps| {
        let whole = caps.get(0)?;
        Some(WikiLink {
            relation: caps.get(1).map(|m| m.as_str()),
            target: caps.get(2)?.as_str(),
            heading: caps.get(3).map(|m| m.as_str()),
            alias: caps.get(4).map(|m| m.as_str()),
            range: whole.range(),
        })
    })
}

/// Removes characters that are illegal in file names and trims whitespace.
///
/// Idempotent: `sanitize_file_name(sanitize_file_name(x)) == sanitize_file_name(x)`.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .filter(|c| !ILLEGAL_FILE_NAME_CHARS.contains(c))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Sanitized, lower-cased form of a note name.
pub fn index_key(name: &str) -> String {
    sanitize_file_name(name).to_lowercase()
}

/// Lower-cases a heading and joins its words with single hyphens.
pub fn heading_slug(heading: &str) -> String {
    WHITESPACE_RE
        .replace_all(heading.trim(), "-")
        .to_lowercase()
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
