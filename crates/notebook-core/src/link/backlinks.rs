//! Backlink index.
//!
//! An inverted index from a note name to the notes linking to it. Keys are
//! sanitized and lower-cased; entries are deduplicated on the composite key
//! (source note, relation), so the same source linking with two different
//! relations yields two entries.

use super::grammar::{index_key, wiki_links};
use crate::session::Note;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// A recorded reference from one note to another.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Backlink {
    /// Label of the note containing the link.
    pub source_note: String,
    /// Semantic relation such as `supports`, if the link carried one.
    #[serde(rename = "type")]
    pub relation: Option<String>,
}

impl Backlink {
    pub fn new(source_note: impl Into<String>, relation: Option<String>) -> Self {
        Self {
            source_note: source_note.into(),
            relation,
        }
    }

    fn key(&self) -> BacklinkKey {
        (self.source_note.clone(), self.relation.clone())
    }
}

type BacklinkKey = (String, Option<String>);

/// Backlinks for one target, in first-seen order.
///
/// Two notes in different folders can share a label, so each entry remembers
/// which note ids contributed it and only disappears once none are left.
#[derive(Debug, Clone, Default)]
struct BacklinkSet {
    entries: Vec<Backlink>,
    contributors: HashMap<BacklinkKey, HashSet<String>>,
}

impl BacklinkSet {
    fn insert(&mut self, source_id: &str, backlink: Backlink) {
        let ids = self.contributors.entry(backlink.key()).or_default();
        if ids.is_empty() {
            self.entries.push(backlink);
        }
        ids.insert(source_id.to_string());
    }

    fn remove_source(&mut self, source_id: &str) {
        let mut emptied = HashSet::new();
        for (key, ids) in self.contributors.iter_mut() {
            if ids.remove(source_id) && ids.is_empty() {
                emptied.insert(key.clone());
            }
        }
        if emptied.is_empty() {
            return;
        }
        self.contributors.retain(|key, _| !emptied.contains(key));
        self.entries.retain(|b| !emptied.contains(&b.key()));
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Reverse mapping from note name to the notes referencing it.
///
/// The index is derived data: it is always rebuilt from note contents and
/// never edited by hand.
#[derive(Debug, Clone, Default)]
pub struct BacklinksIndex {
    targets: HashMap<String, BacklinkSet>,
    /// target keys each note id contributed to, for incremental removal
    outgoing: HashMap<String, HashSet<String>>,
}

impl BacklinksIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an index over a whole corpus of notes.
    pub fn build<'a>(notes: impl IntoIterator<Item = &'a Note>) -> Self {
        let mut index = Self::new();
        for note in notes {
            index.add_links(note);
        }
        index
    }

    /// Re-indexes a single note after its content changed.
    pub fn index_note(&mut self, note: &Note) {
        self.remove_note(&note.id);
        self.add_links(note);
    }

    /// Drops every backlink contributed by the note stored at `note_id`.
    pub fn remove_note(&mut self, note_id: &str) {
        let Some(keys) = self.outgoing.remove(note_id) else {
            return;
        };
        for key in keys {
            if let Some(set) = self.targets.get_mut(&key) {
                set.remove_source(note_id);
                if set.is_empty() {
                    self.targets.remove(&key);
                }
            }
        }
    }

    /// Notes linking to `note_name`, in the order they were indexed.
    ///
    /// The argument is sanitized and lower-cased before the lookup.
    pub fn lookup(&self, note_name: &str) -> Vec<Backlink> {
        self.targets
            .get(&index_key(note_name))
            .map(|set| set.entries.clone())
            .unwrap_or_default()
    }

    /// Number of distinct link targets.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    fn add_links(&mut self, note: &Note) {
        for link in wiki_links(&note.raw_content) {
            let key = link.index_key();
            if key.is_empty() {
                continue;
            }
            let relation = link.relation().map(str::to_string);
            self.targets
                .entry(key.clone())
                .or_default()
                .insert(&note.id, Backlink::new(note.label(), relation));
            self.outgoing
                .entry(note.id.clone())
                .or_default()
                .insert(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::NoteMetadata;

    fn note(label: &str, content: &str) -> Note {
        Note::new(format!("{}.md", label), NoteMetadata::default(), content)
    }

    #[test]
    fn test_build_records_every_link() {
        let notes = vec![
            note("A", "Links to [[B]] and [[supports::C#Intro]]."),
            note("B", "Back to [[a]]."),
        ];
        let index = BacklinksIndex::build(&notes);

        assert_eq!(index.lookup("B"), vec![Backlink::new("A", None)]);
        assert_eq!(
            index.lookup("C"),
            vec![Backlink::new("A", Some("supports".to_string()))]
        );
        assert_eq!(index.lookup("A"), vec![Backlink::new("B", None)]);
        assert!(index.lookup("D").is_empty());
    }

    #[test]
    fn test_lookup_is_case_insensitive_and_sanitized() {
        let index = BacklinksIndex::build(&[note("A", "[[Evidence A]]")]);
        assert_eq!(index.lookup("evidence a"), index.lookup("Evidence A"));
        assert_eq!(index.lookup(" Evidence: A? "), index.lookup("Evidence A"));
        assert_eq!(index.lookup("EVIDENCE A").len(), 1);
    }

    #[test]
    fn test_same_source_different_relations_are_distinct() {
        let index = BacklinksIndex::build(&[note(
            "A",
            "[[supports::Claim]] but also [[refutes::Claim]] and [[supports::claim]] again, plus [[Claim]]",
        )]);
        let backlinks = index.lookup("Claim");
        assert_eq!(
            backlinks,
            vec![
                Backlink::new("A", Some("supports".to_string())),
                Backlink::new("A", Some("refutes".to_string())),
                Backlink::new("A", None),
            ]
        );
    }

    #[test]
    fn test_self_links_and_missing_targets_are_recorded() {
        let index = BacklinksIndex::build(&[note("Loop", "[[Loop]] and [[Nowhere]]")]);
        assert_eq!(index.lookup("Loop"), vec![Backlink::new("Loop", None)]);
        assert_eq!(index.lookup("Nowhere"), vec![Backlink::new("Loop", None)]);
    }

    #[test]
    fn test_insertion_order_is_stable() {
        let notes = vec![note("Z", "[[T]]"), note("A", "[[T]]"), note("M", "[[T]]")];
        let sources: Vec<_> = BacklinksIndex::build(&notes)
            .lookup("T")
            .into_iter()
            .map(|b| b.source_note)
            .collect();
        assert_eq!(sources, vec!["Z", "A", "M"]);
    }

    #[test]
    fn test_index_note_replaces_previous_links() {
        let mut a = note("A", "[[B]] [[C]]");
        let mut index = BacklinksIndex::build(&[a.clone(), note("X", "[[B]]")]);
        assert_eq!(index.lookup("B").len(), 2);

        a.raw_content = "now only [[C]]".to_string();
        index.index_note(&a);

        assert_eq!(index.lookup("B"), vec![Backlink::new("X", None)]);
        assert_eq!(index.lookup("C"), vec![Backlink::new("A", None)]);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_remove_note_drops_empty_targets() {
        let mut index = BacklinksIndex::build(&[note("A", "[[B]]")]);
        index.remove_note("A.md");
        assert!(index.is_empty());
        index.remove_note("never indexed");
        assert!(index.is_empty());
    }

    #[test]
    fn test_same_label_in_two_folders_is_tracked_per_note() {
        let research = Note::new("research/Idea.md", NoteMetadata::default(), "see [[Target]]");
        let mut root = Note::new("Idea.md", NoteMetadata::default(), "");
        let mut index = BacklinksIndex::build(&[research.clone(), root.clone()]);

        index.index_note(&root);
        assert_eq!(index.lookup("Target"), vec![Backlink::new("Idea", None)]);

        root.raw_content = "also [[Target]]".to_string();
        index.index_note(&root);
        index.remove_note(&research.id);
        assert_eq!(index.lookup("Target"), vec![Backlink::new("Idea", None)]);

        index.remove_note(&root.id);
        assert!(index.is_empty());
    }

    #[test]
    fn test_links_that_sanitize_to_nothing_are_skipped() {
        let index = BacklinksIndex::build(&[note("A", "[[ ?* ]]")]);
        assert!(index.is_empty());
    }

    #[test]
    fn test_backlink_serializes_relation_as_type() {
        let json = serde_json::to_value(Backlink::new("A", Some("supports".into()))).unwrap();
        assert_eq!(json["sourceNote"], "A");
        assert_eq!(json["type"], "supports");
    }
}
