use notebook_core::NotebookError;

/// What happened to the disk copy after an in-memory mutation.
///
/// The in-memory change is applied first and is never rolled back, so a
/// `Failed` value only means the file on disk is now behind. Hosts usually
/// turn it into a notification.
#[must_use]
#[derive(Debug, Clone, PartialEq)]
pub enum WriteThrough {
    /// The file system accepted the change.
    Persisted,
    /// The file system rejected the change.
    Failed(NotebookError),
    /// Nothing was changed (unknown id, wrong session kind).
    Skipped,
}

impl WriteThrough {
    pub fn is_persisted(&self) -> bool {
        matches!(self, WriteThrough::Persisted)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, WriteThrough::Skipped)
    }

    pub fn error(&self) -> Option<&NotebookError> {
        match self {
            WriteThrough::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Result of following a wiki-link by name.
#[derive(Debug, Clone, PartialEq)]
pub enum NoteResolution {
    /// An existing note was activated.
    Opened {
        id: String,
        /// Slug of the requested heading, if any
        scroll_target: Option<String>,
    },
    /// No note had that name; an empty one was created and activated.
    Created { id: String, write: WriteThrough },
    /// The name sanitized to nothing.
    Ignored,
    /// A note could not be created, e.g. a chat already uses the file name.
    Rejected(NotebookError),
}

impl NoteResolution {
    /// Id of the note that is now active.
    pub fn id(&self) -> Option<&str> {
        match self {
            NoteResolution::Opened { id, .. } | NoteResolution::Created { id, .. } => Some(id),
            NoteResolution::Ignored | NoteResolution::Rejected(_) => None,
        }
    }
}

/// A file `load_all` could not use.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedFile {
    pub id: String,
    pub error: NotebookError,
}

/// Summary of a `load_all` run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    /// Ids of the sessions now in memory
    pub loaded: Vec<String>,
    pub skipped: Vec<SkippedFile>,
}
