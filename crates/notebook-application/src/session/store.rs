//! The session repository.

use super::outcome::{LoadReport, NoteResolution, SkippedFile, WriteThrough};
use notebook_core::link::{Backlink, BacklinksIndex, heading_slug, index_key, sanitize_file_name};
use notebook_core::session::{
    ChatSession, NewMessage, Note, NoteMetadata, Session, label_from_id,
};
use notebook_core::{Clock, FileSystem, NotebookConfig, NotebookError, Result, SystemClock};
use notebook_infrastructure::codec::{parse_session, serialize_session};
use notebook_infrastructure::{ConfigService, LocalFileSystem, NotebookPaths};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Default)]
struct StoreState {
    /// Keyed by file id; ordered so "first session" is deterministic
    sessions: BTreeMap<String, Session>,
    active_id: Option<String>,
    /// Heading slug the UI should scroll to after activating a note
    scroll_target: Option<String>,
    index: BacklinksIndex,
}

impl StoreState {
    fn notes(&self) -> impl Iterator<Item = &Note> {
        self.sessions.values().filter_map(Session::as_note)
    }

    fn rebuild_index(&mut self) {
        self.index = BacklinksIndex::build(self.notes());
    }

    /// Case-insensitive id lookup, used for conflict checks.
    fn has_id(&self, id: &str) -> bool {
        let id = id.to_lowercase();
        self.sessions.keys().any(|k| k.to_lowercase() == id)
    }

    fn find_note_by_name(&self, name: &str) -> Option<&Note> {
        let key = index_key(name);
        self.notes().find(|note| index_key(note.label()) == key)
    }

    /// Keeps the active id pointing at a loaded session.
    fn repair_active(&mut self) {
        let still_present = self
            .active_id
            .as_ref()
            .is_some_and(|id| self.sessions.contains_key(id));
        if !still_present {
            self.active_id = self.sessions.keys().next().cloned();
            self.scroll_target = None;
        }
    }
}

/// In-memory collection of every loaded chat and note.
///
/// Mutations update memory first and then write the affected file through
/// the [`FileSystem`]. A failed write is reported in the returned
/// [`WriteThrough`] but never undoes the in-memory change.
///
/// The state lock is held across the write, so two mutations of the same
/// session reach the disk in the order they were issued.
pub struct SessionStore {
    fs: Arc<dyn FileSystem>,
    clock: Arc<dyn Clock>,
    config: NotebookConfig,
    state: RwLock<StoreState>,
}

impl SessionStore {
    pub fn new(fs: Arc<dyn FileSystem>, clock: Arc<dyn Clock>, config: NotebookConfig) -> Self {
        Self {
            fs,
            clock,
            config,
            state: RwLock::new(StoreState::default()),
        }
    }

    /// Store over the configured notes directory on the local disk.
    pub fn open(config_service: &ConfigService) -> Result<Self> {
        let config = config_service.get_config()?;
        let root = NotebookPaths::notes_dir(config.notes_dir.as_deref())?;
        tracing::info!("[SessionStore] Opening notebook at {}", root.display());
        Ok(Self::new(
            Arc::new(LocalFileSystem::new(root)),
            Arc::new(SystemClock),
            config,
        ))
    }

    /// Store over the chats kept inside a project folder.
    pub fn open_project(project_root: &Path, config_service: &ConfigService) -> Result<Self> {
        let config = config_service.get_config()?;
        let root = NotebookPaths::chats_dir(project_root);
        tracing::info!("[SessionStore] Opening project chats at {}", root.display());
        Ok(Self::new(
            Arc::new(LocalFileSystem::new(root)),
            Arc::new(SystemClock),
            config,
        ))
    }

    pub fn config(&self) -> &NotebookConfig {
        &self.config
    }

    // ============================================================================
    // Loading
    // ============================================================================

    /// Replaces the in-memory state with what is on disk.
    ///
    /// Files that fail to read or decode are skipped and listed in the report.
    /// Only a failure to list the root directory is an error.
    pub async fn load_all(&self) -> Result<LoadReport> {
        let ids = self.collect_session_files().await?;

        let mut sessions = BTreeMap::new();
        let mut report = LoadReport::default();
        for id in ids {
            let raw = match self.fs.read(&id).await {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::warn!("[SessionStore] Failed to read {}: {}", id, e);
                    report.skipped.push(SkippedFile { id, error: e });
                    continue;
                }
            };
            match parse_session(&id, &raw) {
                Ok(session) => {
                    sessions.insert(id, session);
                }
                Err(e) => {
                    tracing::warn!("[SessionStore] Skipping {}: {}", id, e);
                    let error = e.into_notebook_error(&id);
                    report.skipped.push(SkippedFile { id, error });
                }
            }
        }

        let mut state = self.state.write().await;
        // Context attachments only live in memory; keep them across reloads.
        for (id, session) in sessions.iter_mut() {
            if let (Session::Chat(fresh), Some(Session::Chat(old))) =
                (session, state.sessions.get(id))
            {
                fresh.context_file_paths = old.context_file_paths.clone();
            }
        }
        state.sessions = sessions;
        state.rebuild_index();
        state.repair_active();

        report.loaded = state.sessions.keys().cloned().collect();
        tracing::info!(
            "[SessionStore] Loaded {} sessions ({} skipped, {} link targets)",
            report.loaded.len(),
            report.skipped.len(),
            state.index.len()
        );
        Ok(report)
    }

    /// Walks the file tree, returning the ids of candidate session files.
    async fn collect_session_files(&self) -> Result<Vec<String>> {
        let mut pending = vec![String::new()];
        let mut files = Vec::new();

        while let Some(dir) = pending.pop() {
            let entries = match self.fs.list(&dir).await {
                Ok(entries) => entries,
                Err(e) if dir.is_empty() && e.is_not_found() => {
                    tracing::info!("[SessionStore] Notebook root does not exist yet");
                    break;
                }
                Err(e) if dir.is_empty() => return Err(e),
                Err(e) => {
                    tracing::warn!("[SessionStore] Failed to list {}: {}", dir, e);
                    continue;
                }
            };

            for entry in entries {
                if entry.is_hidden() && !self.config.include_hidden {
                    continue;
                }
                if entry.is_directory {
                    pending.push(entry.path);
                } else if self.config.is_session_file(&entry.path) {
                    files.push(entry.path);
                }
            }
        }

        files.sort();
        Ok(files)
    }

    // ============================================================================
    // Queries
    // ============================================================================

    pub async fn get(&self, id: &str) -> Option<Session> {
        self.state.read().await.sessions.get(id).cloned()
    }

    pub async fn get_chat(&self, id: &str) -> Option<ChatSession> {
        self.get(id).await.and_then(|s| match s {
            Session::Chat(chat) => Some(chat),
            Session::Note(_) => None,
        })
    }

    pub async fn get_note(&self, id: &str) -> Option<Note> {
        self.get(id).await.and_then(|s| match s {
            Session::Note(note) => Some(note),
            Session::Chat(_) => None,
        })
    }

    /// All sessions, ordered by id.
    pub async fn sessions(&self) -> Vec<Session> {
        self.state.read().await.sessions.values().cloned().collect()
    }

    /// Whether a note with this name (file label, case-insensitive) is loaded.
    pub async fn does_note_exist(&self, name: &str) -> bool {
        self.state.read().await.find_note_by_name(name).is_some()
    }

    /// Notes linking to `name`.
    pub async fn backlinks(&self, name: &str) -> Vec<Backlink> {
        self.state.read().await.index.lookup(name)
    }

    pub async fn active_session_id(&self) -> Option<String> {
        self.state.read().await.active_id.clone()
    }

    /// Activates a session (or none). Unknown ids are refused.
    ///
    /// Any pending scroll target belongs to the previous activation and is dropped.
    pub async fn set_active_session_id(&self, id: Option<&str>) -> bool {
        let mut state = self.state.write().await;
        if let Some(id) = id {
            if !state.sessions.contains_key(id) {
                tracing::debug!("[SessionStore] Cannot activate unknown session {}", id);
                return false;
            }
        }
        state.active_id = id.map(str::to_string);
        state.scroll_target = None;
        true
    }

    /// Hands out the pending scroll target once.
    pub async fn take_scroll_target(&self) -> Option<String> {
        self.state.write().await.scroll_target.take()
    }

    // ============================================================================
    // Creation
    // ============================================================================

    /// Creates an empty chat named `name` and writes it out.
    ///
    /// Fails with `AlreadyExists` when the file id is taken (ignoring case),
    /// so the caller can ask before overwriting anything.
    pub async fn create_session(&self, name: &str) -> Result<(ChatSession, WriteThrough)> {
        let mut state = self.state.write().await;
        let (id, title) = self.claim_id(&state, name, "chat").await?;

        let chat = ChatSession::new(
            id.clone(),
            title,
            self.config.default_model.clone(),
            self.config.default_temperature,
            self.clock.now_iso(),
        );
        state.sessions.insert(id.clone(), chat.clone().into());
        tracing::info!("[SessionStore] Created chat {}", id);

        let write = self.persist(&Session::Chat(chat.clone())).await;
        Ok((chat, write))
    }

    /// Creates an empty note named `name` and writes it out.
    pub async fn create_note(&self, name: &str) -> Result<(Note, WriteThrough)> {
        let mut state = self.state.write().await;
        let (id, title) = self.claim_id(&state, name, "note").await?;
        let (note, write) = self.insert_note(&mut state, id, title).await;
        Ok((note, write))
    }

    async fn insert_note(
        &self,
        state: &mut StoreState,
        id: String,
        title: String,
    ) -> (Note, WriteThrough) {
        let metadata = NoteMetadata {
            title: Some(title),
            created_at: Some(self.clock.now_iso()),
            ..Default::default()
        };
        let note = Note::new(id.clone(), metadata, "");
        state.sessions.insert(id.clone(), note.clone().into());
        state.index.index_note(&note);
        tracing::info!("[SessionStore] Created note {}", id);

        let write = self.persist(&Session::Note(note.clone())).await;
        (note, write)
    }

    /// Sanitizes `name` into a file id and checks it is free in memory and on disk.
    async fn claim_id(
        &self,
        state: &StoreState,
        name: &str,
        entity_type: &'static str,
    ) -> Result<(String, String)> {
        let title = sanitize_file_name(name);
        if title.is_empty() {
            return Err(NotebookError::InvalidName(name.to_string()));
        }
        let id = self.config.file_name_for(&title);

        if state.has_id(&id) {
            return Err(NotebookError::already_exists(entity_type, id));
        }
        // An unparseable file is not in memory but must not be overwritten either.
        match self.fs.exists(&id).await {
            Ok(true) => return Err(NotebookError::already_exists(entity_type, id)),
            Ok(false) => {}
            Err(e) => tracing::warn!("[SessionStore] Could not check {} on disk: {}", id, e),
        }

        let title = title_for(&title, &id);
        Ok((id, title))
    }

    // ============================================================================
    // Mutation
    // ============================================================================

    /// Appends a message to a chat.
    ///
    /// The store assigns the message id and timestamp. Unknown ids and notes
    /// are skipped.
    pub async fn add_message(&self, session_id: &str, message: NewMessage) -> WriteThrough {
        let mut state = self.state.write().await;
        let Some(Session::Chat(chat)) = state.sessions.get_mut(session_id) else {
            tracing::warn!("[SessionStore] add_message: no chat with id {}", session_id);
            return WriteThrough::Skipped;
        };

        if message.turn < chat.last_turn() {
            tracing::warn!(
                "[SessionStore] {}: turn {} appended after turn {}",
                session_id,
                message.turn,
                chat.last_turn()
            );
        }
        let message = message.into_message(Uuid::new_v4().to_string(), self.clock.now_iso());
        chat.append(message);
        tracing::debug!(
            "[SessionStore] {} now has {} messages ({} tokens)",
            session_id,
            chat.messages().len(),
            chat.total_token_count()
        );

        let snapshot = Session::Chat(chat.clone());
        self.persist(&snapshot).await
    }

    /// Replaces a note's text and refreshes the backlink index.
    pub async fn update_note_content(&self, session_id: &str, content: &str) -> WriteThrough {
        let mut state = self.state.write().await;
        let Some(Session::Note(note)) = state.sessions.get_mut(session_id) else {
            tracing::debug!("[SessionStore] update_note_content: no note with id {}", session_id);
            return WriteThrough::Skipped;
        };
        note.raw_content = content.to_string();
        let snapshot = Session::Note(note.clone());

        state.rebuild_index();
        self.persist(&snapshot).await
    }

    /// Removes a session from memory, then deletes its file.
    ///
    /// A file that is already gone counts as deleted.
    pub async fn delete_session(&self, session_id: &str) -> WriteThrough {
        let mut state = self.state.write().await;
        let Some(removed) = state.sessions.remove(session_id) else {
            tracing::debug!("[SessionStore] delete_session: unknown id {}", session_id);
            return WriteThrough::Skipped;
        };
        if removed.as_note().is_some() {
            state.rebuild_index();
        }
        state.repair_active();

        match self.fs.delete(session_id).await {
            Ok(()) => {
                tracing::info!("[SessionStore] Deleted {}", session_id);
                WriteThrough::Persisted
            }
            Err(e) if e.is_not_found() => {
                tracing::debug!("[SessionStore] {} was already gone from disk", session_id);
                WriteThrough::Persisted
            }
            Err(e) => {
                tracing::warn!("[SessionStore] Failed to delete {}: {}", session_id, e);
                WriteThrough::Failed(e)
            }
        }
    }

    /// Follows a wiki-link: opens the note called `name`, or creates it.
    ///
    /// When the note exists, `heading` becomes the pending scroll target.
    /// A new note has nothing to scroll to.
    pub async fn resolve_or_create_note_by_name(
        &self,
        name: &str,
        heading: Option<&str>,
    ) -> NoteResolution {
        let title = sanitize_file_name(name);
        if title.is_empty() {
            return NoteResolution::Ignored;
        }

        let mut state = self.state.write().await;
        if let Some(id) = state.find_note_by_name(&title).map(|n| n.id.clone()) {
            let scroll_target = heading.map(heading_slug).filter(|s| !s.is_empty());
            state.active_id = Some(id.clone());
            state.scroll_target = scroll_target.clone();
            return NoteResolution::Opened { id, scroll_target };
        }

        let (id, title) = match self.claim_id(&state, &title, "note").await {
            Ok(claimed) => claimed,
            Err(e) => {
                tracing::warn!("[SessionStore] Cannot create note {}: {}", title, e);
                return NoteResolution::Rejected(e);
            }
        };
        let (note, write) = self.insert_note(&mut state, id, title).await;
        state.active_id = Some(note.id.clone());
        state.scroll_target = None;
        NoteResolution::Created { id: note.id, write }
    }

    // ============================================================================
    // Context attachments (memory only)
    // ============================================================================

    /// Attaches a file to a chat's prompt context. Returns false for unknown
    /// chats and for files already attached.
    pub async fn attach_context_file(&self, session_id: &str, path: &str) -> bool {
        let mut state = self.state.write().await;
        let Some(Session::Chat(chat)) = state.sessions.get_mut(session_id) else {
            return false;
        };
        if chat.context_file_paths.iter().any(|p| p == path) {
            return false;
        }
        chat.context_file_paths.push(path.to_string());
        true
    }

    pub async fn detach_context_file(&self, session_id: &str, path: &str) -> bool {
        let mut state = self.state.write().await;
        let Some(Session::Chat(chat)) = state.sessions.get_mut(session_id) else {
            return false;
        };
        let before = chat.context_file_paths.len();
        chat.context_file_paths.retain(|p| p != path);
        chat.context_file_paths.len() != before
    }

    pub async fn clear_context_files(&self, session_id: &str) -> bool {
        let mut state = self.state.write().await;
        match state.sessions.get_mut(session_id) {
            Some(Session::Chat(chat)) => {
                chat.context_file_paths.clear();
                true
            }
            _ => false,
        }
    }

    /// Serializes `session` and writes it to its file.
    async fn persist(&self, session: &Session) -> WriteThrough {
        let result = match serialize_session(session) {
            Ok(text) => self.fs.write(session.id(), &text).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => WriteThrough::Persisted,
            Err(e) => {
                tracing::warn!("[SessionStore] Failed to write {}: {}", session.id(), e);
                WriteThrough::Failed(e)
            }
        }
    }
}

/// Title recorded for a new session: the name as typed, minus a repeated extension.
fn title_for(title: &str, id: &str) -> String {
    if title == id {
        label_from_id(id).to_string()
    } else {
        title.to_string()
    }
}
