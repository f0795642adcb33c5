use super::{NoteResolution, SessionStore, WriteThrough};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use notebook_core::link::Backlink;
use notebook_core::session::{MessageRole, NewMessage, Session, SessionKind};
use notebook_core::storage::{FileEntry, FileSystem};
use notebook_core::{FixedClock, NotebookConfig, NotebookError, Result};
use notebook_infrastructure::{ConfigService, LocalFileSystem, MemoryFileSystem};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

const NOW: &str = "2025-03-01T09:30:00.000Z";

fn clock() -> Arc<FixedClock> {
    Arc::new(FixedClock(Utc.with_ymd_and_hms(2025, 3, 1, 9, 30, 0).unwrap()))
}

fn store_with(fs: Arc<dyn FileSystem>) -> SessionStore {
    SessionStore::new(fs, clock(), NotebookConfig::default())
}

fn memory_store() -> (Arc<MemoryFileSystem>, SessionStore) {
    let fs = Arc::new(MemoryFileSystem::new());
    let store = store_with(fs.clone());
    (fs, store)
}

fn note_file(body: &str) -> String {
    format!("---\ntype: note\n---\n\n{}", body)
}

/// Memory file system whose writes and deletes can be switched to fail.
#[derive(Default)]
struct FlakyFileSystem {
    inner: MemoryFileSystem,
    fail_writes: AtomicBool,
    fail_deletes: AtomicBool,
}

#[async_trait]
impl FileSystem for FlakyFileSystem {
    async fn list(&self, dir: &str) -> Result<Vec<FileEntry>> {
        self.inner.list(dir).await
    }

    async fn read(&self, path: &str) -> Result<String> {
        self.inner.read(path).await
    }

    async fn write(&self, path: &str, content: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(NotebookError::io("disk full"));
        }
        self.inner.write(path, content).await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(NotebookError::io("permission denied"));
        }
        self.inner.delete(path).await
    }
}

#[tokio::test]
async fn test_create_session_then_reload() {
    let (fs, store) = memory_store();

    let (chat, write) = store.create_session("Project Plan").await.unwrap();
    assert!(write.is_persisted());
    assert_eq!(chat.id, "Project Plan.md");
    assert_eq!(chat.title, "Project Plan");
    assert_eq!(chat.created_at, NOW);
    assert!(chat.messages().is_empty());

    let reloaded = store_with(fs);
    let report = reloaded.load_all().await.unwrap();
    assert_eq!(report.loaded, vec!["Project Plan.md".to_string()]);

    let chat = reloaded.get_chat("Project Plan.md").await.unwrap();
    assert_eq!(chat.messages().len(), 0);
    assert_eq!(chat.total_token_count(), 0);
    assert_eq!(chat.model, "gemini-1.5-flash-latest");
}

#[tokio::test]
async fn test_create_session_conflicts() {
    let (_fs, store) = memory_store();
    let _ = store.create_session("Project Plan").await.unwrap();

    let err = store.create_session("project plan").await.unwrap_err();
    assert!(err.is_already_exists());

    let err = store.create_note("Project Plan.md").await.unwrap_err();
    assert!(err.is_already_exists());

    let err = store.create_session("  //??  ").await.unwrap_err();
    assert_eq!(err, NotebookError::InvalidName("  //??  ".to_string()));
}

#[tokio::test]
async fn test_create_refuses_unloaded_file_on_disk() {
    let fs = Arc::new(MemoryFileSystem::with_files([("Broken.md", "no metadata")]));
    let store = store_with(fs.clone());
    let report = store.load_all().await.unwrap();
    assert_eq!(report.skipped.len(), 1);

    let err = store.create_session("Broken").await.unwrap_err();
    assert!(err.is_already_exists());
    assert_eq!(fs.read("Broken.md").await.unwrap(), "no metadata");
}

#[tokio::test]
async fn test_two_turn_exchange() {
    let (fs, store) = memory_store();
    let (chat, _) = store.create_session("Greeting").await.unwrap();

    let first = store
        .add_message(&chat.id, NewMessage::new(1, MessageRole::User, "Hi", 2))
        .await;
    let second = store
        .add_message(&chat.id, NewMessage::new(1, MessageRole::Assistant, "Hello!", 3))
        .await;
    assert!(first.is_persisted());
    assert!(second.is_persisted());

    let chat = store.get_chat(&chat.id).await.unwrap();
    assert_eq!(chat.total_token_count(), 5);
    let roles: Vec<_> = chat.messages().iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![MessageRole::User, MessageRole::Assistant]);
    assert_eq!(chat.messages()[1].content, "Hello!");
    assert_eq!(chat.messages()[1].created_at, NOW);
    assert_ne!(chat.messages()[0].id, chat.messages()[1].id);

    // What is on disk decodes to what is in memory.
    let reloaded = store_with(fs);
    reloaded.load_all().await.unwrap();
    assert_eq!(reloaded.get_chat(&chat.id).await.unwrap(), chat);
}

#[tokio::test]
async fn test_add_message_appends_exactly_one() {
    let (_fs, store) = memory_store();
    let (chat, _) = store.create_session("Log").await.unwrap();
    for turn in 1..=3 {
        let _ = store
            .add_message(&chat.id, NewMessage::new(turn, MessageRole::User, "q", 4))
            .await;
    }
    let before = store.get_chat(&chat.id).await.unwrap();

    let _ = store
        .add_message(&chat.id, NewMessage::new(3, MessageRole::Assistant, "  a  ", 7))
        .await;

    let after = store.get_chat(&chat.id).await.unwrap();
    assert_eq!(after.messages().len(), before.messages().len() + 1);
    assert_eq!(&after.messages()[..3], before.messages());
    assert_eq!(after.messages()[3].content, "a");
    assert_eq!(after.total_token_count(), before.total_token_count() + 7);
}

#[tokio::test]
async fn test_add_message_to_unknown_or_note_is_skipped() {
    let (_fs, store) = memory_store();
    let (note, _) = store.create_note("Idea").await.unwrap();

    let message = NewMessage::new(1, MessageRole::User, "Hi", 1);
    assert!(store.add_message("missing.md", message.clone()).await.is_skipped());
    assert!(store.add_message(&note.id, message).await.is_skipped());
}

#[tokio::test]
async fn test_failed_write_keeps_memory() {
    let fs = Arc::new(FlakyFileSystem::default());
    let store = store_with(fs.clone());
    let (chat, _) = store.create_session("Offline").await.unwrap();

    fs.fail_writes.store(true, Ordering::SeqCst);
    let write = store
        .add_message(&chat.id, NewMessage::new(1, MessageRole::User, "Hi", 2))
        .await;

    assert!(write.error().is_some_and(NotebookError::is_io));
    let chat = store.get_chat(&chat.id).await.unwrap();
    assert_eq!(chat.messages().len(), 1);

    let (note, write) = store.create_note("Draft").await.unwrap();
    assert!(matches!(write, WriteThrough::Failed(_)));
    assert!(store.get(&note.id).await.is_some());
}

#[tokio::test]
async fn test_load_skips_malformed_files() {
    let fs = Arc::new(MemoryFileSystem::with_files([
        ("Good.md", note_file("fine")),
        ("Plain.md", "# no metadata block".to_string()),
        ("Open.md", "---\ntitle: never closed\n".to_string()),
        ("Chat.md", "---\ntitle: c\n---\n\n### 1:user\n--- | tokens: 1 | created: t\nHi".to_string()),
    ]));
    let store = store_with(fs);

    let report = store.load_all().await.unwrap();

    assert_eq!(report.loaded, vec!["Chat.md".to_string(), "Good.md".to_string()]);
    let mut skipped: Vec<_> = report.skipped.iter().map(|s| s.id.as_str()).collect();
    skipped.sort();
    assert_eq!(skipped, vec!["Open.md", "Plain.md"]);
    assert!(report.skipped.iter().all(|s| s.error.is_parse()));
    assert_eq!(store.get("Chat.md").await.unwrap().kind(), SessionKind::Chat);
}

#[tokio::test]
async fn test_load_walks_directories() {
    let fs = Arc::new(MemoryFileSystem::with_files([
        ("top.md", note_file("")),
        ("research/deep/Evidence A.md", note_file("")),
        (".ai-notebook/chats/hidden.md", note_file("")),
        ("research/image.png", "binary".to_string()),
    ]));

    let store = store_with(fs.clone());
    let report = store.load_all().await.unwrap();
    assert_eq!(
        report.loaded,
        vec!["research/deep/Evidence A.md".to_string(), "top.md".to_string()]
    );
    assert!(store.does_note_exist("evidence a").await);

    let config = NotebookConfig {
        include_hidden: true,
        ..Default::default()
    };
    let store = SessionStore::new(fs, clock(), config);
    let report = store.load_all().await.unwrap();
    assert_eq!(report.loaded.len(), 3);
}

#[tokio::test]
async fn test_load_with_missing_root_is_empty() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let fs = Arc::new(LocalFileSystem::new(temp_dir.path().join("not-yet")));
    let store = store_with(fs);

    let report = store.load_all().await.unwrap();
    assert!(report.loaded.is_empty());
    assert_eq!(store.active_session_id().await, None);
}

#[tokio::test]
async fn test_backlinks_after_load_and_update() {
    let fs = Arc::new(MemoryFileSystem::with_files([
        ("Claim.md", note_file("Backed by [[supports::Evidence A#Key Finding|see evidence]].")),
        ("Doubt.md", note_file("See [[refutes::evidence a]] and [[Claim]].")),
        ("Evidence A.md", note_file("# Key Finding")),
    ]));
    let store = store_with(fs.clone());
    store.load_all().await.unwrap();

    assert_eq!(
        store.backlinks("Evidence A").await,
        vec![
            Backlink::new("Claim", Some("supports".to_string())),
            Backlink::new("Doubt", Some("refutes".to_string())),
        ]
    );
    assert_eq!(store.backlinks("claim").await, vec![Backlink::new("Doubt", None)]);

    let write = store.update_note_content("Doubt.md", "Nothing left.").await;
    assert!(write.is_persisted());
    assert_eq!(store.backlinks("Evidence A").await.len(), 1);
    assert!(store.backlinks("Claim").await.is_empty());
    assert_eq!(fs.read("Doubt.md").await.unwrap(), note_file("Nothing left."));
}

#[tokio::test]
async fn test_new_note_sharing_a_label_keeps_existing_backlinks() {
    let fs = Arc::new(MemoryFileSystem::with_files([(
        "research/Idea.md",
        note_file("see [[Target]]"),
    )]));
    let store = store_with(fs);
    store.load_all().await.unwrap();
    assert_eq!(store.backlinks("Target").await, vec![Backlink::new("Idea", None)]);

    let (note, write) = store.create_note("Idea").await.unwrap();
    assert!(write.is_persisted());
    assert_eq!(note.id, "Idea.md");
    assert_eq!(store.backlinks("Target").await, vec![Backlink::new("Idea", None)]);

    let _ = store.update_note_content("Idea.md", "also [[Target]]").await;
    let _ = store.delete_session("research/Idea.md").await;
    assert_eq!(store.backlinks("Target").await, vec![Backlink::new("Idea", None)]);
}

#[tokio::test]
async fn test_note_with_user_type_key_loads() {
    let fs = Arc::new(MemoryFileSystem::with_files([
        ("Book.md", "---\ntype: reference\n---\n\nLinks [[Target]]".to_string()),
        ("Target.md", note_file("")),
    ]));
    let store = store_with(fs.clone());
    let report = store.load_all().await.unwrap();
    assert_eq!(report.loaded.len(), 2);
    assert!(report.skipped.is_empty());
    assert_eq!(store.backlinks("Target").await, vec![Backlink::new("Book", None)]);

    let err = store.create_note("Book").await.unwrap_err();
    assert!(err.is_already_exists());

    let _ = store.update_note_content("Book.md", "Links [[Target]] again").await;
    assert_eq!(
        fs.read("Book.md").await.unwrap(),
        "---\ntype: reference\n---\n\nLinks [[Target]] again"
    );
}

#[tokio::test]
async fn test_update_note_content_ignores_chats() {
    let (_fs, store) = memory_store();
    let (chat, _) = store.create_session("Talk").await.unwrap();

    assert!(store.update_note_content(&chat.id, "[[X]]").await.is_skipped());
    assert!(store.update_note_content("nope.md", "[[X]]").await.is_skipped());
    assert!(store.backlinks("X").await.is_empty());
}

#[tokio::test]
async fn test_delete_then_reload() {
    let fs = Arc::new(MemoryFileSystem::with_files([
        ("A.md", note_file("[[B]]")),
        ("B.md", note_file("")),
    ]));
    let store = store_with(fs);
    store.load_all().await.unwrap();
    assert_eq!(store.backlinks("B").await.len(), 1);

    let write = store.delete_session("A.md").await;
    assert!(write.is_persisted());
    assert!(store.get("A.md").await.is_none());
    assert!(store.backlinks("B").await.is_empty());

    store.load_all().await.unwrap();
    assert!(store.get("A.md").await.is_none());
    assert!(store.delete_session("A.md").await.is_skipped());
}

#[tokio::test]
async fn test_delete_failure_still_closes() {
    let fs = Arc::new(FlakyFileSystem::default());
    let store = store_with(fs.clone());
    let (chat, _) = store.create_session("Stuck").await.unwrap();

    fs.fail_deletes.store(true, Ordering::SeqCst);
    let write = store.delete_session(&chat.id).await;

    assert!(matches!(write, WriteThrough::Failed(ref e) if e.is_io()));
    assert!(store.get(&chat.id).await.is_none());
    assert!(fs.inner.exists(&chat.id).await.unwrap());
}

#[tokio::test]
async fn test_delete_of_file_already_gone_is_persisted() {
    let fs = Arc::new(MemoryFileSystem::with_files([("Gone.md", note_file(""))]));
    let store = store_with(fs.clone());
    store.load_all().await.unwrap();
    fs.delete("Gone.md").await.unwrap();

    assert!(store.delete_session("Gone.md").await.is_persisted());
}

#[tokio::test]
async fn test_active_id_survives_reload_only_if_present() {
    let fs = Arc::new(MemoryFileSystem::with_files([
        ("a.md", note_file("")),
        ("b.md", note_file("")),
    ]));
    let store = store_with(fs.clone());
    store.load_all().await.unwrap();
    assert_eq!(store.active_session_id().await.as_deref(), Some("a.md"));

    assert!(store.set_active_session_id(Some("b.md")).await);
    assert!(!store.set_active_session_id(Some("zzz.md")).await);
    store.load_all().await.unwrap();
    assert_eq!(store.active_session_id().await.as_deref(), Some("b.md"));

    fs.delete("b.md").await.unwrap();
    store.load_all().await.unwrap();
    assert_eq!(store.active_session_id().await.as_deref(), Some("a.md"));

    fs.delete("a.md").await.unwrap();
    store.load_all().await.unwrap();
    assert_eq!(store.active_session_id().await, None);
}

#[tokio::test]
async fn test_resolve_existing_note_sets_scroll_target() {
    let fs = Arc::new(MemoryFileSystem::with_files([(
        "notes/Evidence A.md",
        note_file("# Key Finding"),
    )]));
    let store = store_with(fs);
    store.load_all().await.unwrap();

    let resolution = store
        .resolve_or_create_note_by_name("evidence a", Some("Key   Finding"))
        .await;

    assert_eq!(
        resolution,
        NoteResolution::Opened {
            id: "notes/Evidence A.md".to_string(),
            scroll_target: Some("key-finding".to_string()),
        }
    );
    assert_eq!(
        store.active_session_id().await.as_deref(),
        Some("notes/Evidence A.md")
    );
    assert_eq!(store.take_scroll_target().await.as_deref(), Some("key-finding"));
    assert_eq!(store.take_scroll_target().await, None);
}

#[tokio::test]
async fn test_set_active_clears_scroll_target() {
    let fs = Arc::new(MemoryFileSystem::with_files([
        ("A.md", note_file("# H")),
        ("B.md", note_file("")),
    ]));
    let store = store_with(fs);
    store.load_all().await.unwrap();

    let _ = store.resolve_or_create_note_by_name("A", Some("H")).await;
    assert!(store.set_active_session_id(Some("B.md")).await);
    assert_eq!(store.take_scroll_target().await, None);
}

#[tokio::test]
async fn test_resolve_missing_note_creates_it() {
    let (fs, store) = memory_store();

    let resolution = store
        .resolve_or_create_note_by_name("New: Idea?", Some("Intro"))
        .await;

    let (id, write) = match resolution {
        NoteResolution::Created { id, write } => (id, write),
        other => panic!("expected a new note, got {:?}", other),
    };
    assert_eq!(id, "New Idea.md");
    assert!(write.is_persisted());
    assert_eq!(store.active_session_id().await.as_deref(), Some("New Idea.md"));
    assert_eq!(store.take_scroll_target().await, None);
    assert!(store.does_note_exist("new idea").await);

    let Session::Note(note) = store.get(&id).await.unwrap() else {
        panic!("expected a note");
    };
    assert_eq!(note.raw_content, "");
    assert_eq!(note.metadata.title.as_deref(), Some("New Idea"));
    assert!(fs.exists("New Idea.md").await.unwrap());
}

#[tokio::test]
async fn test_resolve_edge_cases() {
    let (_fs, store) = memory_store();
    let _ = store.create_session("Taken").await.unwrap();

    assert_eq!(
        store.resolve_or_create_note_by_name(" ?* ", None).await,
        NoteResolution::Ignored
    );
    let resolution = store.resolve_or_create_note_by_name("taken", None).await;
    assert!(matches!(resolution, NoteResolution::Rejected(ref e) if e.is_already_exists()));
    assert_eq!(resolution.id(), None);
}

#[tokio::test]
async fn test_does_note_exist_ignores_chats_and_case() {
    let (_fs, store) = memory_store();
    let _ = store.create_session("Chatty").await.unwrap();
    let _ = store.create_note("Project Plan").await.unwrap();

    assert!(store.does_note_exist("PROJECT PLAN").await);
    assert!(store.does_note_exist("  Project Plan? ").await);
    assert!(!store.does_note_exist("Chatty").await);
    assert!(!store.does_note_exist("Other").await);
}

#[tokio::test]
async fn test_context_files_are_memory_only() {
    let (fs, store) = memory_store();
    let (chat, _) = store.create_session("Code Review").await.unwrap();

    assert!(store.attach_context_file(&chat.id, "src/lib.rs").await);
    assert!(!store.attach_context_file(&chat.id, "src/lib.rs").await);
    assert!(store.attach_context_file(&chat.id, "Cargo.toml").await);
    assert!(store.detach_context_file(&chat.id, "Cargo.toml").await);
    assert!(!store.detach_context_file(&chat.id, "Cargo.toml").await);

    let _ = store
        .add_message(&chat.id, NewMessage::new(1, MessageRole::User, "Review this", 3))
        .await;
    let on_disk = fs.read(&chat.id).await.unwrap();
    assert!(!on_disk.contains("src/lib.rs"));

    // Reloading keeps the attachments of chats that are still there.
    store.load_all().await.unwrap();
    let chat = store.get_chat(&chat.id).await.unwrap();
    assert_eq!(chat.context_file_paths, vec!["src/lib.rs".to_string()]);

    assert!(store.clear_context_files(&chat.id).await);
    assert!(store.get_chat(&chat.id).await.unwrap().context_file_paths.is_empty());
    assert!(!store.clear_context_files("nope.md").await);
}

#[tokio::test]
async fn test_end_to_end_on_disk() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let fs = Arc::new(LocalFileSystem::new(temp_dir.path()));
    let store = store_with(fs.clone());

    let (chat, _) = store.create_session("Disk Chat").await.unwrap();
    let _ = store
        .add_message(&chat.id, NewMessage::new(1, MessageRole::User, "Hi", 2))
        .await;
    let _ = store.create_note("Linked").await.unwrap();
    let _ = store.update_note_content("Linked.md", "[[Disk Chat]]").await;

    let reloaded = store_with(fs);
    let report = reloaded.load_all().await.unwrap();
    assert_eq!(report.loaded, vec!["Disk Chat.md".to_string(), "Linked.md".to_string()]);
    assert!(report.skipped.is_empty());
    assert_eq!(reloaded.get_chat(&chat.id).await.unwrap().total_token_count(), 2);
    assert_eq!(
        reloaded.backlinks("disk chat").await,
        vec![Backlink::new("Linked", None)]
    );
}

#[tokio::test]
async fn test_open_uses_configured_notes_dir() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let notes = temp_dir.path().join("notes");
    std::fs::create_dir_all(&notes).unwrap();
    std::fs::write(notes.join("Seed.md"), note_file("[[Other]]")).unwrap();

    let service = ConfigService::with_path(temp_dir.path().join("config.toml"));
    service
        .save(&NotebookConfig {
            notes_dir: Some(notes.clone()),
            default_model: "local-llama".to_string(),
            ..Default::default()
        })
        .unwrap();

    let store = SessionStore::open(&service).unwrap();
    assert_eq!(store.config().default_model, "local-llama");
    let report = store.load_all().await.unwrap();
    assert_eq!(report.loaded, vec!["Seed.md".to_string()]);
    assert_eq!(store.backlinks("Other").await, vec![Backlink::new("Seed", None)]);

    let (chat, write) = store.create_session("Fresh").await.unwrap();
    assert!(write.is_persisted());
    assert_eq!(chat.model, "local-llama");
    assert!(notes.join("Fresh.md").exists());
}

#[tokio::test]
async fn test_open_project_reads_project_chats() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let service = ConfigService::with_path(temp_dir.path().join("config.toml"));
    let project = temp_dir.path().join("proj");

    let store = SessionStore::open_project(&project, &service).unwrap();
    let (chat, write) = store.create_session("Design").await.unwrap();
    assert!(write.is_persisted());
    assert!(project.join(".ai-notebook/chats").join(&chat.id).exists());

    let reopened = SessionStore::open_project(&project, &service).unwrap();
    let report = reopened.load_all().await.unwrap();
    assert_eq!(report.loaded, vec!["Design.md".to_string()]);
}
