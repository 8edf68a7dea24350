//! FFI use-case API for the mobile UI shell.
//!
//! # Responsibility
//! - Expose note list/create/update/delete flows as sync, use-case-level
//!   functions for FRB.
//! - Own the process-wide synchronizer and the runtime that drives it.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Failures are returned as envelopes with a stable `error_code`, never
//!   dropped.
//! - One notes directory per process; switching directories is rejected.

use notebox_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    NoteName, NoteSynchronizer, NotesSnapshot, RepoError, StoreConfig, SyncError,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::runtime::{Builder, Runtime};

static NOTES_RUNTIME: Mutex<Option<Arc<NotesRuntime>>> = Mutex::new(None);

struct NotesRuntime {
    runtime: Runtime,
    synchronizer: NoteSynchronizer,
    notes_dir: PathBuf,
}

/// Why the process-wide notes runtime is unavailable.
#[derive(Debug)]
struct RuntimeUnavailable {
    /// `already_initialized`, `runtime_failed`, or the store's error code.
    code: &'static str,
    message: String,
}

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// # FFI contract
/// - `level`: `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory for rolling log files.
/// - Idempotent for the same `level + log_dir`.
/// - Returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// Opens the notes store at `notes_dir` and starts the synchronizer.
///
/// # FFI contract
/// - Sync call; creates the directory when absent.
/// - Idempotent for the same directory; a different directory is rejected.
/// - Returns empty string on success and error message on failure. A
///   failure here means the UI must not offer note flows.
#[flutter_rust_bridge::frb(sync)]
pub fn notes_init(notes_dir: String) -> String {
    let trimmed = notes_dir.trim();
    if trimmed.is_empty() {
        return "notes_dir cannot be empty".to_string();
    }
    match ensure_notes_runtime(Some(Path::new(trimmed))) {
        Ok(_) => String::new(),
        Err(err) => err.message,
    }
}

/// One list row for the notes screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteItem {
    /// Note identifier and file name.
    pub name: String,
    /// Full note text.
    pub content: String,
}

/// Full-list response; the UI replaces its whole list with `items`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotesListResponse {
    pub ok: bool,
    pub items: Vec<NoteItem>,
    /// Snapshot revision the items were taken from.
    pub revision: u64,
    pub message: String,
}

/// Action envelope for create/update/delete flows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteActionResponse {
    pub ok: bool,
    /// Affected note name, when known.
    pub name: Option<String>,
    /// Stable failure class (`invalid_name`, `storage_failure`, ...).
    pub error_code: Option<String>,
    /// Human-readable message for diagnostics/UI.
    pub message: String,
    /// Snapshot revision published by a successful action.
    pub revision: Option<u64>,
}

impl NoteActionResponse {
    fn success(message: impl Into<String>, name: String, snapshot: &NotesSnapshot) -> Self {
        Self {
            ok: true,
            name: Some(name),
            error_code: None,
            message: message.into(),
            revision: Some(snapshot.revision),
        }
    }

    fn failure(message: impl Into<String>, error_code: &str, name: Option<String>) -> Self {
        Self {
            ok: false,
            name,
            error_code: Some(error_code.to_string()),
            message: message.into(),
            revision: None,
        }
    }
}

/// Reloads every note from storage and returns the full list.
///
/// # FFI contract
/// - Sync call, storage-backed execution.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn notes_list() -> NotesListResponse {
    let notes = match ensure_notes_runtime(None) {
        Ok(notes) => notes,
        Err(err) => return list_failure(format!("notes_list failed: {}", err.message)),
    };

    match notes.runtime.block_on(notes.synchronizer.load_all()) {
        Ok(snapshot) => {
            let items = snapshot
                .iter()
                .map(|note| NoteItem {
                    name: note.name.to_string(),
                    content: note.content.clone(),
                })
                .collect::<Vec<_>>();
            let message = if items.is_empty() {
                "No notes.".to_string()
            } else {
                format!("Loaded {} note(s).", items.len())
            };
            NotesListResponse {
                ok: true,
                items,
                revision: snapshot.revision,
                message,
            }
        }
        Err(err) => list_failure(format!("notes_list failed: {err}")),
    }
}

/// Creates a note with a generated, time-based name.
///
/// # FFI contract
/// - Empty content is rejected with `error_code = empty_content`.
/// - Returns the generated name on success.
#[flutter_rust_bridge::frb(sync)]
pub fn notes_create(content: String) -> NoteActionResponse {
    let notes = match ensure_notes_runtime(None) {
        Ok(notes) => notes,
        Err(err) => return NoteActionResponse::failure(err.message, err.code, None),
    };

    match notes.runtime.block_on(notes.synchronizer.create(content)) {
        Ok((note, snapshot)) => {
            NoteActionResponse::success("Note created.", note.name.into_inner(), &snapshot)
        }
        Err(err) => action_failure("notes_create", &err, None),
    }
}

/// Replaces the content of an existing note.
///
/// # FFI contract
/// - `name` must be a valid note name (`error_code = invalid_name`).
/// - Empty content is rejected with `error_code = empty_content`.
/// - A note missing from the store is not recreated
///   (`error_code = storage_failure`).
#[flutter_rust_bridge::frb(sync)]
pub fn notes_update(name: String, content: String) -> NoteActionResponse {
    let note_name = match NoteName::parse(name.as_str()) {
        Ok(value) => value,
        Err(err) => return invalid_name_failure("notes_update", err.into(), name),
    };
    let notes = match ensure_notes_runtime(None) {
        Ok(notes) => notes,
        Err(err) => return NoteActionResponse::failure(err.message, err.code, Some(name)),
    };

    match notes
        .runtime
        .block_on(notes.synchronizer.update(note_name, content))
    {
        Ok(snapshot) => NoteActionResponse::success("Note updated.", name, &snapshot),
        Err(err) => action_failure("notes_update", &err, Some(name)),
    }
}

/// Deletes one note by name.
///
/// # FFI contract
/// - Deleting a missing note fails with `error_code = storage_failure`.
#[flutter_rust_bridge::frb(sync)]
pub fn notes_delete(name: String) -> NoteActionResponse {
    let note_name = match NoteName::parse(name.as_str()) {
        Ok(value) => value,
        Err(err) => return invalid_name_failure("notes_delete", err.into(), name),
    };
    let notes = match ensure_notes_runtime(None) {
        Ok(notes) => notes,
        Err(err) => return NoteActionResponse::failure(err.message, err.code, Some(name)),
    };

    match notes.runtime.block_on(notes.synchronizer.delete(note_name)) {
        Ok(snapshot) => NoteActionResponse::success("Note deleted.", name, &snapshot),
        Err(err) => action_failure("notes_delete", &err, Some(name)),
    }
}

fn ensure_notes_runtime(
    requested_dir: Option<&Path>,
) -> Result<Arc<NotesRuntime>, RuntimeUnavailable> {
    let mut slot = NOTES_RUNTIME
        .lock()
        .unwrap_or_else(PoisonError::into_inner);

    if let Some(active) = slot.as_ref() {
        if let Some(dir) = requested_dir {
            if active.notes_dir != dir {
                return Err(RuntimeUnavailable {
                    code: "already_initialized",
                    message: format!(
                        "notes already initialized at `{}`; refusing to switch to `{}`",
                        active.notes_dir.display(),
                        dir.display()
                    ),
                });
            }
        }
        return Ok(Arc::clone(active));
    }

    let config = match requested_dir {
        Some(dir) => {
            let mut config = StoreConfig::from_env();
            config.notes_dir = dir.to_path_buf();
            config
        }
        None => StoreConfig::from_env(),
    };
    let started = Arc::new(start_notes_runtime(config)?);
    *slot = Some(Arc::clone(&started));
    Ok(started)
}

fn start_notes_runtime(config: StoreConfig) -> Result<NotesRuntime, RuntimeUnavailable> {
    let runtime = Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("notebox-sync")
        .enable_time()
        .build()
        .map_err(|err| RuntimeUnavailable {
            code: "runtime_failed",
            message: format!("failed to start notes runtime: {err}"),
        })?;

    let synchronizer = {
        let _entered = runtime.enter();
        NoteSynchronizer::open(&config).map_err(|err| {
            log::error!(
                "event=notes_init module=ffi status=error error_code={} error={}",
                err.code(),
                err
            );
            RuntimeUnavailable {
                code: err.code(),
                message: format!("notes store open failed: {err}"),
            }
        })?
    };
    log::info!(
        "event=notes_init module=ffi status=ok dir={}",
        config.notes_dir.display()
    );

    Ok(NotesRuntime {
        runtime,
        synchronizer,
        notes_dir: config.notes_dir,
    })
}

fn list_failure(message: String) -> NotesListResponse {
    NotesListResponse {
        ok: false,
        items: Vec::new(),
        revision: 0,
        message,
    }
}

fn action_failure(operation: &str, err: &SyncError, name: Option<String>) -> NoteActionResponse {
    NoteActionResponse::failure(format!("{operation} failed: {err}"), err.code(), name)
}

fn invalid_name_failure(operation: &str, err: RepoError, name: String) -> NoteActionResponse {
    NoteActionResponse::failure(format!("{operation} failed: {err}"), err.code(), Some(name))
}
