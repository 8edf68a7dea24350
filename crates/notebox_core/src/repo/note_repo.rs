//! Note repository contract and file-per-note implementation.
//!
//! # Responsibility
//! - Persist each note as one file inside a dedicated notes directory.
//! - Translate files back into `Note` values on full listings.
//! - Report every I/O problem as a structured `RepoError`, never a panic.
//!
//! # Invariants
//! - File name == note name; file content == raw UTF-8 note text.
//! - Saves are atomic: temp file in the same directory, fsync, rename.
//! - At most one writer per note name at a time; different names proceed
//!   concurrently.
//! - Dot-prefixed entries belong to the store and are never listed.

use crate::config::{ListOrder, StoreConfig};
use crate::model::note::{NameValidationError, Note, NoteName};
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Instant, SystemTime};

const TEMP_FILE_PREFIX: &str = ".notebox-";
const TEMP_FILE_SUFFIX: &str = ".tmp";

pub type RepoResult<T> = Result<T, RepoError>;

/// File-system operation that produced a storage failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageOp {
    CreateDir,
    List,
    Read,
    Write,
    Delete,
    Timeout,
}

impl StorageOp {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreateDir => "create_dir",
            Self::List => "list",
            Self::Read => "read",
            Self::Write => "write",
            Self::Delete => "delete",
            Self::Timeout => "timeout",
        }
    }
}

/// Repository error for note persistence.
#[derive(Debug)]
pub enum RepoError {
    /// Proposed note name failed validation.
    InvalidName(NameValidationError),
    /// Any I/O failure: permission, disk full, missing file or directory.
    Storage {
        op: StorageOp,
        path: PathBuf,
        source: io::Error,
    },
}

impl RepoError {
    pub(crate) fn storage(op: StorageOp, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Storage {
            op,
            path: path.into(),
            source,
        }
    }

    /// Underlying I/O error kind for storage failures.
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            Self::Storage { source, .. } => Some(source.kind()),
            Self::InvalidName(_) => None,
        }
    }

    /// Stable short code for adapters and log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidName(_) => "invalid_name",
            Self::Storage { .. } => "storage_failure",
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidName(err) => write!(f, "{err}"),
            Self::Storage { op, path, source } => write!(
                f,
                "storage failure during {} on `{}`: {source}",
                op.as_str(),
                path.display()
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidName(err) => Some(err),
            Self::Storage { source, .. } => Some(source),
        }
    }
}

impl From<NameValidationError> for RepoError {
    fn from(value: NameValidationError) -> Self {
        Self::InvalidName(value)
    }
}

/// Repository interface for note persistence.
pub trait NoteRepository: Send + Sync {
    /// Creates or fully overwrites the file for `note.name`.
    fn save(&self, note: &Note) -> RepoResult<()>;
    /// Reads every note in the directory, in the configured order.
    fn list_all(&self) -> RepoResult<Vec<Note>>;
    /// Removes the file for `name`. A missing file is a storage failure.
    fn delete(&self, name: &NoteName) -> RepoResult<()>;
    /// Reads one note.
    fn read(&self, name: &NoteName) -> RepoResult<Note>;
    /// Returns whether any entry occupies `name`.
    fn exists(&self, name: &NoteName) -> RepoResult<bool>;
    /// Directory holding the note files.
    fn notes_dir(&self) -> &Path;
}

/// File-backed note repository rooted at one notes directory.
pub struct FileNoteRepository {
    notes_dir: PathBuf,
    list_order: ListOrder,
    name_locks: Mutex<HashMap<NoteName, Arc<Mutex<()>>>>,
}

impl FileNoteRepository {
    /// Opens the store, creating the notes directory when absent.
    ///
    /// # Errors
    /// - `Storage { op: CreateDir }` when the directory cannot be created or
    ///   the path exists and is not a directory. Callers must treat this as
    ///   fatal to initialization.
    pub fn open(config: &StoreConfig) -> RepoResult<Self> {
        let notes_dir = config.notes_dir().to_path_buf();
        if let Err(err) = fs::create_dir_all(&notes_dir) {
            error!(
                "event=store_open module=repo status=error error_code=create_dir_failed dir={} error={}",
                notes_dir.display(),
                err
            );
            return Err(RepoError::storage(StorageOp::CreateDir, notes_dir, err));
        }
        if !notes_dir.is_dir() {
            error!(
                "event=store_open module=repo status=error error_code=not_a_directory dir={}",
                notes_dir.display()
            );
            let err = io::Error::new(io::ErrorKind::Other, "notes path is not a directory");
            return Err(RepoError::storage(StorageOp::CreateDir, notes_dir, err));
        }

        info!(
            "event=store_open module=repo status=ok dir={} order={:?}",
            notes_dir.display(),
            config.list_order
        );
        Ok(Self {
            notes_dir,
            list_order: config.list_order,
            name_locks: Mutex::new(HashMap::new()),
        })
    }

    fn note_path(&self, name: &NoteName) -> PathBuf {
        self.notes_dir.join(name.as_str())
    }

    fn with_name_lock<T>(
        &self,
        name: &NoteName,
        f: impl FnOnce() -> RepoResult<T>,
    ) -> RepoResult<T> {
        let lock = {
            let mut locks = self.name_locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(name.clone()).or_default())
        };

        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };

        // Map + local clone only: nobody else is waiting on this name.
        let mut locks = self.name_locks.lock().unwrap_or_else(PoisonError::into_inner);
        if Arc::strong_count(&lock) == 2 {
            locks.remove(name);
        }
        result
    }

    #[cfg(test)]
    fn tracked_lock_count(&self) -> usize {
        self.name_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl NoteRepository for FileNoteRepository {
    fn save(&self, note: &Note) -> RepoResult<()> {
        let started_at = Instant::now();
        let path = self.note_path(&note.name);
        let result = self.with_name_lock(&note.name, || {
            write_atomically(&self.notes_dir, &path, note.content.as_str())
                .map_err(|err| RepoError::storage(StorageOp::Write, &path, err))
        });

        match &result {
            Ok(()) => info!(
                "event=note_save module=repo status=ok name={} bytes={} duration_ms={}",
                note.name,
                note.content.len(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => warn!(
                "event=note_save module=repo status=error name={} duration_ms={} error_code={} error={}",
                note.name,
                started_at.elapsed().as_millis(),
                err.code(),
                err
            ),
        }
        result
    }

    fn list_all(&self) -> RepoResult<Vec<Note>> {
        let started_at = Instant::now();
        let result = list_notes_in(&self.notes_dir, self.list_order);
        match &result {
            Ok(notes) => debug!(
                "event=notes_list module=repo status=ok count={} duration_ms={}",
                notes.len(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => warn!(
                "event=notes_list module=repo status=error duration_ms={} error={}",
                started_at.elapsed().as_millis(),
                err
            ),
        }
        result
    }

    fn delete(&self, name: &NoteName) -> RepoResult<()> {
        let path = self.note_path(name);
        let result = self.with_name_lock(name, || {
            fs::remove_file(&path).map_err(|err| RepoError::storage(StorageOp::Delete, &path, err))
        });

        match &result {
            Ok(()) => info!("event=note_delete module=repo status=ok name={name}"),
            Err(err) => warn!(
                "event=note_delete module=repo status=error name={} error_code={} error={}",
                name,
                err.code(),
                err
            ),
        }
        result
    }

    fn read(&self, name: &NoteName) -> RepoResult<Note> {
        let path = self.note_path(name);
        let content = fs::read_to_string(&path)
            .map_err(|err| RepoError::storage(StorageOp::Read, &path, err))?;
        Ok(Note::new(name.clone(), content))
    }

    fn exists(&self, name: &NoteName) -> RepoResult<bool> {
        let path = self.note_path(name);
        path.try_exists()
            .map_err(|err| RepoError::storage(StorageOp::Read, &path, err))
    }

    fn notes_dir(&self) -> &Path {
        self.notes_dir.as_path()
    }
}

fn write_atomically(dir: &Path, target: &Path, content: &str) -> io::Result<()> {
    if target.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            "a directory occupies the note name",
        ));
    }

    // Dropping `temp` on any early return removes the partial file.
    let mut temp = tempfile::Builder::new()
        .prefix(TEMP_FILE_PREFIX)
        .suffix(TEMP_FILE_SUFFIX)
        .tempfile_in(dir)?;
    temp.write_all(content.as_bytes())?;
    temp.as_file().sync_all()?;
    temp.persist(target).map_err(|err| err.error)?;
    Ok(())
}

fn list_notes_in(notes_dir: &Path, order: ListOrder) -> RepoResult<Vec<Note>> {
    let entries =
        fs::read_dir(notes_dir).map_err(|err| RepoError::storage(StorageOp::List, notes_dir, err))?;

    let mut listed: Vec<(Note, Option<SystemTime>)> = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| RepoError::storage(StorageOp::List, notes_dir, err))?;
        let file_name = entry.file_name();
        let Some(raw_name) = file_name.to_str() else {
            debug!("event=notes_list module=repo status=skipped reason=non_utf8_name");
            continue;
        };
        if raw_name.starts_with('.') {
            continue;
        }
        let Ok(name) = NoteName::parse(raw_name) else {
            debug!("event=notes_list module=repo status=skipped reason=invalid_name");
            continue;
        };

        let path = entry.path();
        let file_type = entry
            .file_type()
            .map_err(|err| RepoError::storage(StorageOp::List, &path, err))?;
        if !file_type.is_file() {
            continue;
        }

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            // Removed between enumeration and read.
            Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
            Err(err) => return Err(RepoError::storage(StorageOp::Read, &path, err)),
        };
        let modified = match order {
            ListOrder::Name => None,
            ListOrder::ModifiedDesc => match entry.metadata().and_then(|meta| meta.modified()) {
                Ok(modified) => Some(modified),
                Err(err) => {
                    // Sorted after every note with a known mtime.
                    debug!(
                        "event=notes_list module=repo status=degraded reason=no_mtime name={} error={}",
                        name, err
                    );
                    None
                }
            },
        };
        listed.push((Note::new(name, content), modified));
    }

    sort_listed(&mut listed, order);
    Ok(listed.into_iter().map(|(note, _)| note).collect())
}

/// Notes with an unknown mtime go last under `ModifiedDesc`.
fn sort_listed(listed: &mut [(Note, Option<SystemTime>)], order: ListOrder) {
    match order {
        ListOrder::Name => listed.sort_by(|left, right| left.0.name.cmp(&right.0.name)),
        ListOrder::ModifiedDesc => listed.sort_by(|left, right| {
            right
                .1
                .cmp(&left.1)
                .then_with(|| left.0.name.cmp(&right.0.name))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::{sort_listed, FileNoteRepository, NoteRepository, RepoError, StorageOp};
    use crate::config::{ListOrder, StoreConfig};
    use crate::model::note::{Note, NoteName};
    use std::fs;
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn open_repo(dir: &TempDir) -> FileNoteRepository {
        FileNoteRepository::open(&StoreConfig::new(dir.path().join("notes"))).unwrap()
    }

    #[test]
    fn save_leaves_no_temp_files_behind() {
        let dir = TempDir::new().unwrap();
        let repo = open_repo(&dir);
        repo.save(&Note::try_new("a.txt", "hello").unwrap()).unwrap();

        let entries: Vec<String> = fs::read_dir(repo.notes_dir())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(entries, vec!["a.txt".to_string()]);
    }

    #[test]
    fn save_onto_directory_fails_and_keeps_directory() {
        let dir = TempDir::new().unwrap();
        let repo = open_repo(&dir);
        fs::create_dir(repo.notes_dir().join("taken")).unwrap();

        let err = repo
            .save(&Note::try_new("taken", "x").unwrap())
            .unwrap_err();
        assert!(matches!(
            err,
            RepoError::Storage {
                op: StorageOp::Write,
                ..
            }
        ));
        assert!(repo.notes_dir().join("taken").is_dir());
    }

    #[test]
    fn name_locks_are_released_after_use() {
        let dir = TempDir::new().unwrap();
        let repo = Arc::new(open_repo(&dir));

        let handles: Vec<_> = (0..8)
            .map(|idx| {
                let repo = Arc::clone(&repo);
                thread::spawn(move || {
                    let note = Note::try_new("shared.txt", format!("writer {idx}")).unwrap();
                    repo.save(&note).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(repo.tracked_lock_count(), 0);
        let name = NoteName::parse("shared.txt").unwrap();
        let content = repo.read(&name).unwrap().content;
        assert!(content.starts_with("writer "));
        assert_eq!(repo.list_all().unwrap().len(), 1);
    }

    #[test]
    fn unknown_mtime_sorts_after_dated_notes() {
        let base = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        let mut listed = vec![
            (Note::try_new("a_unknown.txt", "").unwrap(), None),
            (Note::try_new("b_old.txt", "").unwrap(), Some(base)),
            (Note::try_new("c_new.txt", "").unwrap(), Some(base + Duration::from_secs(5))),
            (Note::try_new("0_unknown.txt", "").unwrap(), None),
        ];

        sort_listed(&mut listed, ListOrder::ModifiedDesc);

        let names: Vec<&str> = listed.iter().map(|(note, _)| note.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["c_new.txt", "b_old.txt", "0_unknown.txt", "a_unknown.txt"]
        );
    }

    #[test]
    fn open_rejects_path_occupied_by_file() {
        let dir = TempDir::new().unwrap();
        let occupied = dir.path().join("notes");
        fs::write(&occupied, "not a directory").unwrap();

        let err = FileNoteRepository::open(&StoreConfig::new(&occupied))
            .err()
            .expect("file path must not open as a store");
        assert!(matches!(
            err,
            RepoError::Storage {
                op: StorageOp::CreateDir,
                ..
            }
        ));
    }
}
