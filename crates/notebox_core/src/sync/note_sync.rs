//! Note synchronizer: observable snapshot over the note repository.
//!
//! # Responsibility
//! - Publish the full note list as a replace-on-change snapshot.
//! - Run every "mutate then reload" sequence to completion before the next
//!   command starts, in issue order.
//! - Keep all file-system work on the blocking pool.
//!
//! # Invariants
//! - The published snapshot always equals a full reload taken after the most
//!   recently issued successful mutation.
//! - A failed mutation never publishes; the previous snapshot stays current.
//! - Snapshot revisions increase by exactly one per publish.
//! - Cancellation only skips commands that have not started.
//! - A store call that outlives its timeout is awaited before the next
//!   command starts; if it was a mutation, a reload follows it.

use crate::config::StoreConfig;
use crate::model::note::{Note, NoteName};
use crate::repo::note_repo::{
    FileNoteRepository, NoteRepository, RepoError, RepoResult, StorageOp,
};
use log::{debug, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

/// Upper bound on suffixed candidates tried for one generated name.
const MAX_NAME_ATTEMPTS: u32 = 1_000;

/// Full, immutable list of notes as of one reload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotesSnapshot {
    /// 0 before the first publish, then +1 per publish.
    pub revision: u64,
    pub notes: Arc<[Note]>,
}

impl NotesSnapshot {
    fn empty() -> Self {
        Self {
            revision: 0,
            notes: Arc::from(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn get(&self, name: &NoteName) -> Option<&Note> {
        self.notes.iter().find(|note| &note.name == name)
    }

    pub fn contains(&self, name: &NoteName) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Note> {
        self.notes.iter()
    }
}

/// Lifecycle phase of the synchronizer's worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Loading,
    Mutating,
}

/// Synchronizer-level error surfaced to presentation callers.
#[derive(Debug)]
pub enum SyncError {
    /// Store rejected the name or failed the I/O.
    Repo(RepoError),
    /// Create/update flows require non-empty content.
    EmptyContent,
    /// Operation was cancelled before it started.
    Cancelled,
    /// Worker is gone; no further commands are processed.
    Stopped,
    /// Blocking store call panicked or was aborted.
    WorkerFailed(String),
}

impl SyncError {
    pub fn is_storage_failure(&self) -> bool {
        matches!(self, Self::Repo(RepoError::Storage { .. }))
    }

    pub fn is_invalid_name(&self) -> bool {
        matches!(self, Self::Repo(RepoError::InvalidName(_)))
    }

    /// Stable short code for adapters and log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Repo(err) => err.code(),
            Self::EmptyContent => "empty_content",
            Self::Cancelled => "cancelled",
            Self::Stopped => "stopped",
            Self::WorkerFailed(_) => "worker_failed",
        }
    }
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::EmptyContent => write!(f, "note content cannot be empty"),
            Self::Cancelled => write!(f, "operation cancelled before it started"),
            Self::Stopped => write!(f, "note synchronizer stopped"),
            Self::WorkerFailed(details) => write!(f, "storage worker failed: {details}"),
        }
    }
}

impl Error for SyncError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for SyncError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Result of one completed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Snapshot published by the reload that closed the command.
    Reloaded(NotesSnapshot),
    /// A new note was created under a generated name.
    Created { note: Note, snapshot: NotesSnapshot },
}

impl SyncOutcome {
    pub fn snapshot(&self) -> &NotesSnapshot {
        match self {
            Self::Reloaded(snapshot) => snapshot,
            Self::Created { snapshot, .. } => snapshot,
        }
    }

    pub fn into_snapshot(self) -> NotesSnapshot {
        match self {
            Self::Reloaded(snapshot) => snapshot,
            Self::Created { snapshot, .. } => snapshot,
        }
    }
}

type SyncReply = Result<SyncOutcome, SyncError>;

enum SyncCommand {
    LoadAll,
    Save(Note),
    Delete(NoteName),
    Create(String),
    Update(Note),
}

impl SyncCommand {
    fn label(&self) -> &'static str {
        match self {
            Self::LoadAll => "load_all",
            Self::Save(_) => "save",
            Self::Delete(_) => "delete",
            Self::Create(_) => "create",
            Self::Update(_) => "update",
        }
    }
}

struct QueuedCommand {
    command: SyncCommand,
    cancel: CancellationToken,
    reply: oneshot::Sender<SyncReply>,
}

/// Handle to one queued synchronizer command.
///
/// Dropping the handle does not cancel the command.
pub struct PendingOperation {
    cancel: CancellationToken,
    reply: oneshot::Receiver<SyncReply>,
}

impl PendingOperation {
    /// Skips the command if the worker has not started it yet.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Waits for the worker to finish (or skip) the command.
    pub async fn wait(self) -> SyncReply {
        self.reply.await.map_err(|_| SyncError::Stopped)?
    }
}

/// Cloneable handle to a single-consumer synchronizer worker.
#[derive(Clone)]
pub struct NoteSynchronizer {
    commands: mpsc::UnboundedSender<QueuedCommand>,
    snapshot_rx: watch::Receiver<NotesSnapshot>,
    state_rx: watch::Receiver<SyncState>,
}

impl NoteSynchronizer {
    /// Opens a file-backed store and spawns a synchronizer over it.
    ///
    /// # Errors
    /// - Returns the store's open error; no worker is started in that case.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(config: &StoreConfig) -> RepoResult<Self> {
        let repo = FileNoteRepository::open(config)?;
        Ok(Self::spawn(Arc::new(repo), config))
    }

    /// Spawns the worker task and queues the initial full load.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(repo: Arc<dyn NoteRepository>, config: &StoreConfig) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(NotesSnapshot::empty());
        let (state_tx, state_rx) = watch::channel(SyncState::Idle);

        let worker = SyncWorker {
            repo,
            io_timeout: config.io_timeout(),
            snapshot_tx,
            state_tx,
            commands: commands_rx,
            revision: 0,
            late_call: None,
        };
        tokio::spawn(worker.run());

        let synchronizer = Self {
            commands: commands_tx,
            snapshot_rx,
            state_rx,
        };
        // Initial load mirrors view-model construction; result is observed
        // through the snapshot channel.
        let _ = synchronizer.enqueue(SyncCommand::LoadAll);
        synchronizer
    }

    /// Reloads the full list and publishes it.
    pub async fn load_all(&self) -> Result<NotesSnapshot, SyncError> {
        self.enqueue_load_all()
            .wait()
            .await
            .map(SyncOutcome::into_snapshot)
    }

    /// Saves `note` (create or full overwrite), then reloads.
    pub async fn save(&self, note: Note) -> Result<NotesSnapshot, SyncError> {
        self.enqueue_save(note)
            .wait()
            .await
            .map(SyncOutcome::into_snapshot)
    }

    /// Deletes the note named `name`, then reloads.
    pub async fn delete(&self, name: NoteName) -> Result<NotesSnapshot, SyncError> {
        self.enqueue_delete(name)
            .wait()
            .await
            .map(SyncOutcome::into_snapshot)
    }

    /// Creates a note with a generated, collision-free name.
    pub async fn create(
        &self,
        content: impl Into<String>,
    ) -> Result<(Note, NotesSnapshot), SyncError> {
        match self.enqueue_create(content).wait().await? {
            SyncOutcome::Created { note, snapshot } => Ok((note, snapshot)),
            SyncOutcome::Reloaded(_) => Err(SyncError::WorkerFailed(
                "create finished without a created note".to_string(),
            )),
        }
    }

    /// Replaces the content of an existing note, then reloads.
    ///
    /// # Errors
    /// - `EmptyContent` for empty content.
    /// - Storage failure with `NotFound` when `name` is not in the store.
    pub async fn update(
        &self,
        name: NoteName,
        content: impl Into<String>,
    ) -> Result<NotesSnapshot, SyncError> {
        self.enqueue_update(name, content)
            .wait()
            .await
            .map(SyncOutcome::into_snapshot)
    }

    pub fn enqueue_load_all(&self) -> PendingOperation {
        self.enqueue(SyncCommand::LoadAll)
    }

    pub fn enqueue_save(&self, note: Note) -> PendingOperation {
        self.enqueue(SyncCommand::Save(note))
    }

    pub fn enqueue_delete(&self, name: NoteName) -> PendingOperation {
        self.enqueue(SyncCommand::Delete(name))
    }

    pub fn enqueue_create(&self, content: impl Into<String>) -> PendingOperation {
        self.enqueue(SyncCommand::Create(content.into()))
    }

    pub fn enqueue_update(&self, name: NoteName, content: impl Into<String>) -> PendingOperation {
        self.enqueue(SyncCommand::Update(Note::new(name, content)))
    }

    /// Observers are woken on every snapshot replacement.
    pub fn subscribe(&self) -> watch::Receiver<NotesSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Last published snapshot.
    pub fn snapshot(&self) -> NotesSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SyncState> {
        self.state_rx.clone()
    }

    pub fn state(&self) -> SyncState {
        *self.state_rx.borrow()
    }

    pub fn is_stopped(&self) -> bool {
        self.commands.is_closed()
    }

    fn enqueue(&self, command: SyncCommand) -> PendingOperation {
        let (reply_tx, reply_rx) = oneshot::channel();
        let cancel = CancellationToken::new();
        let queued = QueuedCommand {
            command,
            cancel: cancel.clone(),
            reply: reply_tx,
        };
        if self.commands.send(queued).is_err() {
            warn!("event=sync_enqueue module=sync status=error error_code=stopped");
        }
        PendingOperation {
            cancel,
            reply: reply_rx,
        }
    }
}

/// Store call still running on the blocking pool after its timeout fired.
struct LateCall {
    finished: Pin<Box<dyn Future<Output = ()> + Send>>,
    mutation: bool,
}

struct SyncWorker {
    repo: Arc<dyn NoteRepository>,
    io_timeout: Option<Duration>,
    snapshot_tx: watch::Sender<NotesSnapshot>,
    state_tx: watch::Sender<SyncState>,
    commands: mpsc::UnboundedReceiver<QueuedCommand>,
    revision: u64,
    late_call: Option<LateCall>,
}

impl SyncWorker {
    async fn run(mut self) {
        info!("event=sync_start module=sync status=ok");
        while let Some(queued) = self.commands.recv().await {
            let label = queued.command.label();
            if queued.cancel.is_cancelled() {
                debug!("event=sync_command module=sync status=cancelled command={label}");
                let _ = queued.reply.send(Err(SyncError::Cancelled));
                continue;
            }

            let started_at = Instant::now();
            let result = self.handle(queued.command).await;
            self.set_state(SyncState::Idle);
            match &result {
                Ok(outcome) => debug!(
                    "event=sync_command module=sync status=ok command={} revision={} duration_ms={}",
                    label,
                    outcome.snapshot().revision,
                    started_at.elapsed().as_millis()
                ),
                Err(err) => warn!(
                    "event=sync_command module=sync status=error command={} duration_ms={} error_code={} error={}",
                    label,
                    started_at.elapsed().as_millis(),
                    err.code(),
                    err
                ),
            }
            // Caller may have dropped its handle; the publish already happened.
            let _ = queued.reply.send(result);
            self.settle_late_call().await;
        }
        info!("event=sync_stop module=sync status=ok");
    }

    async fn handle(&mut self, command: SyncCommand) -> SyncReply {
        match command {
            SyncCommand::LoadAll => self.reload().await.map(SyncOutcome::Reloaded),
            SyncCommand::Save(note) => {
                self.set_state(SyncState::Mutating);
                let repo = Arc::clone(&self.repo);
                self.run_blocking(true, move || repo.save(&note)).await?;
                self.reload().await.map(SyncOutcome::Reloaded)
            }
            SyncCommand::Delete(name) => {
                self.set_state(SyncState::Mutating);
                let repo = Arc::clone(&self.repo);
                self.run_blocking(true, move || repo.delete(&name)).await?;
                self.reload().await.map(SyncOutcome::Reloaded)
            }
            SyncCommand::Create(content) => {
                if content.is_empty() {
                    return Err(SyncError::EmptyContent);
                }
                self.set_state(SyncState::Mutating);
                let repo = Arc::clone(&self.repo);
                let note = self
                    .run_blocking(true, move || create_with_unique_name(repo.as_ref(), content))
                    .await?;
                let snapshot = self.reload().await?;
                Ok(SyncOutcome::Created { note, snapshot })
            }
            SyncCommand::Update(note) => {
                if note.content.is_empty() {
                    return Err(SyncError::EmptyContent);
                }
                self.set_state(SyncState::Mutating);
                let repo = Arc::clone(&self.repo);
                self.run_blocking(true, move || {
                    // Edits start from a listed note; a missing one is not recreated.
                    repo.read(&note.name)?;
                    repo.save(&note)
                })
                .await?;
                self.reload().await.map(SyncOutcome::Reloaded)
            }
        }
    }

    /// Waits out a timed-out store call, then republishes if it mutated.
    async fn settle_late_call(&mut self) {
        let Some(late) = self.late_call.take() else {
            return;
        };
        self.set_state(if late.mutation {
            SyncState::Mutating
        } else {
            SyncState::Loading
        });
        let started_at = Instant::now();
        late.finished.await;
        info!(
            "event=sync_late_call module=sync status=finished mutation={} waited_ms={}",
            late.mutation,
            started_at.elapsed().as_millis()
        );
        if late.mutation {
            if let Err(err) = self.reload().await {
                warn!(
                    "event=sync_late_call module=sync status=error error_code={} error={}",
                    err.code(),
                    err
                );
            }
            // A timed-out reload only lists; wait for it without republishing.
            if let Some(listing) = self.late_call.take() {
                listing.finished.await;
            }
        }
        self.set_state(SyncState::Idle);
    }

    async fn reload(&mut self) -> Result<NotesSnapshot, SyncError> {
        self.set_state(SyncState::Loading);
        let repo = Arc::clone(&self.repo);
        let notes = self.run_blocking(false, move || repo.list_all()).await?;

        self.revision += 1;
        let snapshot = NotesSnapshot {
            revision: self.revision,
            notes: Arc::from(notes),
        };
        self.snapshot_tx.send_replace(snapshot.clone());
        Ok(snapshot)
    }

    /// Runs one store call on the blocking pool.
    ///
    /// On timeout the call keeps running; it is parked in `late_call` and
    /// settled before the next command.
    async fn run_blocking<T, F>(&mut self, mutation: bool, f: F) -> Result<T, SyncError>
    where
        T: Send + 'static,
        F: FnOnce() -> RepoResult<T> + Send + 'static,
    {
        let mut task = tokio::task::spawn_blocking(f);
        let joined = match self.io_timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut task).await {
                Ok(joined) => joined,
                Err(_) => {
                    self.late_call = Some(LateCall {
                        finished: Box::pin(async move {
                            let _ = task.await;
                        }),
                        mutation,
                    });
                    let err = io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("store call exceeded {} ms", limit.as_millis()),
                    );
                    let dir = self.repo.notes_dir();
                    return Err(RepoError::storage(StorageOp::Timeout, dir, err).into());
                }
            },
            None => task.await,
        };
        let result = joined.map_err(|err| SyncError::WorkerFailed(err.to_string()))?;
        Ok(result?)
    }

    fn set_state(&self, next: SyncState) {
        self.state_tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}

fn create_with_unique_name(repo: &dyn NoteRepository, content: String) -> RepoResult<Note> {
    let now = SystemTime::now();
    for attempt in 0..MAX_NAME_ATTEMPTS {
        let name = NoteName::timestamped(now, attempt);
        if repo.exists(&name)? {
            continue;
        }
        let note = Note::new(name, content);
        repo.save(&note)?;
        return Ok(note);
    }

    let err = io::Error::new(
        io::ErrorKind::AlreadyExists,
        "no free generated note name for the current timestamp",
    );
    Err(RepoError::storage(StorageOp::Write, repo.notes_dir(), err))
}

#[cfg(test)]
mod tests {
    use super::{create_with_unique_name, NotesSnapshot, SyncError};
    use crate::config::StoreConfig;
    use crate::model::note::NoteName;
    use crate::repo::note_repo::{FileNoteRepository, NoteRepository, RepoError};
    use tempfile::TempDir;

    #[test]
    fn empty_snapshot_starts_at_revision_zero() {
        let snapshot = NotesSnapshot::empty();
        assert_eq!(snapshot.revision, 0);
        assert!(snapshot.is_empty());
    }

    #[test]
    fn generated_names_skip_existing_entries() {
        let dir = TempDir::new().unwrap();
        let repo = FileNoteRepository::open(&StoreConfig::new(dir.path())).unwrap();

        let first = create_with_unique_name(&repo, "one".to_string()).unwrap();
        let second = create_with_unique_name(&repo, "two".to_string()).unwrap();
        assert_ne!(first.name, second.name);
        assert_eq!(repo.read(&first.name).unwrap().content, "one");
        assert_eq!(repo.read(&second.name).unwrap().content, "two");
    }

    #[test]
    fn error_classification_matches_variants() {
        let invalid: SyncError = RepoError::from(NoteName::parse("a/b").unwrap_err()).into();
        assert!(invalid.is_invalid_name());
        assert!(!invalid.is_storage_failure());
        assert_eq!(invalid.code(), "invalid_name");
        assert_eq!(SyncError::EmptyContent.code(), "empty_content");
    }
}
