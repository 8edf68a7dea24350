//! Core domain logic for Notebox.
//! This crate is the single source of truth for note storage invariants.

pub mod config;
pub mod logging;
pub mod model;
pub mod repo;
pub mod sync;

pub use config::{ListOrder, StoreConfig};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::note::{
    validate_note_name, NameValidationError, Note, NoteName, MAX_NOTE_NAME_BYTES,
};
pub use repo::note_repo::{
    FileNoteRepository, NoteRepository, RepoError, RepoResult, StorageOp,
};
pub use sync::note_sync::{
    NoteSynchronizer, NotesSnapshot, PendingOperation, SyncError, SyncOutcome, SyncState,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
