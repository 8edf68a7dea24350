//! Snapshot synchronization between the note store and its observers.
//!
//! # Responsibility
//! - Serialize mutate-then-reload sequences per synchronizer instance.
//! - Publish replace-on-change snapshots to subscribers.

pub mod note_sync;
