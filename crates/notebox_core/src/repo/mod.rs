//! Repository layer contracts and persistence implementations.
//!
//! # Responsibility
//! - Define the note persistence contract used by the synchronizer.
//! - Isolate file-system details from orchestration code.
//!
//! # Invariants
//! - Repository APIs return structured errors (`InvalidName`, `Storage`)
//!   instead of panicking or silently dropping failures.

pub mod note_repo;
