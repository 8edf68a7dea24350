//! Note domain model.
//!
//! # Responsibility
//! - Define the canonical note record and its identifier type.
//!
//! # Invariants
//! - Every note is identified by a validated `NoteName`, which is also its
//!   backing file name.

pub mod note;
