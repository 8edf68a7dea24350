//! Flutter-facing bridge over `notebox_core`.

pub mod api;
