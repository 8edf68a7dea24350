//! Store configuration.
//!
//! # Responsibility
//! - Describe where notes live and how store calls are bounded.
//! - Resolve overrides from process environment for adapters.
//!
//! # Invariants
//! - `notes_dir` is never empty.
//! - `io_timeout_ms = Some(0)` is treated as "no timeout".

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const NOTES_DIR_ENV: &str = "NOTEBOX_NOTES_DIR";
pub const LIST_ORDER_ENV: &str = "NOTEBOX_LIST_ORDER";
pub const IO_TIMEOUT_ENV: &str = "NOTEBOX_IO_TIMEOUT_MS";

const DEFAULT_NOTES_FOLDER: &str = "notebox_notes";

/// Ordering applied to every full listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListOrder {
    /// Byte-wise ascending by name. Generated names sort by creation time.
    #[default]
    Name,
    /// Most recently modified first, ties broken by name.
    ModifiedDesc,
}

impl ListOrder {
    /// Parses `name` or `modified_desc` (case-insensitive).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "name" => Some(Self::Name),
            "modified_desc" | "modified" => Some(Self::ModifiedDesc),
            _ => None,
        }
    }
}

/// Runtime configuration for the note store and synchronizer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoreConfig {
    /// Directory holding one file per note. Created on open when absent.
    pub notes_dir: PathBuf,
    #[serde(default)]
    pub list_order: ListOrder,
    /// Per store-call bound, in milliseconds.
    #[serde(default)]
    pub io_timeout_ms: Option<u64>,
}

impl StoreConfig {
    pub fn new(notes_dir: impl Into<PathBuf>) -> Self {
        Self {
            notes_dir: notes_dir.into(),
            list_order: ListOrder::default(),
            io_timeout_ms: None,
        }
    }

    pub fn with_list_order(mut self, order: ListOrder) -> Self {
        self.list_order = order;
        self
    }

    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout_ms = Some(timeout.as_millis().min(u128::from(u64::MAX)) as u64);
        self
    }

    /// Effective per-call timeout, if any.
    pub fn io_timeout(&self) -> Option<Duration> {
        match self.io_timeout_ms {
            Some(0) | None => None,
            Some(ms) => Some(Duration::from_millis(ms)),
        }
    }

    /// Builds a config from `NOTEBOX_*` environment variables.
    ///
    /// Falls back to `<temp_dir>/notebox_notes` when no directory is set.
    /// Malformed optional values are ignored with a warning.
    pub fn from_env() -> Self {
        let notes_dir = std::env::var(NOTES_DIR_ENV)
            .ok()
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_notes_dir);

        let mut config = Self::new(notes_dir);
        if let Ok(raw) = std::env::var(LIST_ORDER_ENV) {
            match ListOrder::parse(&raw) {
                Some(order) => config.list_order = order,
                None => log::warn!(
                    "event=config_load module=config status=ignored key={} reason=unknown_value",
                    LIST_ORDER_ENV
                ),
            }
        }
        if let Ok(raw) = std::env::var(IO_TIMEOUT_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(ms) => config.io_timeout_ms = Some(ms),
                Err(_) => log::warn!(
                    "event=config_load module=config status=ignored key={} reason=not_a_number",
                    IO_TIMEOUT_ENV
                ),
            }
        }
        config
    }

    pub fn notes_dir(&self) -> &Path {
        self.notes_dir.as_path()
    }
}

fn default_notes_dir() -> PathBuf {
    std::env::temp_dir().join(DEFAULT_NOTES_FOLDER)
}
