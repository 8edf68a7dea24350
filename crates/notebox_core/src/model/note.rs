//! Note domain model.
//!
//! # Responsibility
//! - Define the note record shared by the store, synchronizer and adapters.
//! - Own the file-name validation policy for note identifiers.
//!
//! # Invariants
//! - A `NoteName` is always a single, portable file-system entry name.
//! - Dot-prefixed names are reserved for store-internal temporary files.
//! - `content` is stored verbatim; empty content is a valid note.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};

/// Upper bound for note names, matching the common 255-byte entry limit.
pub const MAX_NOTE_NAME_BYTES: usize = 255;

const GENERATED_NAME_PREFIX: &str = "note_";
const GENERATED_NAME_EXTENSION: &str = ".txt";

static FORBIDDEN_CHARS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[<>:"|?*\x00-\x1F\x7F]"#).expect("valid forbidden chars regex"));

/// Validation failures for proposed note names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameValidationError {
    /// Name is the empty string.
    Empty,
    /// Name exceeds `MAX_NOTE_NAME_BYTES`.
    TooLong { len: usize, max: usize },
    /// Name contains `/` or `\`.
    PathSeparator(String),
    /// Name contains a control or non-portable character.
    ForbiddenCharacter { name: String, found: char },
    /// Name is `.`/`..` or starts with `.`.
    Reserved(String),
    /// Name ends with `.` or a space.
    TrailingDotOrSpace(String),
}

impl Display for NameValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "note name cannot be empty"),
            Self::TooLong { len, max } => {
                write!(f, "note name is {len} bytes; maximum is {max}")
            }
            Self::PathSeparator(name) => {
                write!(f, "note name `{name}` must not contain path separators")
            }
            Self::ForbiddenCharacter { name, found } => write!(
                f,
                "note name `{}` contains forbidden character {:?}",
                name.escape_debug(),
                found
            ),
            Self::Reserved(name) => write!(f, "note name `{name}` is reserved"),
            Self::TrailingDotOrSpace(name) => {
                write!(f, "note name `{name}` must not end with `.` or a space")
            }
        }
    }
}

impl Error for NameValidationError {}

/// Validated note identifier, used verbatim as the backing file name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NoteName(String);

impl NoteName {
    /// Validates and wraps a caller-supplied name.
    ///
    /// The value is not trimmed or rewritten; it is either accepted as-is or
    /// rejected.
    pub fn parse(value: impl Into<String>) -> Result<Self, NameValidationError> {
        let value = value.into();
        validate_note_name(&value)?;
        Ok(Self(value))
    }

    /// Builds the time-derived name used for new notes:
    /// `note_<epoch_millis>.txt`, or `note_<epoch_millis>_<attempt>.txt`
    /// when `attempt > 0`.
    pub fn timestamped(now: SystemTime, attempt: u32) -> Self {
        let millis = now
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis())
            .unwrap_or(0);
        let value = if attempt == 0 {
            format!("{GENERATED_NAME_PREFIX}{millis}{GENERATED_NAME_EXTENSION}")
        } else {
            format!("{GENERATED_NAME_PREFIX}{millis}_{attempt}{GENERATED_NAME_EXTENSION}")
        };
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Display for NoteName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NoteName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for NoteName {
    type Error = NameValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl TryFrom<&str> for NoteName {
    type Error = NameValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<NoteName> for String {
    fn from(value: NoteName) -> Self {
        value.0
    }
}

/// One named unit of text content, persisted as one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Unique identifier and backing file name.
    pub name: NoteName,
    /// Raw text body. May be empty.
    pub content: String,
}

impl Note {
    pub fn new(name: NoteName, content: impl Into<String>) -> Self {
        Self {
            name,
            content: content.into(),
        }
    }

    /// Validates `name` and builds a note in one step.
    pub fn try_new(
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<Self, NameValidationError> {
        Ok(Self::new(NoteName::parse(name)?, content))
    }

    /// Returns a copy carrying replacement content under the same name.
    ///
    /// Edits are full overwrites; there is no partial patch.
    pub fn with_content(&self, content: impl Into<String>) -> Self {
        Self::new(self.name.clone(), content)
    }
}

/// Checks `value` against the note-name policy.
pub fn validate_note_name(value: &str) -> Result<(), NameValidationError> {
    if value.is_empty() {
        return Err(NameValidationError::Empty);
    }
    if value.len() > MAX_NOTE_NAME_BYTES {
        return Err(NameValidationError::TooLong {
            len: value.len(),
            max: MAX_NOTE_NAME_BYTES,
        });
    }
    if value.contains(['/', '\\']) {
        return Err(NameValidationError::PathSeparator(value.to_string()));
    }
    if let Some(found) = FORBIDDEN_CHARS_RE.find(value) {
        let found = found.as_str().chars().next().unwrap_or('\0');
        return Err(NameValidationError::ForbiddenCharacter {
            name: value.to_string(),
            found,
        });
    }
    if value.starts_with('.') {
        return Err(NameValidationError::Reserved(value.to_string()));
    }
    if value.ends_with(['.', ' ']) {
        return Err(NameValidationError::TrailingDotOrSpace(value.to_string()));
    }
    Ok(())
}
