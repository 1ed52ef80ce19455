//! Song record domain model.
//!
//! # Responsibility
//! - Define the canonical record mirrored from the remote song tables.
//! - Provide the composite key value type used everywhere as lookup key.
//!
//! # Invariants
//! - `(id, language)` is stable and unique across the whole dataset.
//! - `items` are materialized sorted ascending by `line_number`.
//! - Records are replaced wholesale on refresh, never patched field-by-field.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Dataset language of a song record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "PL")]
    Pl,
    #[serde(rename = "EN")]
    En,
}

impl Language {
    /// Wire/storage text for this language.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pl => "PL",
            Self::En => "EN",
        }
    }
}

impl Display for Language {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = SongKeyParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "PL" => Ok(Self::Pl),
            "EN" => Ok(Self::En),
            other => Err(SongKeyParseError::UnknownLanguage(other.to_string())),
        }
    }
}

/// Composite identity of a song record.
///
/// Kept as a proper value type instead of a formatted string so `id` and
/// `language` can never collide with the `-` separator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SongKey {
    pub id: i64,
    pub language: Language,
}

impl SongKey {
    pub fn new(id: i64, language: Language) -> Self {
        Self { id, language }
    }
}

impl Display for SongKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.id, self.language)
    }
}

/// Error for parsing a composite key from its `"{id}-{language}"` text form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SongKeyParseError {
    MissingSeparator(String),
    InvalidId(String),
    UnknownLanguage(String),
}

impl Display for SongKeyParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingSeparator(value) => {
                write!(f, "song key `{value}` has no `-` separator")
            }
            Self::InvalidId(value) => write!(f, "song key id `{value}` is not an integer"),
            Self::UnknownLanguage(value) => write!(f, "unknown song language `{value}`"),
        }
    }
}

impl Error for SongKeyParseError {}

impl FromStr for SongKey {
    type Err = SongKeyParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        // Split on the last separator so a negative id keeps its sign.
        let (id_text, language_text) = value
            .rsplit_once('-')
            .ok_or_else(|| SongKeyParseError::MissingSeparator(value.to_string()))?;
        let id = id_text
            .parse::<i64>()
            .map_err(|_| SongKeyParseError::InvalidId(id_text.to_string()))?;
        let language = language_text.parse::<Language>()?;
        Ok(Self { id, language })
    }
}

/// Rendering category of one song line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LineKind {
    Text,
    Chord,
    Section,
}

/// Horizontal alignment of one song line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LineAlignment {
    Left,
    Center,
    Right,
}

/// One ordered line owned by a [`SongRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SongLine {
    /// Defines order within the record; unique per record.
    pub line_number: i64,
    #[serde(rename = "type")]
    pub kind: LineKind,
    pub text: String,
    pub alignment: LineAlignment,
    pub is_bold: bool,
    pub is_italics: bool,
}

/// Canonical song record: remote header joined with its ordered lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SongRecord {
    pub id: i64,
    pub language: Language,
    /// Remote revision counter; bumped server-side on every edit.
    pub version: i64,
    pub title: String,
    pub source: String,
    pub page: i64,
    pub external_index: String,
    pub is_public: bool,
    #[serde(default)]
    pub last_updated_at: Option<DateTime<Utc>>,
    /// Always sorted ascending by `line_number`.
    #[serde(default)]
    pub items: Vec<SongLine>,
}

impl SongRecord {
    /// Composite lookup key of this record.
    pub fn key(&self) -> SongKey {
        SongKey::new(self.id, self.language)
    }
}

/// Song rendering preference of the consuming UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SongViewMode {
    Basic,
    Chords,
}
