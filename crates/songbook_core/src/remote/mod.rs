//! Remote dataset access and header/line join.
//!
//! # Responsibility
//! - Define the paginated tabular provider seam ([`RemoteSource`]).
//! - Join header and line pages into complete [`SongRecord`]s.
//!
//! # Invariants
//! - A failing page aborts the whole fetch; partial results are discarded.
//! - Joined `items` are sorted ascending by `line_number` even though the
//!   provider already orders them, because grouping can interleave pages.
//! - Non-public records never leave this module.

use crate::model::song::{
    Language, LineAlignment, LineKind, SongKey, SongLine, SongRecord,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod http;

pub use http::{HttpRemoteSource, RemoteConfig};

/// Fixed page size for range pagination. A single unbounded query is assumed
/// to be capped server-side at this size.
pub const PAGE_SIZE: u64 = 1000;

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Transport/query failure reported by the remote provider.
#[derive(Debug)]
pub enum RemoteError {
    Transport(String),
    Status { code: u16, message: String },
    Decode(String),
}

impl Display for RemoteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(message) => write!(f, "remote transport failure: {message}"),
            Self::Status { code, message } => {
                write!(f, "remote query failed with status {code}: {message}")
            }
            Self::Decode(message) => write!(f, "remote payload decode failed: {message}"),
        }
    }
}

impl Error for RemoteError {}

impl From<reqwest::Error> for RemoteError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_decode() {
            Self::Decode(value.to_string())
        } else {
            Self::Transport(value.to_string())
        }
    }
}

/// Header row as served by the remote `songsHeaders` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SongHeaderRow {
    pub id: i64,
    pub language: Language,
    pub version: i64,
    pub title: String,
    pub source: String,
    pub page: i64,
    pub external_index: String,
    pub is_public: bool,
    #[serde(default)]
    pub last_updated_at: Option<DateTime<Utc>>,
}

impl SongHeaderRow {
    pub fn key(&self) -> SongKey {
        SongKey::new(self.id, self.language)
    }
}

/// Line row as served by the remote `songsItems` table. Carries its parent
/// identity so pages can be grouped after the fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SongLineRow {
    pub id: i64,
    pub language: Language,
    pub line_number: i64,
    #[serde(rename = "type")]
    pub kind: LineKind,
    pub text: String,
    pub alignment: LineAlignment,
    pub is_bold: bool,
    pub is_italics: bool,
}

impl SongLineRow {
    pub fn key(&self) -> SongKey {
        SongKey::new(self.id, self.language)
    }

    fn into_line(self) -> SongLine {
        SongLine {
            line_number: self.line_number,
            kind: self.kind,
            text: self.text,
            alignment: self.alignment,
            is_bold: self.is_bold,
            is_italics: self.is_italics,
        }
    }
}

/// Paginated tabular access to the two remote song tables.
///
/// Header pages are served filtered to `is_public = true` and ordered by
/// `page` ascending; line pages are unfiltered and ordered by `line_number`
/// ascending. Both use offset-based ranges of [`PAGE_SIZE`] rows.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    async fn header_page(&self, offset: u64, limit: u64) -> RemoteResult<Vec<SongHeaderRow>>;
    async fn line_page(&self, offset: u64, limit: u64) -> RemoteResult<Vec<SongLineRow>>;
    /// Single public header lookup by composite key.
    async fn header_by_key(&self, key: SongKey) -> RemoteResult<Option<SongHeaderRow>>;
    /// All lines of one record, ordered by `line_number`, unfiltered.
    async fn lines_by_key(&self, key: SongKey) -> RemoteResult<Vec<SongLineRow>>;
}

/// Fetches the complete public dataset and joins lines onto headers.
///
/// Headers with no matching lines get an empty `items` sequence.
pub async fn fetch_all(source: &dyn RemoteSource) -> RemoteResult<Vec<SongRecord>> {
    let headers = collect_pages(|offset| source.header_page(offset, PAGE_SIZE)).await?;
    let lines = collect_pages(|offset| source.line_page(offset, PAGE_SIZE)).await?;
    debug!(
        "event=remote_fetch module=remote status=ok headers={} lines={}",
        headers.len(),
        lines.len()
    );

    let mut grouped: HashMap<SongKey, Vec<SongLine>> = HashMap::new();
    for row in lines {
        grouped.entry(row.key()).or_default().push(row.into_line());
    }

    Ok(headers
        .into_iter()
        .map(|header| {
            let mut items = grouped.remove(&header.key()).unwrap_or_default();
            items.sort_by_key(|line| line.line_number);
            join_record(header, items)
        })
        .collect())
}

/// Fetches one record by composite key, or `None` when the provider has no
/// public header for it.
pub async fn fetch_by_key(
    source: &dyn RemoteSource,
    key: SongKey,
) -> RemoteResult<Option<SongRecord>> {
    let Some(header) = source.header_by_key(key).await? else {
        return Ok(None);
    };

    let mut items: Vec<SongLine> = source
        .lines_by_key(key)
        .await?
        .into_iter()
        .map(SongLineRow::into_line)
        .collect();
    items.sort_by_key(|line| line.line_number);

    Ok(Some(join_record(header, items)))
}

async fn collect_pages<T, F, Fut>(mut page: F) -> RemoteResult<Vec<T>>
where
    F: FnMut(u64) -> Fut,
    Fut: std::future::Future<Output = RemoteResult<Vec<T>>>,
{
    let mut rows = Vec::new();
    let mut offset = 0;
    loop {
        let batch = page(offset).await?;
        if batch.is_empty() {
            break;
        }
        let batch_len = batch.len() as u64;
        rows.extend(batch);
        if batch_len < PAGE_SIZE {
            break;
        }
        offset += PAGE_SIZE;
    }
    Ok(rows)
}

fn join_record(header: SongHeaderRow, items: Vec<SongLine>) -> SongRecord {
    SongRecord {
        id: header.id,
        language: header.language,
        version: header.version,
        title: header.title,
        source: header.source,
        page: header.page,
        external_index: header.external_index,
        is_public: header.is_public,
        last_updated_at: header.last_updated_at,
        items,
    }
}
