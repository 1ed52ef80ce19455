//! Song replica store contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide the durable clear+repopulate store backing the replica.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - The store holds at most one record per composite key.
//! - `replace_all` runs inside a single transaction together with the
//!   `last_synced_at` metadata write.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::DbError;
use crate::model::song::{
    Language, LineAlignment, LineKind, SongKey, SongLine, SongRecord, SongViewMode,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, Row};
use std::collections::{BTreeSet, HashMap};
use std::error::Error;
use std::fmt::{Display, Formatter};

const META_LAST_SYNCED_AT: &str = "last_synced_at";
const META_FAVOURITES: &str = "favourites";
const META_VIEW_MODE: &str = "view_mode";

pub type RepoResult<T> = Result<T, RepoError>;

/// Generic repository error for replica persistence operations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted song data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Local persistent store contract for the replica manager.
///
/// Storage gives no ordering guarantee for `read_all`; ordering is the
/// query view's job.
pub trait SongRepository: Send + Sync {
    fn read_all(&self) -> RepoResult<Vec<SongRecord>>;
    /// Atomically clears the record set, inserts `records` and stamps
    /// `synced_at` into metadata.
    fn replace_all(&self, records: &[SongRecord], synced_at: DateTime<Utc>) -> RepoResult<()>;
    fn read_last_synced_at(&self) -> RepoResult<Option<DateTime<Utc>>>;
    /// Updates metadata only, without touching records. Used when a sync
    /// found no record changes to avoid a wasted full rewrite.
    fn write_last_synced_at(&self, synced_at: DateTime<Utc>) -> RepoResult<()>;
    fn read_favourites(&self) -> RepoResult<BTreeSet<SongKey>>;
    fn write_favourites(&self, favourites: &BTreeSet<SongKey>) -> RepoResult<()>;
    /// View-mode preference of the consuming UI; `None` until first set.
    fn read_view_mode(&self) -> RepoResult<Option<SongViewMode>>;
    fn write_view_mode(&self, mode: SongViewMode) -> RepoResult<()>;
}

/// SQLite-backed replica store.
///
/// Owns its connection behind a mutex so the store can be shared with the
/// async replica manager.
pub struct SqliteSongRepository {
    conn: Mutex<Connection>,
}

impl SqliteSongRepository {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }
}

impl SongRepository for SqliteSongRepository {
    fn read_all(&self) -> RepoResult<Vec<SongRecord>> {
        let conn = self.conn.lock();

        let mut lines_by_key: HashMap<String, Vec<SongLine>> = HashMap::new();
        {
            let mut stmt = conn.prepare(
                "SELECT song_key, line_number, kind, text, alignment, is_bold, is_italics
                 FROM song_lines
                 ORDER BY song_key, line_number;",
            )?;
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                let song_key: String = row.get("song_key")?;
                lines_by_key
                    .entry(song_key)
                    .or_default()
                    .push(parse_line_row(row)?);
            }
        }

        let mut stmt = conn.prepare(
            "SELECT key, id, language, version, title, source, page,
                    external_index, is_public, last_updated_at
             FROM songs;",
        )?;
        let mut rows = stmt.query([])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            let key: String = row.get("key")?;
            let items = lines_by_key.remove(&key).unwrap_or_default();
            records.push(parse_song_row(row, items)?);
        }

        Ok(records)
    }

    fn replace_all(&self, records: &[SongRecord], synced_at: DateTime<Utc>) -> RepoResult<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM song_lines;", [])?;
        tx.execute("DELETE FROM songs;", [])?;

        {
            let mut insert_song = tx.prepare(
                "INSERT INTO songs (
                    key, id, language, version, title, source, page,
                    external_index, is_public, last_updated_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
            )?;
            let mut insert_line = tx.prepare(
                "INSERT INTO song_lines (
                    song_key, line_number, kind, text, alignment, is_bold, is_italics
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            )?;

            for record in records {
                let key = record.key().to_string();
                insert_song.execute(params![
                    key,
                    record.id,
                    record.language.as_str(),
                    record.version,
                    record.title.as_str(),
                    record.source.as_str(),
                    record.page,
                    record.external_index.as_str(),
                    bool_to_int(record.is_public),
                    record.last_updated_at.map(|at| at.to_rfc3339()),
                ])?;

                for line in &record.items {
                    insert_line.execute(params![
                        key,
                        line.line_number,
                        line_kind_to_db(line.kind),
                        line.text.as_str(),
                        alignment_to_db(line.alignment),
                        bool_to_int(line.is_bold),
                        bool_to_int(line.is_italics),
                    ])?;
                }
            }
        }

        put_meta(&tx, META_LAST_SYNCED_AT, &synced_at.to_rfc3339())?;
        tx.commit()?;

        Ok(())
    }

    fn read_last_synced_at(&self) -> RepoResult<Option<DateTime<Utc>>> {
        let conn = self.conn.lock();
        let Some(value) = get_meta(&conn, META_LAST_SYNCED_AT)? else {
            return Ok(None);
        };
        let parsed = DateTime::parse_from_rfc3339(&value).map_err(|err| {
            RepoError::InvalidData(format!("invalid last_synced_at `{value}`: {err}"))
        })?;
        Ok(Some(parsed.with_timezone(&Utc)))
    }

    fn write_last_synced_at(&self, synced_at: DateTime<Utc>) -> RepoResult<()> {
        let conn = self.conn.lock();
        put_meta(&conn, META_LAST_SYNCED_AT, &synced_at.to_rfc3339())
    }

    fn read_favourites(&self) -> RepoResult<BTreeSet<SongKey>> {
        let conn = self.conn.lock();
        let Some(value) = get_meta(&conn, META_FAVOURITES)? else {
            return Ok(BTreeSet::new());
        };
        let keys: Vec<String> = serde_json::from_str(&value)
            .map_err(|err| RepoError::InvalidData(format!("invalid favourites json: {err}")))?;
        keys.iter()
            .map(|text| {
                text.parse::<SongKey>()
                    .map_err(|err| RepoError::InvalidData(err.to_string()))
            })
            .collect()
    }

    fn write_favourites(&self, favourites: &BTreeSet<SongKey>) -> RepoResult<()> {
        let keys: Vec<String> = favourites.iter().map(SongKey::to_string).collect();
        let value = serde_json::to_string(&keys)
            .map_err(|err| RepoError::InvalidData(format!("favourites encode failed: {err}")))?;
        let conn = self.conn.lock();
        put_meta(&conn, META_FAVOURITES, &value)
    }

    fn read_view_mode(&self) -> RepoResult<Option<SongViewMode>> {
        let conn = self.conn.lock();
        let Some(value) = get_meta(&conn, META_VIEW_MODE)? else {
            return Ok(None);
        };
        let mode = match value.as_str() {
            "basic" => SongViewMode::Basic,
            "chords" => SongViewMode::Chords,
            other => {
                return Err(RepoError::InvalidData(format!(
                    "invalid view mode `{other}` in meta.view_mode"
                )))
            }
        };
        Ok(Some(mode))
    }

    fn write_view_mode(&self, mode: SongViewMode) -> RepoResult<()> {
        let value = match mode {
            SongViewMode::Basic => "basic",
            SongViewMode::Chords => "chords",
        };
        let conn = self.conn.lock();
        put_meta(&conn, META_VIEW_MODE, value)
    }
}

fn get_meta(conn: &Connection, key: &str) -> RepoResult<Option<String>> {
    let mut stmt = conn.prepare("SELECT value FROM meta WHERE key = ?1;")?;
    let mut rows = stmt.query([key])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(row.get(0)?));
    }
    Ok(None)
}

fn put_meta(conn: &Connection, key: &str, value: &str) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO meta (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value;",
        params![key, value],
    )?;
    Ok(())
}

fn parse_song_row(row: &Row<'_>, items: Vec<SongLine>) -> RepoResult<SongRecord> {
    let language_text: String = row.get("language")?;
    let language = language_text.parse::<Language>().map_err(|_| {
        RepoError::InvalidData(format!("invalid language `{language_text}` in songs.language"))
    })?;

    let last_updated_at = match row.get::<_, Option<String>>("last_updated_at")? {
        Some(value) => Some(
            DateTime::parse_from_rfc3339(&value)
                .map_err(|err| {
                    RepoError::InvalidData(format!(
                        "invalid last_updated_at `{value}` in songs: {err}"
                    ))
                })?
                .with_timezone(&Utc),
        ),
        None => None,
    };

    Ok(SongRecord {
        id: row.get("id")?,
        language,
        version: row.get("version")?,
        title: row.get("title")?,
        source: row.get("source")?,
        page: row.get("page")?,
        external_index: row.get("external_index")?,
        is_public: int_to_bool(row.get::<_, i64>("is_public")?, "songs.is_public")?,
        last_updated_at,
        items,
    })
}

fn parse_line_row(row: &Row<'_>) -> RepoResult<SongLine> {
    let kind_text: String = row.get("kind")?;
    let kind = parse_line_kind(&kind_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid line kind `{kind_text}` in song_lines.kind"))
    })?;

    let alignment_text: String = row.get("alignment")?;
    let alignment = parse_alignment(&alignment_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid alignment `{alignment_text}` in song_lines.alignment"
        ))
    })?;

    Ok(SongLine {
        line_number: row.get("line_number")?,
        kind,
        text: row.get("text")?,
        alignment,
        is_bold: int_to_bool(row.get::<_, i64>("is_bold")?, "song_lines.is_bold")?,
        is_italics: int_to_bool(row.get::<_, i64>("is_italics")?, "song_lines.is_italics")?,
    })
}

fn line_kind_to_db(kind: LineKind) -> &'static str {
    match kind {
        LineKind::Text => "TEXT",
        LineKind::Chord => "CHORD",
        LineKind::Section => "SECTION",
    }
}

fn parse_line_kind(value: &str) -> Option<LineKind> {
    match value {
        "TEXT" => Some(LineKind::Text),
        "CHORD" => Some(LineKind::Chord),
        "SECTION" => Some(LineKind::Section),
        _ => None,
    }
}

fn alignment_to_db(alignment: LineAlignment) -> &'static str {
    match alignment {
        LineAlignment::Left => "LEFT",
        LineAlignment::Center => "CENTER",
        LineAlignment::Right => "RIGHT",
    }
}

fn parse_alignment(value: &str) -> Option<LineAlignment> {
    match value {
        "LEFT" => Some(LineAlignment::Left),
        "CENTER" => Some(LineAlignment::Center),
        "RIGHT" => Some(LineAlignment::Right),
        _ => None,
    }
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

fn int_to_bool(value: i64, column: &str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid boolean value `{other}` in {column}"
        ))),
    }
}
