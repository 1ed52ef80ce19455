//! Offline-first replica and synchronization core for the song-book app.
//! This crate is the single source of truth for the on-device dataset.

pub mod db;
pub mod logging;
pub mod model;
pub mod remote;
pub mod repo;
pub mod search;
pub mod sync;

pub use logging::{default_log_level, init_logging, logging_status};
pub use model::song::{
    Language, LineAlignment, LineKind, SongKey, SongKeyParseError, SongLine, SongRecord,
    SongViewMode,
};
pub use remote::{
    fetch_all, fetch_by_key, HttpRemoteSource, RemoteConfig, RemoteError, RemoteResult,
    RemoteSource, SongHeaderRow, SongLineRow, PAGE_SIZE,
};
pub use repo::song_repo::{RepoError, RepoResult, SongRepository, SqliteSongRepository};
pub use search::index::{
    build_search_index, filter_songs, normalize, SearchableSong, SongFilter, SortMode,
};
pub use search::page_index::{build_page_index, songs_by_page, PageIndexGroup};
pub use sync::change::has_changed;
pub use sync::connectivity::{AlwaysOnline, ConnectivityProbe};
pub use sync::replica::{ReplicaManager, ReplicaState, DEFAULT_SYNC_INTERVAL};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
