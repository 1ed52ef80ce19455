//! Normalized search index and song filtering.
//!
//! # Responsibility
//! - Build one folded search string per record (title, external index, page
//!   and line texts).
//! - Filter and sort records for the consuming list views.
//!
//! # Invariants
//! - Search strings are diacritic-folded and lower-cased.
//! - Sorting is deterministic; ties are broken by normalized title.

use crate::model::song::{Language, SongKey, SongRecord};
use std::collections::BTreeSet;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Folds diacritics (NFD decomposition, combining marks stripped) and
/// lower-cases the input. Shared by index building, query matching and the
/// title collation used for sorting.
pub fn normalize(text: &str) -> String {
    text.nfd()
        .filter(|ch| !is_combining_mark(*ch))
        .flat_map(char::to_lowercase)
        .collect()
}

/// One record paired with its precomputed search string.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchableSong {
    pub key: SongKey,
    pub search: String,
    pub song: SongRecord,
}

/// Builds the memoized search projection for a published snapshot.
pub fn build_search_index(records: &[SongRecord]) -> Vec<SearchableSong> {
    records
        .iter()
        .map(|song| SearchableSong {
            key: song.key(),
            search: searchable_text(song),
            song: song.clone(),
        })
        .collect()
}

fn searchable_text(song: &SongRecord) -> String {
    let lines = song
        .items
        .iter()
        .map(|line| line.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    [
        song.title.as_str(),
        song.external_index.as_str(),
        &song.page.to_string(),
        &lines,
    ]
    .iter()
    .map(|value| normalize(value))
    .collect::<Vec<_>>()
    .join(" ")
}

/// Ordering applied to filtered results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortMode {
    /// Ascending by `page`, ties by title.
    Page,
    /// Ascending by title.
    Alpha,
    /// Descending by `last_updated_at` (missing = epoch), ties by title.
    Recent,
}

/// Filter/sort query over the search index.
#[derive(Debug, Clone)]
pub struct SongFilter {
    pub query: String,
    pub language: Language,
    pub favourites_only: bool,
    pub favourites: BTreeSet<SongKey>,
    /// `None` or `Some(0)` means no page restriction.
    pub page: Option<i64>,
    pub sort: SortMode,
}

impl SongFilter {
    pub fn new(language: Language) -> Self {
        Self {
            query: String::new(),
            language,
            favourites_only: false,
            favourites: BTreeSet::new(),
            page: None,
            sort: SortMode::Page,
        }
    }
}

/// Applies `filter` over the search index and returns matching records in
/// the requested order.
pub fn filter_songs(index: &[SearchableSong], filter: &SongFilter) -> Vec<SongRecord> {
    let query = normalize(filter.query.trim());

    let mut matches: Vec<(&SearchableSong, String)> = index
        .iter()
        .filter(|entry| {
            if entry.song.language != filter.language {
                return false;
            }
            if filter.favourites_only && !filter.favourites.contains(&entry.key) {
                return false;
            }
            if let Some(page) = filter.page {
                if page != 0 && entry.song.page != page {
                    return false;
                }
            }
            query.is_empty() || entry.search.contains(&query)
        })
        .map(|entry| (entry, normalize(&entry.song.title)))
        .collect();

    match filter.sort {
        SortMode::Alpha => matches.sort_by(|(_, a_title), (_, b_title)| a_title.cmp(b_title)),
        SortMode::Recent => matches.sort_by(|(a, a_title), (b, b_title)| {
            let a_time = a.song.last_updated_at.map_or(0, |at| at.timestamp_millis());
            let b_time = b.song.last_updated_at.map_or(0, |at| at.timestamp_millis());
            b_time.cmp(&a_time).then_with(|| a_title.cmp(b_title))
        }),
        SortMode::Page => matches.sort_by(|(a, a_title), (b, b_title)| {
            a.song
                .page
                .cmp(&b.song.page)
                .then_with(|| a_title.cmp(b_title))
        }),
    }

    matches
        .into_iter()
        .map(|(entry, _)| entry.song.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::normalize;

    #[test]
    fn normalize_folds_diacritics_and_case() {
        assert_eq!(normalize("Zażółć GĘŚLĄ jaźń"), "zazołc gesla jazn");
    }

    #[test]
    fn normalize_keeps_plain_ascii() {
        assert_eq!(normalize("Amazing Grace 42"), "amazing grace 42");
    }
}
