//! Page-index grouping for the binder navigation view.
//!
//! # Responsibility
//! - Group the distinct page numbers of a record set into navigation chunks.
//! - Bucket records by page for direct page rendering.

use crate::model::song::SongRecord;
use std::collections::BTreeMap;

const PAGES_PER_GROUP: usize = 10;

/// One navigation chunk of up to ten distinct page numbers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageIndexGroup {
    /// Human label, e.g. `"1 – 12"`.
    pub label: String,
    pub pages: Vec<i64>,
}

/// Chunks the distinct sorted pages of `records` into groups of ten.
pub fn build_page_index(records: &[SongRecord]) -> Vec<PageIndexGroup> {
    let unique_pages: Vec<i64> = records
        .iter()
        .map(|song| song.page)
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .collect();

    unique_pages
        .chunks(PAGES_PER_GROUP)
        .map(|chunk| {
            // chunks() never yields an empty slice
            let first = chunk[0];
            let last = chunk[chunk.len() - 1];
            PageIndexGroup {
                label: format!("{first} – {last}"),
                pages: chunk.to_vec(),
            }
        })
        .collect()
}

/// Buckets records by their page number, ascending.
pub fn songs_by_page(records: &[SongRecord]) -> BTreeMap<i64, Vec<SongRecord>> {
    let mut by_page: BTreeMap<i64, Vec<SongRecord>> = BTreeMap::new();
    for song in records {
        by_page.entry(song.page).or_default().push(song.clone());
    }
    by_page
}
