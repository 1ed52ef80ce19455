//! Snapshot change detection.
//!
//! # Responsibility
//! - Decide whether a freshly fetched remote set differs from the current
//!   snapshot, so unchanged polls skip the durable rewrite.
//!
//! # Invariants
//! - A missing `last_updated_at` is a distinct value from any timestamp.

use crate::model::song::{SongKey, SongRecord};
use std::collections::HashMap;

/// Returns whether `remote` differs from `current`.
///
/// True when the counts differ, when a remote key is missing locally, or
/// when `version` or `last_updated_at` differ for any record. This is a
/// cheap in-memory pre-check; durable writes are assumed to cost more than
/// the diff.
pub fn has_changed(current: &[SongRecord], remote: &[SongRecord]) -> bool {
    if current.len() != remote.len() {
        return true;
    }

    let by_key: HashMap<SongKey, &SongRecord> =
        current.iter().map(|song| (song.key(), song)).collect();

    for song in remote {
        let Some(existing) = by_key.get(&song.key()) else {
            return true;
        };
        if existing.version != song.version {
            return true;
        }
        if existing.last_updated_at != song.last_updated_at {
            return true;
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::has_changed;
    use crate::model::song::{Language, SongRecord};
    use chrono::{TimeZone, Utc};

    fn record(id: i64, version: i64) -> SongRecord {
        SongRecord {
            id,
            language: Language::Pl,
            version,
            title: format!("song {id}"),
            source: String::new(),
            page: id,
            external_index: String::new(),
            is_public: true,
            last_updated_at: None,
            items: Vec::new(),
        }
    }

    #[test]
    fn empty_sets_are_unchanged() {
        assert!(!has_changed(&[], &[]));
    }

    #[test]
    fn count_mismatch_is_a_change() {
        assert!(has_changed(&[record(1, 1)], &[]));
        assert!(has_changed(&[], &[record(1, 1)]));
    }

    #[test]
    fn version_bump_is_a_change() {
        assert!(has_changed(&[record(1, 1)], &[record(1, 2)]));
    }

    #[test]
    fn identical_values_are_unchanged() {
        assert!(!has_changed(&[record(1, 1)], &[record(1, 1)]));
    }

    #[test]
    fn timestamp_appearing_is_a_change() {
        let mut updated = record(1, 1);
        updated.last_updated_at = Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
        assert!(has_changed(&[record(1, 1)], &[updated]));
    }

    #[test]
    fn different_key_same_count_is_a_change() {
        assert!(has_changed(&[record(1, 1)], &[record(2, 1)]));
    }
}
