use chrono::{TimeZone, Utc};
use songbook_core::db::open_db_in_memory;
use songbook_core::{
    Language, LineAlignment, LineKind, SongKey, SongLine, SongRecord, SongRepository,
    SongViewMode, SqliteSongRepository,
};
use std::collections::{BTreeSet, HashSet};

fn sample_line(line_number: i64, text: &str) -> SongLine {
    SongLine {
        line_number,
        kind: LineKind::Text,
        text: text.to_string(),
        alignment: LineAlignment::Left,
        is_bold: false,
        is_italics: false,
    }
}

fn sample_record(id: i64, language: Language, page: i64) -> SongRecord {
    SongRecord {
        id,
        language,
        version: 1,
        title: format!("Song {id}"),
        source: "hymnal".to_string(),
        page,
        external_index: format!("IDX-{id}"),
        is_public: true,
        last_updated_at: Some(Utc.with_ymd_and_hms(2024, 3, 10, 8, 30, 0).unwrap()),
        items: vec![sample_line(1, "first line"), sample_line(2, "second line")],
    }
}

fn key_set(records: &[SongRecord]) -> HashSet<String> {
    records
        .iter()
        .map(|record| record.key().to_string())
        .collect()
}

#[test]
fn replace_all_then_read_all_round_trips() {
    let repo = SqliteSongRepository::new(open_db_in_memory().unwrap());
    let records = vec![
        sample_record(1, Language::Pl, 3),
        sample_record(2, Language::En, 1),
    ];
    let synced_at = Utc.with_ymd_and_hms(2024, 3, 11, 9, 0, 0).unwrap();

    repo.replace_all(&records, synced_at).unwrap();

    let loaded = repo.read_all().unwrap();
    assert_eq!(loaded.len(), 2);
    assert_eq!(key_set(&loaded), key_set(&records));

    let first = loaded
        .iter()
        .find(|record| record.key() == SongKey::new(1, Language::Pl))
        .unwrap();
    assert_eq!(first.title, "Song 1");
    assert_eq!(first.items.len(), 2);
    assert_eq!(first.last_updated_at, records[0].last_updated_at);

    assert_eq!(repo.read_last_synced_at().unwrap(), Some(synced_at));
}

#[test]
fn replace_all_is_idempotent() {
    let repo = SqliteSongRepository::new(open_db_in_memory().unwrap());
    let records = vec![
        sample_record(1, Language::Pl, 3),
        sample_record(2, Language::Pl, 7),
    ];
    let synced_at = Utc::now();

    repo.replace_all(&records, synced_at).unwrap();
    repo.replace_all(&records, synced_at).unwrap();

    let loaded = repo.read_all().unwrap();
    assert_eq!(loaded.len(), 2);
    assert_eq!(key_set(&loaded), key_set(&records));
}

#[test]
fn replace_all_removes_absent_records() {
    let repo = SqliteSongRepository::new(open_db_in_memory().unwrap());
    repo.replace_all(
        &[
            sample_record(1, Language::Pl, 1),
            sample_record(2, Language::Pl, 2),
        ],
        Utc::now(),
    )
    .unwrap();

    repo.replace_all(&[sample_record(2, Language::Pl, 2)], Utc::now())
        .unwrap();

    let loaded = repo.read_all().unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].key(), SongKey::new(2, Language::Pl));
}

#[test]
fn read_all_returns_lines_sorted_by_line_number() {
    let repo = SqliteSongRepository::new(open_db_in_memory().unwrap());
    let mut record = sample_record(5, Language::En, 9);
    record.items = vec![
        sample_line(3, "third"),
        sample_line(1, "first"),
        sample_line(2, "second"),
    ];
    repo.replace_all(std::slice::from_ref(&record), Utc::now())
        .unwrap();

    let loaded = repo.read_all().unwrap();
    let numbers: Vec<i64> = loaded[0].items.iter().map(|line| line.line_number).collect();
    assert_eq!(numbers, vec![1, 2, 3]);
}

#[test]
fn same_key_in_one_batch_is_rejected() {
    let repo = SqliteSongRepository::new(open_db_in_memory().unwrap());
    let records = vec![
        sample_record(1, Language::Pl, 1),
        sample_record(1, Language::Pl, 2),
    ];

    assert!(repo.replace_all(&records, Utc::now()).is_err());
    // All-or-nothing: the failed batch must leave the store empty.
    assert!(repo.read_all().unwrap().is_empty());
}

#[test]
fn write_last_synced_at_touches_metadata_only() {
    let repo = SqliteSongRepository::new(open_db_in_memory().unwrap());
    let records = vec![sample_record(1, Language::Pl, 1)];
    repo.replace_all(&records, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        .unwrap();

    let later = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
    repo.write_last_synced_at(later).unwrap();

    assert_eq!(repo.read_last_synced_at().unwrap(), Some(later));
    assert_eq!(repo.read_all().unwrap().len(), 1);
}

#[test]
fn last_synced_at_is_none_on_fresh_store() {
    let repo = SqliteSongRepository::new(open_db_in_memory().unwrap());
    assert_eq!(repo.read_last_synced_at().unwrap(), None);
}

#[test]
fn view_mode_round_trip() {
    let repo = SqliteSongRepository::new(open_db_in_memory().unwrap());
    assert_eq!(repo.read_view_mode().unwrap(), None);

    repo.write_view_mode(SongViewMode::Chords).unwrap();
    assert_eq!(repo.read_view_mode().unwrap(), Some(SongViewMode::Chords));

    repo.write_view_mode(SongViewMode::Basic).unwrap();
    assert_eq!(repo.read_view_mode().unwrap(), Some(SongViewMode::Basic));
}

#[test]
fn favourites_round_trip() {
    let repo = SqliteSongRepository::new(open_db_in_memory().unwrap());
    assert!(repo.read_favourites().unwrap().is_empty());

    let favourites: BTreeSet<SongKey> = [
        SongKey::new(1, Language::Pl),
        SongKey::new(9, Language::En),
    ]
    .into_iter()
    .collect();
    repo.write_favourites(&favourites).unwrap();

    assert_eq!(repo.read_favourites().unwrap(), favourites);
}
