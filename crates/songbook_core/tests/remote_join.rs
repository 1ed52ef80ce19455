use async_trait::async_trait;
use songbook_core::{
    fetch_all, fetch_by_key, Language, LineAlignment, LineKind, RemoteError, RemoteResult,
    RemoteSource, SongHeaderRow, SongKey, SongLineRow, PAGE_SIZE,
};
use std::sync::atomic::{AtomicUsize, Ordering};

fn header(id: i64, language: Language, page: i64) -> SongHeaderRow {
    SongHeaderRow {
        id,
        language,
        version: 1,
        title: format!("Song {id}"),
        source: "hymnal".to_string(),
        page,
        external_index: format!("IDX-{id}"),
        is_public: true,
        last_updated_at: None,
    }
}

fn line(id: i64, language: Language, line_number: i64) -> SongLineRow {
    SongLineRow {
        id,
        language,
        line_number,
        kind: LineKind::Text,
        text: format!("line {line_number}"),
        alignment: LineAlignment::Left,
        is_bold: false,
        is_italics: false,
    }
}

fn page_of<T: Clone>(rows: &[T], offset: u64, limit: u64) -> Vec<T> {
    rows.iter()
        .skip(offset as usize)
        .take(limit as usize)
        .cloned()
        .collect()
}

#[derive(Default)]
struct FakeSource {
    headers: Vec<SongHeaderRow>,
    lines: Vec<SongLineRow>,
    fail_lines: bool,
    header_page_calls: AtomicUsize,
}

#[async_trait]
impl RemoteSource for FakeSource {
    async fn header_page(&self, offset: u64, limit: u64) -> RemoteResult<Vec<SongHeaderRow>> {
        self.header_page_calls.fetch_add(1, Ordering::SeqCst);
        Ok(page_of(&self.headers, offset, limit))
    }

    async fn line_page(&self, offset: u64, limit: u64) -> RemoteResult<Vec<SongLineRow>> {
        if self.fail_lines {
            return Err(RemoteError::Transport("simulated outage".to_string()));
        }
        Ok(page_of(&self.lines, offset, limit))
    }

    async fn header_by_key(&self, key: SongKey) -> RemoteResult<Option<SongHeaderRow>> {
        Ok(self
            .headers
            .iter()
            .find(|row| row.key() == key && row.is_public)
            .cloned())
    }

    async fn lines_by_key(&self, key: SongKey) -> RemoteResult<Vec<SongLineRow>> {
        Ok(self
            .lines
            .iter()
            .filter(|row| row.key() == key)
            .cloned()
            .collect())
    }
}

#[tokio::test]
async fn join_attaches_lines_sorted_by_line_number() {
    let source = FakeSource {
        headers: vec![header(1, Language::Pl, 1)],
        // Grouping can interleave pages, so serve lines out of order.
        lines: vec![
            line(1, Language::Pl, 3),
            line(1, Language::Pl, 1),
            line(1, Language::Pl, 2),
        ],
        ..FakeSource::default()
    };

    let records = fetch_all(&source).await.unwrap();
    assert_eq!(records.len(), 1);
    let numbers: Vec<i64> = records[0]
        .items
        .iter()
        .map(|item| item.line_number)
        .collect();
    assert_eq!(numbers, vec![1, 2, 3]);
}

#[tokio::test]
async fn header_without_lines_gets_empty_items() {
    let source = FakeSource {
        headers: vec![header(1, Language::Pl, 1), header(2, Language::En, 2)],
        lines: vec![line(1, Language::Pl, 1)],
        ..FakeSource::default()
    };

    let records = fetch_all(&source).await.unwrap();
    let lonely = records
        .iter()
        .find(|record| record.key() == SongKey::new(2, Language::En))
        .unwrap();
    assert!(lonely.items.is_empty());
}

#[tokio::test]
async fn lines_with_same_id_but_other_language_are_not_joined() {
    let source = FakeSource {
        headers: vec![header(1, Language::Pl, 1)],
        lines: vec![line(1, Language::En, 1)],
        ..FakeSource::default()
    };

    let records = fetch_all(&source).await.unwrap();
    assert!(records[0].items.is_empty());
}

#[tokio::test]
async fn pagination_stops_after_short_page() {
    let headers: Vec<SongHeaderRow> = (0..(PAGE_SIZE + 1) as i64)
        .map(|id| header(id, Language::Pl, id))
        .collect();
    let source = FakeSource {
        headers,
        ..FakeSource::default()
    };

    let records = fetch_all(&source).await.unwrap();
    assert_eq!(records.len(), (PAGE_SIZE + 1) as usize);
    // One full page plus the short tail page.
    assert_eq!(source.header_page_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn exact_page_boundary_needs_one_trailing_empty_page() {
    let headers: Vec<SongHeaderRow> = (0..PAGE_SIZE as i64)
        .map(|id| header(id, Language::Pl, id))
        .collect();
    let source = FakeSource {
        headers,
        ..FakeSource::default()
    };

    let records = fetch_all(&source).await.unwrap();
    assert_eq!(records.len(), PAGE_SIZE as usize);
    assert_eq!(source.header_page_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn any_failing_page_aborts_the_whole_fetch() {
    let source = FakeSource {
        headers: vec![header(1, Language::Pl, 1)],
        lines: vec![line(1, Language::Pl, 1)],
        fail_lines: true,
        ..FakeSource::default()
    };

    let err = fetch_all(&source).await.unwrap_err();
    assert!(matches!(err, RemoteError::Transport(_)));
}

#[tokio::test]
async fn fetch_by_key_returns_joined_record() {
    let source = FakeSource {
        headers: vec![header(7, Language::En, 4)],
        lines: vec![line(7, Language::En, 2), line(7, Language::En, 1)],
        ..FakeSource::default()
    };

    let record = fetch_by_key(&source, SongKey::new(7, Language::En))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.title, "Song 7");
    let numbers: Vec<i64> = record.items.iter().map(|item| item.line_number).collect();
    assert_eq!(numbers, vec![1, 2]);
}

#[tokio::test]
async fn fetch_by_key_misses_unknown_and_private_records() {
    let mut private = header(3, Language::Pl, 1);
    private.is_public = false;
    let source = FakeSource {
        headers: vec![private],
        ..FakeSource::default()
    };

    assert!(fetch_by_key(&source, SongKey::new(3, Language::Pl))
        .await
        .unwrap()
        .is_none());
    assert!(fetch_by_key(&source, SongKey::new(99, Language::Pl))
        .await
        .unwrap()
        .is_none());
}
