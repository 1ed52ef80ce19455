//! HTTP implementation of the remote tabular provider.
//!
//! # Responsibility
//! - Talk to a PostgREST-style endpoint serving the `songsHeaders` and
//!   `songsItems` tables.
//! - Map HTTP/decoding failures onto [`RemoteError`].
//!
//! # Invariants
//! - Every request carries the provider api key.
//! - Non-success statuses are reported as errors, never as empty pages.

use super::{RemoteError, RemoteResult, RemoteSource, SongHeaderRow, SongLineRow};
use crate::model::song::SongKey;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::de::DeserializeOwned;

const HEADERS_TABLE: &str = "songsHeaders";
const LINES_TABLE: &str = "songsItems";
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Connection settings for the remote provider.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// REST root, e.g. `https://project.example.co/rest/v1`.
    pub base_url: String,
    pub api_key: String,
}

impl RemoteConfig {
    /// Reads provider settings from `SONGBOOK_REMOTE_URL` and
    /// `SONGBOOK_REMOTE_KEY`. Returns `None` when either is unset, which the
    /// replica manager treats as "no remote source configured".
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("SONGBOOK_REMOTE_URL").ok()?;
        let api_key = std::env::var("SONGBOOK_REMOTE_KEY").ok()?;
        Some(Self { base_url, api_key })
    }
}

/// PostgREST-style [`RemoteSource`] over HTTPS.
pub struct HttpRemoteSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRemoteSource {
    pub fn new(config: RemoteConfig) -> RemoteResult<Self> {
        let mut headers = HeaderMap::new();
        let api_key = HeaderValue::from_str(&config.api_key)
            .map_err(|err| RemoteError::Transport(format!("invalid api key header: {err}")))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
            .map_err(|err| RemoteError::Transport(format!("invalid api key header: {err}")))?;
        headers.insert("apikey", api_key);
        headers.insert(AUTHORIZATION, bearer);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|err| RemoteError::Transport(err.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_rows<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> RemoteResult<Vec<T>> {
        let url = format!("{}/{table}", self.base_url);
        let response = self.client.get(&url).query(query).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Status {
                code: status.as_u16(),
                message: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        let rows = response.json::<Vec<T>>().await?;
        Ok(rows)
    }
}

#[async_trait]
impl RemoteSource for HttpRemoteSource {
    async fn header_page(&self, offset: u64, limit: u64) -> RemoteResult<Vec<SongHeaderRow>> {
        self.get_rows(
            HEADERS_TABLE,
            &[
                ("select", "*".to_string()),
                ("isPublic", "eq.true".to_string()),
                ("order", "page.asc".to_string()),
                ("offset", offset.to_string()),
                ("limit", limit.to_string()),
            ],
        )
        .await
    }

    async fn line_page(&self, offset: u64, limit: u64) -> RemoteResult<Vec<SongLineRow>> {
        self.get_rows(
            LINES_TABLE,
            &[
                ("select", "*".to_string()),
                ("order", "lineNumber.asc".to_string()),
                ("offset", offset.to_string()),
                ("limit", limit.to_string()),
            ],
        )
        .await
    }

    async fn header_by_key(&self, key: SongKey) -> RemoteResult<Option<SongHeaderRow>> {
        let rows = self
            .get_rows::<SongHeaderRow>(
                HEADERS_TABLE,
                &[
                    ("select", "*".to_string()),
                    ("id", format!("eq.{}", key.id)),
                    ("language", format!("eq.{}", key.language)),
                    ("isPublic", "eq.true".to_string()),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn lines_by_key(&self, key: SongKey) -> RemoteResult<Vec<SongLineRow>> {
        self.get_rows(
            LINES_TABLE,
            &[
                ("select", "*".to_string()),
                ("id", format!("eq.{}", key.id)),
                ("language", format!("eq.{}", key.language)),
                ("order", "lineNumber.asc".to_string()),
            ],
        )
        .await
    }
}
