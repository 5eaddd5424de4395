use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Progress envelope stored as the website cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlCursor {
    #[serde(default)]
    pub last_crawl: Option<DateTime<Utc>>,
    #[serde(default)]
    pub crawled_urls: Vec<String>,
    #[serde(default)]
    pub pending_urls: Vec<String>,
}

impl CrawlCursor {
    /// Decode a stored cursor. A bare RFC 3339 timestamp is accepted as a legacy cursor.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() {
            return Self::default();
        }
        if let Ok(cursor) = serde_json::from_str::<CrawlCursor>(raw) {
            return cursor;
        }
        match DateTime::parse_from_rfc3339(raw) {
            Ok(ts) => Self {
                last_crawl: Some(ts.with_timezone(&Utc)),
                ..Self::default()
            },
            Err(err) => {
                debug!(cursor = raw, "unreadable website cursor, starting over: {err}");
                Self::default()
            }
        }
    }

    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Envelope for the next run: previous crawled URLs plus `crawled`, in first-seen order.
    pub fn advance(
        &self,
        started_at: DateTime<Utc>,
        crawled: impl IntoIterator<Item = String>,
        pending: Vec<String>,
    ) -> Self {
        let mut seen: ahash::AHashSet<String> = self.crawled_urls.iter().cloned().collect();
        let mut crawled_urls = self.crawled_urls.clone();
        for url in crawled {
            if seen.insert(url.clone()) {
                crawled_urls.push(url);
            }
        }
        Self {
            last_crawl: Some(started_at),
            crawled_urls,
            pending_urls: pending,
        }
    }
}
