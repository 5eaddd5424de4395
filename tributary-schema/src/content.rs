//! Content items forwarded to the downstream store.
//!
//! Every item body starts with a metadata header so the store can index provenance without a
//! side channel:
//!
//! ```text
//! ---TRIBUTARY-METADATA---
//! {
//!   "source": "code_host",
//!   ...
//! }
//! ---END-TRIBUTARY-METADATA---
//!
//! <original content>
//! ```
//!
//! The delimiters and layout are a wire contract; do not change them without versioning the
//! sink.

use crate::provider::ProviderKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const METADATA_START: &str = "---TRIBUTARY-METADATA---";
pub const METADATA_END: &str = "---END-TRIBUTARY-METADATA---";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentMetadata {
    pub source: ProviderKind,
    /// Resource the item came from (repository, workspace id, site root).
    pub origin: String,
    /// Path, page id or URL of the item inside its origin.
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
    pub ingested_at: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ContentMetadata {
    pub fn new(
        source: ProviderKind,
        origin: impl Into<String>,
        path: impl Into<String>,
        modified_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            source,
            origin: origin.into(),
            path: path.into(),
            modified_at,
            ingested_at: Utc::now(),
            extra: Map::new(),
        }
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Render the header block, including the trailing blank line.
    pub fn header(&self) -> String {
        let json = serde_json::to_string_pretty(self)
            .unwrap_or_else(|error| format!("{{\"error\":\"{error}\"}}"));
        format!("{METADATA_START}\n{json}\n{METADATA_END}\n\n")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    pub content: String,
    pub category: String,
    pub mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub metadata: ContentMetadata,
}

impl ContentItem {
    /// Build an item whose body is `body` prefixed with the metadata header.
    pub fn with_header(
        body: &str,
        mime_type: impl Into<String>,
        user_id: Option<String>,
        metadata: ContentMetadata,
    ) -> Self {
        let content = format!("{}{body}", metadata.header());
        Self {
            content,
            category: metadata.source.category().to_string(),
            mime_type: mime_type.into(),
            user_id,
            metadata,
        }
    }

    /// Path (or page id / URL) of the item, as recorded in sync history.
    pub fn path(&self) -> &str {
        &self.metadata.path
    }

    /// Split the body back into `(metadata json, original content)`.
    pub fn split_header(content: &str) -> Option<(Value, &str)> {
        let rest = content.strip_prefix(METADATA_START)?.strip_prefix('\n')?;
        let end = rest.find(&format!("\n{METADATA_END}\n"))?;
        let json: Value = serde_json::from_str(&rest[..end]).ok()?;
        let body = &rest[end + METADATA_END.len() + 2..];
        Some((json, body.strip_prefix('\n').unwrap_or(body)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn header_layout_is_exact() {
        let meta = ContentMetadata::new(ProviderKind::CodeHost, "acme/widgets", "src/lib.rs", None);
        let item = ContentItem::with_header("fn main() {}", "text/plain", None, meta.clone());

        let expected_json = serde_json::to_string_pretty(&meta).expect("serialize");
        let expected = format!(
            "---TRIBUTARY-METADATA---\n{expected_json}\n---END-TRIBUTARY-METADATA---\n\nfn main() {{}}"
        );
        assert_eq!(item.content, expected);
        assert_eq!(item.category, "code");
    }

    #[test]
    fn split_header_recovers_body_and_metadata() {
        let meta = ContentMetadata::new(ProviderKind::Website, "https://example.com", "/about", None)
            .with_extra("title", json!("About"));
        let item = ContentItem::with_header("hello\nworld", "text/plain", Some("u1".into()), meta);

        let (json, body) = ContentItem::split_header(&item.content).expect("header present");
        assert_eq!(body, "hello\nworld");
        assert_eq!(json["source"], "website");
        assert_eq!(json["origin"], "https://example.com");
        assert_eq!(json["title"], "About");
        assert!(json.get("modifiedAt").is_none());
        assert!(json.get("ingestedAt").is_some());
    }

    #[test]
    fn split_header_rejects_plain_content() {
        assert!(ContentItem::split_header("no header here").is_none());
    }
}
