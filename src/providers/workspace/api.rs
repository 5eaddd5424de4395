//! Notion-shaped workspace API: search and block children.

use crate::error::TributaryError;
use crate::providers::http::UpstreamClient;
use chrono::{DateTime, Utc};
use governor::DefaultDirectRateLimiter;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use url::Url;

#[derive(Debug, Deserialize)]
pub(super) struct Paginated<T> {
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct Page {
    pub id: String,
    pub last_edited_time: DateTime<Utc>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub properties: Value,
}

impl Page {
    /// Concatenated plain text of the page's title property.
    pub fn title(&self) -> String {
        let Some(props) = self.properties.as_object() else {
            return String::new();
        };
        props
            .values()
            .find(|prop| prop.get("type").and_then(Value::as_str) == Some("title"))
            .and_then(|prop| prop.get("title"))
            .map(plain_text)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct Block {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub has_children: bool,
    #[serde(flatten)]
    pub body: serde_json::Map<String, Value>,
}

/// Join the `plain_text` of a rich-text array.
pub(super) fn plain_text(rich_text: &Value) -> String {
    rich_text
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("plain_text").and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default()
}

pub(super) struct WorkspaceApi {
    pub http: UpstreamClient,
    pub base: Url,
    pub token: Option<String>,
    pub api_version: String,
    pub page_size: u32,
    pub limiter: Arc<DefaultDirectRateLimiter>,
}

impl WorkspaceApi {
    fn endpoint(&self, segments: &[&str]) -> Result<Url, TributaryError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| TributaryError::invalid("workspace api_url cannot be a base"))?
            .pop_if_empty()
            .push("v1")
            .extend(segments.iter().copied());
        Ok(url)
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let req = req.header("Notion-Version", self.api_version.as_str());
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    /// One page of pages, most recently edited first.
    pub async fn search(
        &self,
        start_cursor: Option<&str>,
    ) -> Result<Paginated<Page>, TributaryError> {
        let url = self.endpoint(&["search"])?;
        let mut body = json!({
            "filter": { "property": "object", "value": "page" },
            "sort": { "direction": "descending", "timestamp": "last_edited_time" },
            "page_size": self.page_size,
        });
        if let Some(cursor) = start_cursor {
            body["start_cursor"] = json!(cursor);
        }

        self.limiter.until_ready().await;
        let resp = self
            .http
            .send(|c| self.authorize(c.post(url.clone())).json(&body))
            .await?;
        Ok(resp.json().await?)
    }

    pub async fn children(
        &self,
        block_id: &str,
        start_cursor: Option<&str>,
    ) -> Result<Paginated<Block>, TributaryError> {
        let mut url = self.endpoint(&["blocks", block_id, "children"])?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("page_size", &self.page_size.to_string());
            if let Some(cursor) = start_cursor {
                query.append_pair("start_cursor", cursor);
            }
        }

        self.limiter.until_ready().await;
        let resp = self
            .http
            .send(|c| self.authorize(c.get(url.clone())))
            .await?;
        Ok(resp.json().await?)
    }
}
