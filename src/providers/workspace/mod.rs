//! Workspace provider (Notion-API shaped).
//!
//! The cursor is an RFC 3339 timestamp: the newest `last_edited_time` seen so far. Pages are
//! searched newest-first and re-filtered locally, since upstream search has no time filter.

mod api;
mod render;

use crate::config::WorkspaceResolvedConfig;
use crate::error::{IsRetryable, TributaryError};
use crate::providers::http::UpstreamClient;
use crate::providers::{Provider, PullOptions, PullResult};
use api::{Page, WorkspaceApi};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use futures::FutureExt;
use futures::future::BoxFuture;
use governor::{Quota, RateLimiter};
use serde_json::json;
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::{debug, info, warn};
use tributary_schema::{ContentItem, ContentMetadata, ProviderKind};

const USER_AGENT: &str = concat!("tributary/", env!("CARGO_PKG_VERSION"));
const MAX_BLOCK_DEPTH: usize = 3;

/// 32 hex digits, bare or grouped 8-4-4-4-12.
pub fn validate_workspace_id(resource_id: &str) -> Result<(), TributaryError> {
    let hex = |s: &str, len: usize| s.len() == len && s.bytes().all(|b| b.is_ascii_hexdigit());
    let groups: Vec<&str> = resource_id.split('-').collect();
    let ok = match groups.as_slice() {
        [bare] => hex(bare, 32),
        [a, b, c, d, e] => hex(a, 8) && hex(b, 4) && hex(c, 4) && hex(d, 4) && hex(e, 12),
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(TributaryError::invalid(format!(
            "workspace resource id must be 32 hex digits, got `{resource_id}`"
        )))
    }
}

pub struct WorkspaceProvider {
    api: WorkspaceApi,
}

impl WorkspaceProvider {
    pub fn new(cfg: WorkspaceResolvedConfig) -> Result<Self, TributaryError> {
        let http = UpstreamClient::new("workspace", &cfg.client, USER_AGENT)?;
        let rps = NonZeroU32::new(cfg.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let limiter = Arc::new(RateLimiter::direct(Quota::per_second(rps)));

        Ok(Self {
            api: WorkspaceApi {
                http,
                base: cfg.api_url,
                token: cfg.token,
                api_version: cfg.api_version,
                page_size: cfg.page_size,
                limiter,
            },
        })
    }

    /// Pages edited strictly after `since`, newest first.
    async fn fresh_pages(&self, since: Option<DateTime<Utc>>) -> Result<Vec<Page>, TributaryError> {
        let mut fresh = Vec::new();
        let mut start_cursor: Option<String> = None;

        loop {
            let batch = self.api.search(start_cursor.as_deref()).await?;
            let before = fresh.len();
            fresh.extend(
                batch
                    .results
                    .into_iter()
                    .filter(|page| since.is_none_or(|since| page.last_edited_time > since)),
            );

            // Sorted newest-first: a batch without fresh pages means the rest is stale too.
            let exhausted = fresh.len() == before && since.is_some();
            match batch.next_cursor {
                Some(next) if batch.has_more && !exhausted => start_cursor = Some(next),
                _ => break,
            }
        }

        Ok(fresh)
    }

    async fn render_page(&self, page: &Page) -> Result<String, TributaryError> {
        let mut lines = Vec::new();
        self.render_children(&page.id, 0, &mut lines).await?;
        Ok(lines.join("\n"))
    }

    /// Append the children of `block_id` in document order, each followed by its own subtree.
    fn render_children<'a>(
        &'a self,
        block_id: &'a str,
        depth: usize,
        lines: &'a mut Vec<String>,
    ) -> BoxFuture<'a, Result<(), TributaryError>> {
        async move {
            let mut start_cursor: Option<String> = None;
            loop {
                let batch = self.api.children(block_id, start_cursor.as_deref()).await?;
                for block in &batch.results {
                    if let Some(line) = render::render_block(block, depth) {
                        lines.push(line);
                    }
                    if block.has_children && depth + 1 < MAX_BLOCK_DEPTH {
                        self.render_children(&block.id, depth + 1, lines).await?;
                    }
                }
                match batch.next_cursor {
                    Some(next) if batch.has_more => start_cursor = Some(next),
                    _ => break,
                }
            }
            Ok(())
        }
        .boxed()
    }
}

#[async_trait]
impl Provider for WorkspaceProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Workspace
    }

    async fn pull(&self, opts: PullOptions) -> Result<PullResult, TributaryError> {
        validate_workspace_id(&opts.resource_id)?;
        let since = parse_cursor(&opts.cursor);
        let pages = self.fresh_pages(since).await?;

        let mut items = Vec::with_capacity(pages.len());
        let mut newest = since;
        for page in &pages {
            newest = newest.max(Some(page.last_edited_time));

            let body = match self.render_page(page).await {
                Ok(body) => body,
                Err(err) if err.is_retryable() => return Err(err),
                Err(err) => {
                    let err = TributaryError::PartialPage {
                        item: page.id.clone(),
                        message: err.to_string(),
                    };
                    warn!(workspace = %opts.resource_id, "{err}");
                    continue;
                }
            };

            let title = page.title();
            let mut metadata = ContentMetadata::new(
                ProviderKind::Workspace,
                opts.resource_id.as_str(),
                page.id.as_str(),
                Some(page.last_edited_time),
            )
            .with_extra("title", json!(title));
            if let Some(url) = &page.url {
                metadata = metadata.with_extra("url", json!(url));
            }

            let content = if title.is_empty() {
                body
            } else {
                format!("# {title}\n\n{body}")
            };
            items.push(ContentItem::with_header(
                &content,
                "text/markdown",
                opts.user_id.clone(),
                metadata,
            ));
        }

        info!(
            workspace = %opts.resource_id,
            since = ?since,
            fresh = pages.len(),
            emitted = items.len(),
            "workspace pull complete"
        );

        // An unchanged cursor is echoed verbatim so re-encoding can never move it.
        let new_cursor = if newest == since && since.is_some() {
            Some(opts.cursor.clone())
        } else {
            newest.map(format_cursor)
        };
        Ok(PullResult { items, new_cursor })
    }
}

fn parse_cursor(cursor: &str) -> Option<DateTime<Utc>> {
    if cursor.is_empty() {
        return None;
    }
    match DateTime::parse_from_rfc3339(cursor) {
        Ok(ts) => Some(ts.with_timezone(&Utc)),
        Err(err) => {
            debug!(cursor, "unparseable workspace cursor, resyncing: {err}");
            None
        }
    }
}

/// Millisecond precision when that is lossless, full precision otherwise.
fn format_cursor(ts: DateTime<Utc>) -> String {
    let format = if ts.timestamp_subsec_nanos() % 1_000_000 == 0 {
        SecondsFormat::Millis
    } else {
        SecondsFormat::AutoSi
    };
    ts.to_rfc3339_opts(format, true)
}
