//! Website provider: a polite, depth-bounded crawl of one site per pull.
//!
//! The cursor is a JSON envelope (see [`CrawlCursor`]). Pages whose `Last-Modified` is not
//! newer than the previous crawl are fetched (to discover links) but not emitted.

mod config;
mod crawl;
mod cursor;
mod extract;
mod robots;

pub use config::SiteConfig;
pub use crawl::{CrawlOutcome, CrawlSettings, CrawledPage, Crawler};
pub use cursor::CrawlCursor;
pub use robots::RobotsRules;

use crate::config::WebsiteResolvedConfig;
use crate::error::TributaryError;
use crate::providers::http::UpstreamClient;
use crate::providers::{Provider, PullOptions, PullResult};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use std::time::Duration;
use tracing::{info, warn};
use tributary_schema::{ContentItem, ContentMetadata, ProviderKind};
use url::Url;

pub struct WebsiteProvider {
    http: UpstreamClient,
    cfg: WebsiteResolvedConfig,
}

impl WebsiteProvider {
    pub fn new(cfg: WebsiteResolvedConfig) -> Result<Self, TributaryError> {
        let http = UpstreamClient::new("website", &cfg.client, &cfg.user_agent)?;
        Ok(Self { http, cfg })
    }

    /// Service defaults overlaid with the per-site registration.
    pub fn settings_for(&self, site: &SiteConfig) -> CrawlSettings {
        CrawlSettings {
            max_depth: site.depth.unwrap_or(self.cfg.max_depth),
            max_pages: site.max_pages.unwrap_or(self.cfg.max_pages).max(1),
            delay: Duration::from_millis(site.delay_ms.unwrap_or(self.cfg.delay_ms)),
            follow_external: site.follow_external,
            respect_robots: site.respect_robots.unwrap_or(self.cfg.respect_robots),
            include_content_types: site.include_content_types.clone(),
            url_patterns: site.url_patterns.clone(),
            max_body_bytes: self.cfg.max_body_bytes,
            agent_token: agent_token(&self.cfg.user_agent),
        }
    }
}

#[async_trait]
impl Provider for WebsiteProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Website
    }

    async fn pull(&self, opts: PullOptions) -> Result<PullResult, TributaryError> {
        let site = SiteConfig::parse(&opts.resource_id)?;
        let previous = CrawlCursor::parse(&opts.cursor);
        let settings = self.settings_for(&site);

        let mut seeds: Vec<Url> = previous
            .pending_urls
            .iter()
            .filter_map(|raw| match Url::parse(raw) {
                Ok(url) => Some(url),
                Err(err) => {
                    warn!(url = %raw, "dropping unparseable pending url: {err}");
                    None
                }
            })
            .collect();
        if seeds.is_empty() {
            seeds.push(site.url.clone());
        }

        let started_at = Utc::now();
        let outcome = Crawler::new(&self.http, &settings, &site.url).run(seeds).await;
        if outcome.crawled.is_empty() && outcome.failed > 0 {
            return Err(TributaryError::UpstreamPayload(format!(
                "no page of {} could be fetched",
                site.url
            )));
        }

        let origin = site.origin();
        let fetched = outcome.pages.len();
        let items: Vec<ContentItem> = outcome
            .pages
            .iter()
            .filter(|page| match (page.last_modified, previous.last_crawl) {
                (Some(modified), Some(last_crawl)) => modified > last_crawl,
                _ => true,
            })
            .map(|page| {
                let mut metadata = ContentMetadata::new(
                    ProviderKind::Website,
                    origin.as_str(),
                    page.url.as_str(),
                    page.last_modified,
                )
                .with_extra("depth", json!(page.depth))
                .with_extra("contentType", json!(page.content_type));
                let body = match &page.title {
                    Some(title) => {
                        metadata = metadata.with_extra("title", json!(title));
                        format!("# {title}\n\n{}", page.text)
                    }
                    None => page.text.clone(),
                };
                ContentItem::with_header(&body, "text/plain", opts.user_id.clone(), metadata)
            })
            .collect();

        let next = previous.advance(started_at, outcome.crawled, outcome.pending);
        info!(
            site = %site.url,
            fetched,
            emitted = items.len(),
            failed = outcome.failed,
            pending = next.pending_urls.len(),
            "website pull complete"
        );

        Ok(PullResult {
            items,
            new_cursor: Some(next.encode()),
        })
    }
}

/// `TributaryBot/1.0 (+https://...)` -> `TributaryBot`.
fn agent_token(user_agent: &str) -> String {
    user_agent
        .split(['/', ' '])
        .next()
        .unwrap_or(user_agent)
        .to_string()
}
