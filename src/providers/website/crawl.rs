use crate::error::TributaryError;
use crate::providers::http::UpstreamClient;
use ahash::{AHashMap, AHashSet};
use chrono::{DateTime, Utc};
use reqwest::header::{CONTENT_TYPE, LAST_MODIFIED};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::extract::{extract_html, looks_like_html};
use super::robots::{RobotsRules, wildcard_match};

const IMAGE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "svg", "webp", "ico", "bmp", "tif", "tiff", "avif",
];
const SCRIPT_EXTENSIONS: &[&str] = &["js", "mjs", "cjs", "map"];
const STYLE_EXTENSIONS: &[&str] = &["css", "scss", "less"];

/// Limits and filters of one crawl invocation.
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    pub max_depth: u32,
    pub max_pages: usize,
    pub delay: Duration,
    pub follow_external: bool,
    pub respect_robots: bool,
    pub include_content_types: Vec<String>,
    pub url_patterns: Vec<String>,
    pub max_body_bytes: usize,
    /// Product token matched against robots.txt `User-agent` lines.
    pub agent_token: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CrawledPage {
    pub url: Url,
    pub depth: u32,
    pub title: Option<String>,
    pub text: String,
    pub content_type: String,
    pub last_modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub struct CrawlOutcome {
    pub pages: Vec<CrawledPage>,
    /// Every URL fetched successfully, in fetch order.
    pub crawled: Vec<String>,
    /// Deferred URLs: cross-origin links and whatever the page budget cut off.
    pub pending: Vec<String>,
    /// Fetches that failed (network error or non-success status).
    pub failed: usize,
}

pub struct Crawler<'a> {
    http: &'a UpstreamClient,
    settings: &'a CrawlSettings,
    root: &'a Url,
    robots: AHashMap<String, RobotsRules>,
}

impl<'a> Crawler<'a> {
    pub fn new(http: &'a UpstreamClient, settings: &'a CrawlSettings, root: &'a Url) -> Self {
        Self {
            http,
            settings,
            root,
            robots: AHashMap::new(),
        }
    }

    /// Breadth-first crawl from `seeds`, each at depth 0.
    pub async fn run(mut self, seeds: Vec<Url>) -> CrawlOutcome {
        let mut queue: VecDeque<(Url, u32)> = seeds.into_iter().map(|url| (url, 0)).collect();
        let mut visited: AHashSet<String> = AHashSet::new();
        let mut pending: Vec<String> = Vec::new();
        let mut pending_seen: AHashSet<String> = AHashSet::new();
        let mut outcome = CrawlOutcome::default();
        let mut fetches = 0usize;

        while let Some((url, depth)) = queue.pop_front() {
            let key = url_key(&url);
            if visited.contains(&key) {
                continue;
            }
            if fetches >= self.settings.max_pages {
                if pending_seen.insert(key.clone()) {
                    pending.push(key);
                }
                continue;
            }
            visited.insert(key.clone());

            if self.settings.respect_robots && !self.robots_allow(&url).await {
                debug!(url = %url, "disallowed by robots.txt");
                continue;
            }
            if self.denied_by_type(&url) {
                debug!(url = %url, "skipping asset url");
                continue;
            }
            if !self.settings.url_patterns.is_empty()
                && !self
                    .settings
                    .url_patterns
                    .iter()
                    .any(|p| wildcard_match(p, url.as_str(), false))
            {
                debug!(url = %url, "url outside configured patterns");
                continue;
            }

            if fetches > 0 && !self.settings.delay.is_zero() {
                tokio::time::sleep(self.settings.delay).await;
            }
            fetches += 1;
            let fetched = self.fetch(&url).await;

            let (page, links) = match fetched {
                Ok(Some(fetched)) => fetched,
                Ok(None) => continue,
                Err(err) => {
                    warn!(url = %url, "fetch failed: {err}");
                    outcome.failed += 1;
                    continue;
                }
            };
            outcome.crawled.push(key);

            if depth < self.settings.max_depth {
                for link in links {
                    let link_key = url_key(&link);
                    if visited.contains(&link_key) {
                        continue;
                    }
                    if same_origin(self.root, &link) || self.settings.follow_external {
                        queue.push_back((link, depth + 1));
                    } else if pending_seen.insert(link_key.clone()) {
                        pending.push(link_key);
                    }
                }
            }
            outcome.pages.push(CrawledPage { depth, ..page });
        }

        // A deferred URL that was reached later in this run is no longer pending.
        pending.retain(|url| !visited.contains(url));
        outcome.pending = pending;
        outcome
    }

    async fn robots_allow(&mut self, url: &Url) -> bool {
        let origin = url.origin().ascii_serialization();
        if !self.robots.contains_key(&origin) {
            let rules = self.fetch_robots(url).await;
            self.robots.insert(origin.clone(), rules);
        }

        let mut path = url.path().to_string();
        if let Some(query) = url.query() {
            path.push('?');
            path.push_str(query);
        }
        self.robots
            .get(&origin)
            .is_none_or(|rules| rules.is_allowed(&path))
    }

    async fn fetch_robots(&self, url: &Url) -> RobotsRules {
        let Ok(robots_url) = url.join("/robots.txt") else {
            return RobotsRules::allow_all();
        };
        let resp = match self.http.send_raw(|c| c.get(robots_url.clone())).await {
            Ok(resp) if resp.status().is_success() => resp,
            Ok(resp) => {
                debug!(url = %robots_url, status = %resp.status(), "no robots.txt, allowing all");
                return RobotsRules::allow_all();
            }
            Err(err) => {
                debug!(url = %robots_url, "robots.txt fetch failed, allowing all: {err}");
                return RobotsRules::allow_all();
            }
        };
        match resp.text().await {
            Ok(text) => RobotsRules::parse(&text, &self.settings.agent_token),
            Err(_) => RobotsRules::allow_all(),
        }
    }

    fn denied_by_type(&self, url: &Url) -> bool {
        let Some(ext) = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .and_then(|last| last.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase())
        else {
            return false;
        };

        let included = |class: &str| {
            self.settings
                .include_content_types
                .iter()
                .any(|c| c.eq_ignore_ascii_case(class))
        };

        (IMAGE_EXTENSIONS.contains(&ext.as_str()) && !included("image"))
            || (SCRIPT_EXTENSIONS.contains(&ext.as_str()) && !included("script"))
            || (STYLE_EXTENSIONS.contains(&ext.as_str()) && !included("style"))
    }

    /// Fetch and extract one page. `Ok(None)` for non-text responses.
    async fn fetch(&self, url: &Url) -> Result<Option<(CrawledPage, Vec<Url>)>, TributaryError> {
        let resp = self.http.send(|c| c.get(url.clone())).await?;

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();
        let last_modified = resp
            .headers()
            .get(LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| DateTime::parse_from_rfc2822(v).ok())
            .map(|ts| ts.with_timezone(&Utc));

        let bytes = resp.bytes().await?;
        let bytes = &bytes[..bytes.len().min(self.settings.max_body_bytes)];
        let body = String::from_utf8_lossy(bytes);

        let is_html = content_type.contains("text/html")
            || (content_type.is_empty() && looks_like_html(&body));
        if is_html {
            let extracted = extract_html(url, &body);
            let page = CrawledPage {
                url: url.clone(),
                depth: 0,
                title: extracted.title,
                text: extracted.text,
                content_type: "text/html".to_string(),
                last_modified,
            };
            return Ok(Some((page, extracted.links)));
        }

        if content_type.starts_with("text/") || content_type.is_empty() {
            let page = CrawledPage {
                url: url.clone(),
                depth: 0,
                title: None,
                text: body.into_owned(),
                content_type: match content_type.split(';').next().map(str::trim) {
                    Some(mime) if !mime.is_empty() => mime.to_string(),
                    _ => "text/plain".to_string(),
                },
                last_modified,
            };
            return Ok(Some((page, Vec::new())));
        }

        debug!(url = %url, content_type, "skipping non-text response");
        Ok(None)
    }
}

fn same_origin(a: &Url, b: &Url) -> bool {
    a.origin() == b.origin()
}

fn url_key(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.to_string()
}
