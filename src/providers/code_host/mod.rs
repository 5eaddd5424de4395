//! Code-host provider (GitHub REST v3 shaped API).
//!
//! The cursor is the last-seen head commit SHA of the default branch. An empty cursor yields a
//! full snapshot of the tree at head; otherwise only paths changed in `cursor...head` are
//! emitted.

mod api;
mod repo;

pub use repo::RepoRef;

use crate::config::CodeHostResolvedConfig;
use crate::error::{IsRetryable, TributaryError};
use crate::providers::http::UpstreamClient;
use crate::providers::{Provider, PullOptions, PullResult};
use api::{Candidate, CodeHostApi};
use async_trait::async_trait;
use moka::sync::Cache;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use tributary_ignore::{DEFAULT_PATTERNS, IgnoreMatcher, IgnorePatternSet};
use tributary_schema::{ContentItem, ContentMetadata, ProviderKind};

const USER_AGENT: &str = concat!("tributary/", env!("CARGO_PKG_VERSION"));
const BINARY_SNIFF_BYTES: usize = 8000;

pub struct CodeHostProvider {
    api: CodeHostApi,
    cfg: CodeHostResolvedConfig,
    // (repo, head sha) -> compiled matcher
    matchers: Cache<(String, String), Arc<IgnoreMatcher>>,
}

impl CodeHostProvider {
    pub fn new(cfg: CodeHostResolvedConfig) -> Result<Self, TributaryError> {
        let http = UpstreamClient::new("code_host", &cfg.client, USER_AGENT)?;
        let api = CodeHostApi {
            http,
            base: cfg.api_url.clone(),
            token: cfg.token.clone(),
        };
        let matchers = Cache::builder()
            .max_capacity(256)
            .time_to_live(Duration::from_secs(6 * 60 * 60))
            .build();
        Ok(Self { api, cfg, matchers })
    }

    async fn matcher(
        &self,
        repo: &RepoRef,
        sha: &str,
    ) -> Result<Arc<IgnoreMatcher>, TributaryError> {
        let key = (repo.to_string(), sha.to_string());
        if let Some(matcher) = self.matchers.get(&key) {
            return Ok(matcher);
        }

        let mut patterns = IgnorePatternSet::from_patterns(DEFAULT_PATTERNS);
        patterns.extend(&self.cfg.ignore_patterns);
        if let Some(bytes) = self.api.raw_file(repo, ".gitignore", sha).await? {
            patterns.extend(String::from_utf8_lossy(&bytes).lines());
        }

        let (matcher, skipped) = patterns.compile_lossy();
        for err in &skipped {
            warn!(repo = %repo, sha, "skipping ignore pattern: {err}");
        }
        debug!(repo = %repo, sha, rules = matcher.len(), "ignore matcher compiled");

        let matcher = Arc::new(matcher);
        self.matchers.insert(key, matcher.clone());
        Ok(matcher)
    }
}

#[async_trait]
impl Provider for CodeHostProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::CodeHost
    }

    async fn pull(&self, opts: PullOptions) -> Result<PullResult, TributaryError> {
        let repo = RepoRef::parse(&opts.resource_id)?;
        let branch = self.api.default_branch(&repo).await?;
        let head = self.api.head(&repo, &branch).await?;

        if !opts.cursor.is_empty() && opts.cursor == head.sha {
            debug!(repo = %repo, sha = %head.sha, "head unchanged");
            return Ok(PullResult::default());
        }

        let candidates = if opts.cursor.is_empty() {
            self.api.tree(&repo, &head.sha).await?
        } else {
            self.api.compare(&repo, &opts.cursor, &head.sha).await?
        };

        let matcher = self.matcher(&repo, &head.sha).await?;
        let total = candidates.len();
        let candidates: Vec<Candidate> = candidates
            .into_iter()
            .filter(|c| !matcher.should_ignore(&c.path))
            .filter(|c| c.size.is_none_or(|size| size <= self.cfg.max_file_bytes))
            .collect();

        let modified_at = head.committed_at();
        let mut items = Vec::with_capacity(candidates.len());
        let mut failed: Vec<&str> = Vec::new();
        for candidate in &candidates {
            let bytes = match self.api.raw_file(&repo, &candidate.path, &head.sha).await {
                Ok(Some(bytes)) => bytes,
                Ok(None) => continue,
                Err(err) if err.is_retryable() => return Err(err),
                Err(err) => {
                    warn!(repo = %repo, path = %candidate.path, "skipping file: {err}");
                    failed.push(&candidate.path);
                    continue;
                }
            };

            if bytes.len() as u64 > self.cfg.max_file_bytes {
                debug!(repo = %repo, path = %candidate.path, size = bytes.len(), "skipping oversized file");
                continue;
            }
            let Some(body) = decode_text(&bytes) else {
                debug!(repo = %repo, path = %candidate.path, "skipping binary file");
                continue;
            };

            let metadata = ContentMetadata::new(
                ProviderKind::CodeHost,
                repo.to_string(),
                candidate.path.as_str(),
                modified_at,
            )
            .with_extra("commit", json!(head.sha))
            .with_extra("branch", json!(branch));
            items.push(ContentItem::with_header(
                body,
                mime_for_path(&candidate.path),
                opts.user_id.clone(),
                metadata,
            ));
        }

        let from = if opts.cursor.is_empty() {
            "<snapshot>"
        } else {
            opts.cursor.as_str()
        };
        info!(
            repo = %repo,
            from,
            to = %head.sha,
            listed = total,
            emitted = items.len(),
            "code-host pull complete"
        );

        // Advancing past a file we could not fetch would drop it until it changes again.
        let new_cursor = if failed.is_empty() {
            Some(head.sha)
        } else {
            warn!(repo = %repo, ?failed, "holding cursor until every changed file is fetched");
            None
        };
        Ok(PullResult { items, new_cursor })
    }
}

/// UTF-8 text without NUL bytes in its first block; everything else is treated as binary.
fn decode_text(bytes: &[u8]) -> Option<&str> {
    let sniff = &bytes[..bytes.len().min(BINARY_SNIFF_BYTES)];
    if sniff.contains(&0) {
        return None;
    }
    std::str::from_utf8(bytes).ok()
}

fn mime_for_path(path: &str) -> &'static str {
    let ext = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "md" | "markdown" => "text/markdown",
        "html" | "htm" => "text/html",
        "json" => "application/json",
        "yaml" | "yml" => "application/yaml",
        "toml" => "application/toml",
        "xml" => "application/xml",
        "csv" => "text/csv",
        _ => "text/plain",
    }
}
