use crate::error::TributaryError;
use serde::{Deserialize, Serialize};
use url::Url;

/// Site registration carried (as JSON) in the resource id of a website resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteConfig {
    pub url: Url,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<u32>,
    #[serde(default)]
    pub follow_external: bool,
    /// Asset classes (`image`, `script`, `style`) to crawl despite the default denylist.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include_content_types: Vec<String>,
    /// When non-empty, only URLs matching one of these `*` wildcards are fetched.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub url_patterns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub respect_robots: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_pages: Option<usize>,
}

impl SiteConfig {
    pub fn parse(resource_id: &str) -> Result<Self, TributaryError> {
        let cfg: SiteConfig = serde_json::from_str(resource_id).map_err(|e| {
            TributaryError::invalid(format!(
                "website resource id must be a JSON object with a `url` field: {e}"
            ))
        })?;
        if !matches!(cfg.url.scheme(), "http" | "https") || cfg.url.host_str().is_none() {
            return Err(TributaryError::invalid(format!(
                "website url must be an absolute http(s) url, got `{}`",
                cfg.url
            )));
        }
        Ok(cfg)
    }

    /// Canonical origin used as the `origin` of emitted items.
    pub fn origin(&self) -> String {
        self.url.origin().ascii_serialization()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_and_full_configs() {
        let cfg = SiteConfig::parse(r#"{"url":"https://docs.example.com/guide"}"#).expect("ok");
        assert_eq!(cfg.origin(), "https://docs.example.com");
        assert!(!cfg.follow_external);
        assert!(cfg.depth.is_none());

        let cfg = SiteConfig::parse(
            r#"{"url":"https://example.com","depth":1,"followExternal":true,
                "includeContentTypes":["image"],"urlPatterns":["https://example.com/docs/*"],
                "respectRobots":false,"delayMs":0,"maxPages":5}"#,
        )
        .expect("ok");
        assert_eq!(cfg.depth, Some(1));
        assert_eq!(cfg.respect_robots, Some(false));
        assert_eq!(cfg.max_pages, Some(5));
    }

    #[test]
    fn rejects_non_http_urls() {
        assert!(SiteConfig::parse(r#"{"url":"ftp://example.com"}"#).is_err());
        assert!(SiteConfig::parse(r#"{"url":"not a url"}"#).is_err());
        assert!(SiteConfig::parse("[]").is_err());
    }
}
