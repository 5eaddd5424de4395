use serde::{Deserialize, Serialize};

use super::{ClientOverrides, ClientSettings, ProviderDefaults};

/// Website crawler configuration managed by Figment.
///
/// These are service-wide defaults; a site registration may override depth, delay, page
/// budget and robots handling in its own resource id.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebsiteConfig {
    /// TOML: `providers.website.user_agent`. Default: `TributaryBot/1.0`.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Pause between two fetches of one crawl.
    /// TOML: `providers.website.delay_ms`. Default: `1000`.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    /// TOML: `providers.website.max_depth`. Default: `2`.
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Fetch budget per pull.
    /// TOML: `providers.website.max_pages`. Default: `50`.
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// TOML: `providers.website.respect_robots`. Default: `true`.
    #[serde(default = "default_respect_robots")]
    pub respect_robots: bool,

    /// Responses larger than this are truncated before extraction.
    /// TOML: `providers.website.max_body_bytes`. Default: `2097152`.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    #[serde(flatten)]
    pub client: ClientOverrides,
}

#[derive(Debug, Clone)]
pub struct WebsiteResolvedConfig {
    pub user_agent: String,
    pub delay_ms: u64,
    pub max_depth: u32,
    pub max_pages: usize,
    pub respect_robots: bool,
    pub max_body_bytes: usize,
    pub client: ClientSettings,
}

impl WebsiteConfig {
    pub fn resolve(&self, defaults: &ProviderDefaults) -> WebsiteResolvedConfig {
        WebsiteResolvedConfig {
            user_agent: self.user_agent.clone(),
            delay_ms: self.delay_ms,
            max_depth: self.max_depth,
            max_pages: self.max_pages.max(1),
            respect_robots: self.respect_robots,
            max_body_bytes: self.max_body_bytes,
            client: self.client.resolve(defaults),
        }
    }
}

impl Default for WebsiteConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            delay_ms: default_delay_ms(),
            max_depth: default_max_depth(),
            max_pages: default_max_pages(),
            respect_robots: default_respect_robots(),
            max_body_bytes: default_max_body_bytes(),
            client: ClientOverrides::default(),
        }
    }
}

fn default_user_agent() -> String {
    "TributaryBot/1.0".to_string()
}

fn default_delay_ms() -> u64 {
    1000
}

fn default_max_depth() -> u32 {
    2
}

fn default_max_pages() -> usize {
    50
}

fn default_respect_robots() -> bool {
    true
}

fn default_max_body_bytes() -> usize {
    2 * 1024 * 1024
}
