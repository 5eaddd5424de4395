use serde::{Deserialize, Serialize};
use url::Url;

use super::{ClientOverrides, ClientSettings, ProviderDefaults};

/// Workspace provider configuration managed by Figment.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkspaceConfig {
    /// TOML: `providers.workspace.api_url`. Default: `https://api.notion.com`.
    #[serde(default = "default_api_url")]
    pub api_url: Url,

    /// Integration token.
    /// TOML: `providers.workspace.token`.
    #[serde(default)]
    pub token: Option<String>,

    /// Value sent as the `Notion-Version` header.
    /// TOML: `providers.workspace.api_version`. Default: `2022-06-28`.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Search page size.
    /// TOML: `providers.workspace.page_size`. Default: `100`.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Outbound request budget shared by every workspace pull.
    /// TOML: `providers.workspace.requests_per_second`. Default: `3`.
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,

    #[serde(flatten)]
    pub client: ClientOverrides,
}

#[derive(Debug, Clone)]
pub struct WorkspaceResolvedConfig {
    pub api_url: Url,
    pub token: Option<String>,
    pub api_version: String,
    pub page_size: u32,
    pub requests_per_second: u32,
    pub client: ClientSettings,
}

impl WorkspaceConfig {
    pub fn resolve(&self, defaults: &ProviderDefaults) -> WorkspaceResolvedConfig {
        WorkspaceResolvedConfig {
            api_url: self.api_url.clone(),
            token: self.token.clone().filter(|t| !t.trim().is_empty()),
            api_version: self.api_version.clone(),
            page_size: self.page_size.clamp(1, 100),
            requests_per_second: self.requests_per_second.max(1),
            client: self.client.resolve(defaults),
        }
    }
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            token: None,
            api_version: default_api_version(),
            page_size: default_page_size(),
            requests_per_second: default_requests_per_second(),
            client: ClientOverrides::default(),
        }
    }
}

fn default_api_url() -> Url {
    Url::parse("https://api.notion.com").expect("valid default workspace api url")
}

fn default_api_version() -> String {
    "2022-06-28".to_string()
}

fn default_page_size() -> u32 {
    100
}

fn default_requests_per_second() -> u32 {
    3
}
