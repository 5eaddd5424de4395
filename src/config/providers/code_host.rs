use serde::{Deserialize, Serialize};
use url::Url;

use super::{ClientOverrides, ClientSettings, ProviderDefaults};

/// Code-host provider configuration managed by Figment.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CodeHostConfig {
    /// REST API base.
    /// TOML: `providers.code_host.api_url`. Default: `https://api.github.com`.
    #[serde(default = "default_api_url")]
    pub api_url: Url,

    /// Personal access token; anonymous requests are heavily rate limited.
    /// TOML: `providers.code_host.token`.
    #[serde(default)]
    pub token: Option<String>,

    /// Extra gitignore-style patterns applied on top of the built-in defaults.
    /// TOML: `providers.code_host.ignore_patterns`.
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    /// Files larger than this are skipped.
    /// TOML: `providers.code_host.max_file_bytes`. Default: `1048576`.
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,

    #[serde(flatten)]
    pub client: ClientOverrides,
}

#[derive(Debug, Clone)]
pub struct CodeHostResolvedConfig {
    pub api_url: Url,
    pub token: Option<String>,
    pub ignore_patterns: Vec<String>,
    pub max_file_bytes: u64,
    pub client: ClientSettings,
}

impl CodeHostConfig {
    pub fn resolve(&self, defaults: &ProviderDefaults) -> CodeHostResolvedConfig {
        CodeHostResolvedConfig {
            api_url: self.api_url.clone(),
            token: self.token.clone().filter(|t| !t.trim().is_empty()),
            ignore_patterns: self.ignore_patterns.clone(),
            max_file_bytes: self.max_file_bytes,
            client: self.client.resolve(defaults),
        }
    }
}

impl Default for CodeHostConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            token: None,
            ignore_patterns: Vec::new(),
            max_file_bytes: default_max_file_bytes(),
            client: ClientOverrides::default(),
        }
    }
}

fn default_api_url() -> Url {
    Url::parse("https://api.github.com").expect("valid default code-host api url")
}

fn default_max_file_bytes() -> u64 {
    1024 * 1024
}
