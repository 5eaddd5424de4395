mod code_host;
mod website;
mod workspace;

pub use code_host::{CodeHostConfig, CodeHostResolvedConfig};
pub use website::{WebsiteConfig, WebsiteResolvedConfig};
pub use workspace::{WorkspaceConfig, WorkspaceResolvedConfig};

use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Global provider defaults (used when provider-level config is unset).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderDefaults {
    /// Optional upstream HTTP proxy. If set, used for reqwest clients.
    /// TOML: `providers.defaults.proxy`. Example: `http://127.0.0.1:1080`.
    #[serde(default)]
    pub proxy: Option<Url>,

    /// Allow HTTP/2 multiplexing for reqwest clients; disabled forces HTTP/1.
    /// TOML: `providers.defaults.enable_multiplexing`. Default: `false`.
    #[serde(default = "default_enable_multiplexing")]
    pub enable_multiplexing: bool,

    /// Max retry attempts for rate-limited upstream calls.
    /// TOML: `providers.defaults.retry_max_times`. Default: `3`.
    #[serde(default = "default_retry_max_times")]
    pub retry_max_times: usize,

    /// First backoff delay for rate-limited upstream calls.
    /// TOML: `providers.defaults.retry_min_delay_ms`. Default: `500`.
    #[serde(default = "default_retry_min_delay_ms")]
    pub retry_min_delay_ms: u64,
}

impl Default for ProviderDefaults {
    fn default() -> Self {
        Self {
            proxy: None,
            enable_multiplexing: default_enable_multiplexing(),
            retry_max_times: default_retry_max_times(),
            retry_min_delay_ms: default_retry_min_delay_ms(),
        }
    }
}

/// Per-provider HTTP overrides, flattened into each provider table.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ClientOverrides {
    #[serde(default)]
    pub proxy: Option<Url>,
    #[serde(default)]
    pub enable_multiplexing: Option<bool>,
    #[serde(default)]
    pub retry_max_times: Option<usize>,
    #[serde(default)]
    pub retry_min_delay_ms: Option<u64>,
}

/// HTTP client settings after applying provider overrides to the defaults.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub proxy: Option<Url>,
    pub enable_multiplexing: bool,
    pub retry_max_times: usize,
    pub retry_min_delay: Duration,
}

impl ClientOverrides {
    pub fn resolve(&self, defaults: &ProviderDefaults) -> ClientSettings {
        ClientSettings {
            proxy: self.proxy.clone().or_else(|| defaults.proxy.clone()),
            enable_multiplexing: self
                .enable_multiplexing
                .unwrap_or(defaults.enable_multiplexing),
            retry_max_times: self.retry_max_times.unwrap_or(defaults.retry_max_times),
            retry_min_delay: Duration::from_millis(
                self.retry_min_delay_ms
                    .unwrap_or(defaults.retry_min_delay_ms),
            ),
        }
    }
}

impl ProviderDefaults {
    pub fn client_settings(&self) -> ClientSettings {
        ClientOverrides::default().resolve(self)
    }
}

/// All provider configurations.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ProvidersConfig {
    /// Global defaults for providers (overridden per provider if set).
    #[serde(default)]
    pub defaults: ProviderDefaults,

    /// Code-host (GitHub REST v3) provider configuration.
    #[serde(default)]
    pub code_host: CodeHostConfig,

    /// Workspace (Notion API) provider configuration.
    #[serde(default)]
    pub workspace: WorkspaceConfig,

    /// Website crawler configuration.
    #[serde(default)]
    pub website: WebsiteConfig,
}

fn default_enable_multiplexing() -> bool {
    false
}

fn default_retry_max_times() -> usize {
    3
}

fn default_retry_min_delay_ms() -> u64 {
    500
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_fall_back_to_defaults() {
        let defaults = ProviderDefaults {
            proxy: Some(Url::parse("http://127.0.0.1:1080").expect("url")),
            enable_multiplexing: true,
            retry_max_times: 5,
            retry_min_delay_ms: 200,
        };
        let overrides = ClientOverrides {
            retry_max_times: Some(1),
            ..Default::default()
        };

        let settings = overrides.resolve(&defaults);
        assert_eq!(settings.retry_max_times, 1);
        assert!(settings.enable_multiplexing);
        assert_eq!(settings.retry_min_delay, Duration::from_millis(200));
        assert_eq!(
            settings.proxy.as_ref().map(Url::as_str),
            Some("http://127.0.0.1:1080/")
        );
    }
}
