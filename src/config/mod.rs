mod basic;
mod providers;
mod sink;
mod sync;

pub use basic::BasicConfig;
pub use providers::{
    ClientOverrides, ClientSettings, CodeHostConfig, CodeHostResolvedConfig, ProviderDefaults,
    ProvidersConfig, WebsiteConfig, WebsiteResolvedConfig, WorkspaceConfig,
    WorkspaceResolvedConfig,
};
pub use sink::SinkConfig;
pub use sync::SyncConfig;

use figment::{
    Figment,
    providers::{Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use crate::error::TributaryError;
use std::path::PathBuf;

/// Application configuration managed by Figment.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// Core server configuration (see `basic` table in config.toml).
    #[serde(default)]
    pub basic: BasicConfig,

    /// Scheduling defaults (see `sync` table in config.toml).
    #[serde(default)]
    pub sync: SyncConfig,

    /// Downstream content store (see `sink` table in config.toml).
    #[serde(default)]
    pub sink: SinkConfig,

    /// Provider and upstream settings (see `providers` table in config.toml).
    #[serde(default)]
    pub providers: ProvidersConfig,
}

const DEFAULT_CONFIG_FILE: &str = "config.toml";

impl Config {
    /// Builds a Figment that merges defaults and a config TOML file.
    pub fn figment() -> Figment {
        let figment = Figment::new().merge(Serialized::defaults(Config::default()));
        if PathBuf::from(DEFAULT_CONFIG_FILE).is_file() {
            figment.merge(Toml::file(DEFAULT_CONFIG_FILE))
        } else {
            figment
        }
    }

    /// Loads configuration from the TOML file (with defaults) and validates required fields.
    pub fn from_toml() -> Self {
        if !PathBuf::from(DEFAULT_CONFIG_FILE).is_file() {
            panic!("config file not found: {}", DEFAULT_CONFIG_FILE);
        }
        let cfg: Self = Self::figment().extract().unwrap_or_else(|err| {
            panic!(
                "failed to extract configuration from {}: {err}",
                DEFAULT_CONFIG_FILE
            )
        });
        if let Err(err) = cfg.validate() {
            panic!("{err}");
        }
        cfg
    }

    /// Fields the binary cannot start without.
    pub fn validate(&self) -> Result<(), TributaryError> {
        if self.basic.tributary_key.trim().is_empty() {
            return Err(TributaryError::invalid(
                "basic.tributary_key must be set and non-empty",
            ));
        }
        if self.sync.default_cadence_secs == 0 {
            return Err(TributaryError::invalid(
                "sync.default_cadence_secs must be greater than zero",
            ));
        }
        if self.sync.upload_concurrency == 0 {
            return Err(TributaryError::invalid(
                "sync.upload_concurrency must be greater than zero",
            ));
        }
        Ok(())
    }

    pub fn code_host(&self) -> CodeHostResolvedConfig {
        self.providers.code_host.resolve(&self.providers.defaults)
    }

    pub fn workspace(&self) -> WorkspaceResolvedConfig {
        self.providers.workspace.resolve(&self.providers.defaults)
    }

    pub fn website(&self) -> WebsiteResolvedConfig {
        self.providers.website.resolve(&self.providers.defaults)
    }
}
