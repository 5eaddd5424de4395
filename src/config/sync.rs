use serde::{Deserialize, Serialize};

/// Scheduling and upload settings shared by every resource actor.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SyncConfig {
    /// Cadence applied when a registration does not carry one.
    /// TOML: `sync.default_cadence_secs`. Default: `3600`.
    #[serde(default = "default_cadence_secs")]
    pub default_cadence_secs: u64,

    /// Respawn every initialized resource at startup and re-arm its timer.
    /// TOML: `sync.restore_on_start`. Default: `true`.
    #[serde(default = "default_restore_on_start")]
    pub restore_on_start: bool,

    /// Max concurrent uploads per sync.
    /// TOML: `sync.upload_concurrency`. Default: `4`.
    #[serde(default = "default_upload_concurrency")]
    pub upload_concurrency: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            default_cadence_secs: default_cadence_secs(),
            restore_on_start: default_restore_on_start(),
            upload_concurrency: default_upload_concurrency(),
        }
    }
}

fn default_cadence_secs() -> u64 {
    3600
}

fn default_restore_on_start() -> bool {
    true
}

fn default_upload_concurrency() -> usize {
    4
}
