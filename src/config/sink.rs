use serde::{Deserialize, Serialize};
use url::Url;

/// Downstream content store.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct SinkConfig {
    /// Ingestion endpoint receiving one JSON item per POST.
    /// TOML: `sink.url`. When unset, items are kept in memory (dry run).
    #[serde(default)]
    pub url: Option<Url>,

    /// Bearer token for the ingestion endpoint.
    /// TOML: `sink.token`.
    #[serde(default)]
    pub token: Option<String>,
}
