use crate::config::Config;
use crate::error::TributaryError;
use crate::providers::Provider;
use crate::providers::code_host::CodeHostProvider;
use crate::providers::website::WebsiteProvider;
use crate::providers::workspace::WorkspaceProvider;
use ahash::AHashMap;
use std::sync::Arc;
use tracing::info;
use tributary_schema::ProviderKind;

/// Dispatch table from provider kind to implementation.
#[derive(Clone, Default)]
pub struct ProviderSet {
    providers: AHashMap<ProviderKind, Arc<dyn Provider>>,
}

impl ProviderSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every provider from the effective configuration.
    pub fn from_config(cfg: &Config) -> Result<Self, TributaryError> {
        let provider_defaults = &cfg.providers.defaults;
        let code_host_cfg = cfg.code_host();
        let workspace_cfg = cfg.workspace();
        let website_cfg = cfg.website();

        // Log resolved provider configs here so `main` stays wiring-only.
        info!(
            providers_defaults_proxy = %provider_defaults.proxy.as_ref().map(|u| u.as_str()).unwrap_or("<none>"),
            providers_defaults_enable_multiplexing = provider_defaults.enable_multiplexing,
            providers_defaults_retry_max_times = provider_defaults.retry_max_times,
            providers_defaults_retry_min_delay_ms = provider_defaults.retry_min_delay_ms,
            "Provider defaults loaded"
        );
        info!(
            code_host_api_url = %code_host_cfg.api_url,
            code_host_token = code_host_cfg.token.is_some(),
            code_host_ignore_patterns = ?code_host_cfg.ignore_patterns,
            code_host_max_file_bytes = code_host_cfg.max_file_bytes,
            code_host_retry_max_times = code_host_cfg.client.retry_max_times,
            "Code-host config (effective)"
        );
        info!(
            workspace_api_url = %workspace_cfg.api_url,
            workspace_token = workspace_cfg.token.is_some(),
            workspace_api_version = %workspace_cfg.api_version,
            workspace_page_size = workspace_cfg.page_size,
            workspace_requests_per_second = workspace_cfg.requests_per_second,
            "Workspace config (effective)"
        );
        info!(
            website_user_agent = %website_cfg.user_agent,
            website_delay_ms = website_cfg.delay_ms,
            website_max_depth = website_cfg.max_depth,
            website_max_pages = website_cfg.max_pages,
            website_respect_robots = website_cfg.respect_robots,
            "Website config (effective)"
        );

        let mut set = Self::new();
        set.register(Arc::new(CodeHostProvider::new(code_host_cfg)?));
        set.register(Arc::new(WorkspaceProvider::new(workspace_cfg)?));
        set.register(Arc::new(WebsiteProvider::new(website_cfg)?));
        Ok(set)
    }

    /// Register (or replace) the implementation for `provider.kind()`.
    pub fn register(&mut self, provider: Arc<dyn Provider>) -> &mut Self {
        self.providers.insert(provider.kind(), provider);
        self
    }

    pub fn get(&self, kind: ProviderKind) -> Result<Arc<dyn Provider>, TributaryError> {
        self.providers.get(&kind).cloned().ok_or_else(|| {
            TributaryError::InvalidConfiguration(format!("no provider registered for {kind}"))
        })
    }
}
