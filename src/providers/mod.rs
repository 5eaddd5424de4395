//! Source providers.
//!
//! A provider turns `(resource id, cursor)` into a batch of content items and the next cursor.
//! Providers never touch actor state; the cursor is opaque outside the provider that wrote it.

pub mod code_host;
pub mod http;
pub mod website;
pub mod workspace;

mod registry;

pub use registry::ProviderSet;

use crate::error::TributaryError;
use async_trait::async_trait;
use tributary_schema::{ContentItem, ProviderKind};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullOptions {
    /// Subscriber the pull runs on behalf of (first user of the resource).
    pub user_id: Option<String>,
    pub resource_id: String,
    /// Empty means "never synced".
    pub cursor: String,
}

#[derive(Debug, Clone, Default)]
pub struct PullResult {
    pub items: Vec<ContentItem>,
    /// `None` leaves the stored cursor untouched.
    pub new_cursor: Option<String>,
}

#[async_trait]
pub trait Provider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    async fn pull(&self, opts: PullOptions) -> Result<PullResult, TributaryError>;
}

/// Check `resource_id` against the format `kind` expects.
pub fn validate_resource_id(kind: ProviderKind, resource_id: &str) -> Result<(), TributaryError> {
    match kind {
        ProviderKind::CodeHost => code_host::RepoRef::parse(resource_id).map(|_| ()),
        ProviderKind::Workspace => workspace::validate_workspace_id(resource_id),
        ProviderKind::Website => website::SiteConfig::parse(resource_id).map(|_| ()),
    }
}
