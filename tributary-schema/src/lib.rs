pub mod content;
pub mod provider;
pub mod status;

pub use content::{ContentItem, ContentMetadata, METADATA_END, METADATA_START};
pub use provider::{ParseProviderKindError, ProviderKind};
pub use status::{ParseSyncStatusError, SyncStatus};
