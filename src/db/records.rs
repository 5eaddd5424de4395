use chrono::{DateTime, Utc};
use tributary_schema::{ProviderKind, SyncStatus};

#[derive(Debug, Clone)]
pub struct SyncPlanCreate {
    pub provider: ProviderKind,
    pub resource_id: String,
    pub user_id: Option<String>,
}

/// One concluded sync attempt. The plan row is resolved (or created) by the store.
#[derive(Debug, Clone)]
pub struct SyncHistoryCreate {
    pub resource_id: String,
    pub provider: ProviderKind,
    pub user_id: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub previous_cursor: String,
    pub new_cursor: String,
    pub items_processed: i64,
    pub updated_paths: Vec<String>,
    pub status: SyncStatus,
    pub error_message: Option<String>,
}

/// History lookup key; results are always most-recent-first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryQuery {
    Resource(String),
    User(String),
    Plan(String),
}
