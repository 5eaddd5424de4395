use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use sqlx::types::Json;
use tributary_schema::{ProviderKind, SyncStatus};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbResourceState {
    pub actor_key: String,
    pub record: Json<Value>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DbSyncPlan {
    pub id: String,
    #[sqlx(try_from = "String")]
    pub provider: ProviderKind,
    pub resource_id: String,
    pub user_ids: Json<Vec<String>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DbSyncHistory {
    pub id: String,
    pub sync_plan_id: String,
    pub resource_id: String,
    #[sqlx(try_from = "String")]
    pub provider: ProviderKind,
    pub user_id: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub previous_cursor: String,
    pub new_cursor: String,
    pub items_processed: i64,
    pub updated_paths: Json<Vec<String>>,
    #[sqlx(try_from = "String")]
    pub status: SyncStatus,
    pub error_message: Option<String>,
}
