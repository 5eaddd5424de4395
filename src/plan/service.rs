use crate::db::{DbActorHandle, DbSyncHistory, DbSyncPlan, HistoryQuery, SyncPlanCreate};
use crate::error::TributaryError;
use crate::providers::validate_resource_id;
use crate::resource::{ResourceConfig, ResourcePatch, ResourceRegistry, SyncReport};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};
use tributary_schema::ProviderKind;

pub const DEFAULT_HISTORY_LIMIT: u32 = 50;
pub const MAX_HISTORY_LIMIT: u32 = 500;

pub fn clamp_history_limit(limit: Option<u32>) -> u32 {
    limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub plan: DbSyncPlan,
    pub config: ResourceConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceInfo {
    pub config: ResourceConfig,
    pub next_wake_at: Option<DateTime<Utc>>,
}

/// Orchestrates plan rows and resource actors. Holds no state of its own.
#[derive(Clone)]
pub struct SyncPlanService {
    db: DbActorHandle,
    registry: Arc<ResourceRegistry>,
    default_cadence_secs: u64,
}

impl SyncPlanService {
    pub fn new(db: DbActorHandle, registry: Arc<ResourceRegistry>, default_cadence_secs: u64) -> Self {
        Self {
            db,
            registry,
            default_cadence_secs,
        }
    }

    pub fn registry(&self) -> &Arc<ResourceRegistry> {
        &self.registry
    }

    /// `Conflict` (with the existing id) when the resource already has a plan.
    pub async fn create_sync_plan(
        &self,
        provider: ProviderKind,
        resource_id: &str,
        user_id: Option<&str>,
    ) -> Result<DbSyncPlan, TributaryError> {
        validate_resource_id(provider, resource_id)?;
        let plan = self
            .db
            .create_plan(SyncPlanCreate {
                provider,
                resource_id: resource_id.to_string(),
                user_id: user_id.map(str::to_string),
            })
            .await?;
        info!(plan_id = %plan.id, %provider, resource_id, "Sync plan created");
        Ok(plan)
    }

    /// Idempotently add `user_id` to the plan and, when initialized, to its actor.
    pub async fn attach_user(
        &self,
        plan_id: &str,
        user_id: &str,
    ) -> Result<DbSyncPlan, TributaryError> {
        let plan = self.db.add_plan_user(plan_id, user_id).await?;
        if let Some(handle) = self
            .registry
            .get_initialized(plan.provider, &plan.resource_id)
            .await?
        {
            handle.add_user(user_id).await?;
        }
        Ok(plan)
    }

    /// Initialize the actor for `resource_id`; `Conflict` when it already holds this resource.
    pub async fn initialize_resource(
        &self,
        resource_id: &str,
        provider: ProviderKind,
        user_id: Option<&str>,
        cadence_secs: Option<u64>,
    ) -> Result<ResourceConfig, TributaryError> {
        validate_resource_id(provider, resource_id)?;
        let handle = self.registry.get_or_spawn(provider, resource_id).await?;
        let result = handle
            .initialize_if_absent(ResourcePatch {
                resource_id: Some(resource_id.to_string()),
                provider_type: Some(provider),
                user_ids: user_id.map(str::to_string).into_iter().collect(),
                cadence_secs: Some(cadence_secs.unwrap_or(self.default_cadence_secs)),
                cursor: None,
            })
            .await;

        // A rejected patch must not leave an empty actor behind.
        if let Err(TributaryError::InvalidConfiguration(_)) = &result
            && !handle.info().await?.is_initialized()
        {
            self.registry.evict(&handle).await;
        }
        result
    }

    /// Attach `user_id` (when given) and run one sync now.
    pub async fn sync_resource(
        &self,
        resource_id: &str,
        provider: ProviderKind,
        user_id: Option<&str>,
    ) -> Result<SyncReport, TributaryError> {
        validate_resource_id(provider, resource_id)?;
        let handle = self
            .registry
            .get_initialized(provider, resource_id)
            .await?
            .ok_or(TributaryError::NotInitialized)?;

        if let Some(user_id) = user_id.filter(|u| !u.trim().is_empty()) {
            handle.add_user(user_id).await?;
            if let Some(plan) = self.db.find_plan_by_resource(resource_id).await? {
                self.db.add_plan_user(&plan.id, user_id).await?;
            }
        }
        handle.sync().await
    }

    /// Initialize the actor and create the plan row.
    ///
    /// When the actor already holds the resource the user is attached to the existing plan
    /// and actor, and `Conflict` carries the existing plan id.
    pub async fn register_resource(
        &self,
        provider: ProviderKind,
        resource_id: &str,
        user_id: Option<&str>,
        cadence_secs: Option<u64>,
    ) -> Result<Registration, TributaryError> {
        let config = match self
            .initialize_resource(resource_id, provider, user_id, cadence_secs)
            .await
        {
            Ok(config) => config,
            Err(TributaryError::Conflict { .. }) => {
                return Err(self.join_existing(provider, resource_id, user_id).await?);
            }
            Err(e) => return Err(e),
        };

        // The actor is ours; a plan row may already exist because its first wake recorded
        // history before we got here.
        let plan = match self.create_sync_plan(provider, resource_id, user_id).await {
            Ok(plan) => plan,
            Err(TributaryError::Conflict { .. }) => {
                let plan = self.get_sync_plan(resource_id).await?;
                match user_id.filter(|u| !u.trim().is_empty()) {
                    Some(user_id) => self.db.add_plan_user(&plan.id, user_id).await?,
                    None => plan,
                }
            }
            Err(e) => return Err(e),
        };
        Ok(Registration { plan, config })
    }

    /// Attach the user to the existing registration and build the `Conflict` to report.
    async fn join_existing(
        &self,
        provider: ProviderKind,
        resource_id: &str,
        user_id: Option<&str>,
    ) -> Result<TributaryError, TributaryError> {
        let plan = match self.db.find_plan_by_resource(resource_id).await? {
            Some(plan) => plan,
            // The actor exists but its plan row was never written.
            None => match self.create_sync_plan(provider, resource_id, user_id).await {
                Ok(plan) => plan,
                Err(TributaryError::Conflict { .. }) => self
                    .db
                    .find_plan_by_resource(resource_id)
                    .await?
                    .ok_or_else(|| TributaryError::NotFound(format!("plan for {resource_id}")))?,
                Err(e) => return Err(e),
            },
        };

        if let Some(user_id) = user_id.filter(|u| !u.trim().is_empty()) {
            self.db.add_plan_user(&plan.id, user_id).await?;
            if let Some(handle) = self
                .registry
                .get_initialized(plan.provider, &plan.resource_id)
                .await?
            {
                handle.add_user(user_id).await?;
            }
        }
        debug!(plan_id = %plan.id, resource_id, "Registration joined existing plan");

        Ok(TributaryError::conflict(
            format!("resource {resource_id} is already registered"),
            Some(plan.id),
        ))
    }

    pub async fn get_sync_plan(&self, resource_id: &str) -> Result<DbSyncPlan, TributaryError> {
        self.db
            .find_plan_by_resource(resource_id)
            .await?
            .ok_or_else(|| TributaryError::NotFound(format!("no sync plan for {resource_id}")))
    }

    pub async fn resource_info(
        &self,
        provider: ProviderKind,
        resource_id: &str,
    ) -> Result<ResourceInfo, TributaryError> {
        validate_resource_id(provider, resource_id)?;
        let handle = self
            .registry
            .get_initialized(provider, resource_id)
            .await?
            .ok_or(TributaryError::NotInitialized)?;
        let config = handle.info().await?;
        Ok(ResourceInfo {
            config,
            next_wake_at: handle.next_wake().await?,
        })
    }

    pub async fn history_by_resource(
        &self,
        resource_id: &str,
        limit: Option<u32>,
    ) -> Result<Vec<DbSyncHistory>, TributaryError> {
        self.history(HistoryQuery::Resource(resource_id.to_string()), limit)
            .await
    }

    pub async fn history_by_user(
        &self,
        user_id: &str,
        limit: Option<u32>,
    ) -> Result<Vec<DbSyncHistory>, TributaryError> {
        self.history(HistoryQuery::User(user_id.to_string()), limit)
            .await
    }

    pub async fn history_by_plan(
        &self,
        plan_id: &str,
        limit: Option<u32>,
    ) -> Result<Vec<DbSyncHistory>, TributaryError> {
        self.history(HistoryQuery::Plan(plan_id.to_string()), limit)
            .await
    }

    async fn history(
        &self,
        query: HistoryQuery,
        limit: Option<u32>,
    ) -> Result<Vec<DbSyncHistory>, TributaryError> {
        self.db
            .list_history(query, clamp_history_limit(limit))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_limit_defaults_and_clamps() {
        assert_eq!(clamp_history_limit(None), DEFAULT_HISTORY_LIMIT);
        assert_eq!(clamp_history_limit(Some(0)), 1);
        assert_eq!(clamp_history_limit(Some(10)), 10);
        assert_eq!(clamp_history_limit(Some(10_000)), MAX_HISTORY_LIMIT);
    }
}
