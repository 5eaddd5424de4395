use crate::db::models::{DbResourceState, DbSyncHistory, DbSyncPlan};
use crate::db::records::{HistoryQuery, SyncHistoryCreate, SyncPlanCreate};
use crate::db::schema::SQLITE_INIT;
use crate::error::TributaryError;
use chrono::Utc;
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::types::Json;
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::{str::FromStr, time::Duration};
use tracing::{debug, info};
use uuid::Uuid;

const PLAN_COLUMNS: &str = "id, provider, resource_id, user_ids, created_at, updated_at";
const HISTORY_COLUMNS: &str = "h.id, h.sync_plan_id, h.resource_id, h.provider, h.user_id, \
     h.started_at, h.completed_at, h.previous_cursor, h.new_cursor, h.items_processed, \
     h.updated_paths, h.status, h.error_message";

#[derive(Debug)]
pub enum DbActorMessage {
    /// Load the durable record of one resource actor.
    LoadState(String, RpcReplyPort<Result<Option<Value>, TributaryError>>),

    /// Replace the durable record of one resource actor.
    SaveState(String, Value, RpcReplyPort<Result<(), TributaryError>>),

    /// List every persisted resource actor record.
    ListStates(RpcReplyPort<Result<Vec<DbResourceState>, TributaryError>>),

    /// Insert a plan row; `Conflict` when the resource id already has one.
    CreatePlan(SyncPlanCreate, RpcReplyPort<Result<DbSyncPlan, TributaryError>>),

    FindPlanByResource(String, RpcReplyPort<Result<Option<DbSyncPlan>, TributaryError>>),

    GetPlan(String, RpcReplyPort<Result<Option<DbSyncPlan>, TributaryError>>),

    /// Append a user to a plan (idempotent); `NotFound` for unknown plans.
    AddPlanUser(String, String, RpcReplyPort<Result<DbSyncPlan, TributaryError>>),

    /// Append one history entry, creating the plan row first when absent.
    CreateHistory(
        SyncHistoryCreate,
        RpcReplyPort<Result<DbSyncHistory, TributaryError>>,
    ),

    ListHistory(
        HistoryQuery,
        u32,
        RpcReplyPort<Result<Vec<DbSyncHistory>, TributaryError>>,
    ),
}

#[derive(Clone)]
pub struct DbActorHandle {
    actor: ActorRef<DbActorMessage>,
}

impl DbActorHandle {
    pub async fn load_state(&self, key: &str) -> Result<Option<Value>, TributaryError> {
        ractor::call!(self.actor, DbActorMessage::LoadState, key.to_string())
            .map_err(|e| TributaryError::RactorError(format!("DbActor LoadState RPC failed: {e}")))?
    }

    pub async fn save_state(&self, key: &str, record: Value) -> Result<(), TributaryError> {
        ractor::call!(self.actor, DbActorMessage::SaveState, key.to_string(), record)
            .map_err(|e| TributaryError::RactorError(format!("DbActor SaveState RPC failed: {e}")))?
    }

    pub async fn list_states(&self) -> Result<Vec<DbResourceState>, TributaryError> {
        ractor::call!(self.actor, DbActorMessage::ListStates).map_err(|e| {
            TributaryError::RactorError(format!("DbActor ListStates RPC failed: {e}"))
        })?
    }

    pub async fn create_plan(&self, create: SyncPlanCreate) -> Result<DbSyncPlan, TributaryError> {
        ractor::call!(self.actor, DbActorMessage::CreatePlan, create).map_err(|e| {
            TributaryError::RactorError(format!("DbActor CreatePlan RPC failed: {e}"))
        })?
    }

    pub async fn find_plan_by_resource(
        &self,
        resource_id: &str,
    ) -> Result<Option<DbSyncPlan>, TributaryError> {
        ractor::call!(
            self.actor,
            DbActorMessage::FindPlanByResource,
            resource_id.to_string()
        )
        .map_err(|e| {
            TributaryError::RactorError(format!("DbActor FindPlanByResource RPC failed: {e}"))
        })?
    }

    pub async fn get_plan(&self, plan_id: &str) -> Result<Option<DbSyncPlan>, TributaryError> {
        ractor::call!(self.actor, DbActorMessage::GetPlan, plan_id.to_string())
            .map_err(|e| TributaryError::RactorError(format!("DbActor GetPlan RPC failed: {e}")))?
    }

    pub async fn add_plan_user(
        &self,
        plan_id: &str,
        user_id: &str,
    ) -> Result<DbSyncPlan, TributaryError> {
        ractor::call!(
            self.actor,
            DbActorMessage::AddPlanUser,
            plan_id.to_string(),
            user_id.to_string()
        )
        .map_err(|e| TributaryError::RactorError(format!("DbActor AddPlanUser RPC failed: {e}")))?
    }

    pub async fn create_history(
        &self,
        create: SyncHistoryCreate,
    ) -> Result<DbSyncHistory, TributaryError> {
        ractor::call!(self.actor, DbActorMessage::CreateHistory, create).map_err(|e| {
            TributaryError::RactorError(format!("DbActor CreateHistory RPC failed: {e}"))
        })?
    }

    pub async fn list_history(
        &self,
        query: HistoryQuery,
        limit: u32,
    ) -> Result<Vec<DbSyncHistory>, TributaryError> {
        ractor::call!(self.actor, DbActorMessage::ListHistory, query, limit).map_err(|e| {
            TributaryError::RactorError(format!("DbActor ListHistory RPC failed: {e}"))
        })?
    }
}

struct DbActorState {
    pool: SqlitePool,
}

struct DbActor;

#[ractor::async_trait]
impl Actor for DbActor {
    type Msg = DbActorMessage;
    type State = DbActorState;
    type Arguments = String;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        database_url: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        let connect_opts = SqliteConnectOptions::from_str(database_url.as_str())
            .map_err(|e| ActorProcessingErr::from(format!("invalid database url: {e}")))?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5))
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .connect_with(connect_opts)
            .await
            .map_err(|e| ActorProcessingErr::from(format!("db connect failed: {e}")))?;

        apply_schema(&pool)
            .await
            .map_err(|e| ActorProcessingErr::from(format!("db schema init failed: {e}")))?;

        info!("DbActor initialized");
        Ok(DbActorState { pool })
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            DbActorMessage::LoadState(key, reply) => {
                let res = self.load_state(&state.pool, &key).await;
                let _ = reply.send(res);
            }
            DbActorMessage::SaveState(key, record, reply) => {
                let res = self.save_state(&state.pool, &key, record).await;
                let _ = reply.send(res);
            }
            DbActorMessage::ListStates(reply) => {
                let res = self.list_states(&state.pool).await;
                let _ = reply.send(res);
            }
            DbActorMessage::CreatePlan(create, reply) => {
                let res = self.create_plan(&state.pool, create).await;
                let _ = reply.send(res);
            }
            DbActorMessage::FindPlanByResource(resource_id, reply) => {
                let res = self.find_plan_by_resource(&state.pool, &resource_id).await;
                let _ = reply.send(res);
            }
            DbActorMessage::GetPlan(plan_id, reply) => {
                let res = self.get_plan(&state.pool, &plan_id).await;
                let _ = reply.send(res);
            }
            DbActorMessage::AddPlanUser(plan_id, user_id, reply) => {
                let res = self.add_plan_user(&state.pool, &plan_id, &user_id).await;
                let _ = reply.send(res);
            }
            DbActorMessage::CreateHistory(create, reply) => {
                let res = self.create_history(&state.pool, create).await;
                let _ = reply.send(res);
            }
            DbActorMessage::ListHistory(query, limit, reply) => {
                let res = self.list_history(&state.pool, query, limit).await;
                let _ = reply.send(res);
            }
        }
        Ok(())
    }
}

impl DbActor {
    async fn load_state(
        &self,
        pool: &SqlitePool,
        key: &str,
    ) -> Result<Option<Value>, TributaryError> {
        let row: Option<Json<Value>> =
            sqlx::query_scalar("SELECT record FROM resource_state WHERE actor_key = ?")
                .bind(key)
                .fetch_optional(pool)
                .await?;
        Ok(row.map(|Json(value)| value))
    }

    async fn save_state(
        &self,
        pool: &SqlitePool,
        key: &str,
        record: Value,
    ) -> Result<(), TributaryError> {
        sqlx::query(
            r#"
        INSERT INTO resource_state (actor_key, record, updated_at)
        VALUES (?, ?, ?)
        ON CONFLICT(actor_key) DO UPDATE SET
            record = excluded.record,
            updated_at = excluded.updated_at
        "#,
        )
        .bind(key)
        .bind(Json(record))
        .bind(Utc::now())
        .execute(pool)
        .await?;
        Ok(())
    }

    async fn list_states(&self, pool: &SqlitePool) -> Result<Vec<DbResourceState>, TributaryError> {
        let rows = sqlx::query_as::<_, DbResourceState>(
            "SELECT actor_key, record, updated_at FROM resource_state ORDER BY actor_key",
        )
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }

    async fn create_plan(
        &self,
        pool: &SqlitePool,
        create: SyncPlanCreate,
    ) -> Result<DbSyncPlan, TributaryError> {
        if let Some(existing) = self.find_plan_by_resource(pool, &create.resource_id).await? {
            return Err(TributaryError::conflict(
                format!("sync plan already exists for {}", create.resource_id),
                Some(existing.id),
            ));
        }

        let mut tx = pool.begin().await?;
        let plan = insert_plan(&mut tx, &create).await?;
        tx.commit().await?;

        debug!(plan_id = %plan.id, resource_id = %plan.resource_id, "sync plan created");
        Ok(plan)
    }

    async fn find_plan_by_resource(
        &self,
        pool: &SqlitePool,
        resource_id: &str,
    ) -> Result<Option<DbSyncPlan>, TributaryError> {
        let row = sqlx::query_as::<_, DbSyncPlan>(&format!(
            "SELECT {PLAN_COLUMNS} FROM sync_plans WHERE resource_id = ?"
        ))
        .bind(resource_id)
        .fetch_optional(pool)
        .await?;
        Ok(row)
    }

    async fn get_plan(
        &self,
        pool: &SqlitePool,
        plan_id: &str,
    ) -> Result<Option<DbSyncPlan>, TributaryError> {
        let row = sqlx::query_as::<_, DbSyncPlan>(&format!(
            "SELECT {PLAN_COLUMNS} FROM sync_plans WHERE id = ?"
        ))
        .bind(plan_id)
        .fetch_optional(pool)
        .await?;
        Ok(row)
    }

    async fn add_plan_user(
        &self,
        pool: &SqlitePool,
        plan_id: &str,
        user_id: &str,
    ) -> Result<DbSyncPlan, TributaryError> {
        let Some(mut plan) = self.get_plan(pool, plan_id).await? else {
            return Err(TributaryError::NotFound(format!("sync plan {plan_id}")));
        };

        if user_id.is_empty() || plan.user_ids.0.iter().any(|u| u == user_id) {
            return Ok(plan);
        }

        let now = Utc::now();
        plan.user_ids.0.push(user_id.to_string());
        plan.updated_at = now;

        sqlx::query("UPDATE sync_plans SET user_ids = ?, updated_at = ? WHERE id = ?")
            .bind(&plan.user_ids)
            .bind(now)
            .bind(plan_id)
            .execute(pool)
            .await?;

        Ok(plan)
    }

    async fn create_history(
        &self,
        pool: &SqlitePool,
        create: SyncHistoryCreate,
    ) -> Result<DbSyncHistory, TributaryError> {
        let mut tx = pool.begin().await?;

        let existing: Option<String> =
            sqlx::query_scalar("SELECT id FROM sync_plans WHERE resource_id = ?")
                .bind(&create.resource_id)
                .fetch_optional(&mut *tx)
                .await?;

        let sync_plan_id = match existing {
            Some(id) => id,
            None => {
                let plan = insert_plan(
                    &mut tx,
                    &SyncPlanCreate {
                        provider: create.provider,
                        resource_id: create.resource_id.clone(),
                        user_id: create.user_id.clone(),
                    },
                )
                .await?;
                debug!(plan_id = %plan.id, resource_id = %plan.resource_id, "sync plan created lazily");
                plan.id
            }
        };

        let entry = DbSyncHistory {
            id: Uuid::new_v4().to_string(),
            sync_plan_id,
            resource_id: create.resource_id,
            provider: create.provider,
            user_id: create.user_id,
            started_at: create.started_at,
            completed_at: create.completed_at,
            previous_cursor: create.previous_cursor,
            new_cursor: create.new_cursor,
            items_processed: create.items_processed,
            updated_paths: Json(create.updated_paths),
            status: create.status,
            error_message: create.error_message,
        };

        sqlx::query(
            r#"
        INSERT INTO sync_history (
            id, sync_plan_id, resource_id, provider, user_id, started_at, completed_at,
            previous_cursor, new_cursor, items_processed, updated_paths, status, error_message
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        )
        .bind(&entry.id)
        .bind(&entry.sync_plan_id)
        .bind(&entry.resource_id)
        .bind(entry.provider.as_str())
        .bind(&entry.user_id)
        .bind(entry.started_at)
        .bind(entry.completed_at)
        .bind(&entry.previous_cursor)
        .bind(&entry.new_cursor)
        .bind(entry.items_processed)
        .bind(&entry.updated_paths)
        .bind(entry.status.as_str())
        .bind(&entry.error_message)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(entry)
    }

    async fn list_history(
        &self,
        pool: &SqlitePool,
        query: HistoryQuery,
        limit: u32,
    ) -> Result<Vec<DbSyncHistory>, TributaryError> {
        let rows = match query {
            HistoryQuery::Resource(resource_id) => {
                sqlx::query_as::<_, DbSyncHistory>(&format!(
                    "SELECT {HISTORY_COLUMNS} FROM sync_history h \
                     WHERE h.resource_id = ? ORDER BY h.seq DESC LIMIT ?"
                ))
                .bind(resource_id)
                .bind(limit)
                .fetch_all(pool)
                .await?
            }
            HistoryQuery::Plan(plan_id) => {
                sqlx::query_as::<_, DbSyncHistory>(&format!(
                    "SELECT {HISTORY_COLUMNS} FROM sync_history h \
                     WHERE h.sync_plan_id = ? ORDER BY h.seq DESC LIMIT ?"
                ))
                .bind(plan_id)
                .bind(limit)
                .fetch_all(pool)
                .await?
            }
            HistoryQuery::User(user_id) => {
                // Attempts run on behalf of the first subscriber; later subscribers see them
                // through the plan's user list.
                sqlx::query_as::<_, DbSyncHistory>(&format!(
                    "SELECT {HISTORY_COLUMNS} FROM sync_history h \
                     WHERE h.user_id = ? OR h.sync_plan_id IN ( \
                         SELECT p.id FROM sync_plans p, json_each(p.user_ids) u \
                         WHERE u.value = ? \
                     ) \
                     ORDER BY h.seq DESC LIMIT ?"
                ))
                .bind(&user_id)
                .bind(&user_id)
                .bind(limit)
                .fetch_all(pool)
                .await?
            }
        };
        Ok(rows)
    }
}

async fn insert_plan(
    tx: &mut Transaction<'_, Sqlite>,
    create: &SyncPlanCreate,
) -> Result<DbSyncPlan, TributaryError> {
    let now = Utc::now();
    let user_ids: Vec<String> = create
        .user_id
        .iter()
        .filter(|u| !u.is_empty())
        .cloned()
        .collect();

    let plan = DbSyncPlan {
        id: Uuid::new_v4().to_string(),
        provider: create.provider,
        resource_id: create.resource_id.clone(),
        user_ids: Json(user_ids),
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"
    INSERT INTO sync_plans (id, provider, resource_id, user_ids, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?)
    "#,
    )
    .bind(&plan.id)
    .bind(plan.provider.as_str())
    .bind(&plan.resource_id)
    .bind(&plan.user_ids)
    .bind(plan.created_at)
    .bind(plan.updated_at)
    .execute(&mut **tx)
    .await?;

    Ok(plan)
}

/// Spawn the database actor and return a cloneable handle.
///
/// The actor is unnamed so several stores (tests, tools) can live in one process.
pub async fn spawn(database_url: &str) -> Result<DbActorHandle, TributaryError> {
    let (actor, _jh) = ractor::Actor::spawn(None, DbActor, database_url.to_string())
        .await
        .map_err(|e| TributaryError::RactorError(format!("failed to spawn DbActor: {e}")))?;

    Ok(DbActorHandle { actor })
}

async fn apply_schema(pool: &SqlitePool) -> Result<(), TributaryError> {
    for stmt in SQLITE_INIT.split(';') {
        let s = stmt.trim();
        if s.is_empty() {
            continue;
        }
        sqlx::query(s).execute(pool).await?;
    }
    Ok(())
}
