use crate::db::{DbActorHandle, SyncHistoryCreate};
use crate::error::TributaryError;
use crate::providers::{ProviderSet, PullOptions};
use crate::resource::config::{ResourceConfig, ResourcePatch, ResourceRecord, actor_key};
use crate::resource::metrics::SyncCounters;
use crate::sink::ContentSink;
use crate::utils::logging::debug_sync_report;
use chrono::{DateTime, TimeDelta, Utc};
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use tributary_schema::{ProviderKind, SyncStatus};

/// A wake whose armed time is further out than this many seconds was superseded by a re-arm.
const STALE_WAKE_TOLERANCE_SECS: i64 = 1;

/// Collaborators shared by every resource actor.
#[derive(Clone)]
pub struct ResourceDeps {
    pub db: DbActorHandle,
    pub providers: Arc<ProviderSet>,
    pub sink: Arc<dyn ContentSink>,
    pub counters: Arc<SyncCounters>,
    pub upload_concurrency: usize,
    pub default_cadence_secs: u64,
}

/// Outcome of one successful sync.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub resource_id: String,
    pub provider: ProviderKind,
    pub previous_cursor: String,
    pub new_cursor: String,
    pub items_processed: usize,
    pub updated_paths: Vec<String>,
    pub uploaded_ids: Vec<String>,
    /// `None` when the history write itself failed.
    pub history_id: Option<String>,
}

#[derive(Debug)]
pub enum ResourceActorMessage {
    /// Merge, validate, persist and schedule an immediate wake.
    Initialize(
        ResourcePatch,
        RpcReplyPort<Result<ResourceConfig, TributaryError>>,
    ),
    /// Like `Initialize`, but `Conflict` when the resource id is already set to the patch's.
    InitializeIfAbsent(
        ResourcePatch,
        RpcReplyPort<Result<ResourceConfig, TributaryError>>,
    ),
    AddUser(String, RpcReplyPort<Result<ResourceConfig, TributaryError>>),
    SyncNow(RpcReplyPort<Result<SyncReport, TributaryError>>),
    Info(RpcReplyPort<ResourceConfig>),
    NextWake(RpcReplyPort<Option<DateTime<Utc>>>),

    // Internal messages (sent by the actor's own timer)
    Wake,
}

/// Handle for one resource actor.
#[derive(Clone)]
pub struct ResourceHandle {
    actor: ActorRef<ResourceActorMessage>,
    key: String,
}

impl ResourceHandle {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub(crate) fn is_alive(&self) -> bool {
        !matches!(
            self.actor.get_status(),
            ractor::ActorStatus::Stopping | ractor::ActorStatus::Stopped
        )
    }

    pub async fn initialize(&self, patch: ResourcePatch) -> Result<ResourceConfig, TributaryError> {
        ractor::call!(self.actor, ResourceActorMessage::Initialize, patch)
            .map_err(|e| TributaryError::RactorError(format!("Initialize RPC failed: {e}")))?
    }

    pub async fn initialize_if_absent(
        &self,
        patch: ResourcePatch,
    ) -> Result<ResourceConfig, TributaryError> {
        ractor::call!(self.actor, ResourceActorMessage::InitializeIfAbsent, patch).map_err(
            |e| TributaryError::RactorError(format!("InitializeIfAbsent RPC failed: {e}")),
        )?
    }

    pub async fn add_user(&self, user_id: impl Into<String>) -> Result<ResourceConfig, TributaryError> {
        ractor::call!(self.actor, ResourceActorMessage::AddUser, user_id.into())
            .map_err(|e| TributaryError::RactorError(format!("AddUser RPC failed: {e}")))?
    }

    pub async fn sync(&self) -> Result<SyncReport, TributaryError> {
        ractor::call!(self.actor, ResourceActorMessage::SyncNow)
            .map_err(|e| TributaryError::RactorError(format!("SyncNow RPC failed: {e}")))?
    }

    pub async fn info(&self) -> Result<ResourceConfig, TributaryError> {
        ractor::call!(self.actor, ResourceActorMessage::Info)
            .map_err(|e| TributaryError::RactorError(format!("Info RPC failed: {e}")))
    }

    pub async fn next_wake(&self) -> Result<Option<DateTime<Utc>>, TributaryError> {
        ractor::call!(self.actor, ResourceActorMessage::NextWake)
            .map_err(|e| TributaryError::RactorError(format!("NextWake RPC failed: {e}")))
    }

    pub(crate) fn same_actor(&self, other: &ResourceHandle) -> bool {
        self.actor.get_id() == other.actor.get_id()
    }

    pub fn stop(&self) {
        self.actor.stop(None);
    }
}

pub struct ResourceActorArgs {
    pub kind: ProviderKind,
    pub resource_id: String,
    pub deps: ResourceDeps,
}

struct ResourceActorState {
    key: String,
    record: ResourceRecord,
    timer: Option<JoinHandle<()>>,
    deps: ResourceDeps,
}

impl ResourceActorState {
    fn kind(&self) -> ProviderKind {
        self.record.config.provider_type
    }
}

struct ResourceActor;

#[ractor::async_trait]
impl Actor for ResourceActor {
    type Msg = ResourceActorMessage;
    type State = ResourceActorState;
    type Arguments = ResourceActorArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        let key = actor_key(args.kind, &args.resource_id);
        let empty = ResourceRecord::empty(args.kind, args.deps.default_cadence_secs);
        let record = match args.deps.db.load_state(&key).await? {
            Some(value) => serde_json::from_value::<ResourceRecord>(value).unwrap_or_else(|e| {
                warn!(key = %key, "discarding unreadable resource record: {e}");
                empty
            }),
            None => empty,
        };

        let mut state = ResourceActorState {
            key,
            record,
            timer: None,
            deps: args.deps,
        };

        // Missed wakes fire immediately.
        if state.record.config.is_initialized()
            && let Some(at) = state.record.next_wake_at
        {
            arm_timer(&myself, &mut state, at);
            debug!(key = %state.key, next_wake_at = %at, "Resource timer restored");
        }
        Ok(state)
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        Ok(())
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            ResourceActorMessage::Initialize(patch, reply) => {
                let res = self.initialize(&myself, state, patch).await;
                let _ = reply.send(res);
            }
            ResourceActorMessage::InitializeIfAbsent(patch, reply) => {
                let res = self.initialize_if_absent(&myself, state, patch).await;
                let _ = reply.send(res);
            }
            ResourceActorMessage::AddUser(user_id, reply) => {
                let res = self.add_user(state, &user_id).await;
                let _ = reply.send(res);
            }
            ResourceActorMessage::SyncNow(reply) => {
                let res = self.run_sync(state).await;
                let _ = reply.send(res);
            }
            ResourceActorMessage::Info(reply) => {
                let _ = reply.send(state.record.config.clone());
            }
            ResourceActorMessage::NextWake(reply) => {
                let _ = reply.send(state.record.next_wake_at);
            }
            ResourceActorMessage::Wake => {
                self.handle_wake(&myself, state).await;
            }
        }
        Ok(())
    }
}

impl ResourceActor {
    async fn initialize(
        &self,
        myself: &ActorRef<ResourceActorMessage>,
        state: &mut ResourceActorState,
        patch: ResourcePatch,
    ) -> Result<ResourceConfig, TributaryError> {
        let config = state.record.config.merge(&patch)?;
        let now = Utc::now();
        let record = ResourceRecord {
            config,
            next_wake_at: Some(now),
        };
        save_record(&state.deps.db, &state.key, &record).await?;

        state.record = record;
        arm_timer(myself, state, now);
        info!(
            key = %state.key,
            users = state.record.config.user_ids.len(),
            cadence_secs = state.record.config.cadence_secs,
            "Resource initialized"
        );
        Ok(state.record.config.clone())
    }

    async fn initialize_if_absent(
        &self,
        myself: &ActorRef<ResourceActorMessage>,
        state: &mut ResourceActorState,
        patch: ResourcePatch,
    ) -> Result<ResourceConfig, TributaryError> {
        let requested = patch.resource_id.as_deref().unwrap_or("");
        if state.record.config.is_initialized() && state.record.config.resource_id == requested {
            let plan_id = match state.deps.db.find_plan_by_resource(requested).await {
                Ok(plan) => plan.map(|p| p.id),
                Err(e) => {
                    warn!(key = %state.key, "plan lookup during conflict failed: {e}");
                    None
                }
            };
            return Err(TributaryError::conflict(
                format!("resource {requested} is already initialized"),
                plan_id,
            ));
        }
        self.initialize(myself, state, patch).await
    }

    async fn add_user(
        &self,
        state: &mut ResourceActorState,
        user_id: &str,
    ) -> Result<ResourceConfig, TributaryError> {
        let mut record = state.record.clone();
        if !record.config.push_user(user_id) {
            return Ok(record.config);
        }
        save_record(&state.deps.db, &state.key, &record).await?;
        state.record = record;
        debug!(key = %state.key, user_id, "Subscriber added");
        Ok(state.record.config.clone())
    }

    /// Pull, persist the cursor, upload, then record one history entry either way.
    async fn run_sync(&self, state: &mut ResourceActorState) -> Result<SyncReport, TributaryError> {
        if !state.record.config.is_initialized() {
            return Err(TributaryError::NotInitialized);
        }

        let started_at = Utc::now();
        let previous_cursor = state.record.config.cursor.clone();
        let user_id = state.record.config.first_user().map(str::to_string);
        let attempt = self.pull_and_upload(state, user_id.clone()).await;
        let completed_at = Utc::now();

        let config = &state.record.config;
        let mut entry = SyncHistoryCreate {
            resource_id: config.resource_id.clone(),
            provider: config.provider_type,
            user_id,
            started_at,
            completed_at,
            previous_cursor: previous_cursor.clone(),
            new_cursor: config.cursor.clone(),
            items_processed: 0,
            updated_paths: Vec::new(),
            status: SyncStatus::Success,
            error_message: None,
        };

        match attempt {
            Ok((updated_paths, uploaded_ids)) => {
                entry.items_processed = updated_paths.len() as i64;
                entry.updated_paths = updated_paths.clone();
                let history_id = match state.deps.db.create_history(entry).await {
                    Ok(history) => Some(history.id),
                    Err(e) => {
                        warn!(key = %state.key, "failed to record sync history: {e}");
                        None
                    }
                };
                let succeeded = state.deps.counters.record_success();
                info!(
                    key = %state.key,
                    items = updated_paths.len(),
                    elapsed_ms = (completed_at - started_at).num_milliseconds(),
                    syncs_succeeded = succeeded,
                    syncs_failed = state.deps.counters.failed(),
                    "Sync succeeded"
                );
                let report = SyncReport {
                    resource_id: state.record.config.resource_id.clone(),
                    provider: state.kind(),
                    previous_cursor,
                    new_cursor: state.record.config.cursor.clone(),
                    items_processed: updated_paths.len(),
                    updated_paths,
                    uploaded_ids,
                    history_id,
                };
                debug_sync_report(&state.key, &report);
                Ok(report)
            }
            Err(err) => {
                entry.status = SyncStatus::Error;
                entry.error_message = Some(err.to_string());
                if let Err(e) = state.deps.db.create_history(entry).await {
                    warn!(key = %state.key, "failed to record sync failure: {e}");
                }
                let failed = state.deps.counters.record_failure();
                warn!(
                    key = %state.key,
                    syncs_succeeded = state.deps.counters.succeeded(),
                    syncs_failed = failed,
                    "Sync failed: {err}"
                );
                Err(err)
            }
        }
    }

    /// Returns `(updated paths, sink ids)`.
    async fn pull_and_upload(
        &self,
        state: &mut ResourceActorState,
        user_id: Option<String>,
    ) -> Result<(Vec<String>, Vec<String>), TributaryError> {
        let provider = state.deps.providers.get(state.kind())?;
        let pulled = provider
            .pull(PullOptions {
                user_id,
                resource_id: state.record.config.resource_id.clone(),
                cursor: state.record.config.cursor.clone(),
            })
            .await?;

        if let Some(cursor) = pulled.new_cursor.filter(|c| !c.is_empty())
            && cursor != state.record.config.cursor
        {
            let mut record = state.record.clone();
            record.config.cursor = cursor;
            save_record(&state.deps.db, &state.key, &record).await?;
            state.record = record;
        }

        let uploaded_ids = state
            .deps
            .sink
            .upload(&pulled.items, state.deps.upload_concurrency)
            .await?;
        let updated_paths = pulled
            .items
            .iter()
            .map(|item| item.path().to_string())
            .collect();
        Ok((updated_paths, uploaded_ids))
    }

    async fn handle_wake(
        &self,
        myself: &ActorRef<ResourceActorMessage>,
        state: &mut ResourceActorState,
    ) {
        match state.deps.db.load_state(&state.key).await {
            Ok(Some(value)) => match serde_json::from_value::<ResourceRecord>(value) {
                Ok(record) => state.record = record,
                Err(e) => warn!(key = %state.key, "unreadable record on wake, using memory: {e}"),
            },
            Ok(None) => {}
            Err(e) => warn!(key = %state.key, "record reload on wake failed, using memory: {e}"),
        }

        if let Some(at) = state.record.next_wake_at
            && at > Utc::now() + TimeDelta::seconds(STALE_WAKE_TOLERANCE_SECS)
        {
            debug!(key = %state.key, next_wake_at = %at, "Ignoring superseded wake");
            return;
        }
        state.timer = None;

        if !state.record.config.is_initialized() {
            debug!(key = %state.key, "Wake on uninitialized resource, not rescheduling");
            state.record.next_wake_at = None;
            return;
        }

        // Failures are recorded in history; the schedule continues regardless.
        let _ = self.run_sync(state).await;

        let next = Utc::now() + TimeDelta::seconds(state.record.config.cadence_secs as i64);
        state.record.next_wake_at = Some(next);
        arm_timer(myself, state, next);
        if let Err(e) = save_record(&state.deps.db, &state.key, &state.record).await {
            warn!(key = %state.key, "failed to persist next wake: {e}");
        }
        debug!(key = %state.key, next_wake_at = %next, "Resource rescheduled");
    }
}

/// Replace the armed timer with one firing at `at` (immediately when in the past).
fn arm_timer(
    myself: &ActorRef<ResourceActorMessage>,
    state: &mut ResourceActorState,
    at: DateTime<Utc>,
) {
    if let Some(timer) = state.timer.take() {
        timer.abort();
    }
    let delay = (at - Utc::now()).to_std().unwrap_or_default();
    let actor = myself.clone();
    state.timer = Some(tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let _ = actor.cast(ResourceActorMessage::Wake);
    }));
}

async fn save_record(
    db: &DbActorHandle,
    key: &str,
    record: &ResourceRecord,
) -> Result<(), TributaryError> {
    db.save_state(key, serde_json::to_value(record)?).await
}

pub async fn spawn(args: ResourceActorArgs) -> Result<ResourceHandle, TributaryError> {
    let key = actor_key(args.kind, &args.resource_id);
    let (actor, _jh) = Actor::spawn(None, ResourceActor, args)
        .await
        .map_err(|e| TributaryError::RactorError(format!("failed to spawn ResourceActor: {e}")))?;
    Ok(ResourceHandle { actor, key })
}
