use crate::config::Config;
use crate::db::DbActorHandle;
use crate::error::TributaryError;
use crate::plan::SyncPlanService;
use crate::providers::ProviderSet;
use crate::resource::{ResourceDeps, ResourceRegistry, SyncCounters};
use crate::sink::{self, ContentSink};
use std::sync::Arc;
use tracing::info;

/// Everything the control surface and the scheduler share.
#[derive(Clone)]
pub struct Services {
    pub db: DbActorHandle,
    pub registry: Arc<ResourceRegistry>,
    pub plans: SyncPlanService,
    pub counters: Arc<SyncCounters>,
}

impl Services {
    /// Wire services from explicit collaborators.
    pub fn assemble(
        cfg: &Config,
        db: DbActorHandle,
        providers: ProviderSet,
        sink: Arc<dyn ContentSink>,
    ) -> Self {
        let counters = Arc::new(SyncCounters::new());
        let registry = Arc::new(ResourceRegistry::new(ResourceDeps {
            db: db.clone(),
            providers: Arc::new(providers),
            sink,
            counters: counters.clone(),
            upload_concurrency: cfg.sync.upload_concurrency.max(1),
            default_cadence_secs: cfg.sync.default_cadence_secs,
        }));
        let plans = SyncPlanService::new(db.clone(), registry.clone(), cfg.sync.default_cadence_secs);

        info!(
            sync_default_cadence_secs = cfg.sync.default_cadence_secs,
            sync_upload_concurrency = cfg.sync.upload_concurrency,
            sync_restore_on_start = cfg.sync.restore_on_start,
            "Sync config (effective)"
        );

        Self {
            db,
            registry,
            plans,
            counters,
        }
    }

    /// Build providers and the sink from `cfg`, then restore persisted resources if enabled.
    pub async fn start(cfg: &Config, db: DbActorHandle) -> Result<Self, TributaryError> {
        let providers = ProviderSet::from_config(cfg)?;
        let sink = sink::from_config(cfg)?;
        let services = Self::assemble(cfg, db, providers, sink);
        if cfg.sync.restore_on_start {
            services.registry.restore().await?;
        }
        Ok(services)
    }
}
