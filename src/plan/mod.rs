//! Plan/dedup layer: maps external resources to actors and plan rows.

mod service;

pub use service::{
    DEFAULT_HISTORY_LIMIT, MAX_HISTORY_LIMIT, Registration, ResourceInfo, SyncPlanService,
    clamp_history_limit,
};
