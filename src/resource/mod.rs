//! Per-resource actors: durable config, cursor, wake timer and sync execution.

pub mod actor;
pub mod config;
pub mod metrics;
pub mod registry;

pub use actor::{ResourceDeps, ResourceHandle, SyncReport};
pub use config::{ResourceConfig, ResourcePatch, ResourceRecord, actor_key};
pub use metrics::SyncCounters;
pub use registry::ResourceRegistry;
