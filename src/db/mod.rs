//! Database module: the SQLite-backed store behind every resource actor and the plan index.
//!
//! Layout:
//! - `models.rs`: Rust structs mirroring DB rows
//! - `records.rs`: insert payloads
//! - `schema.rs`: SQL DDL for initializing the database (SQLite-first)

pub mod actor;
pub mod models;
pub mod records;
pub mod schema;

pub use actor::{DbActorHandle, spawn};
pub use models::{DbResourceState, DbSyncHistory, DbSyncPlan};
pub use records::{HistoryQuery, SyncHistoryCreate, SyncPlanCreate};
pub use schema::SQLITE_INIT;
