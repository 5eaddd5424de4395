//! Thin HTTP control surface over [`SyncPlanService`](crate::plan::SyncPlanService).

pub mod guards;
pub mod router;
pub mod routes;
