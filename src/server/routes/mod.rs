use crate::server::router::TributaryState;
use axum::{
    Router,
    routing::{get, post},
};

pub mod extract;
pub mod history;
pub mod plans;
pub mod resources;

pub fn router() -> Router<TributaryState> {
    Router::new()
        .route("/v1/resources", post(resources::register_resource))
        .route("/v1/resources/sync", post(resources::sync_resource))
        .route("/v1/resources/{provider}/info", get(resources::resource_info))
        .route("/v1/plans", get(plans::get_plan))
        .route("/v1/plans/{plan_id}/users", post(plans::attach_user))
        .route("/v1/history/resource", get(history::by_resource))
        .route("/v1/history/user/{user_id}", get(history::by_user))
        .route("/v1/history/plan/{plan_id}", get(history::by_plan))
}
