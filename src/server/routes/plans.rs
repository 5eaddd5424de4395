use crate::db::DbSyncPlan;
use crate::error::TributaryError;
use crate::server::router::TributaryState;
use crate::server::routes::extract::{json_body, query, required};
use crate::server::routes::resources::ResourceQuery;
use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachUserRequest {
    pub user_id: String,
}

/// GET /v1/plans?resourceId=
pub async fn get_plan(
    State(state): State<TributaryState>,
    params: Result<Query<ResourceQuery>, QueryRejection>,
) -> Result<Json<DbSyncPlan>, TributaryError> {
    let resource_id = required(query(params)?.resource_id, "resourceId")?;
    Ok(Json(state.plans.get_sync_plan(&resource_id).await?))
}

/// POST /v1/plans/{plan_id}/users
pub async fn attach_user(
    State(state): State<TributaryState>,
    Path(plan_id): Path<String>,
    payload: Result<Json<AttachUserRequest>, JsonRejection>,
) -> Result<Json<DbSyncPlan>, TributaryError> {
    let req = json_body(payload)?;
    let user_id = required(Some(req.user_id), "userId")?;
    Ok(Json(state.plans.attach_user(&plan_id, &user_id).await?))
}
