use crate::db::DbSyncHistory;
use crate::error::TributaryError;
use crate::server::router::TributaryState;
use crate::server::routes::extract::{query, required};
use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryParams {
    pub resource_id: Option<String>,
    pub limit: Option<u32>,
}

/// GET /v1/history/resource?resourceId=&limit=
pub async fn by_resource(
    State(state): State<TributaryState>,
    params: Result<Query<HistoryParams>, QueryRejection>,
) -> Result<Json<Vec<DbSyncHistory>>, TributaryError> {
    let params = query(params)?;
    let resource_id = required(params.resource_id, "resourceId")?;
    Ok(Json(
        state
            .plans
            .history_by_resource(&resource_id, params.limit)
            .await?,
    ))
}

/// GET /v1/history/user/{user_id}?limit=
pub async fn by_user(
    State(state): State<TributaryState>,
    Path(user_id): Path<String>,
    params: Result<Query<HistoryParams>, QueryRejection>,
) -> Result<Json<Vec<DbSyncHistory>>, TributaryError> {
    let params = query(params)?;
    Ok(Json(
        state.plans.history_by_user(&user_id, params.limit).await?,
    ))
}

/// GET /v1/history/plan/{plan_id}?limit=
pub async fn by_plan(
    State(state): State<TributaryState>,
    Path(plan_id): Path<String>,
    params: Result<Query<HistoryParams>, QueryRejection>,
) -> Result<Json<Vec<DbSyncHistory>>, TributaryError> {
    let params = query(params)?;
    Ok(Json(
        state.plans.history_by_plan(&plan_id, params.limit).await?,
    ))
}
