use crate::error::TributaryError;
use crate::plan::{Registration, ResourceInfo};
use crate::resource::SyncReport;
use crate::server::router::TributaryState;
use crate::server::routes::extract::{json_body, provider_path, query, required};
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::{Json, http::StatusCode};
use serde::Deserialize;
use tributary_schema::ProviderKind;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResourceRequest {
    pub provider: ProviderKind,
    pub resource_id: String,
    pub user_id: Option<String>,
    pub cadence_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResourceRequest {
    pub provider: ProviderKind,
    pub resource_id: String,
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceQuery {
    pub resource_id: Option<String>,
}

/// POST /v1/resources
///
/// 201 with the plan and config; 409 with `details.planId` when already registered.
pub async fn register_resource(
    State(state): State<TributaryState>,
    payload: Result<Json<RegisterResourceRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Registration>), TributaryError> {
    let req = json_body(payload)?;
    let registration = state
        .plans
        .register_resource(
            req.provider,
            &req.resource_id,
            req.user_id.as_deref(),
            req.cadence_secs,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(registration)))
}

/// POST /v1/resources/sync
pub async fn sync_resource(
    State(state): State<TributaryState>,
    payload: Result<Json<SyncResourceRequest>, JsonRejection>,
) -> Result<Json<SyncReport>, TributaryError> {
    let req = json_body(payload)?;
    let report = state
        .plans
        .sync_resource(&req.resource_id, req.provider, req.user_id.as_deref())
        .await?;
    Ok(Json(report))
}

/// GET /v1/resources/{provider}/info?resourceId=
pub async fn resource_info(
    State(state): State<TributaryState>,
    provider: Result<Path<String>, PathRejection>,
    params: Result<Query<ResourceQuery>, QueryRejection>,
) -> Result<Json<ResourceInfo>, TributaryError> {
    let provider = provider_path(provider)?;
    let resource_id = required(query(params)?.resource_id, "resourceId")?;
    Ok(Json(state.plans.resource_info(provider, &resource_id).await?))
}
