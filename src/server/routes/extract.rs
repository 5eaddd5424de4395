use crate::error::TributaryError;
use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query};
use tributary_schema::ProviderKind;

/// Unwrap a JSON body, turning a rejection into `InvalidConfiguration` (400).
pub fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, TributaryError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| TributaryError::invalid(rejection.body_text()))
}

pub fn query<T>(params: Result<Query<T>, QueryRejection>) -> Result<T, TributaryError> {
    params
        .map(|Query(params)| params)
        .map_err(|rejection| TributaryError::invalid(rejection.body_text()))
}

pub fn provider_path(
    provider: Result<Path<String>, PathRejection>,
) -> Result<ProviderKind, TributaryError> {
    let Path(raw) = provider.map_err(|rejection| TributaryError::invalid(rejection.body_text()))?;
    raw.parse::<ProviderKind>()
        .map_err(|e| TributaryError::invalid(e.to_string()))
}

pub fn required(value: Option<String>, name: &str) -> Result<String, TributaryError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| TributaryError::invalid(format!("{name} is required")))
}
