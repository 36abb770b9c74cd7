//! Channel mapping endpoints
//!
//! All routes live under `/x-nmos/channelmapping/v1.0/map` and return JSON.
//! Errors use the `{"code", "error", "debug"}` body devices commonly send.

use crate::device::{ActivationRequest, DeviceError};
use crate::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::{json, Value};

impl DeviceError {
    pub fn status(&self) -> StatusCode {
        match self {
            DeviceError::BadRequest(_) => StatusCode::BAD_REQUEST,
            DeviceError::Locked(_) => StatusCode::LOCKED,
            DeviceError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for DeviceError {
    fn into_response(self) -> Response {
        let status = self.status();
        tracing::debug!(status = status.as_u16(), error = %self, "Request refused");
        let body = json!({
            "code": status.as_u16(),
            "error": self.to_string(),
            "debug": null,
        });
        (status, Json(body)).into_response()
    }
}

pub async fn map_root() -> Json<Value> {
    Json(json!(["activations/", "active/", "inputs/", "io/", "outputs/"]))
}

pub async fn list_inputs(State(state): State<AppState>) -> Json<Value> {
    Json(json!(state.device().input_ids()))
}

pub async fn input_root(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, DeviceError> {
    state.device().input_resource(&id, "parent")?;
    Ok(Json(json!(["caps/", "channels/", "parent/", "properties/"])))
}

pub async fn input_resource(
    State(state): State<AppState>,
    Path((id, resource)): Path<(String, String)>,
) -> Result<Json<Value>, DeviceError> {
    Ok(Json(state.device().input_resource(&id, &resource)?))
}

pub async fn list_outputs(State(state): State<AppState>) -> Json<Value> {
    Json(json!(state.device().output_ids()))
}

pub async fn output_root(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, DeviceError> {
    state.device().output_resource(&id, "source_id")?;
    Ok(Json(json!(["caps/", "channels/", "properties/", "source_id/"])))
}

pub async fn output_resource(
    State(state): State<AppState>,
    Path((id, resource)): Path<(String, String)>,
) -> Result<Json<Value>, DeviceError> {
    Ok(Json(state.device().output_resource(&id, &resource)?))
}

pub async fn get_io(State(state): State<AppState>) -> Result<Json<Value>, DeviceError> {
    Ok(Json(state.device().io()?))
}

pub async fn get_active(State(state): State<AppState>) -> Json<Value> {
    Json(state.device().active())
}

pub async fn get_active_output(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, DeviceError> {
    Ok(Json(state.device().active_output(&id)?))
}

pub async fn list_activations(State(state): State<AppState>) -> Json<Value> {
    Json(state.device().activations())
}

/// Immediate activations are applied before responding. Scheduled ones are
/// completed by a timer task unless deleted first.
pub async fn post_activation(
    State(state): State<AppState>,
    body: Result<Json<ActivationRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), DeviceError> {
    let Json(request) = body.map_err(|e| DeviceError::BadRequest(e.body_text()))?;
    let submitted = state.device().submit(request)?;
    tracing::info!(id = %submitted.id, scheduled = submitted.due_in.is_some(), "Activation accepted");

    if let Some(due_in) = submitted.due_in {
        let id = submitted.id.clone();
        let timer_state = state.clone();
        tokio::spawn(async move {
            tokio::time::sleep(due_in).await;
            timer_state.device().complete(&id);
        });
    }
    Ok((StatusCode::CREATED, Json(submitted.resource)))
}

pub async fn delete_activation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, DeviceError> {
    state.device().delete(&id)?;
    tracing::info!(id = %id, "Activation deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(DeviceError::BadRequest("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(DeviceError::Locked("out1".into()).status(), StatusCode::LOCKED);
        assert_eq!(DeviceError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_error_response_status() {
        let response = DeviceError::Locked("out1".into()).into_response();
        assert_eq!(response.status(), StatusCode::LOCKED);
    }
}
