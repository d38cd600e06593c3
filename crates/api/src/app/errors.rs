use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use invoicedesk_infra::RenderError;

pub fn status_for(err: &RenderError) -> StatusCode {
    match err {
        RenderError::NotFound { .. } => StatusCode::NOT_FOUND,
        RenderError::SchemaViolation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        RenderError::ProcessSpawnFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        RenderError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        RenderError::NonZeroExit { .. } => StatusCode::BAD_GATEWAY,
        RenderError::OutputMissing { .. } => StatusCode::BAD_GATEWAY,
        RenderError::DeliveryFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        RenderError::DataSource(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

pub fn render_error_to_response(err: RenderError) -> axum::response::Response {
    let status = status_for(&err);
    if status.is_server_error() {
        tracing::warn!(kind = err.kind(), error = %err, "request failed");
    } else {
        tracing::debug!(kind = err.kind(), error = %err, "request rejected");
    }
    json_error(status, err.kind(), err.to_string())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
