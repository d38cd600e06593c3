use std::str::FromStr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Extension, Path, Query},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio_util::io::ReaderStream;

use invoicedesk_core::InvoiceId;
use invoicedesk_infra::Artifact;

use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/report", get(bulk_report))
        .route("/summary", get(filing_summary))
        .route("/:id/pdf", get(invoice_pdf))
}

pub async fn bulk_report(Extension(services): Extension<Arc<AppServices>>) -> Response {
    match services.render_bulk_report().await {
        Ok(artifact) => artifact_response(artifact),
        Err(e) => errors::render_error_to_response(e),
    }
}

pub async fn invoice_pdf(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Response {
    let invoice_id = match InvoiceId::new(&id) {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invoice id must not be blank"),
    };

    match services.render_invoice_pdf(&invoice_id).await {
        Ok(artifact) => artifact_response(artifact),
        Err(e) => errors::render_error_to_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub pay_threshold: Option<String>,
}

pub async fn filing_summary(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<SummaryQuery>,
) -> Response {
    let pay_threshold = match query.pay_threshold.as_deref().map(str::trim) {
        None | Some("") => Decimal::ZERO,
        Some(raw) => match Decimal::from_str(raw) {
            Ok(v) if v >= Decimal::ZERO => v,
            _ => {
                return errors::json_error(
                    StatusCode::BAD_REQUEST,
                    "invalid_pay_threshold",
                    "pay_threshold must be a non-negative number",
                );
            }
        },
    };

    match services.filing_report(pay_threshold).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => errors::render_error_to_response(e),
    }
}

/// Stream an artifact as an attachment.
fn artifact_response(artifact: Artifact) -> Response {
    let disposition = format!("attachment; filename=\"{}\"", artifact.download_name);
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, artifact.content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
            (header::CONTENT_LENGTH, artifact.len.to_string()),
        ],
        Body::from_stream(ReaderStream::new(artifact.file)),
    )
        .into_response()
}
