use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use inspections::workflows::inspection::{
    inspection_router, AttachmentUploader, InspectionRepository, InspectionService,
    StaffDirectory,
};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tower_http::services::ServeDir;

/// Public path prefix of the URLs handed out by the local uploader.
pub(crate) const UPLOAD_URL_PREFIX: &str = "/uploads";

/// Inspection API plus probes, metrics and the stored photos under [`UPLOAD_URL_PREFIX`].
pub(crate) fn with_inspection_routes<R, S, U>(
    service: Arc<InspectionService<R, S, U>>,
    upload_dir: &Path,
) -> axum::Router
where
    R: InspectionRepository + 'static,
    S: StaffDirectory + 'static,
    U: AttachmentUploader + 'static,
{
    inspection_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .nest_service(UPLOAD_URL_PREFIX, ServeDir::new(upload_dir))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
