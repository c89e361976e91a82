use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::domain::{InspectionId, InspectionPatch, InspectionStatus, NewInspection};
use super::photos::{AttachmentUploader, UploadFile};
use super::repository::InspectionRepository;
use super::roster::StaffDirectory;
use super::sections::SectionError;
use super::service::{InspectionService, InspectionServiceError};

type SharedService<R, S, U> = Arc<InspectionService<R, S, U>>;

/// Router builder exposing the case operations over HTTP.
pub fn inspection_router<R, S, U>(service: SharedService<R, S, U>) -> Router
where
    R: InspectionRepository + 'static,
    S: StaffDirectory + 'static,
    U: AttachmentUploader + 'static,
{
    Router::new()
        .route(
            "/api/v1/inspections",
            post(create_handler::<R, S, U>).get(list_handler::<R, S, U>),
        )
        .route(
            "/api/v1/inspections/trash",
            get(trashed_handler::<R, S, U>),
        )
        .route(
            "/api/v1/inspections/:id",
            get(find_handler::<R, S, U>).patch(update_handler::<R, S, U>),
        )
        .route(
            "/api/v1/inspections/:id/status",
            patch(status_handler::<R, S, U>),
        )
        .route(
            "/api/v1/inspections/:id/trash",
            post(trash_handler::<R, S, U>),
        )
        .route(
            "/api/v1/inspections/:id/restore",
            post(restore_handler::<R, S, U>),
        )
        .route(
            "/api/v1/inspections/:id/photos/:section",
            post(photos_handler::<R, S, U>),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusChange {
    pub(crate) status: InspectionStatus,
}

/// One photo in an attach request; `data` is base64 encoded.
#[derive(Debug, Deserialize)]
pub(crate) struct PhotoPayload {
    pub(crate) file_name: String,
    pub(crate) content_type: String,
    pub(crate) data: String,
}

pub(crate) async fn create_handler<R, S, U>(
    State(service): State<SharedService<R, S, U>>,
    Json(payload): Json<NewInspection>,
) -> Response
where
    R: InspectionRepository + 'static,
    S: StaffDirectory + 'static,
    U: AttachmentUploader + 'static,
{
    match blocking(service, move |service| service.create(payload)).await {
        Ok(record) => (StatusCode::CREATED, Json(record)).into_response(),
        Err(response) => response,
    }
}

pub(crate) async fn list_handler<R, S, U>(State(service): State<SharedService<R, S, U>>) -> Response
where
    R: InspectionRepository + 'static,
    S: StaffDirectory + 'static,
    U: AttachmentUploader + 'static,
{
    match blocking(service, |service| service.find_all()).await {
        Ok(records) => (StatusCode::OK, Json(records)).into_response(),
        Err(response) => response,
    }
}

pub(crate) async fn trashed_handler<R, S, U>(
    State(service): State<SharedService<R, S, U>>,
) -> Response
where
    R: InspectionRepository + 'static,
    S: StaffDirectory + 'static,
    U: AttachmentUploader + 'static,
{
    match blocking(service, |service| service.find_trashed()).await {
        Ok(records) => (StatusCode::OK, Json(records)).into_response(),
        Err(response) => response,
    }
}

pub(crate) async fn find_handler<R, S, U>(
    State(service): State<SharedService<R, S, U>>,
    Path(id): Path<u64>,
) -> Response
where
    R: InspectionRepository + 'static,
    S: StaffDirectory + 'static,
    U: AttachmentUploader + 'static,
{
    match blocking(service, move |service| service.find_one(InspectionId(id))).await {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(response) => response,
    }
}

pub(crate) async fn update_handler<R, S, U>(
    State(service): State<SharedService<R, S, U>>,
    Path(id): Path<u64>,
    Json(patch): Json<InspectionPatch>,
) -> Response
where
    R: InspectionRepository + 'static,
    S: StaffDirectory + 'static,
    U: AttachmentUploader + 'static,
{
    match blocking(service, move |service| service.update(InspectionId(id), patch)).await {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(response) => response,
    }
}

pub(crate) async fn status_handler<R, S, U>(
    State(service): State<SharedService<R, S, U>>,
    Path(id): Path<u64>,
    Json(change): Json<StatusChange>,
) -> Response
where
    R: InspectionRepository + 'static,
    S: StaffDirectory + 'static,
    U: AttachmentUploader + 'static,
{
    let status = change.status;
    match blocking(service, move |service| {
        service.update_status(InspectionId(id), status)
    })
    .await
    {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(response) => response,
    }
}

pub(crate) async fn trash_handler<R, S, U>(
    State(service): State<SharedService<R, S, U>>,
    Path(id): Path<u64>,
) -> Response
where
    R: InspectionRepository + 'static,
    S: StaffDirectory + 'static,
    U: AttachmentUploader + 'static,
{
    match blocking(service, move |service| service.move_to_trash(InspectionId(id))).await {
        Ok(receipt) => (StatusCode::OK, Json(receipt)).into_response(),
        Err(response) => response,
    }
}

pub(crate) async fn restore_handler<R, S, U>(
    State(service): State<SharedService<R, S, U>>,
    Path(id): Path<u64>,
) -> Response
where
    R: InspectionRepository + 'static,
    S: StaffDirectory + 'static,
    U: AttachmentUploader + 'static,
{
    match blocking(service, move |service| service.restore_from_trash(InspectionId(id))).await {
        Ok(receipt) => (StatusCode::OK, Json(receipt)).into_response(),
        Err(response) => response,
    }
}

pub(crate) async fn photos_handler<R, S, U>(
    State(service): State<SharedService<R, S, U>>,
    Path((id, section)): Path<(u64, String)>,
    Json(photos): Json<Vec<PhotoPayload>>,
) -> Response
where
    R: InspectionRepository + 'static,
    S: StaffDirectory + 'static,
    U: AttachmentUploader + 'static,
{
    let mut files = Vec::with_capacity(photos.len());
    for photo in photos {
        let bytes = match STANDARD.decode(photo.data.as_bytes()) {
            Ok(bytes) => bytes,
            Err(err) => {
                let payload = json!({
                    "error": format!("photo '{}' is not valid base64: {err}", photo.file_name),
                });
                return (StatusCode::BAD_REQUEST, Json(payload)).into_response();
            }
        };
        files.push(UploadFile {
            file_name: photo.file_name,
            content_type: photo.content_type,
            bytes,
        });
    }

    match service
        .attach_photos(InspectionId(id), &section, files)
        .await
    {
        Ok(outcome) if outcome.created => (StatusCode::CREATED, Json(outcome)).into_response(),
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(err) => error_response(err),
    }
}

/// Runs a synchronous service call on the blocking pool so store I/O never parks an
/// async worker.
async fn blocking<R, S, U, T, F>(service: SharedService<R, S, U>, call: F) -> Result<T, Response>
where
    R: InspectionRepository + 'static,
    S: StaffDirectory + 'static,
    U: AttachmentUploader + 'static,
    T: Send + 'static,
    F: FnOnce(&InspectionService<R, S, U>) -> Result<T, InspectionServiceError> + Send + 'static,
{
    match tokio::task::spawn_blocking(move || call(&service)).await {
        Ok(result) => result.map_err(error_response),
        Err(err) => {
            error!(error = %err, "inspection request task failed");
            let payload = json!({ "error": "inspection request was interrupted" });
            Err((StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response())
        }
    }
}

fn error_response(err: InspectionServiceError) -> Response {
    let status = match &err {
        InspectionServiceError::NotFound(_)
        | InspectionServiceError::Section(SectionError::Missing(_)) => StatusCode::NOT_FOUND,
        InspectionServiceError::Lifecycle(_)
        | InspectionServiceError::Section(SectionError::Unknown(_)) => StatusCode::BAD_REQUEST,
        InspectionServiceError::UnknownInspectors(_) => StatusCode::UNPROCESSABLE_ENTITY,
        InspectionServiceError::Conflict(_) => StatusCode::CONFLICT,
        InspectionServiceError::Repository(_) | InspectionServiceError::Sweep(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    let payload = json!({
        "error": err.to_string(),
    });
    (status, Json(payload)).into_response()
}
