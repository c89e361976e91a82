use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use crate::workflows::inspection::{InspectionServiceError, RepositoryError, SweepError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Storage(RepositoryError),
    Sweep(SweepError),
    Workflow(InspectionServiceError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Storage(err) => write!(f, "storage error: {}", err),
            AppError::Sweep(err) => write!(f, "archival sweep error: {}", err),
            AppError::Workflow(err) => write!(f, "workflow error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Storage(err) => Some(err),
            AppError::Sweep(err) => Some(err),
            AppError::Workflow(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::Storage(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
            AppError::Storage(RepositoryError::Conflict) => StatusCode::CONFLICT,
            AppError::Workflow(InspectionServiceError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Workflow(InspectionServiceError::Lifecycle(_)) => StatusCode::BAD_REQUEST,
            AppError::Workflow(_)
            | AppError::Sweep(_)
            | AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_)
            | AppError::Storage(RepositoryError::Unavailable(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<RepositoryError> for AppError {
    fn from(value: RepositoryError) -> Self {
        Self::Storage(value)
    }
}

impl From<SweepError> for AppError {
    fn from(value: SweepError) -> Self {
        Self::Sweep(value)
    }
}

impl From<InspectionServiceError> for AppError {
    fn from(value: InspectionServiceError) -> Self {
        Self::Workflow(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_map_to_matching_status_codes() {
        let missing = AppError::from(RepositoryError::NotFound).into_response();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let offline =
            AppError::from(RepositoryError::Unavailable("disk full".to_string())).into_response();
        assert_eq!(offline.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn workflow_errors_keep_their_message() {
        let err = AppError::from(InspectionServiceError::NotFound(
            crate::workflows::inspection::InspectionId(9),
        ));
        assert_eq!(err.to_string(), "workflow error: inspection 9 not found");
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }
}
