use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use kpi_rewards::config::ConfigError;
use kpi_rewards::telemetry::TelemetryError;
use kpi_rewards::workflows::records::import::RecordImportError;
use kpi_rewards::workflows::records::{RecordServiceError, RepositoryError};
use kpi_rewards::workflows::rewards::RewardServiceError;
use kpi_rewards::ErrorKind;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Import(RecordImportError),
    Json(serde_json::Error),
    InvalidRequest(String),
    Records(RecordServiceError),
    Rewards(RewardServiceError),
    Store(RepositoryError),
}

impl AppError {
    /// Classification of workflow failures; `None` for host-level errors.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            AppError::InvalidRequest(_) => Some(ErrorKind::Validation),
            AppError::Records(err) => Some(err.kind()),
            AppError::Rewards(err) => Some(err.kind()),
            AppError::Store(err) => Some(err.kind()),
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_)
            | AppError::Import(_)
            | AppError::Json(_) => None,
        }
    }

    fn is_not_found(&self) -> bool {
        matches!(
            self,
            AppError::Records(RecordServiceError::Repository(RepositoryError::NotFound))
                | AppError::Rewards(RewardServiceError::Repository(RepositoryError::NotFound))
                | AppError::Store(RepositoryError::NotFound)
        )
    }

    fn status(&self) -> StatusCode {
        if self.is_not_found() {
            return StatusCode::NOT_FOUND;
        }
        match self.kind() {
            Some(ErrorKind::Validation) | Some(ErrorKind::Configuration) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Some(ErrorKind::GuardViolation) | Some(ErrorKind::Conflict) => StatusCode::CONFLICT,
            Some(ErrorKind::Unavailable) => StatusCode::SERVICE_UNAVAILABLE,
            Some(ErrorKind::DataIntegrity) | None => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Import(err) => write!(f, "record import error: {}", err),
            AppError::Json(err) => write!(f, "json error: {}", err),
            AppError::InvalidRequest(message) => write!(f, "invalid request: {}", message),
            AppError::Records(err) => write!(f, "{}", err),
            AppError::Rewards(err) => write!(f, "{}", err),
            AppError::Store(err) => write!(f, "{}", err),
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
            AppError::Import(err) => Some(err),
            AppError::Json(err) => Some(err),
            AppError::InvalidRequest(_) => None,
            AppError::Records(err) => Some(err),
            AppError::Rewards(err) => Some(err),
            AppError::Store(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = self.kind().map(ErrorKind::label);
        let body = Json(json!({ "error": self.to_string(), "kind": kind }));
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

impl From<RecordImportError> for AppError {
    fn from(value: RecordImportError) -> Self {
        Self::Import(value)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<RecordServiceError> for AppError {
    fn from(value: RecordServiceError) -> Self {
        Self::Records(value)
    }
}

impl From<RewardServiceError> for AppError {
    fn from(value: RewardServiceError) -> Self {
        Self::Rewards(value)
    }
}

impl From<RepositoryError> for AppError {
    fn from(value: RepositoryError) -> Self {
        Self::Store(value)
    }
}
