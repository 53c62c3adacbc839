use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use crate::workflows::screening::ScreeningServiceError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Top-level failure of the server or a CLI command.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("server error: {0}")]
    Server(#[from] axum::Error),
    #[error("screening error: {0}")]
    Screening(#[from] ScreeningServiceError),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Screening(err) => err.status_code(),
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Process exit status for the CLI, following the sysexits convention.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Config(_) => 78,
            AppError::Io(_) => 74,
            AppError::Screening(err) if err.status_code().is_client_error() => 65,
            _ => 1,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Callers see rejection reasons; server-side causes only reach the log.
        let message = match &self {
            AppError::Screening(err) if status.is_client_error() => err.to_string(),
            _ => {
                error!(error = %self, "request failed");
                "internal server error".to_string()
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::screening::repository::RepositoryError;
    use axum::body::to_bytes;
    use serde_json::Value;

    async fn body_of(err: AppError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        (status, serde_json::from_slice(&bytes).expect("json body"))
    }

    #[test]
    fn display_prefixes_the_failing_layer() {
        let err = AppError::from(ScreeningServiceError::InvalidCapacity);
        assert_eq!(
            err.to_string(),
            "screening error: daily_manual_capacity must be > 0"
        );
        assert_eq!(
            AppError::from(ConfigError::InvalidPort).to_string(),
            "configuration error: APP_PORT must be a valid u16"
        );
    }

    #[tokio::test]
    async fn client_errors_keep_the_rejection_message() {
        let (status, body) = body_of(ScreeningServiceError::InvalidCapacity.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "daily_manual_capacity must be > 0");

        let (status, body) =
            body_of(ScreeningServiceError::Repository(RepositoryError::NotFound).into()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "record not found");
    }

    #[tokio::test]
    async fn server_errors_hide_their_cause() {
        let (status, body) = body_of(
            ScreeningServiceError::Repository(RepositoryError::Unavailable(
                "disk /var/lib/prescreen full".to_string(),
            ))
            .into(),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "internal server error");

        let (status, _) = body_of(ConfigError::InvalidPort.into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn exit_codes_separate_bad_input_from_broken_setup() {
        assert_eq!(AppError::from(ConfigError::InvalidPort).exit_code(), 78);
        assert_eq!(
            AppError::from(std::io::Error::other("read failed")).exit_code(),
            74
        );
        assert_eq!(AppError::from(ScreeningServiceError::NoDocuments).exit_code(), 65);
        assert_eq!(
            AppError::from(ScreeningServiceError::Repository(RepositoryError::Unavailable(
                "down".to_string()
            )))
            .exit_code(),
            1
        );
    }
}
