use thiserror::Error;

/// Errors surfaced by every dashboard operation.
///
/// `Validation` and `NotFound` are caller-fixable (400-class); everything else
/// is an operational failure (500-class).
#[derive(Debug, Error)]
pub enum DashboardError {
    /// The configured spreadsheet location does not exist.
    #[error("spreadsheet source not found: {0}")]
    SourceNotFound(String),

    /// Transport or credential failure while talking to the source.
    #[error("spreadsheet source unavailable: {0}")]
    SourceUnavailable(String),

    /// The source could be read but not decoded (unsupported extension, corrupt workbook).
    #[error("spreadsheet could not be decoded: {0}")]
    SourceFormat(String),

    /// One or more required columns are absent from the source header.
    #[error("spreadsheet is missing required columns: {}", .missing.join(", "))]
    SchemaInvalid { missing: Vec<String> },

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("persistence failure: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("render failure: {0}")]
    Render(String),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, DashboardError>;

impl DashboardError {
    /// Stable, machine-readable identifier for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            DashboardError::SourceNotFound(_) => "SOURCE_NOT_FOUND",
            DashboardError::SourceUnavailable(_) => "SOURCE_UNAVAILABLE",
            DashboardError::SourceFormat(_) => "SOURCE_FORMAT",
            DashboardError::SchemaInvalid { .. } => "SCHEMA_INVALID",
            DashboardError::Validation(_) => "VALIDATION_FAILED",
            DashboardError::NotFound(_) => "NOT_FOUND",
            DashboardError::Persistence(_) => "PERSISTENCE_ERROR",
            DashboardError::Render(_) => "RENDER_ERROR",
            DashboardError::Config(_) => "CONFIG_ERROR",
        }
    }

    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            DashboardError::Validation(_) | DashboardError::NotFound(_)
        )
    }
}

#[cfg(feature = "web")]
mod web {
    use super::DashboardError;
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Response};

    impl DashboardError {
        /// HTTP status code for this error.
        pub fn status_code(&self) -> StatusCode {
            match self {
                DashboardError::Validation(_) => StatusCode::BAD_REQUEST,
                DashboardError::NotFound(_) => StatusCode::NOT_FOUND,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            }
        }
    }

    impl IntoResponse for DashboardError {
        fn into_response(self) -> Response {
            let body = serde_json::json!({
                "status": "error",
                "code": self.code(),
                "detail": self.to_string(),
            });
            (self.status_code(), axum::Json(body)).into_response()
        }
    }
}
