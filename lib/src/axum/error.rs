use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;

use crate::{Error, ErrorKind};

impl Error {
    pub fn status(&self) -> StatusCode {
        match &self.kind {
            ErrorKind::BadInput(_) | ErrorKind::EmailParseError(_) => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound(_) => StatusCode::NOT_FOUND,
            ErrorKind::Conflict(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Renders errors as `{"error": "<message>"}`.
///
/// Backtraces are never part of the response, only of the logs. Internal
/// errors are reported with a generic message in release builds.
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            tracing::error!("{self}");
            if cfg!(debug_assertions) {
                self.public_message()
            } else {
                "Internal server error".to_string()
            }
        } else {
            tracing::debug!("{}", self.kind);
            self.public_message()
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
