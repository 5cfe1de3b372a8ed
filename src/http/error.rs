//! Maps [`BookstoreError`] onto JSON error responses.
//!
//! Every failure renders as `{"success": false, "message": ...}`. Server-side
//! failures show a fixed message and are logged; the detail travels in a
//! response extension that [`expose_error_detail`] folds into the body when
//! the service runs with `APP_ENV=development`.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::auth::AuthError;
use crate::http::AppState;
use crate::BookstoreError;

const INTERNAL_MESSAGE: &str = "Internal server error";

#[derive(Debug)]
pub struct ApiError(pub BookstoreError);

/// Detail of a 500, kept out of the body unless exposure is enabled.
#[derive(Clone, Debug)]
pub struct ErrorDetail(pub String);

impl From<BookstoreError> for ApiError {
    fn from(err: BookstoreError) -> Self {
        Self(err)
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self(BookstoreError::Auth(err))
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            BookstoreError::Validation(_) => StatusCode::BAD_REQUEST,
            BookstoreError::NotFound(_) => StatusCode::NOT_FOUND,
            BookstoreError::Auth(_) => StatusCode::UNAUTHORIZED,
            BookstoreError::Upstream(_) => StatusCode::BAD_GATEWAY,
            BookstoreError::Store(_) | BookstoreError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if !status.is_server_error() {
            let body = Json(json!({ "success": false, "message": self.0.to_string() }));
            return (status, body).into_response();
        }

        let detail = self.0.to_string();
        tracing::error!(error = %detail, status = status.as_u16(), "request failed");
        let message = match &self.0 {
            BookstoreError::Upstream(_) => "Catalog service unavailable",
            _ => INTERNAL_MESSAGE,
        };
        let mut response = (status, Json(json!({ "success": false, "message": message }))).into_response();
        response.extensions_mut().insert(ErrorDetail(detail));
        response
    }
}

/// Response mapper installed on the router; a no-op unless the state allows
/// exposing error detail.
pub async fn expose_error_detail(State(state): State<AppState>, response: Response) -> Response {
    if !state.expose_errors {
        return response;
    }
    let Some(ErrorDetail(detail)) = response.extensions().get::<ErrorDetail>().cloned() else {
        return response;
    };
    let status = response.status();
    let message = if status == StatusCode::BAD_GATEWAY { "Catalog service unavailable" } else { INTERNAL_MESSAGE };
    (status, Json(json!({ "success": false, "message": message, "error": detail }))).into_response()
}
