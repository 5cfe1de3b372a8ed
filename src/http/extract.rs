//! Request extractors: the authenticated user and JSON bodies.

use axum::extract::rejection::JsonRejection;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::Json;

use crate::auth::bearer_token;
use crate::domain::value_objects::UserId;
use crate::http::error::ApiError;
use crate::http::AppState;
use crate::BookstoreError;

/// The caller's identity, verified from the bearer token.
///
/// ```rust,ignore
/// async fn handler(AuthUser(user_id): AuthUser) -> impl IntoResponse {
///     format!("hello {user_id}")
/// }
/// ```
pub struct AuthUser(pub UserId);

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts.headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
        let token = bearer_token(header)?;
        let user_id = state.verifier.verify(token).map_err(|e| {
            tracing::debug!(error = %e, path = %parts.uri.path(), "token rejected");
            e
        })?;
        Ok(Self(user_id))
    }
}

/// Unwraps a JSON body, turning a malformed or missing one into a 400.
pub fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| BookstoreError::validation(rejection.body_text()).into())
}
