use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{request::Parts, HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::auth::{AuthOutcome, Registration, Session};
use crate::error::Error;
use crate::policy::Actor;
use crate::AppState;

use super::error::{ApiError, ErrorCode, ValidationErrorBuilder};
use super::validation::{validate_email, validate_name, validate_password};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Create a regular account and return a session for it
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<Session>), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors
        .check("name", validate_name(&req.name))
        .check("email", validate_email(&req.email))
        .check("password", validate_password(&req.password));
    errors.finish()?;

    let session = state
        .auth
        .register(Registration {
            name: req.name,
            email: req.email,
            secret: req.password,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(session)))
}

/// Login endpoint. Answers with the `{success, user, token, message}`
/// envelope on success and failure alike.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<(StatusCode, Json<AuthOutcome>), ApiError> {
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::bad_request("Email and password are required"));
    }

    let result = state.auth.authenticate(&req.email, &req.password).await;
    let status = match &result {
        Ok(_) => StatusCode::OK,
        // Unknown and wrong credentials look the same from outside
        Err(Error::NotFound(_)) => StatusCode::UNAUTHORIZED,
        Err(err) => ErrorCode::for_error(err).status_code(),
    };
    let outcome = match result {
        Err(Error::NotFound(_)) => AuthOutcome::from(Err(Error::InvalidCredential)),
        other => AuthOutcome::from(other),
    };

    Ok((status, Json(outcome)))
}

pub async fn change_password(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<StatusCode, ApiError> {
    validate_password(&req.new_password)
        .map_err(|e| ApiError::validation_field("new_password", e))?;

    state
        .auth
        .change_password(&actor.id, &req.current_password, &req.new_password)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Extract the bearer token from request headers
fn extract_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Extractor for the authenticated caller of a request
#[async_trait]
impl FromRequestParts<Arc<AppState>> for Actor {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token(&parts.headers)
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;
        state.auth.actor(&token).await.map_err(|e| match e {
            Error::InvalidCredential => ApiError::unauthorized("Invalid or expired token"),
            other => ApiError::from(other),
        })
    }
}

/// Reject callers who are not admins
pub fn require_admin(actor: &Actor) -> Result<(), ApiError> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(ApiError::forbidden("Admin access required"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_token(&headers), None);

        headers.insert("Authorization", HeaderValue::from_static("Basic abc"));
        assert_eq!(extract_token(&headers), None);

        headers.insert("Authorization", HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(extract_token(&headers).as_deref(), Some("abc.def"));

        headers.insert("Authorization", HeaderValue::from_static("Bearer "));
        assert_eq!(extract_token(&headers), None);
    }
}
