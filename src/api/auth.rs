use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::Response,
    Json,
};
use std::sync::Arc;
use tracing::{debug, info};

use super::error::{is_unique_violation, ApiError, ValidationErrorBuilder};
use super::extract::JsonBody;
use super::validation::{normalize_email, validate_email, validate_password};
use crate::auth::{hash_password, verify_password};
use crate::db::{CredentialsRequest, Role, TokenResponse, User, VerifyResponse};
use crate::AppState;

/// The caller identified by a verified bearer token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: String,
    pub role: Role,
}

/// Validated signup/login input
struct Credentials {
    email: String,
    password: String,
}

/// Signup and login share the same email and password rules.
fn validate_credentials(request: CredentialsRequest) -> Result<Credentials, ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    let email = match request.email {
        Some(raw) => {
            let email = normalize_email(&raw);
            errors.check("email", validate_email(&email)).map(|_| email)
        }
        None => {
            errors.add("email", "Required");
            None
        }
    };

    let password = match request.password {
        Some(password) => errors
            .check("password", validate_password(&password))
            .map(|_| password),
        None => {
            errors.add("password", "Required");
            None
        }
    };

    match (email, password) {
        (Some(email), Some(password)) if errors.is_empty() => Ok(Credentials { email, password }),
        _ => Err(errors.into_error()),
    }
}

/// Create an account and return a token for it
pub async fn signup(
    State(state): State<Arc<AppState>>,
    JsonBody(request): JsonBody<CredentialsRequest>,
) -> Result<(StatusCode, Json<TokenResponse>), ApiError> {
    let credentials = validate_credentials(request)?;

    if User::find_by_email(&state.db, &credentials.email)
        .await?
        .is_some()
    {
        return Err(ApiError::conflict("Email already exists"));
    }

    let password_hash = hash_password(&credentials.password)?;

    let user = User::create(&state.db, &credentials.email, &password_hash)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ApiError::conflict("Email already exists")
            } else {
                ApiError::from(e)
            }
        })?;

    let token = state.tokens.issue(&user.id, user.role())?;

    info!(user_id = %user.id, "Account created");

    Ok((StatusCode::CREATED, Json(TokenResponse { token })))
}

/// Login endpoint
pub async fn login(
    State(state): State<Arc<AppState>>,
    JsonBody(request): JsonBody<CredentialsRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let credentials = validate_credentials(request)?;
    let invalid = || ApiError::new(StatusCode::UNAUTHORIZED, "Invalid credentials");

    let user = User::find_by_email(&state.db, &credentials.email)
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(&credentials.password, &user.password_hash) {
        debug!(user_id = %user.id, "Login rejected: wrong password");
        return Err(invalid());
    }

    let token = state.tokens.issue(&user.id, user.role())?;

    info!(user_id = %user.id, "Login successful");

    Ok(Json(TokenResponse { token }))
}

/// Return the account behind the presented token
pub async fn verify(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<VerifyResponse>, ApiError> {
    let user = User::find_by_id(&state.db, &auth.id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(VerifyResponse { user: user.into() }))
}

/// The token of an `Authorization: Bearer <token>` header
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Resolve the caller from request headers. Every failure is the same 401.
fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<AuthUser, ApiError> {
    let Some(token) = bearer_token(headers) else {
        debug!("Rejected request: missing or non-bearer Authorization header");
        return Err(ApiError::unauthorized());
    };

    let claims = state.tokens.verify(token)?;

    Ok(AuthUser {
        id: claims.sub,
        role: claims.role,
    })
}

/// Middleware guarding every protected route
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let user = authenticate(&state, request.headers())?;
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Extractor for the authenticated caller. Uses the identity stored by
/// [`require_auth`] when present, otherwise verifies the header itself.
#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }
        authenticate(state, &parts.headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&headers("Bearer abc.def")), Some("abc.def"));
        assert_eq!(bearer_token(&headers("bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&headers("Basic dXNlcjpwYXNz")), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&headers("abc.def")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_credentials_policy() {
        let err = validate_credentials(CredentialsRequest {
            email: Some("not-an-email".into()),
            password: Some("short".into()),
        })
        .err()
        .unwrap();

        let paths: Vec<&str> = err.details().unwrap().iter().map(|d| d.path.as_str()).collect();
        assert_eq!(paths, vec!["email", "password"]);
    }

    #[test]
    fn test_missing_fields_are_required() {
        let err = validate_credentials(CredentialsRequest::default())
            .err()
            .unwrap();
        let details = err.details().unwrap();
        assert_eq!(details.len(), 2);
        assert!(details.iter().all(|d| d.message == "Required"));
    }

    #[test]
    fn test_credentials_normalize_email() {
        let creds = validate_credentials(CredentialsRequest {
            email: Some("  Demo@Example.com ".into()),
            password: Some("DemoPass123!".into()),
        })
        .ok()
        .unwrap();

        assert_eq!(creds.email, "demo@example.com");
        assert_eq!(creds.password, "DemoPass123!");
    }
}
