//! Access gate for the HTTP surface.
//!
//! Every client request carries a fixed application-origin header; signed-in
//! requests also carry `Authorization: Bearer <token>`. Administrative requests
//! present `X-Admin-Token`. Handlers opt in through the [`AppOrigin`],
//! [`AuthUser`] and [`AdminAccess`] extractors, which read the [`Gate`] from
//! router state via `FromRef`.

use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, HeaderName},
};
use chrono::{DateTime, Utc};

use bookcat_http::AppError;
use bookcat_kernel::settings::AuthSettings;

pub mod password;
pub mod token;

pub use password::{hash_password, verify_password};
pub use token::{Claims, TokenError, TokenSigner};

pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Shared access policy. Cheap to clone.
#[derive(Clone)]
pub struct Gate {
    inner: Arc<GateInner>,
}

struct GateInner {
    origin_header: HeaderName,
    origin_value: String,
    signer: TokenSigner,
    admin_token: Option<String>,
}

impl Gate {
    pub fn from_settings(auth: &AuthSettings) -> anyhow::Result<Self> {
        let origin_header = HeaderName::try_from(auth.origin_header.as_str())
            .with_context(|| format!("invalid origin header name '{}'", auth.origin_header))?;

        Ok(Self {
            inner: Arc::new(GateInner {
                origin_header,
                origin_value: auth.origin_value.clone(),
                signer: TokenSigner::new(&auth.token_secret, auth.token_ttl_minutes),
                admin_token: auth.admin_token.clone().filter(|t| !t.is_empty()),
            }),
        })
    }

    pub fn check_origin(&self, headers: &HeaderMap) -> Result<(), AppError> {
        let matches = headers
            .get(&self.inner.origin_header)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == self.inner.origin_value);
        if matches {
            Ok(())
        } else {
            Err(AppError::unauthorized("invalid request origin"))
        }
    }

    /// Origin check plus a valid bearer token.
    pub fn authenticate(&self, headers: &HeaderMap, now: DateTime<Utc>) -> Result<AuthUser, AppError> {
        self.check_origin(headers)?;

        let token = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(bearer_token)
            .ok_or_else(|| AppError::unauthorized("missing bearer token"))?;

        let claims = self.inner.signer.verify(token, now).map_err(|err| {
            tracing::warn!(error = %err, "bearer token rejected");
            AppError::unauthorized("user is not authorized")
        })?;

        Ok(AuthUser {
            user_id: claims.sub,
            login: claims.login,
        })
    }

    pub fn check_admin(&self, headers: &HeaderMap) -> Result<(), AppError> {
        let Some(expected) = self.inner.admin_token.as_deref() else {
            return Err(AppError::forbidden("administrative access is disabled"));
        };
        let presented = headers
            .get(ADMIN_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::unauthorized("missing admin token"))?;
        if password::secrets_match(expected, presented) {
            Ok(())
        } else {
            Err(AppError::forbidden("admin token rejected"))
        }
    }

    pub fn issue_token(&self, user_id: i64, login: &str) -> Result<String, AppError> {
        self.inner
            .signer
            .issue(user_id, login, Utc::now())
            .map_err(|err| AppError::Internal(anyhow::anyhow!("token signing failed: {err}")))
    }
}

fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Request came from the client application.
#[derive(Debug, Clone, Copy)]
pub struct AppOrigin;

/// Authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: i64,
    pub login: String,
}

/// Caller presented the administrative token.
#[derive(Debug, Clone, Copy)]
pub struct AdminAccess;

impl<S> FromRequestParts<S> for AppOrigin
where
    Gate: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Gate::from_ref(state).check_origin(&parts.headers)?;
        Ok(AppOrigin)
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    Gate: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Gate::from_ref(state).authenticate(&parts.headers, Utc::now())
    }
}

impl<S> FromRequestParts<S> for AdminAccess
where
    Gate: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Gate::from_ref(state).check_admin(&parts.headers)?;
        Ok(AdminAccess)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    fn gate(admin: Option<&str>) -> Gate {
        let settings = AuthSettings {
            admin_token: admin.map(str::to_string),
            ..AuthSettings::default()
        };
        Gate::from_settings(&settings).unwrap()
    }

    fn app(gate: Gate) -> Router {
        Router::new()
            .route("/me", get(|user: AuthUser| async move { user.login }))
            .route("/public", get(|_: AppOrigin| async { "hello" }))
            .route("/admin", get(|_: AdminAccess| async { "root" }))
            .with_state(gate)
    }

    async fn status(gate: Gate, request: Request<Body>) -> StatusCode {
        app(gate).oneshot(request).await.unwrap().status()
    }

    #[test]
    fn bearer_scheme_is_case_insensitive() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("bearer abc"), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer "), None);
    }

    #[tokio::test]
    async fn origin_header_is_required() {
        let g = gate(None);
        let missing = Request::get("/public").body(Body::empty()).unwrap();
        assert_eq!(status(g.clone(), missing).await, StatusCode::UNAUTHORIZED);

        let wrong = Request::get("/public")
            .header("X-Requested-From", "curl")
            .body(Body::empty())
            .unwrap();
        assert_eq!(status(g.clone(), wrong).await, StatusCode::UNAUTHORIZED);

        let ok = Request::get("/public")
            .header("X-Requested-From", "BookCatApp")
            .body(Body::empty())
            .unwrap();
        assert_eq!(status(g, ok).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn signed_in_request_resolves_identity() {
        let g = gate(None);
        let token = g.issue_token(7, "librarian").unwrap();

        let request = Request::get("/me")
            .header("X-Requested-From", "BookCatApp")
            .header("Authorization", format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let response = app(g.clone()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"librarian");

        let no_origin = Request::get("/me")
            .header("Authorization", format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        assert_eq!(status(g, no_origin).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn admin_routes_need_configured_token() {
        let closed = Request::get("/admin")
            .header(ADMIN_TOKEN_HEADER, "anything")
            .body(Body::empty())
            .unwrap();
        assert_eq!(status(gate(None), closed).await, StatusCode::FORBIDDEN);

        let wrong = Request::get("/admin")
            .header(ADMIN_TOKEN_HEADER, "guess")
            .body(Body::empty())
            .unwrap();
        assert_eq!(status(gate(Some("s3cret")), wrong).await, StatusCode::FORBIDDEN);

        let right = Request::get("/admin")
            .header(ADMIN_TOKEN_HEADER, "s3cret")
            .body(Body::empty())
            .unwrap();
        assert_eq!(status(gate(Some("s3cret")), right).await, StatusCode::OK);
    }
}
