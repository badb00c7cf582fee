//! Registration, sign-in and the signed-in user's profile.

pub mod models;
pub mod routes;
pub mod service;

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use bookcat_kernel::{InitCtx, Migration, Module};
use utoipa::OpenApi;

use crate::state::AppState;

pub(crate) const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    username      TEXT NOT NULL,
    userlogin     TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    userimage     TEXT,
    create_at     TEXT NOT NULL
);
"#;

#[derive(OpenApi)]
#[openapi(
    paths(routes::register, routes::login, routes::me, routes::put_image),
    components(schemas(
        models::Registration,
        models::RegisteredUser,
        models::Credentials,
        models::TokenResponse,
        models::Profile,
        models::ImageUpdated,
    ))
)]
struct UsersApi;

pub struct UsersModule {
    state: AppState,
    upload_limit: usize,
}

#[async_trait]
impl Module for UsersModule {
    fn name(&self) -> &'static str {
        "user"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            token_ttl_minutes = ctx.settings.auth.token_ttl_minutes,
            "user module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/register", post(routes::register))
            .route("/login", post(routes::login))
            .route("/me", get(routes::me))
            .route("/image", put(routes::put_image))
            .layer(DefaultBodyLimit::max(self.upload_limit))
            .with_state(self.state.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        serde_json::to_value(UsersApi::openapi()).ok()
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![Migration {
            id: "001_init",
            up: SCHEMA,
        }]
    }
}

pub fn create_module(state: AppState) -> Arc<dyn Module> {
    let upload_limit = state.storage.upload_limit();
    Arc::new(UsersModule {
        state,
        upload_limit,
    })
}
