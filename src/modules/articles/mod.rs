//! Public news articles with optional cover images.

pub mod models;
pub mod routes;
pub mod service;

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::DefaultBodyLimit,
    routing::get,
    Router,
};
use bookcat_kernel::{Migration, Module};
use utoipa::OpenApi;

use crate::state::AppState;

pub(crate) const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS articles (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    title       TEXT NOT NULL,
    slug        TEXT NOT NULL UNIQUE,
    category    TEXT,
    content     TEXT NOT NULL,
    cover_image TEXT,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_articles_created ON articles (created_at);
"#;

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::list_articles,
        routes::get_by_id,
        routes::get_by_slug,
        routes::create_article,
        routes::update_article,
        routes::delete_article,
    ),
    components(schemas(models::Article))
)]
struct ArticlesApi;

pub struct ArticlesModule {
    state: AppState,
    upload_limit: usize,
}

#[async_trait]
impl Module for ArticlesModule {
    fn name(&self) -> &'static str {
        "article"
    }

    // `/{key}` carries the slug on GET and the numeric id on PUT and DELETE.
    fn routes(&self) -> Router {
        Router::new()
            .route(
                "/",
                get(routes::list_articles).post(routes::create_article),
            )
            .route("/by-id/{id}", get(routes::get_by_id))
            .route(
                "/{key}",
                get(routes::get_by_slug)
                    .put(routes::update_article)
                    .delete(routes::delete_article),
            )
            .layer(DefaultBodyLimit::max(self.upload_limit))
            .with_state(self.state.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        serde_json::to_value(ArticlesApi::openapi()).ok()
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
    Arc::new(ArticlesModule {
        state,
        upload_limit,
    })
}
