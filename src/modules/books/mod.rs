//! Book ledger.

pub mod models;
pub mod routes;
pub mod service;

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    routing::{delete, get, post, put},
    Router,
};
use bookcat_kernel::{InitCtx, Migration, Module};
use utoipa::OpenApi;

use crate::state::AppState;

pub(crate) const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS books (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    library_id        INTEGER NOT NULL REFERENCES libraries(id) ON DELETE RESTRICT,
    inventory_number  TEXT NOT NULL,
    name              TEXT NOT NULL,
    author            TEXT,
    udk               TEXT,
    udk_form_document TEXT,
    price_cents       INTEGER CHECK (price_cents IS NULL OR price_cents >= 0),
    check_document    TEXT,
    year_publishing   INTEGER,
    removed           TEXT,
    create_at         TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS books_library_inventory ON books (library_id, inventory_number);
CREATE INDEX IF NOT EXISTS books_library_removed ON books (library_id, removed);
"#;

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::create_book,
        routes::list_books,
        routes::list_removed_books,
        routes::get_book,
        routes::remove_book,
        routes::unremove_book,
        routes::update_book,
        routes::delete_book,
    ),
    components(schemas(models::Book, models::BookInput, models::BookPage))
)]
struct BooksApi;

pub struct BooksModule {
    state: AppState,
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "book"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "book ledger initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/create", post(routes::create_book))
            .route("/list", get(routes::list_books))
            .route("/list-removed", get(routes::list_removed_books))
            .route("/get/{inventory_number}", get(routes::get_book))
            .route("/remove/{inventory_number}", put(routes::remove_book))
            .route("/unremove/{inventory_number}", put(routes::unremove_book))
            .route("/update/{inventory_number}", put(routes::update_book))
            .route("/delete/{inventory_number}", delete(routes::delete_book))
            .with_state(self.state.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        serde_json::to_value(BooksApi::openapi()).ok()
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![Migration {
            id: "001_init",
            up: SCHEMA,
        }]
    }
}

pub fn create_module(state: AppState) -> Arc<dyn Module> {
    Arc::new(BooksModule { state })
}
