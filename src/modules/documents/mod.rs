//! Report documents: inventory book and write-off act rendered from `.docx`
//! templates, stored under the library's file tree and recorded per library.

pub mod models;
pub mod render;
pub mod routes;
pub mod service;
pub mod template;

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    routing::{get, post},
    Router,
};
use bookcat_kernel::{InitCtx, Migration, Module};
use utoipa::OpenApi;

use crate::state::AppState;

pub(crate) const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    library_id INTEGER NOT NULL REFERENCES libraries(id) ON DELETE RESTRICT,
    name       TEXT NOT NULL,
    format     TEXT NOT NULL CHECK (format IN ('allbooks', 'removed')),
    url        TEXT NOT NULL,
    date_start TEXT,
    date_end   TEXT,
    create_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS documents_library ON documents (library_id, create_at);
"#;

#[derive(OpenApi)]
#[openapi(
    paths(routes::create_document, routes::list_documents),
    components(schemas(
        models::CreateDocument,
        models::ReportKind,
        models::Document,
        models::DocumentFormat,
    ))
)]
struct DocumentsApi;

pub struct DocumentsModule {
    state: AppState,
}

#[async_trait]
impl Module for DocumentsModule {
    fn name(&self) -> &'static str {
        "document"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        let reports = &ctx.settings.reports;
        for template in [&reports.inventory_book_template, &reports.write_off_act_template] {
            let path = reports.templates_dir.join(template);
            if !path.is_file() {
                tracing::warn!(
                    path = %path.display(),
                    "report template not found; run `bookcat-cli init-templates`"
                );
            }
        }
        tracing::info!(
            module = self.name(),
            templates = %reports.templates_dir.display(),
            "document module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/create", post(routes::create_document))
            .route("/all", get(routes::list_documents))
            .with_state(self.state.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        serde_json::to_value(DocumentsApi::openapi()).ok()
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![Migration {
            id: "001_init",
            up: SCHEMA,
        }]
    }
}

pub fn create_module(state: AppState) -> Arc<dyn Module> {
    Arc::new(DocumentsModule { state })
}
