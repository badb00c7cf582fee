//! Library lifecycle: the caller's own library settings plus the admin
//! status workflow.
//!
//! A fresh library's inventory counter starts at 1, not 0: a book created
//! with inventory number `"0"` (or none) asks for the next counter value, so
//! 0 is never handed out.

pub mod lifecycle;
pub mod models;
pub mod routes;
pub mod service;

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    routing::{get, put},
    Router,
};
use bookcat_kernel::{InitCtx, Migration, Module};
use utoipa::OpenApi;

use crate::state::AppState;

pub(crate) const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS libraries (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id         INTEGER NOT NULL UNIQUE REFERENCES users(id) ON DELETE RESTRICT,
    plan_id         INTEGER REFERENCES plans(id) ON DELETE SET NULL,
    start_inventory INTEGER NOT NULL DEFAULT 1 CHECK (start_inventory >= 0),
    data_end_plan   TEXT,
    status          TEXT NOT NULL DEFAULT 'pending' CHECK (status IN ('pending', 'active', 'banned')),
    dark_theme      INTEGER NOT NULL DEFAULT 0,
    create_at       TEXT NOT NULL
);
"#;

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::get_library,
        routes::get_status,
        routes::get_inventory,
        routes::put_inventory,
        routes::put_plan,
        routes::put_theme,
        routes::confirm_payment,
        routes::ban,
        routes::reset,
        routes::in_waiting,
        routes::banned_eligible,
        routes::pending_eligible,
    ),
    components(schemas(
        models::Library,
        models::LibraryStatus,
        models::StatusView,
        models::InventoryCounter,
        models::InventoryUpdated,
        models::PlanChange,
        models::ThemeChange,
    ))
)]
struct LibrariesApi;

pub struct LibrariesModule {
    state: AppState,
}

#[async_trait]
impl Module for LibrariesModule {
    fn name(&self) -> &'static str {
        "library"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            admin_enabled = ctx.settings.auth.admin_token.is_some(),
            "library module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/", get(routes::get_library))
            .route("/status", get(routes::get_status))
            .route("/inventory", get(routes::get_inventory).put(routes::put_inventory))
            .route("/plan", put(routes::put_plan))
            .route("/theme", put(routes::put_theme))
            .route("/admin/in-waiting", get(routes::in_waiting))
            .route("/admin/banned-eligible", get(routes::banned_eligible))
            .route("/admin/pending-eligible", get(routes::pending_eligible))
            .route("/admin/{id}/confirm-payment", put(routes::confirm_payment))
            .route("/admin/{id}/ban", put(routes::ban))
            .route("/admin/{id}/reset", put(routes::reset))
            .with_state(self.state.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        serde_json::to_value(LibrariesApi::openapi()).ok()
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![Migration {
            id: "001_init",
            up: SCHEMA,
        }]
    }
}

pub fn create_module(state: AppState) -> Arc<dyn Module> {
    Arc::new(LibrariesModule { state })
}
