//! Subscription plans: public catalogue, admin-managed.

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
CREATE TABLE IF NOT EXISTS plans (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    max_books   INTEGER NOT NULL CHECK (max_books >= 0),
    price_cents INTEGER NOT NULL CHECK (price_cents >= 0)
);
"#;

#[derive(OpenApi)]
#[openapi(
    paths(routes::list_plans, routes::create_plan, routes::update_plan),
    components(schemas(models::Plan, models::PlanInput))
)]
struct PlansApi;

pub struct PlansModule {
    state: AppState,
}

#[async_trait]
impl Module for PlansModule {
    fn name(&self) -> &'static str {
        "plan"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "plans module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/", get(routes::list_plans).post(routes::create_plan))
            .route("/{id}", put(routes::update_plan))
            .with_state(self.state.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        serde_json::to_value(PlansApi::openapi()).ok()
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![Migration {
            id: "001_init",
            up: SCHEMA,
        }]
    }
}

pub fn create_module(state: AppState) -> Arc<dyn Module> {
    Arc::new(PlansModule { state })
}
