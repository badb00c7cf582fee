use async_trait::async_trait;
use axum::Router;
use bookcat_db::Db;

/// What a module sees while the application boots.
pub struct InitCtx<'a> {
    pub settings: &'a crate::settings::Settings,
    pub db: &'a Db,
}

/// One SQL script owned by a module. `id` orders scripts across modules and
/// is recorded once applied.
#[derive(Debug, Clone)]
pub struct Migration {
    pub id: &'static str,
    pub up: &'static str,
}

/// A slice of the BookCat API: its tables, its routes and its OpenAPI paths.
///
/// Boot order is migrations, then [`init`](Module::init), then
/// [`start`](Module::start); [`stop`](Module::stop) runs in reverse
/// registration order on shutdown.
#[async_trait]
pub trait Module: Sync + Send {
    /// Mount point below `/api`, e.g. `book` for `/api/book/...`.
    fn name(&self) -> &'static str;

    /// Check configuration and external files. Tables already exist here.
    async fn init(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Routes relative to `/api/{name}`, with state already attached.
    fn routes(&self) -> Router {
        Router::new()
    }

    /// OpenAPI document whose paths are relative to the mount point.
    fn openapi(&self) -> Option<serde_json::Value> {
        None
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![]
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
