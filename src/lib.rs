//! BookCat application library
//!
//! Library inventory backend: users and their libraries, the book ledger,
//! report documents, subscription plans and public articles. Each concern is a
//! [`Module`](bookcat_kernel::Module) mounted under `/api/{name}`.

pub mod modules;
pub mod state;
pub mod storage;
pub mod utils;

use anyhow::Context;
use axum::Router;
use bookcat_db::Db;
use bookcat_kernel::{settings::Settings, InitCtx, ModuleRegistry};

pub use state::AppState;

/// Register every module, apply pending migrations, then init and start the
/// modules in registration order.
pub async fn bootstrap(settings: &Settings, db: Db) -> anyhow::Result<(ModuleRegistry, AppState)> {
    let state = AppState::new(settings, db.clone()).context("failed to build application state")?;

    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry, &state);
    registry.run_migrations(&db).await?;

    let ctx = InitCtx { settings, db: &db };
    registry.init_modules(&ctx).await?;
    registry.start_modules(&ctx).await?;

    tracing::info!(modules = registry.module_count(), "bookcat bootstrap complete");
    Ok((registry, state))
}

/// Full HTTP surface for a bootstrapped registry.
pub fn router(registry: &ModuleRegistry, settings: &Settings) -> Router {
    bookcat_http::build_router(registry, settings)
}

/// Apply pending migrations without serving. Returns how many ran.
pub async fn migrate(settings: &Settings) -> anyhow::Result<usize> {
    let db = connect(settings).await?;
    let state = AppState::new(settings, db.clone())?;
    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry, &state);
    registry.run_migrations(&db).await
}

/// Connect, bootstrap and serve until shutdown, then stop the modules.
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    let db = connect(&settings).await?;
    let (registry, _state) = bootstrap(&settings, db).await?;

    let served = bookcat_http::start_server(&registry, &settings).await;
    registry.stop_modules().await?;
    served
}

async fn connect(settings: &Settings) -> anyhow::Result<Db> {
    Db::connect(&settings.database.url, settings.database.max_connections)
        .await
        .context("database unavailable")
}
