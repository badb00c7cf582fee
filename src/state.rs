use std::sync::Arc;

use axum::extract::FromRef;
use bookcat_authz::Gate;
use bookcat_db::Db;
use bookcat_kernel::settings::{ReportSettings, Settings};

use crate::storage::Storage;

/// Router state shared by every module.
#[derive(Clone, FromRef)]
pub struct AppState {
    pub db: Db,
    pub gate: Gate,
    pub storage: Storage,
    pub reports: Arc<ReportSettings>,
}

impl AppState {
    pub fn new(settings: &Settings, db: Db) -> anyhow::Result<Self> {
        Ok(Self {
            db,
            gate: Gate::from_settings(&settings.auth)?,
            storage: Storage::new(settings.storage.clone()),
            reports: Arc::new(settings.reports.clone()),
        })
    }
}
