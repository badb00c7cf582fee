use anyhow::Context;
use bookcat_kernel::settings::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("failed to load BookCat settings")?;
    bookcat_telemetry::init(&settings.telemetry);

    tracing::info!(
        env = ?settings.environment,
        db = %settings.database.url,
        storage = %settings.storage.root.display(),
        "bookcat-app starting"
    );

    bookcat_app::run(settings).await
}
