use anyhow::Context;
use bookcat_app::modules::documents::service::install_default_templates;
use bookcat_kernel::settings::Settings;
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "bookcat-cli", version, about = "BookCat library inventory backend")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply migrations and serve the HTTP API
    Serve,
    /// Apply pending migrations and exit
    Migrate,
    /// Write the default report templates into `reports.templates_dir`
    InitTemplates {
        /// Overwrite templates that already exist
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load().context("failed to load BookCat settings")?;
    bookcat_telemetry::init(&settings.telemetry);

    match cli.command {
        Command::Serve => bookcat_app::run(settings).await,
        Command::Migrate => {
            let applied = bookcat_app::migrate(&settings).await?;
            tracing::info!(applied, db = %settings.database.url, "migrate finished");
            Ok(())
        }
        Command::InitTemplates { force } => {
            let written = install_default_templates(&settings.reports, force)
                .with_context(|| {
                    format!(
                        "failed to write templates into {}",
                        settings.reports.templates_dir.display()
                    )
                })?;
            tracing::info!(
                written = written.len(),
                dir = %settings.reports.templates_dir.display(),
                "init-templates finished"
            );
            Ok(())
        }
    }
}
