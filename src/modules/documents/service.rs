use std::io;
use std::path::PathBuf;

use bookcat_http::AppError;
use bookcat_kernel::settings::ReportSettings;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use sqlx::SqlitePool;
use thiserror::Error;

use super::models::{CreateDocument, Document, ReportKind};
use super::render;
use super::template::{DocxTemplate, TemplateError};
use crate::modules::books::service::{self as books, LedgerError};
use crate::storage::Storage;
use crate::utils::is_safe_file_stem;

const COLUMNS: &str = "id, library_id, name, format, url, date_start, date_end, create_at";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("name is required")]
    NameRequired,
    #[error("'{0}' cannot be used as a file name")]
    UnsafeName(String),
    #[error("writeOffAct requires both dateFrom and dateTo")]
    RangeRequired,
    #[error("dateFrom must not be after dateTo")]
    RangeInverted,
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("report rendering task failed")]
    Task(#[from] tokio::task::JoinError),
    #[error("failed to store report: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl From<ReportError> for AppError {
    fn from(err: ReportError) -> Self {
        match err {
            ReportError::NameRequired => AppError::invalid_field("name", "required", err.to_string()),
            ReportError::UnsafeName(_) => AppError::invalid_field("name", "invalid", err.to_string()),
            ReportError::RangeRequired => AppError::invalid_field("dateFrom", "required", err.to_string()),
            ReportError::RangeInverted => AppError::invalid_field("dateFrom", "after_date_to", err.to_string()),
            ReportError::Template(TemplateError::Missing(ref path)) => {
                tracing::error!(path = %path.display(), "report template missing");
                AppError::fault("template_missing", err.to_string())
            }
            ReportError::Template(TemplateError::Malformed(ref reason)) => {
                tracing::error!(reason = %reason, "report template malformed");
                AppError::fault("template_malformed", err.to_string())
            }
            ReportError::Ledger(e) => e.into(),
            ReportError::Template(TemplateError::Io(e)) | ReportError::Io(e) => {
                AppError::Internal(anyhow::Error::new(e).context("report generation failed"))
            }
            ReportError::Task(e) => AppError::Internal(e.into()),
            ReportError::Database(e) => AppError::Internal(e.into()),
        }
    }
}

/// A rendered report, already stored and recorded.
#[derive(Debug)]
pub struct GeneratedReport {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub document: Document,
}

/// Inclusive date range checked against the report kind.
fn validated_range(request: &CreateDocument) -> Result<Option<(NaiveDate, NaiveDate)>, ReportError> {
    match request.format {
        ReportKind::InventoryBook => Ok(None),
        ReportKind::WriteOffAct => {
            let (Some(from), Some(to)) = (request.date_from, request.date_to) else {
                return Err(ReportError::RangeRequired);
            };
            if from > to {
                return Err(ReportError::RangeInverted);
            }
            Ok(Some((from, to)))
        }
    }
}

/// `from` 00:00:00.000 through `to` 23:59:59.999, UTC.
fn day_bounds(from: NaiveDate, to: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = from.and_time(NaiveTime::MIN).and_utc();
    let end = to.and_time(NaiveTime::MIN).and_utc() + Duration::days(1) - Duration::milliseconds(1);
    (start, end)
}

fn template_name(settings: &ReportSettings, kind: ReportKind) -> &str {
    match kind {
        ReportKind::InventoryBook => &settings.inventory_book_template,
        ReportKind::WriteOffAct => &settings.write_off_act_template,
    }
}

/// Render, store and record a report. Nothing is written unless the template
/// renders completely.
pub async fn generate(
    pool: &SqlitePool,
    storage: &Storage,
    settings: &ReportSettings,
    library_id: i64,
    request: &CreateDocument,
    now: DateTime<Utc>,
) -> Result<GeneratedReport, ReportError> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(ReportError::NameRequired);
    }
    if !is_safe_file_stem(name) {
        return Err(ReportError::UnsafeName(name.to_string()));
    }
    let range = validated_range(request)?;

    let mut books = {
        let mut conn = pool.acquire().await?;
        match range {
            None => books::active_books(&mut conn, library_id).await?,
            Some((from, to)) => {
                let (start, end) = day_bounds(from, to);
                books::retired_between(&mut conn, library_id, start, end).await?
            }
        }
    };
    let book_count = books.len();

    let template_path = settings.templates_dir.join(template_name(settings, request.format));
    let kind = request.format;
    let title = name.to_string();
    let marker = settings.summary_marker.clone();
    let bytes = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, TemplateError> {
        let mut template = DocxTemplate::open(&template_path)?;
        render::render(&mut template, kind, &title, &mut books, &marker)?;
        template.to_bytes()
    })
    .await??;

    let file_name = format!("{name}.docx");
    let location = storage.report_location(library_id, now.date_naive(), &file_name);
    storage.write_atomic(&location.path, bytes.clone()).await?;

    let (date_start, date_end) = range.unzip();
    let document = sqlx::query_as::<_, Document>(&format!(
        "INSERT INTO documents (library_id, name, format, url, date_start, date_end, create_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING {COLUMNS}"
    ))
    .bind(library_id)
    .bind(name)
    .bind(kind.format())
    .bind(&location.url)
    .bind(date_start)
    .bind(date_end)
    .bind(now)
    .fetch_one(pool)
    .await?;

    tracing::info!(
        document_id = document.id,
        library_id,
        kind = ?kind,
        books = book_count,
        size = bytes.len(),
        url = %location.url,
        "report generated"
    );
    Ok(GeneratedReport {
        file_name,
        bytes,
        document,
    })
}

/// The library's documents, newest first.
pub async fn list(pool: &SqlitePool, library_id: i64) -> Result<Vec<Document>, ReportError> {
    Ok(sqlx::query_as::<_, Document>(&format!(
        "SELECT {COLUMNS} FROM documents WHERE library_id = ? ORDER BY create_at DESC, id DESC"
    ))
    .bind(library_id)
    .fetch_all(pool)
    .await?)
}

/// Write the built-in templates into `templates_dir`. Existing files are kept
/// unless `force` is set. Returns the paths that were written.
pub fn install_default_templates(settings: &ReportSettings, force: bool) -> Result<Vec<PathBuf>, ReportError> {
    std::fs::create_dir_all(&settings.templates_dir)?;

    let mut written = Vec::new();
    for kind in [ReportKind::InventoryBook, ReportKind::WriteOffAct] {
        let path = settings.templates_dir.join(template_name(settings, kind));
        if path.exists() && !force {
            tracing::info!(path = %path.display(), "template already present, skipped");
            continue;
        }
        let bytes = render::default_template(kind, &settings.summary_marker)?;
        std::fs::write(&path, bytes)?;
        tracing::info!(path = %path.display(), "template written");
        written.push(path);
    }
    Ok(written)
}
