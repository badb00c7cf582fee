use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use bookcat_authz::AuthUser;
use bookcat_db::Db;
use bookcat_http::{AppError, AppJson};
use bookcat_kernel::settings::ReportSettings;
use chrono::Utc;

use super::models::{CreateDocument, Document};
use super::service;
use crate::modules::libraries::service as libraries;
use crate::storage::Storage;

pub const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Generate a report and download it
#[utoipa::path(
    post,
    path = "/create",
    tag = "Documents",
    request_body = CreateDocument,
    responses(
        (status = 200, description = "Rendered report", content_type = "application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
        (status = 422, description = "Bad name or date range"),
        (status = 500, description = "Template missing or malformed")
    )
)]
pub async fn create_document(
    user: AuthUser,
    State(db): State<Db>,
    State(storage): State<Storage>,
    State(settings): State<Arc<ReportSettings>>,
    AppJson(request): AppJson<CreateDocument>,
) -> Result<Response, AppError> {
    let library_id = libraries::id_for_user(db.pool(), user.user_id).await?;
    let report =
        service::generate(db.pool(), &storage, &settings, library_id, &request, Utc::now()).await?;

    let disposition = HeaderValue::from_str(&content_disposition(&report.file_name))
        .map_err(|e| AppError::Internal(e.into()))?;
    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(DOCX_MIME)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        report.bytes,
    )
        .into_response())
}

/// Generated documents, newest first
#[utoipa::path(
    get,
    path = "/all",
    tag = "Documents",
    responses((status = 200, description = "Documents of the caller's library", body = [Document]))
)]
pub async fn list_documents(user: AuthUser, State(db): State<Db>) -> Result<Json<Vec<Document>>, AppError> {
    let library_id = libraries::id_for_user(db.pool(), user.user_id).await?;
    Ok(Json(service::list(db.pool(), library_id).await?))
}

/// `attachment` with an ASCII fallback name plus the UTF-8 `filename*` form.
fn content_disposition(file_name: &str) -> String {
    let fallback: String = file_name
        .chars()
        .map(|c| match c {
            ' '..='~' if c != '"' && c != '\\' => c,
            _ => '_',
        })
        .collect();

    let mut encoded = String::with_capacity(file_name.len() * 3);
    for byte in file_name.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{byte:02X}")),
        }
    }

    format!("attachment; filename=\"{fallback}\"; filename*=UTF-8''{encoded}")
}
