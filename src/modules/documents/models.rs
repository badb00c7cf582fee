use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::utils::deserialize_opt_date;

/// Requested report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum ReportKind {
    /// Every book on the active shelf
    InventoryBook,
    /// Books written off within a date range
    WriteOffAct,
}

impl ReportKind {
    pub fn format(self) -> DocumentFormat {
        match self {
            ReportKind::InventoryBook => DocumentFormat::Allbooks,
            ReportKind::WriteOffAct => DocumentFormat::Removed,
        }
    }
}

/// Stored kind of a generated document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum DocumentFormat {
    Allbooks,
    Removed,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateDocument {
    /// Report title and file name without extension
    #[serde(default)]
    pub name: String,
    pub format: ReportKind,
    #[serde(default, deserialize_with = "deserialize_opt_date")]
    #[schema(value_type = Option<String>, example = "2024-01-01")]
    pub date_from: Option<NaiveDate>,
    #[serde(default, deserialize_with = "deserialize_opt_date")]
    #[schema(value_type = Option<String>, example = "2024-01-31")]
    pub date_to: Option<NaiveDate>,
}

/// A generated report file.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: i64,
    pub library_id: i64,
    pub name: String,
    pub format: DocumentFormat,
    /// Public path of the file
    pub url: String,
    pub date_start: Option<NaiveDate>,
    pub date_end: Option<NaiveDate>,
    pub create_at: DateTime<Utc>,
}
