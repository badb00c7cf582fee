use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::utils::{deserialize_opt_date, money};

/// A physical book in a library's ledger.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: i64,
    pub library_id: i64,
    pub inventory_number: String,
    pub name: String,
    pub author: Option<String>,
    /// Classification code
    pub udk: Option<String>,
    pub udk_form_document: Option<String>,
    #[schema(value_type = Option<String>, example = "120.50")]
    pub price: Option<Decimal>,
    /// Accompanying document reference
    pub check_document: Option<String>,
    pub year_publishing: Option<i32>,
    /// Set while the book is written off
    pub removed: Option<DateTime<Utc>>,
    pub create_at: DateTime<Utc>,
}

impl Book {
    pub fn is_retired(&self) -> bool {
        self.removed.is_some()
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct BookRow {
    pub id: i64,
    pub library_id: i64,
    pub inventory_number: String,
    pub name: String,
    pub author: Option<String>,
    pub udk: Option<String>,
    pub udk_form_document: Option<String>,
    pub price_cents: Option<i64>,
    pub check_document: Option<String>,
    pub year_publishing: Option<i32>,
    pub removed: Option<DateTime<Utc>>,
    pub create_at: DateTime<Utc>,
}

impl From<BookRow> for Book {
    fn from(row: BookRow) -> Self {
        Self {
            id: row.id,
            library_id: row.library_id,
            inventory_number: row.inventory_number,
            name: row.name,
            author: row.author,
            udk: row.udk,
            udk_form_document: row.udk_form_document,
            price: row.price_cents.map(money::from_cents),
            check_document: row.check_document,
            year_publishing: row.year_publishing,
            removed: row.removed,
            create_at: row.create_at,
        }
    }
}

/// Body for create and for the full-overwrite update.
///
/// On create, an absent, empty or `"0"` inventory number asks for the next
/// number from the library counter.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookInput {
    pub inventory_number: Option<String>,
    #[serde(default)]
    pub name: String,
    pub author: Option<String>,
    pub udk: Option<String>,
    pub udk_form_document: Option<String>,
    #[schema(value_type = Option<String>, example = "120.50")]
    pub price: Option<Decimal>,
    pub check_document: Option<String>,
    pub year_publishing: Option<i32>,
    pub removed: Option<DateTime<Utc>>,
}

/// Query string for both listings. Empty values are ignored.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct BookQuery {
    /// 1-based page, default 1
    pub page: Option<i64>,
    /// Page size 1..=100, default 20
    pub limit: Option<i64>,
    /// Substring of the name
    pub title: Option<String>,
    pub author: Option<String>,
    /// Exact publishing year
    pub year: Option<String>,
    pub udc: Option<String>,
    pub udc_form: Option<String>,
    pub accompanying_doc: Option<String>,
    /// Write-off day, retired listing only
    #[serde(default, deserialize_with = "deserialize_opt_date")]
    #[param(value_type = Option<String>, example = "2024-01-31")]
    pub removed: Option<NaiveDate>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookPage {
    pub books: Vec<Book>,
    pub total_pages: i64,
    pub total_books: i64,
    /// Sum of known prices over every matching book
    #[schema(value_type = String, example = "1520.00")]
    pub total_price: Decimal,
}
