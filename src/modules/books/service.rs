//! Book ledger: create, filtered listing, retire/restore, overwrite, delete.
//!
//! Every lookup by inventory number is scoped to the caller's library; a book
//! that exists only in another library is reported as not found. Inventory
//! numbers are not unique: a caller-supplied number is stored verbatim, and a
//! lookup resolves to the oldest book carrying it.

use bookcat_http::AppError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use thiserror::Error;

use super::models::{Book, BookInput, BookPage, BookQuery, BookRow};
use crate::modules::libraries::service::{self as libraries, LibraryError};
use crate::utils::{money, non_empty, page_count};

const COLUMNS: &str = "id, library_id, inventory_number, name, author, udk, udk_form_document, \
                       price_cents, check_document, year_publishing, removed, create_at";

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_LIMIT: i64 = 20;
pub const MAX_LIMIT: i64 = 100;

/// Sentinel that asks for the next counter value.
const AUTO_INVENTORY: &str = "0";

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("name is required")]
    NameRequired,
    #[error("inventoryNumber is required")]
    InventoryRequired,
    #[error("price must be a non-negative amount")]
    InvalidPrice,
    #[error("book with inventory number '{0}' not found")]
    NotFound(String),
    #[error("book '{0}' is already written off")]
    AlreadyRetired(String),
    #[error("book '{0}' is not written off")]
    NotRetired(String),
    #[error("{field} must be {expected}")]
    InvalidPage {
        field: &'static str,
        expected: &'static str,
    },
    #[error(transparent)]
    Library(#[from] LibraryError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NameRequired => AppError::invalid_field("name", "required", err.to_string()),
            LedgerError::InventoryRequired => {
                AppError::invalid_field("inventoryNumber", "required", err.to_string())
            }
            LedgerError::InvalidPrice => AppError::invalid_field("price", "invalid", err.to_string()),
            LedgerError::InvalidPage { field, .. } => {
                AppError::invalid_field(field, "out_of_range", err.to_string())
            }
            LedgerError::NotFound(_) => AppError::not_found(err.to_string()),
            LedgerError::AlreadyRetired(ref number) | LedgerError::NotRetired(ref number) => {
                AppError::conflict(vec![json!({"inventoryNumber": number})], err.to_string())
            }
            LedgerError::Library(e) => e.into(),
            LedgerError::Database(e) => AppError::Internal(e.into()),
        }
    }
}

/// Which half of the ledger a listing reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shelf {
    Active,
    Retired,
}

/// Add a book. The counter claim and the insert commit together.
pub async fn create(pool: &SqlitePool, library_id: i64, input: &BookInput) -> Result<Book, LedgerError> {
    let name = required_name(input)?;
    let price_cents = price_cents(input)?;
    let requested = non_empty(input.inventory_number.as_deref())
        .map(str::trim)
        .filter(|n| !n.is_empty() && *n != AUTO_INVENTORY);

    let mut tx = pool.begin().await?;
    let inventory_number = match requested {
        Some(number) => number.to_string(),
        None => libraries::claim_inventory_number(&mut *tx, library_id)
            .await?
            .to_string(),
    };

    let row = sqlx::query_as::<_, BookRow>(&format!(
        "INSERT INTO books (library_id, inventory_number, name, author, udk, udk_form_document, \
         price_cents, check_document, year_publishing, removed, create_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING {COLUMNS}"
    ))
    .bind(library_id)
    .bind(&inventory_number)
    .bind(name)
    .bind(&input.author)
    .bind(&input.udk)
    .bind(&input.udk_form_document)
    .bind(price_cents)
    .bind(&input.check_document)
    .bind(input.year_publishing)
    .bind(input.removed)
    .bind(Utc::now())
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;

    tracing::info!(
        book_id = row.id,
        library_id,
        inventory_number = %row.inventory_number,
        auto_assigned = requested.is_none(),
        "book created"
    );
    Ok(row.into())
}

/// One page of a shelf plus totals over every matching book.
pub async fn list(
    pool: &SqlitePool,
    library_id: i64,
    shelf: Shelf,
    query: &BookQuery,
) -> Result<BookPage, LedgerError> {
    let page = query.page.unwrap_or(DEFAULT_PAGE);
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    if page < 1 {
        return Err(LedgerError::InvalidPage {
            field: "page",
            expected: "at least 1",
        });
    }
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(LedgerError::InvalidPage {
            field: "limit",
            expected: "between 1 and 100",
        });
    }
    let offset = (page - 1).checked_mul(limit).ok_or(LedgerError::InvalidPage {
        field: "page",
        expected: "within range",
    })?;

    let mut totals = filtered("SELECT COUNT(*), COALESCE(SUM(price_cents), 0)", library_id, shelf, query);
    let (total_books, total_cents): (i64, i64) =
        totals.build_query_as().fetch_one(pool).await?;

    let mut rows = filtered(&format!("SELECT {COLUMNS}"), library_id, shelf, query);
    rows.push(" ORDER BY create_at DESC, id DESC LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);
    let books: Vec<BookRow> = rows.build_query_as().fetch_all(pool).await?;

    Ok(BookPage {
        books: books.into_iter().map(Book::from).collect(),
        total_pages: page_count(total_books, limit),
        total_books,
        total_price: money::from_cents(total_cents),
    })
}

fn filtered<'q>(
    select: &str,
    library_id: i64,
    shelf: Shelf,
    query: &BookQuery,
) -> QueryBuilder<'q, Sqlite> {
    let mut qb = QueryBuilder::new(select);
    qb.push(" FROM books WHERE library_id = ").push_bind(library_id);
    qb.push(match shelf {
        Shelf::Active => " AND removed IS NULL",
        Shelf::Retired => " AND removed IS NOT NULL",
    });

    let substrings = [
        ("name", &query.title),
        ("author", &query.author),
        ("udk", &query.udc),
        ("udk_form_document", &query.udc_form),
        ("check_document", &query.accompanying_doc),
    ];
    for (column, value) in substrings {
        if let Some(needle) = non_empty(value.as_deref()) {
            // instr() is case-sensitive, unlike LIKE
            qb.push(format!(" AND instr({column}, "))
                .push_bind(needle.to_string())
                .push(") > 0");
        }
    }
    if let Some(year) = non_empty(query.year.as_deref()) {
        qb.push(" AND CAST(year_publishing AS TEXT) = ")
            .push_bind(year.trim().to_string());
    }
    if let (Shelf::Retired, Some(day)) = (shelf, query.removed) {
        qb.push(" AND date(removed) = ")
            .push_bind(day.format("%Y-%m-%d").to_string());
    }
    qb
}

pub async fn get(pool: &SqlitePool, library_id: i64, inventory_number: &str) -> Result<Book, LedgerError> {
    let mut conn = pool.acquire().await?;
    find(&mut conn, library_id, inventory_number).await
}

/// Write the book off now.
pub async fn retire(
    pool: &SqlitePool,
    library_id: i64,
    inventory_number: &str,
    now: DateTime<Utc>,
) -> Result<Book, LedgerError> {
    let mut tx = pool.begin().await?;
    let book = find(&mut *tx, library_id, inventory_number).await?;
    if book.is_retired() {
        return Err(LedgerError::AlreadyRetired(book.inventory_number));
    }
    let book = set_removed(&mut *tx, book.id, Some(now)).await?;
    tx.commit().await?;

    tracing::info!(library_id, inventory_number, removed = %now, "book written off");
    Ok(book)
}

/// Return a written-off book to the active shelf.
pub async fn restore(pool: &SqlitePool, library_id: i64, inventory_number: &str) -> Result<Book, LedgerError> {
    let mut tx = pool.begin().await?;
    let book = find(&mut *tx, library_id, inventory_number).await?;
    if !book.is_retired() {
        return Err(LedgerError::NotRetired(book.inventory_number));
    }
    let book = set_removed(&mut *tx, book.id, None).await?;
    tx.commit().await?;

    tracing::info!(library_id, inventory_number, "book restored");
    Ok(book)
}

/// Overwrite every mutable field, inventory number and `removed` included.
pub async fn update(
    pool: &SqlitePool,
    library_id: i64,
    inventory_number: &str,
    input: &BookInput,
) -> Result<Book, LedgerError> {
    let name = required_name(input)?;
    let price_cents = price_cents(input)?;
    let new_number = non_empty(input.inventory_number.as_deref())
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or(LedgerError::InventoryRequired)?;

    let mut tx = pool.begin().await?;
    let current = find(&mut *tx, library_id, inventory_number).await?;
    let row = sqlx::query_as::<_, BookRow>(&format!(
        "UPDATE books SET inventory_number = ?, name = ?, author = ?, udk = ?, \
         udk_form_document = ?, price_cents = ?, check_document = ?, year_publishing = ?, \
         removed = ? WHERE id = ? RETURNING {COLUMNS}"
    ))
    .bind(new_number)
    .bind(name)
    .bind(&input.author)
    .bind(&input.udk)
    .bind(&input.udk_form_document)
    .bind(price_cents)
    .bind(&input.check_document)
    .bind(input.year_publishing)
    .bind(input.removed)
    .bind(current.id)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;

    tracing::info!(
        book_id = row.id,
        library_id,
        from = inventory_number,
        to = %row.inventory_number,
        "book updated"
    );
    Ok(row.into())
}

/// Hard delete of one book; returns what was removed.
pub async fn delete(pool: &SqlitePool, library_id: i64, inventory_number: &str) -> Result<Book, LedgerError> {
    let mut tx = pool.begin().await?;
    let current = find(&mut *tx, library_id, inventory_number).await?;
    let row: BookRow = sqlx::query_as(&format!("DELETE FROM books WHERE id = ? RETURNING {COLUMNS}"))
        .bind(current.id)
        .fetch_one(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::info!(book_id = row.id, library_id, inventory_number, "book deleted");
    Ok(row.into())
}

/// Active books, in insertion order.
pub async fn active_books(conn: &mut SqliteConnection, library_id: i64) -> Result<Vec<Book>, LedgerError> {
    let rows: Vec<BookRow> = sqlx::query_as(&format!(
        "SELECT {COLUMNS} FROM books WHERE library_id = ? AND removed IS NULL ORDER BY id"
    ))
    .bind(library_id)
    .fetch_all(conn)
    .await?;
    Ok(rows.into_iter().map(Book::from).collect())
}

/// Books written off within `[from, to]`, in insertion order.
pub async fn retired_between(
    conn: &mut SqliteConnection,
    library_id: i64,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Vec<Book>, LedgerError> {
    let rows: Vec<BookRow> = sqlx::query_as(&format!(
        "SELECT {COLUMNS} FROM books WHERE library_id = ? AND removed IS NOT NULL \
         AND removed >= ? AND removed <= ? ORDER BY id"
    ))
    .bind(library_id)
    .bind(from)
    .bind(to)
    .fetch_all(conn)
    .await?;
    Ok(rows.into_iter().map(Book::from).collect())
}

async fn find(conn: &mut SqliteConnection, library_id: i64, inventory_number: &str) -> Result<Book, LedgerError> {
    find_row(conn, library_id, inventory_number)
        .await?
        .map(Book::from)
        .ok_or_else(|| LedgerError::NotFound(inventory_number.to_string()))
}

async fn find_row(
    conn: &mut SqliteConnection,
    library_id: i64,
    inventory_number: &str,
) -> Result<Option<BookRow>, LedgerError> {
    Ok(sqlx::query_as(&format!(
        "SELECT {COLUMNS} FROM books WHERE library_id = ? AND inventory_number = ? \
         ORDER BY id LIMIT 1"
    ))
    .bind(library_id)
    .bind(inventory_number)
    .fetch_optional(conn)
    .await?)
}

async fn set_removed(
    conn: &mut SqliteConnection,
    id: i64,
    removed: Option<DateTime<Utc>>,
) -> Result<Book, LedgerError> {
    let row: BookRow = sqlx::query_as(&format!(
        "UPDATE books SET removed = ? WHERE id = ? RETURNING {COLUMNS}"
    ))
    .bind(removed)
    .bind(id)
    .fetch_one(conn)
    .await?;
    Ok(row.into())
}

fn required_name(input: &BookInput) -> Result<&str, LedgerError> {
    let name = input.name.trim();
    if name.is_empty() {
        Err(LedgerError::NameRequired)
    } else {
        Ok(name)
    }
}

fn price_cents(input: &BookInput) -> Result<Option<i64>, LedgerError> {
    match input.price {
        None => Ok(None),
        Some(price) if price < Decimal::ZERO => Err(LedgerError::InvalidPrice),
        Some(price) => money::to_cents(price).map(Some).ok_or(LedgerError::InvalidPrice),
    }
}
