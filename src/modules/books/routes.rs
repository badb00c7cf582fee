use axum::{
    extract::{Path, Query, State},
    Json,
};
use bookcat_authz::AuthUser;
use bookcat_db::Db;
use bookcat_http::{AppError, AppJson};
use chrono::Utc;

use super::models::{Book, BookInput, BookPage, BookQuery};
use super::service::{self, Shelf};
use crate::modules::libraries::service as libraries;

async fn caller_library(db: &Db, user: &AuthUser) -> Result<i64, AppError> {
    Ok(libraries::id_for_user(db.pool(), user.user_id).await?)
}

/// Add a book; the inventory number is assigned when absent or "0"
#[utoipa::path(
    post,
    path = "/create",
    tag = "Books",
    request_body = BookInput,
    responses(
        (status = 200, description = "Book created", body = Book),
        (status = 422, description = "Name missing")
    )
)]
pub async fn create_book(
    user: AuthUser,
    State(db): State<Db>,
    AppJson(input): AppJson<BookInput>,
) -> Result<Json<Book>, AppError> {
    let library_id = caller_library(&db, &user).await?;
    Ok(Json(service::create(db.pool(), library_id, &input).await?))
}

/// Active books, newest first
#[utoipa::path(
    get,
    path = "/list",
    tag = "Books",
    params(BookQuery),
    responses((status = 200, description = "One page of active books", body = BookPage))
)]
pub async fn list_books(
    user: AuthUser,
    State(db): State<Db>,
    Query(query): Query<BookQuery>,
) -> Result<Json<BookPage>, AppError> {
    let library_id = caller_library(&db, &user).await?;
    Ok(Json(service::list(db.pool(), library_id, Shelf::Active, &query).await?))
}

/// Written-off books, newest first
#[utoipa::path(
    get,
    path = "/list-removed",
    tag = "Books",
    params(BookQuery),
    responses((status = 200, description = "One page of written-off books", body = BookPage))
)]
pub async fn list_removed_books(
    user: AuthUser,
    State(db): State<Db>,
    Query(query): Query<BookQuery>,
) -> Result<Json<BookPage>, AppError> {
    let library_id = caller_library(&db, &user).await?;
    Ok(Json(service::list(db.pool(), library_id, Shelf::Retired, &query).await?))
}

/// One book by inventory number
#[utoipa::path(
    get,
    path = "/get/{inventory_number}",
    tag = "Books",
    params(("inventory_number" = String, Path, description = "Inventory number")),
    responses(
        (status = 200, description = "Book", body = Book),
        (status = 404, description = "Not in the caller's library")
    )
)]
pub async fn get_book(
    user: AuthUser,
    State(db): State<Db>,
    Path(inventory_number): Path<String>,
) -> Result<Json<Book>, AppError> {
    let library_id = caller_library(&db, &user).await?;
    Ok(Json(service::get(db.pool(), library_id, &inventory_number).await?))
}

/// Write a book off
#[utoipa::path(
    put,
    path = "/remove/{inventory_number}",
    tag = "Books",
    params(("inventory_number" = String, Path, description = "Inventory number")),
    responses(
        (status = 200, description = "Book written off", body = Book),
        (status = 404, description = "Not in the caller's library"),
        (status = 409, description = "Already written off")
    )
)]
pub async fn remove_book(
    user: AuthUser,
    State(db): State<Db>,
    Path(inventory_number): Path<String>,
) -> Result<Json<Book>, AppError> {
    let library_id = caller_library(&db, &user).await?;
    Ok(Json(
        service::retire(db.pool(), library_id, &inventory_number, Utc::now()).await?,
    ))
}

/// Return a written-off book to the shelf
#[utoipa::path(
    put,
    path = "/unremove/{inventory_number}",
    tag = "Books",
    params(("inventory_number" = String, Path, description = "Inventory number")),
    responses(
        (status = 200, description = "Book restored", body = Book),
        (status = 404, description = "Not in the caller's library"),
        (status = 409, description = "Not written off")
    )
)]
pub async fn unremove_book(
    user: AuthUser,
    State(db): State<Db>,
    Path(inventory_number): Path<String>,
) -> Result<Json<Book>, AppError> {
    let library_id = caller_library(&db, &user).await?;
    Ok(Json(service::restore(db.pool(), library_id, &inventory_number).await?))
}

/// Overwrite a book
#[utoipa::path(
    put,
    path = "/update/{inventory_number}",
    tag = "Books",
    params(("inventory_number" = String, Path, description = "Current inventory number")),
    request_body = BookInput,
    responses(
        (status = 200, description = "Book updated", body = Book),
        (status = 404, description = "Not in the caller's library")
    )
)]
pub async fn update_book(
    user: AuthUser,
    State(db): State<Db>,
    Path(inventory_number): Path<String>,
    AppJson(input): AppJson<BookInput>,
) -> Result<Json<Book>, AppError> {
    let library_id = caller_library(&db, &user).await?;
    Ok(Json(
        service::update(db.pool(), library_id, &inventory_number, &input).await?,
    ))
}

/// Delete a book permanently
#[utoipa::path(
    delete,
    path = "/delete/{inventory_number}",
    tag = "Books",
    params(("inventory_number" = String, Path, description = "Inventory number")),
    responses(
        (status = 200, description = "Deleted book", body = Book),
        (status = 404, description = "Not in the caller's library")
    )
)]
pub async fn delete_book(
    user: AuthUser,
    State(db): State<Db>,
    Path(inventory_number): Path<String>,
) -> Result<Json<Book>, AppError> {
    let library_id = caller_library(&db, &user).await?;
    Ok(Json(service::delete(db.pool(), library_id, &inventory_number).await?))
}
