use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use bookcat_authz::{AppOrigin, AuthUser};
use bookcat_db::Db;
use bookcat_http::AppError;
use chrono::Utc;

use super::models::{Article, ArticleForm, Upload};
use super::service;
use crate::storage::Storage;

/// Every article, newest first
#[utoipa::path(
    get,
    path = "/",
    tag = "Article",
    responses((status = 200, description = "Articles", body = [Article]))
)]
pub async fn list_articles(
    _origin: AppOrigin,
    State(db): State<Db>,
    State(storage): State<Storage>,
) -> Result<Json<Vec<Article>>, AppError> {
    Ok(Json(service::list(db.pool(), &storage).await?))
}

#[utoipa::path(
    get,
    path = "/by-id/{id}",
    tag = "Article",
    params(("id" = i64, Path, description = "Article id")),
    responses(
        (status = 200, description = "Article", body = Article),
        (status = 404, description = "No such article")
    )
)]
pub async fn get_by_id(
    _origin: AppOrigin,
    State(db): State<Db>,
    State(storage): State<Storage>,
    Path(id): Path<i64>,
) -> Result<Json<Article>, AppError> {
    Ok(Json(service::by_id(db.pool(), &storage, id).await?))
}

#[utoipa::path(
    get,
    path = "/{slug}",
    tag = "Article",
    params(("slug" = String, Path, description = "Article slug")),
    responses(
        (status = 200, description = "Article", body = Article),
        (status = 404, description = "No such article")
    )
)]
pub async fn get_by_slug(
    _origin: AppOrigin,
    State(db): State<Db>,
    State(storage): State<Storage>,
    Path(slug): Path<String>,
) -> Result<Json<Article>, AppError> {
    Ok(Json(service::by_slug(db.pool(), &storage, &slug).await?))
}

/// Publish an article
#[utoipa::path(
    post,
    path = "/",
    tag = "Article",
    request_body(content_type = "multipart/form-data", description = "Fields `title`, `slug`, `content`, optional `category` and `coverImageFile` (jpg, jpeg, png or gif)"),
    responses(
        (status = 201, description = "Published", body = Article),
        (status = 400, description = "Oversized or unsupported cover"),
        (status = 409, description = "Slug already in use"),
        (status = 422, description = "Blank field")
    )
)]
pub async fn create_article(
    user: AuthUser,
    State(db): State<Db>,
    State(storage): State<Storage>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Article>), AppError> {
    let form = read_form(multipart).await?;
    let article = service::create(db.pool(), &storage, &form, Utc::now()).await?;
    tracing::debug!(user_id = user.user_id, article_id = article.id, "article created via api");
    Ok((StatusCode::CREATED, Json(article)))
}

#[utoipa::path(
    put,
    path = "/{id}",
    tag = "Article",
    params(("id" = i64, Path, description = "Article id")),
    request_body(content_type = "multipart/form-data", description = "Fields `title`, `slug`, `content`, optional `category` and `coverImageFile` (jpg, jpeg, png or gif)"),
    responses(
        (status = 204, description = "Updated"),
        (status = 404, description = "No such article"),
        (status = 409, description = "Slug already in use")
    )
)]
pub async fn update_article(
    _user: AuthUser,
    State(db): State<Db>,
    State(storage): State<Storage>,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> Result<StatusCode, AppError> {
    let form = read_form(multipart).await?;
    service::update(db.pool(), &storage, id, &form, Utc::now()).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Article",
    params(("id" = i64, Path, description = "Article id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "No such article")
    )
)]
pub async fn delete_article(
    _user: AuthUser,
    State(db): State<Db>,
    State(storage): State<Storage>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    service::delete(db.pool(), &storage, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Field names are matched case-insensitively; unknown fields are skipped.
async fn read_form(mut multipart: Multipart) -> Result<ArticleForm, AppError> {
    let mut form = ArticleForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_ascii_lowercase();
        if name == "coverimagefile" {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::bad_request(e.body_text()))?;
            form.cover = Some(Upload {
                file_name,
                bytes: bytes.to_vec(),
            });
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| AppError::bad_request(e.body_text()))?;
        match name.as_str() {
            "title" => form.title = value,
            "slug" => form.slug = value,
            "content" => form.content = value,
            "category" => form.category = Some(value),
            _ => {}
        }
    }
    Ok(form)
}
