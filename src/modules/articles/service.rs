use bookcat_http::AppError;
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::SqlitePool;
use thiserror::Error;

use super::models::{Article, ArticleForm, ArticleRow};
use crate::storage::{Storage, StorageError};
use crate::utils::is_unique_violation;

pub(crate) const IMAGE_CATEGORY: &str = "articles";

const COLUMNS: &str = "id, title, slug, category, content, cover_image, created_at, updated_at";

#[derive(Debug, Error)]
pub enum ArticleError {
    #[error("{0} is required")]
    Required(&'static str),
    #[error("article '{0}' not found")]
    NotFound(String),
    #[error("slug '{0}' is already in use")]
    DuplicateSlug(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl From<ArticleError> for AppError {
    fn from(err: ArticleError) -> Self {
        match err {
            ArticleError::Required(field) => {
                AppError::invalid_field(field, "required", err.to_string())
            }
            ArticleError::NotFound(_) => AppError::not_found(err.to_string()),
            ArticleError::DuplicateSlug(ref slug) => AppError::conflict(
                vec![json!({"field": "slug", "value": slug})],
                err.to_string(),
            ),
            ArticleError::Storage(e) => e.into(),
            ArticleError::Database(e) => AppError::Internal(e.into()),
        }
    }
}

/// Newest first.
pub async fn list(pool: &SqlitePool, storage: &Storage) -> Result<Vec<Article>, ArticleError> {
    let rows = sqlx::query_as::<_, ArticleRow>(&format!(
        "SELECT {COLUMNS} FROM articles ORDER BY created_at DESC, id DESC"
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|row| Article::from_row(row, storage)).collect())
}

pub async fn by_id(pool: &SqlitePool, storage: &Storage, id: i64) -> Result<Article, ArticleError> {
    let row = find_by_id(pool, id).await?;
    Ok(Article::from_row(row, storage))
}

pub async fn by_slug(pool: &SqlitePool, storage: &Storage, slug: &str) -> Result<Article, ArticleError> {
    let row = sqlx::query_as::<_, ArticleRow>(&format!("SELECT {COLUMNS} FROM articles WHERE slug = ?"))
        .bind(slug)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ArticleError::NotFound(slug.to_string()))?;
    Ok(Article::from_row(row, storage))
}

/// Publish an article. The cover is stored first and dropped again if the
/// row cannot be written.
pub async fn create(
    pool: &SqlitePool,
    storage: &Storage,
    form: &ArticleForm,
    now: DateTime<Utc>,
) -> Result<Article, ArticleError> {
    validate(form)?;
    let cover = store_cover(storage, form).await?;

    let inserted = sqlx::query_as::<_, ArticleRow>(&format!(
        "INSERT INTO articles (title, slug, category, content, cover_image, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING {COLUMNS}"
    ))
    .bind(form.title.trim())
    .bind(form.slug.trim())
    .bind(category(form))
    .bind(&form.content)
    .bind(&cover)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await;

    let row = match inserted {
        Ok(row) => row,
        Err(e) => {
            discard(storage, cover.as_deref()).await;
            return Err(slug_conflict(e, form));
        }
    };

    tracing::info!(article_id = row.id, slug = %row.slug, "article published");
    Ok(Article::from_row(row, storage))
}

/// Overwrite every field. A new cover replaces the old file; without one
/// the existing cover is kept.
pub async fn update(
    pool: &SqlitePool,
    storage: &Storage,
    id: i64,
    form: &ArticleForm,
    now: DateTime<Utc>,
) -> Result<(), ArticleError> {
    validate(form)?;
    let existing = find_by_id(pool, id).await?;
    let cover = store_cover(storage, form).await?;

    let updated = sqlx::query(
        "UPDATE articles SET title = ?, slug = ?, category = ?, content = ?, \
         cover_image = COALESCE(?, cover_image), updated_at = ? WHERE id = ?",
    )
    .bind(form.title.trim())
    .bind(form.slug.trim())
    .bind(category(form))
    .bind(&form.content)
    .bind(&cover)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await;

    match updated {
        Ok(result) if result.rows_affected() == 0 => {
            discard(storage, cover.as_deref()).await;
            return Err(ArticleError::NotFound(id.to_string()));
        }
        Ok(_) => {}
        Err(e) => {
            discard(storage, cover.as_deref()).await;
            return Err(slug_conflict(e, form));
        }
    }

    if cover.is_some() {
        discard(storage, existing.cover_image.as_deref()).await;
    }
    tracing::info!(article_id = id, "article updated");
    Ok(())
}

pub async fn delete(pool: &SqlitePool, storage: &Storage, id: i64) -> Result<(), ArticleError> {
    let cover: Option<String> = sqlx::query_scalar("DELETE FROM articles WHERE id = ? RETURNING cover_image")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ArticleError::NotFound(id.to_string()))?;

    discard(storage, cover.as_deref()).await;
    tracing::info!(article_id = id, "article deleted");
    Ok(())
}

fn validate(form: &ArticleForm) -> Result<(), ArticleError> {
    if form.title.trim().is_empty() {
        return Err(ArticleError::Required("title"));
    }
    if form.slug.trim().is_empty() {
        return Err(ArticleError::Required("slug"));
    }
    if form.content.trim().is_empty() {
        return Err(ArticleError::Required("content"));
    }
    Ok(())
}

fn category(form: &ArticleForm) -> Option<&str> {
    form.category.as_deref().map(str::trim).filter(|c| !c.is_empty())
}

async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<ArticleRow, ArticleError> {
    sqlx::query_as::<_, ArticleRow>(&format!("SELECT {COLUMNS} FROM articles WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ArticleError::NotFound(id.to_string()))
}

async fn store_cover(storage: &Storage, form: &ArticleForm) -> Result<Option<String>, ArticleError> {
    match &form.cover {
        Some(upload) if !upload.bytes.is_empty() => Ok(Some(
            storage
                .save_image(IMAGE_CATEGORY, &upload.file_name, &upload.bytes)
                .await?,
        )),
        _ => Ok(None),
    }
}

async fn discard(storage: &Storage, file_name: Option<&str>) {
    if let Some(file_name) = file_name {
        storage.remove_image(IMAGE_CATEGORY, file_name).await;
    }
}

fn slug_conflict(err: sqlx::Error, form: &ArticleForm) -> ArticleError {
    if is_unique_violation(&err) {
        ArticleError::DuplicateSlug(form.slug.trim().to_string())
    } else {
        err.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::articles::models::Upload;
    use crate::testing;
    use chrono::Duration;

    fn form(title: &str, slug: &str) -> ArticleForm {
        ArticleForm {
            title: title.to_string(),
            category: Some("news".to_string()),
            slug: slug.to_string(),
            content: "Opening hours change in May.".to_string(),
            cover: None,
        }
    }

    fn cover(name: &str) -> Option<Upload> {
        Some(Upload {
            file_name: name.to_string(),
            bytes: b"GIF89a".to_vec(),
        })
    }

    fn stored_files(storage: &Storage) -> usize {
        std::fs::read_dir(storage.root().join("library-uploads").join(IMAGE_CATEGORY))
            .map(|dir| dir.count())
            .unwrap_or(0)
    }

    #[tokio::test]
    async fn blank_fields_are_rejected() {
        let db = testing::db().await;
        let dir = tempfile::tempdir().unwrap();
        let storage = testing::storage(dir.path());

        let err = create(db.pool(), &storage, &form("  ", "s"), Utc::now()).await.unwrap_err();
        assert!(matches!(err, ArticleError::Required("title")));
        let err = create(db.pool(), &storage, &form("t", ""), Utc::now()).await.unwrap_err();
        assert!(matches!(err, ArticleError::Required("slug")));
    }

    #[tokio::test]
    async fn list_is_newest_first_with_absolute_cover_urls() {
        let db = testing::db().await;
        let dir = tempfile::tempdir().unwrap();
        let storage = testing::storage(dir.path());
        let earlier = Utc::now() - Duration::days(1);

        let old = create(db.pool(), &storage, &form("Old", "old"), earlier).await.unwrap();
        let mut with_cover = form("New", "new");
        with_cover.cover = cover("cover.gif");
        let new = create(db.pool(), &storage, &with_cover, Utc::now()).await.unwrap();

        let listed = list(db.pool(), &storage).await.unwrap();
        assert_eq!(listed.iter().map(|a| a.id).collect::<Vec<_>>(), vec![new.id, old.id]);
        let url = listed[0].cover_image.clone().unwrap();
        assert!(url.starts_with("https://books.example.org/library-uploads/articles/"));
        assert_eq!(by_slug(db.pool(), &storage, "new").await.unwrap(), listed[0]);
    }

    #[tokio::test]
    async fn duplicate_slug_conflicts_and_keeps_no_orphan_cover() {
        let db = testing::db().await;
        let dir = tempfile::tempdir().unwrap();
        let storage = testing::storage(dir.path());
        create(db.pool(), &storage, &form("First", "hours"), Utc::now()).await.unwrap();

        let mut second = form("Second", "hours");
        second.cover = cover("second.png");
        let err = create(db.pool(), &storage, &second, Utc::now()).await.unwrap_err();
        assert!(matches!(err, ArticleError::DuplicateSlug(ref s) if s == "hours"));
        assert_eq!(stored_files(&storage), 0);
    }

    #[tokio::test]
    async fn update_replaces_cover_and_delete_removes_it() {
        let db = testing::db().await;
        let dir = tempfile::tempdir().unwrap();
        let storage = testing::storage(dir.path());

        let mut initial = form("Hours", "hours");
        initial.cover = cover("first.jpg");
        let article = create(db.pool(), &storage, &initial, Utc::now()).await.unwrap();
        assert_eq!(stored_files(&storage), 1);

        let mut edited = form("Summer hours", "summer-hours");
        edited.cover = cover("second.png");
        update(db.pool(), &storage, article.id, &edited, Utc::now()).await.unwrap();
        assert_eq!(stored_files(&storage), 1);

        let reloaded = by_id(db.pool(), &storage, article.id).await.unwrap();
        assert_eq!(reloaded.title, "Summer hours");
        assert!(reloaded.cover_image.unwrap().ends_with(".png"));

        // no new file keeps the current cover
        update(db.pool(), &storage, article.id, &form("Hours", "hours"), Utc::now())
            .await
            .unwrap();
        assert_eq!(stored_files(&storage), 1);

        delete(db.pool(), &storage, article.id).await.unwrap();
        assert_eq!(stored_files(&storage), 0);
        assert!(matches!(
            delete(db.pool(), &storage, article.id).await,
            Err(ArticleError::NotFound(_))
        ));
    }
}
