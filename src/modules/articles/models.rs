use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::storage::Storage;

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct ArticleRow {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub category: Option<String>,
    pub content: String,
    pub cover_image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub category: Option<String>,
    pub content: String,
    /// Absolute cover image URL
    pub cover_image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Article {
    pub(crate) fn from_row(row: ArticleRow, storage: &Storage) -> Self {
        Self {
            cover_image: row
                .cover_image
                .map(|file| storage.image_url(super::service::IMAGE_CATEGORY, &file)),
            id: row.id,
            title: row.title,
            slug: row.slug,
            category: row.category,
            content: row.content,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Uploaded cover file.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Multipart body shared by create and update.
#[derive(Debug, Clone, Default)]
pub struct ArticleForm {
    pub title: String,
    pub category: Option<String>,
    pub slug: String,
    pub content: String,
    pub cover: Option<Upload>,
}
