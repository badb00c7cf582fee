//! File storage: rendered reports and uploaded images under one root directory.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bookcat_http::AppError;
use bookcat_kernel::settings::StorageSettings;
use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

const REPORTS_DIR: &str = "LibraryFiles";
const UPLOADS_DIR: &str = "library-uploads";
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif"];

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("file is larger than {max} bytes")]
    TooLarge { max: usize },
    #[error("only JPG, JPEG, PNG and GIF images are accepted (got '{0}')")]
    UnsupportedType(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::TooLarge { .. } | StorageError::UnsupportedType(_) => {
                AppError::bad_request(err.to_string())
            }
            StorageError::Io(e) => AppError::Internal(anyhow::Error::new(e).context("file storage failed")),
        }
    }
}

/// Where a rendered report lives on disk and how clients address it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredLocation {
    pub path: PathBuf,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct Storage {
    settings: Arc<StorageSettings>,
}

impl Storage {
    pub fn new(settings: StorageSettings) -> Self {
        Self {
            settings: Arc::new(settings),
        }
    }

    pub fn root(&self) -> &Path {
        &self.settings.root
    }

    /// `{root}/LibraryFiles/{library}/{yyyy-mm-dd}/{file_name}`, addressed as
    /// `/LibraryFiles/{library}/{yyyy-mm-dd}/{file_name}`.
    pub fn report_location(&self, library_id: i64, day: NaiveDate, file_name: &str) -> StoredLocation {
        let day = day.format("%Y-%m-%d").to_string();
        let path = self
            .root()
            .join(REPORTS_DIR)
            .join(library_id.to_string())
            .join(&day)
            .join(file_name);
        StoredLocation {
            path,
            url: format!("/{REPORTS_DIR}/{library_id}/{day}/{file_name}"),
        }
    }

    /// Write through a sibling temp file and rename, so concurrent writers to
    /// the same path never interleave and readers never see a partial file.
    pub async fn write_atomic(&self, path: &Path, bytes: Vec<u8>) -> io::Result<()> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || {
            let dir = path
                .parent()
                .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no parent"))?;
            std::fs::create_dir_all(dir)?;

            let mut file = tempfile::NamedTempFile::new_in(dir)?;
            file.write_all(&bytes)?;
            file.as_file().sync_all()?;
            file.persist(&path).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(io::Error::other)?
    }

    /// Validate and store an uploaded image under `library-uploads/{category}`.
    /// Returns the generated file name.
    pub async fn save_image(
        &self,
        category: &str,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<String, StorageError> {
        if bytes.len() > self.settings.max_image_bytes {
            return Err(StorageError::TooLarge {
                max: self.settings.max_image_bytes,
            });
        }

        let extension = Path::new(original_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        if !IMAGE_EXTENSIONS.contains(&extension.as_str()) {
            return Err(StorageError::UnsupportedType(original_name.to_string()));
        }

        let file_name = format!("{}.{extension}", Uuid::new_v4());
        let path = self.image_dir(category).join(&file_name);
        self.write_atomic(&path, bytes.to_vec()).await?;

        tracing::info!(category, file = %file_name, size = bytes.len(), "image stored");
        Ok(file_name)
    }

    /// Best-effort removal; a file that is already gone is not an error.
    pub async fn remove_image(&self, category: &str, file_name: &str) {
        let Some(name) = Path::new(file_name).file_name() else {
            return;
        };
        let path = self.image_dir(category).join(name);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => tracing::info!(category, file = %file_name, "image removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(error = %e, path = %path.display(), "failed to remove image"),
        }
    }

    /// Request body cap for routes that accept an image plus form fields.
    pub fn upload_limit(&self) -> usize {
        self.settings.max_image_bytes + 1024 * 1024
    }

    pub fn image_url(&self, category: &str, file_name: &str) -> String {
        format!(
            "{}/{UPLOADS_DIR}/{category}/{file_name}",
            self.settings.public_base_url.trim_end_matches('/')
        )
    }

    pub fn image_path(&self, category: &str, file_name: &str) -> PathBuf {
        self.image_dir(category).join(file_name)
    }

    fn image_dir(&self, category: &str) -> PathBuf {
        self.root().join(UPLOADS_DIR).join(category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage(root: &Path) -> Storage {
        Storage::new(StorageSettings {
            root: root.to_path_buf(),
            public_base_url: "https://books.example.org/".to_string(),
            max_image_bytes: 16,
        })
    }

    #[test]
    fn report_location_is_library_and_day_scoped() {
        let storage = storage(Path::new("/srv/www"));
        let day = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        let location = storage.report_location(12, day, "act.docx");

        assert_eq!(
            location.path,
            PathBuf::from("/srv/www/LibraryFiles/12/2024-03-09/act.docx")
        );
        assert_eq!(location.url, "/LibraryFiles/12/2024-03-09/act.docx");
    }

    #[tokio::test]
    async fn atomic_write_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());
        let path = dir.path().join("nested/out.bin");

        storage.write_atomic(&path, b"first".to_vec()).await.unwrap();
        storage.write_atomic(&path, b"second".to_vec()).await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"second");
        let leftovers = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[tokio::test]
    async fn images_are_validated_stored_and_removed() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());

        let too_big = storage.save_image("articles", "cover.png", &[0u8; 17]).await;
        assert!(matches!(too_big, Err(StorageError::TooLarge { max: 16 })));

        let wrong_type = storage.save_image("articles", "cover.bmp", b"BM").await;
        assert!(matches!(wrong_type, Err(StorageError::UnsupportedType(_))));

        let name = storage.save_image("articles", "Cover.JPG", b"jpeg").await.unwrap();
        assert!(name.ends_with(".jpg"));
        let path = storage.image_path("articles", &name);
        assert_eq!(std::fs::read(&path).unwrap(), b"jpeg");
        assert_eq!(
            storage.image_url("articles", &name),
            format!("https://books.example.org/library-uploads/articles/{name}")
        );

        storage.remove_image("articles", &name).await;
        assert!(!path.exists());
        // second removal is silent
        storage.remove_image("articles", &name).await;
    }
}
