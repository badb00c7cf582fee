use bookcat_authz::{hash_password, verify_password};
use bookcat_http::AppError;
use chrono::Utc;
use serde_json::json;
use sqlx::SqlitePool;
use thiserror::Error;

use super::models::{Profile, RegisteredUser, Registration, UserRow};
use crate::modules::libraries::service::{self as libraries, LibraryError};
use crate::storage::{Storage, StorageError};
use crate::utils::is_unique_violation;

pub(crate) const IMAGE_CATEGORY: &str = "users";

#[derive(Debug, Error)]
pub enum UserError {
    #[error("{0} is required")]
    Required(&'static str),
    #[error("login '{0}' is already taken")]
    DuplicateLogin(String),
    #[error("wrong login or password")]
    InvalidCredentials,
    #[error("user {0} not found")]
    NotFound(i64),
    #[error(transparent)]
    Library(#[from] LibraryError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl From<UserError> for AppError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::Required(field) => AppError::invalid_field(field, "required", err.to_string()),
            UserError::DuplicateLogin(ref login) => AppError::conflict(
                vec![json!({"field": "userlogin", "value": login})],
                err.to_string(),
            ),
            UserError::InvalidCredentials => AppError::unauthorized(err.to_string()),
            UserError::NotFound(_) => AppError::integrity(err.to_string()),
            UserError::Library(e) => e.into(),
            UserError::Storage(e) => e.into(),
            UserError::Database(e) => AppError::Internal(e.into()),
        }
    }
}

/// Create the user and their `pending` library in one transaction.
pub async fn register(pool: &SqlitePool, input: &Registration) -> Result<RegisteredUser, UserError> {
    let username = required("username", &input.username)?;
    let userlogin = required("userlogin", &input.userlogin)?;
    if input.userpassword.is_empty() {
        return Err(UserError::Required("userpassword"));
    }

    let now = Utc::now();
    let mut tx = pool.begin().await?;
    let user_id: i64 = sqlx::query_scalar(
        "INSERT INTO users (username, userlogin, password_hash, create_at) \
         VALUES (?, ?, ?, ?) RETURNING id",
    )
    .bind(username)
    .bind(userlogin)
    .bind(hash_password(&input.userpassword))
    .bind(now)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            UserError::DuplicateLogin(userlogin.to_string())
        } else {
            e.into()
        }
    })?;

    let library = libraries::create(&mut *tx, user_id, input.plan_id, now).await?;
    tx.commit().await?;

    tracing::info!(user_id, library_id = library.id, login = userlogin, "user registered");
    Ok(RegisteredUser {
        id: user_id,
        username: username.to_string(),
        userlogin: userlogin.to_string(),
    })
}

/// Check credentials; returns the user id and login on success.
pub async fn authenticate(
    pool: &SqlitePool,
    userlogin: &str,
    password: &str,
) -> Result<(i64, String), UserError> {
    let row = find_by_login(pool, userlogin).await?;
    match row {
        Some(user) if verify_password(password, &user.password_hash) => Ok((user.id, user.userlogin)),
        _ => {
            tracing::warn!(login = userlogin, "login rejected");
            Err(UserError::InvalidCredentials)
        }
    }
}

pub async fn profile(pool: &SqlitePool, storage: &Storage, user_id: i64) -> Result<Profile, UserError> {
    let mut conn = pool.acquire().await?;
    let user = find(&mut conn, user_id).await?;
    let library = libraries::for_user(&mut conn, user_id).await?;

    Ok(Profile {
        id: user.id,
        username: user.username,
        userlogin: user.userlogin,
        userimage: user
            .userimage
            .map(|name| storage.image_url(IMAGE_CATEGORY, &name)),
        create_at: user.create_at,
        library,
    })
}

/// Store a new profile image and drop the previous one.
pub async fn replace_image(
    pool: &SqlitePool,
    storage: &Storage,
    user_id: i64,
    original_name: &str,
    bytes: &[u8],
) -> Result<String, UserError> {
    let mut conn = pool.acquire().await?;
    let previous = find(&mut conn, user_id).await?.userimage;

    let file_name = storage.save_image(IMAGE_CATEGORY, original_name, bytes).await?;
    let updated = sqlx::query("UPDATE users SET userimage = ? WHERE id = ?")
        .bind(&file_name)
        .bind(user_id)
        .execute(&mut *conn)
        .await;
    if let Err(e) = updated {
        storage.remove_image(IMAGE_CATEGORY, &file_name).await;
        return Err(e.into());
    }

    if let Some(previous) = previous {
        storage.remove_image(IMAGE_CATEGORY, &previous).await;
    }
    tracing::info!(user_id, file = %file_name, "profile image replaced");
    Ok(storage.image_url(IMAGE_CATEGORY, &file_name))
}

async fn find(conn: &mut sqlx::SqliteConnection, user_id: i64) -> Result<UserRow, UserError> {
    sqlx::query_as::<_, UserRow>(
        "SELECT id, username, userlogin, password_hash, userimage, create_at FROM users WHERE id = ?",
    )
    .bind(user_id)
    .fetch_optional(conn)
    .await?
    .ok_or(UserError::NotFound(user_id))
}

async fn find_by_login(pool: &SqlitePool, userlogin: &str) -> Result<Option<UserRow>, UserError> {
    Ok(sqlx::query_as::<_, UserRow>(
        "SELECT id, username, userlogin, password_hash, userimage, create_at \
         FROM users WHERE userlogin = ?",
    )
    .bind(userlogin)
    .fetch_optional(pool)
    .await?)
}

fn required<'a>(field: &'static str, value: &'a str) -> Result<&'a str, UserError> {
    let value = value.trim();
    if value.is_empty() {
        Err(UserError::Required(field))
    } else {
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::libraries::models::LibraryStatus;
    use crate::modules::plans::service::PlanError;
    use crate::testing;

    fn registration(login: &str, plan_id: Option<i64>) -> Registration {
        Registration {
            username: "Reading Room".to_string(),
            userlogin: login.to_string(),
            userpassword: "pa55word".to_string(),
            plan_id,
        }
    }

    #[tokio::test]
    async fn registration_creates_pending_library() {
        let db = testing::db().await;
        let storage = testing::storage(std::path::Path::new("/tmp/unused"));

        let user = register(db.pool(), &registration("reader", None)).await.unwrap();
        let profile = profile(db.pool(), &storage, user.id).await.unwrap();

        assert_eq!(profile.userlogin, "reader");
        assert_eq!(profile.library.status, LibraryStatus::Pending);
        assert_eq!(profile.library.user_id, user.id);
        assert_eq!(profile.userimage, None);
    }

    #[tokio::test]
    async fn duplicate_login_conflicts() {
        let db = testing::db().await;
        register(db.pool(), &registration("twin", None)).await.unwrap();

        let err = register(db.pool(), &registration("twin", None)).await.unwrap_err();
        assert!(matches!(err, UserError::DuplicateLogin(ref l) if l == "twin"));
        assert_eq!(AppError::from(err).code(), "conflict");
    }

    #[tokio::test]
    async fn unknown_plan_rolls_back_the_user() {
        let db = testing::db().await;
        let err = register(db.pool(), &registration("planless", Some(77)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            UserError::Library(LibraryError::Plan(PlanError::NotFound(77)))
        ));

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn credentials_are_checked() {
        let db = testing::db().await;
        let user = register(db.pool(), &registration("checker", None)).await.unwrap();

        let (id, login) = authenticate(db.pool(), "checker", "pa55word").await.unwrap();
        assert_eq!((id, login.as_str()), (user.id, "checker"));

        assert!(matches!(
            authenticate(db.pool(), "checker", "nope").await,
            Err(UserError::InvalidCredentials)
        ));
        assert!(matches!(
            authenticate(db.pool(), "ghost", "pa55word").await,
            Err(UserError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn blank_fields_are_rejected() {
        let db = testing::db().await;
        let mut input = registration("  ", None);
        assert!(matches!(
            register(db.pool(), &input).await,
            Err(UserError::Required("userlogin"))
        ));
        input.userlogin = "ok".to_string();
        input.userpassword.clear();
        assert!(matches!(
            register(db.pool(), &input).await,
            Err(UserError::Required("userpassword"))
        ));
    }

    #[tokio::test]
    async fn image_replacement_removes_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = testing::storage(dir.path());
        let db = testing::db().await;
        let user = register(db.pool(), &registration("pictured", None)).await.unwrap();

        let first = replace_image(db.pool(), &storage, user.id, "a.png", b"one")
            .await
            .unwrap();
        let first_name = first.rsplit('/').next().unwrap().to_string();
        assert!(storage.image_path(IMAGE_CATEGORY, &first_name).exists());

        let second = replace_image(db.pool(), &storage, user.id, "b.gif", b"two")
            .await
            .unwrap();
        assert!(second.ends_with(".gif"));
        assert!(!storage.image_path(IMAGE_CATEGORY, &first_name).exists());
    }
}
