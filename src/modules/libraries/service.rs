use bookcat_http::AppError;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::json;
use sqlx::{SqliteConnection, SqlitePool};
use thiserror::Error;

use super::lifecycle::{self, IllegalTransition, StatusAction};
use super::models::{Library, LibraryStatus};
use crate::modules::plans::service::{self as plans, PlanError};

const COLUMNS: &str =
    "id, user_id, plan_id, start_inventory, data_end_plan, status, dark_theme, create_at";

/// First number handed out by a fresh library's counter.
pub const INITIAL_INVENTORY: i64 = 1;

/// Highest counter value that can still be claimed and advanced.
pub const MAX_INVENTORY: i64 = i64::MAX - 1;

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("no library is registered for user {0}")]
    MissingForUser(i64),
    #[error("library {0} not found")]
    NotFound(i64),
    #[error("inventory counter cannot be negative")]
    NegativeCounter,
    #[error("inventory counter cannot exceed {MAX_INVENTORY}")]
    CounterOutOfRange,
    #[error(transparent)]
    Transition(#[from] IllegalTransition),
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl From<LibraryError> for AppError {
    fn from(err: LibraryError) -> Self {
        match err {
            LibraryError::MissingForUser(user_id) => {
                tracing::error!(user_id, "authenticated user has no library row");
                AppError::integrity(err.to_string())
            }
            LibraryError::NotFound(_) => AppError::not_found(err.to_string()),
            LibraryError::NegativeCounter => {
                AppError::invalid_field("inventory", "negative", err.to_string())
            }
            LibraryError::CounterOutOfRange => {
                AppError::invalid_field("inventory", "out_of_range", err.to_string())
            }
            LibraryError::Transition(t) => AppError::conflict(
                vec![json!({"status": t.from, "action": t.action.as_str()})],
                t.to_string(),
            ),
            LibraryError::Plan(e) => e.into(),
            LibraryError::Database(e) => AppError::Internal(e.into()),
        }
    }
}

/// Which read-only admin listing to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminView {
    InWaiting,
    BannedEligible,
    PendingEligible,
}

/// The caller's library. A signed-in user without one is a data fault.
pub async fn for_user(conn: &mut SqliteConnection, user_id: i64) -> Result<Library, LibraryError> {
    sqlx::query_as::<_, Library>(&format!("SELECT {COLUMNS} FROM libraries WHERE user_id = ?"))
        .bind(user_id)
        .fetch_optional(conn)
        .await?
        .ok_or(LibraryError::MissingForUser(user_id))
}

/// Id of the caller's library, for handlers that only need scoping.
pub async fn id_for_user(pool: &SqlitePool, user_id: i64) -> Result<i64, LibraryError> {
    sqlx::query_scalar("SELECT id FROM libraries WHERE user_id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(LibraryError::MissingForUser(user_id))
}

pub async fn find(conn: &mut SqliteConnection, id: i64) -> Result<Library, LibraryError> {
    sqlx::query_as::<_, Library>(&format!("SELECT {COLUMNS} FROM libraries WHERE id = ?"))
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or(LibraryError::NotFound(id))
}

/// Library for a newly registered user. Starts `pending`.
pub async fn create(
    conn: &mut SqliteConnection,
    user_id: i64,
    plan_id: Option<i64>,
    now: DateTime<Utc>,
) -> Result<Library, LibraryError> {
    if let Some(plan_id) = plan_id {
        plans::ensure_exists(&mut *conn, plan_id).await?;
    }

    let library = sqlx::query_as::<_, Library>(&format!(
        "INSERT INTO libraries (user_id, plan_id, start_inventory, status, dark_theme, create_at) \
         VALUES (?, ?, ?, ?, 0, ?) RETURNING {COLUMNS}"
    ))
    .bind(user_id)
    .bind(plan_id)
    .bind(INITIAL_INVENTORY)
    .bind(LibraryStatus::Pending)
    .bind(now)
    .fetch_one(conn)
    .await?;

    tracing::info!(library_id = library.id, user_id, ?plan_id, "library created");
    Ok(library)
}

/// Advance the counter and return the number it held before.
pub async fn claim_inventory_number(
    conn: &mut SqliteConnection,
    library_id: i64,
) -> Result<i64, LibraryError> {
    sqlx::query_scalar(
        "UPDATE libraries SET start_inventory = start_inventory + 1 \
         WHERE id = ? RETURNING start_inventory - 1",
    )
    .bind(library_id)
    .fetch_optional(conn)
    .await?
    .ok_or(LibraryError::NotFound(library_id))
}

pub async fn set_start_inventory(
    pool: &SqlitePool,
    user_id: i64,
    value: i64,
) -> Result<i64, LibraryError> {
    if value < 0 {
        return Err(LibraryError::NegativeCounter);
    }
    if value > MAX_INVENTORY {
        return Err(LibraryError::CounterOutOfRange);
    }
    let updated = sqlx::query("UPDATE libraries SET start_inventory = ? WHERE user_id = ?")
        .bind(value)
        .bind(user_id)
        .execute(pool)
        .await?;
    if updated.rows_affected() == 0 {
        return Err(LibraryError::MissingForUser(user_id));
    }

    tracing::info!(user_id, start_inventory = value, "inventory counter set");
    Ok(value)
}

/// Switching plans puts the library back into `pending` with no paid period.
pub async fn change_plan(pool: &SqlitePool, user_id: i64, plan_id: i64) -> Result<Library, LibraryError> {
    let mut tx = pool.begin().await?;
    plans::ensure_exists(&mut *tx, plan_id).await?;

    let library = sqlx::query_as::<_, Library>(&format!(
        "UPDATE libraries SET plan_id = ?, status = ?, data_end_plan = NULL \
         WHERE user_id = ? RETURNING {COLUMNS}"
    ))
    .bind(plan_id)
    .bind(LibraryStatus::Pending)
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(LibraryError::MissingForUser(user_id))?;
    tx.commit().await?;

    tracing::info!(library_id = library.id, plan_id, "library plan changed, awaiting payment");
    Ok(library)
}

pub async fn set_theme(pool: &SqlitePool, user_id: i64, dark_theme: bool) -> Result<(), LibraryError> {
    let updated = sqlx::query("UPDATE libraries SET dark_theme = ? WHERE user_id = ?")
        .bind(dark_theme)
        .bind(user_id)
        .execute(pool)
        .await?;
    if updated.rows_affected() == 0 {
        return Err(LibraryError::MissingForUser(user_id));
    }
    Ok(())
}

/// Apply an administrative status change.
pub async fn apply(
    pool: &SqlitePool,
    id: i64,
    action: StatusAction,
    today: NaiveDate,
) -> Result<Library, LibraryError> {
    let mut tx = pool.begin().await?;
    let current = find(&mut *tx, id).await?;
    let status = lifecycle::transition(current.status, action)?;
    let data_end_plan = match action {
        StatusAction::ConfirmPayment => Some(lifecycle::next_plan_end(today, current.data_end_plan)),
        StatusAction::Ban | StatusAction::Reset => current.data_end_plan,
    };

    let library = sqlx::query_as::<_, Library>(&format!(
        "UPDATE libraries SET status = ?, data_end_plan = ? WHERE id = ? RETURNING {COLUMNS}"
    ))
    .bind(status)
    .bind(data_end_plan)
    .bind(id)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;

    tracing::info!(
        library_id = id,
        action = action.as_str(),
        from = ?current.status,
        to = ?library.status,
        data_end_plan = ?library.data_end_plan,
        "library status changed"
    );
    Ok(library)
}

pub async fn admin_view(
    pool: &SqlitePool,
    view: AdminView,
    today: NaiveDate,
) -> Result<Vec<Library>, LibraryError> {
    let libraries =
        sqlx::query_as::<_, Library>(&format!("SELECT {COLUMNS} FROM libraries ORDER BY id"))
            .fetch_all(pool)
            .await?;

    Ok(libraries
        .into_iter()
        .filter(|library| match view {
            AdminView::InWaiting => lifecycle::is_in_waiting(library),
            AdminView::BannedEligible => lifecycle::is_ban_eligible(library, today),
            AdminView::PendingEligible => lifecycle::is_pending_eligible(library, today),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::plans::{models::PlanInput, service as plan_service};
    use crate::testing;
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn counter_claims_are_sequential() {
        let db = testing::db().await;
        let (_, library) = testing::library(&db, "claims").await;
        let mut conn = db.pool().acquire().await.unwrap();

        let first = claim_inventory_number(&mut conn, library.id).await.unwrap();
        let second = claim_inventory_number(&mut conn, library.id).await.unwrap();
        assert_eq!(first, INITIAL_INVENTORY);
        assert_eq!(second, INITIAL_INVENTORY + 1);

        let reloaded = find(&mut conn, library.id).await.unwrap();
        assert_eq!(reloaded.start_inventory, INITIAL_INVENTORY + 2);
    }

    #[tokio::test]
    async fn missing_library_is_an_integrity_fault() {
        let db = testing::db().await;
        let mut conn = db.pool().acquire().await.unwrap();
        let err = for_user(&mut conn, 404).await.unwrap_err();
        assert_eq!(AppError::from(err).code(), "integrity_fault");
    }

    #[tokio::test]
    async fn negative_counter_is_rejected() {
        let db = testing::db().await;
        let (user_id, _) = testing::library(&db, "negative").await;
        assert!(matches!(
            set_start_inventory(db.pool(), user_id, -1).await,
            Err(LibraryError::NegativeCounter)
        ));
        assert_eq!(set_start_inventory(db.pool(), user_id, 40).await.unwrap(), 40);
    }

    #[tokio::test]
    async fn counter_that_cannot_advance_is_rejected() {
        let db = testing::db().await;
        let (user_id, library) = testing::library(&db, "ceiling").await;
        let err = set_start_inventory(db.pool(), user_id, i64::MAX).await.unwrap_err();
        assert!(matches!(err, LibraryError::CounterOutOfRange));
        assert_eq!(AppError::from(err).code(), "validation_error");

        set_start_inventory(db.pool(), user_id, MAX_INVENTORY).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        assert_eq!(claim_inventory_number(&mut conn, library.id).await.unwrap(), MAX_INVENTORY);
    }

    #[tokio::test]
    async fn fresh_library_counts_from_one() {
        let db = testing::db().await;
        let (_, library) = testing::library(&db, "fresh").await;
        assert_eq!(library.start_inventory, 1);
    }

    #[tokio::test]
    async fn payment_then_plan_change_resets_to_pending() {
        let db = testing::db().await;
        let (user_id, library) = testing::library(&db, "lifecycle").await;
        let plan = plan_service::create(
            db.pool(),
            &PlanInput {
                max_books: 1000,
                price: Decimal::new(9900, 2),
            },
        )
        .await
        .unwrap();
        let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();

        let active = apply(db.pool(), library.id, StatusAction::ConfirmPayment, today)
            .await
            .unwrap();
        assert_eq!(active.status, LibraryStatus::Active);
        assert_eq!(active.data_end_plan, NaiveDate::from_ymd_opt(2024, 3, 31));

        let again = apply(db.pool(), library.id, StatusAction::ConfirmPayment, today).await;
        assert!(matches!(again, Err(LibraryError::Transition(_))));

        let changed = change_plan(db.pool(), user_id, plan.id).await.unwrap();
        assert_eq!(changed.status, LibraryStatus::Pending);
        assert_eq!(changed.plan_id, Some(plan.id));
        assert_eq!(changed.data_end_plan, None);

        let unknown = change_plan(db.pool(), user_id, 999).await;
        assert!(matches!(unknown, Err(LibraryError::Plan(PlanError::NotFound(999)))));
    }

    #[tokio::test]
    async fn admin_views_filter_by_status_and_dates() {
        let db = testing::db().await;
        let (_, waiting) = testing::library(&db, "waiting").await;
        let (_, paid) = testing::library(&db, "paid").await;
        let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        apply(db.pool(), paid.id, StatusAction::ConfirmPayment, today)
            .await
            .unwrap();

        let in_waiting = admin_view(db.pool(), AdminView::InWaiting, today).await.unwrap();
        assert_eq!(in_waiting.iter().map(|l| l.id).collect::<Vec<_>>(), vec![waiting.id]);

        let later = NaiveDate::from_ymd_opt(2024, 4, 5).unwrap();
        let lapsed = admin_view(db.pool(), AdminView::PendingEligible, later).await.unwrap();
        assert_eq!(lapsed.iter().map(|l| l.id).collect::<Vec<_>>(), vec![paid.id]);
    }
}
