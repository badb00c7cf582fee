use bookcat_http::AppError;
use sqlx::{SqliteConnection, SqlitePool};
use thiserror::Error;

use super::models::{Plan, PlanInput, PlanRow};
use crate::utils::money;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("plan {0} not found")]
    NotFound(i64),
    #[error("maxBooks cannot be negative")]
    NegativeAllowance,
    #[error("price must be a non-negative amount")]
    InvalidPrice,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl From<PlanError> for AppError {
    fn from(err: PlanError) -> Self {
        match err {
            PlanError::NotFound(_) => AppError::not_found(err.to_string()),
            PlanError::NegativeAllowance => {
                AppError::invalid_field("maxBooks", "negative", err.to_string())
            }
            PlanError::InvalidPrice => AppError::invalid_field("price", "invalid", err.to_string()),
            PlanError::Database(e) => AppError::Internal(e.into()),
        }
    }
}

pub async fn list(pool: &SqlitePool) -> Result<Vec<Plan>, PlanError> {
    let rows: Vec<PlanRow> =
        sqlx::query_as("SELECT id, max_books, price_cents FROM plans ORDER BY id")
            .fetch_all(pool)
            .await?;
    Ok(rows.into_iter().map(Plan::from).collect())
}

pub async fn create(pool: &SqlitePool, input: &PlanInput) -> Result<Plan, PlanError> {
    let price_cents = validate(input)?;
    let row: PlanRow = sqlx::query_as(
        "INSERT INTO plans (max_books, price_cents) VALUES (?, ?) \
         RETURNING id, max_books, price_cents",
    )
    .bind(input.max_books)
    .bind(price_cents)
    .fetch_one(pool)
    .await?;

    tracing::info!(plan_id = row.id, max_books = row.max_books, "plan created");
    Ok(row.into())
}

pub async fn update(pool: &SqlitePool, id: i64, input: &PlanInput) -> Result<(), PlanError> {
    let price_cents = validate(input)?;
    let result = sqlx::query("UPDATE plans SET max_books = ?, price_cents = ? WHERE id = ?")
        .bind(input.max_books)
        .bind(price_cents)
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(PlanError::NotFound(id));
    }

    tracing::info!(plan_id = id, max_books = input.max_books, "plan updated");
    Ok(())
}

/// Fails with `NotFound` unless the plan exists.
pub async fn ensure_exists(conn: &mut SqliteConnection, id: i64) -> Result<(), PlanError> {
    let found: Option<i64> = sqlx::query_scalar("SELECT id FROM plans WHERE id = ?")
        .bind(id)
        .fetch_optional(conn)
        .await?;
    found.map(|_| ()).ok_or(PlanError::NotFound(id))
}

fn validate(input: &PlanInput) -> Result<i64, PlanError> {
    if input.max_books < 0 {
        return Err(PlanError::NegativeAllowance);
    }
    if input.price.is_sign_negative() {
        return Err(PlanError::InvalidPrice);
    }
    money::to_cents(input.price).ok_or(PlanError::InvalidPrice)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn input(max_books: i64, price: &str) -> PlanInput {
        PlanInput {
            max_books,
            price: Decimal::from_str(price).unwrap(),
        }
    }

    #[tokio::test]
    async fn plans_are_listed_by_id() {
        let db = testing::db().await;
        let pool = db.pool();

        let basic = create(pool, &input(500, "99.90")).await.unwrap();
        let large = create(pool, &input(5000, "249")).await.unwrap();

        let plans = list(pool).await.unwrap();
        assert_eq!(plans, vec![basic.clone(), large]);
        assert_eq!(basic.price, Decimal::from_str("99.90").unwrap());
    }

    #[tokio::test]
    async fn update_overwrites_or_reports_missing() {
        let db = testing::db().await;
        let pool = db.pool();
        let plan = create(pool, &input(100, "10")).await.unwrap();

        update(pool, plan.id, &input(200, "12.50")).await.unwrap();
        let plans = list(pool).await.unwrap();
        assert_eq!(plans[0].max_books, 200);
        assert_eq!(plans[0].price, Decimal::from_str("12.50").unwrap());

        assert!(matches!(
            update(pool, 999, &input(1, "1")).await,
            Err(PlanError::NotFound(999))
        ));
    }

    #[tokio::test]
    async fn negative_values_are_rejected() {
        let db = testing::db().await;
        assert!(matches!(
            create(db.pool(), &input(-1, "1")).await,
            Err(PlanError::NegativeAllowance)
        ));
        assert!(matches!(
            create(db.pool(), &input(1, "-0.01")).await,
            Err(PlanError::InvalidPrice)
        ));
    }
}
