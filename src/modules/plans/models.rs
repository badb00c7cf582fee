use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::utils::money;

/// Subscription plan a library can be on.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub id: i64,
    /// Book allowance
    pub max_books: i64,
    /// Monthly price
    #[schema(value_type = String, example = "199.00")]
    pub price: Decimal,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct PlanRow {
    pub id: i64,
    pub max_books: i64,
    pub price_cents: i64,
}

impl From<PlanRow> for Plan {
    fn from(row: PlanRow) -> Self {
        Self {
            id: row.id,
            max_books: row.max_books,
            price: money::from_cents(row.price_cents),
        }
    }
}

/// Body for creating or overwriting a plan.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlanInput {
    pub max_books: i64,
    #[schema(value_type = String, example = "199.00")]
    pub price: Decimal,
}
