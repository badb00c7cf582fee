use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum LibraryStatus {
    Pending,
    Active,
    Banned,
}

/// A tenant: one per registered user, owner of books and documents.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Library {
    pub id: i64,
    pub user_id: i64,
    pub plan_id: Option<i64>,
    /// Next auto-assigned inventory number
    pub start_inventory: i64,
    /// Paid-until date
    pub data_end_plan: Option<NaiveDate>,
    pub status: LibraryStatus,
    pub dark_theme: bool,
    pub create_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatusView {
    pub status: LibraryStatus,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct InventoryCounter {
    pub inventory: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct InventoryUpdated {
    pub message: String,
    pub inventory: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlanChange {
    pub plan_id: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ThemeChange {
    pub dark_theme: bool,
}
