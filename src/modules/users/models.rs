use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::modules::libraries::models::Library;

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct UserRow {
    pub id: i64,
    pub username: String,
    pub userlogin: String,
    pub password_hash: String,
    pub userimage: Option<String>,
    pub create_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub username: String,
    pub userlogin: String,
    pub userpassword: String,
    pub plan_id: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RegisteredUser {
    pub id: i64,
    pub username: String,
    pub userlogin: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct Credentials {
    pub userlogin: String,
    pub userpassword: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TokenResponse {
    pub token: String,
}

/// Signed-in user with their library.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: i64,
    pub username: String,
    pub userlogin: String,
    /// Absolute image URL
    pub userimage: Option<String>,
    pub create_at: DateTime<Utc>,
    pub library: Library,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ImageUpdated {
    pub userimage: String,
}
