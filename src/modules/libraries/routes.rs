use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use bookcat_authz::{AdminAccess, AuthUser};
use bookcat_db::Db;
use bookcat_http::{AppError, AppJson};
use chrono::Utc;

use super::lifecycle::StatusAction;
use super::models::{
    InventoryCounter, InventoryUpdated, Library, PlanChange, StatusView, ThemeChange,
};
use super::service::{self, AdminView};

/// Caller's library
#[utoipa::path(
    get,
    path = "/",
    tag = "Library",
    responses((status = 200, description = "Library of the signed-in user", body = Library))
)]
pub async fn get_library(user: AuthUser, State(db): State<Db>) -> Result<Json<Library>, AppError> {
    let mut conn = db.pool().acquire().await.map_err(anyhow::Error::from)?;
    Ok(Json(service::for_user(&mut conn, user.user_id).await?))
}

/// Subscription status
#[utoipa::path(
    get,
    path = "/status",
    tag = "Library",
    responses((status = 200, description = "Current status", body = StatusView))
)]
pub async fn get_status(user: AuthUser, State(db): State<Db>) -> Result<Json<StatusView>, AppError> {
    let mut conn = db.pool().acquire().await.map_err(anyhow::Error::from)?;
    let library = service::for_user(&mut conn, user.user_id).await?;
    Ok(Json(StatusView {
        status: library.status,
    }))
}

/// Next auto-assigned inventory number
#[utoipa::path(
    get,
    path = "/inventory",
    tag = "Library",
    responses((status = 200, description = "Counter value", body = InventoryCounter))
)]
pub async fn get_inventory(
    user: AuthUser,
    State(db): State<Db>,
) -> Result<Json<InventoryCounter>, AppError> {
    let mut conn = db.pool().acquire().await.map_err(anyhow::Error::from)?;
    let library = service::for_user(&mut conn, user.user_id).await?;
    Ok(Json(InventoryCounter {
        inventory: library.start_inventory,
    }))
}

/// Set the inventory counter
#[utoipa::path(
    put,
    path = "/inventory",
    tag = "Library",
    request_body = InventoryCounter,
    responses(
        (status = 200, description = "Counter updated", body = InventoryUpdated),
        (status = 422, description = "Counter negative or too large to advance")
    )
)]
pub async fn put_inventory(
    user: AuthUser,
    State(db): State<Db>,
    AppJson(body): AppJson<InventoryCounter>,
) -> Result<Json<InventoryUpdated>, AppError> {
    let inventory = service::set_start_inventory(db.pool(), user.user_id, body.inventory).await?;
    Ok(Json(InventoryUpdated {
        message: "inventory counter updated".to_string(),
        inventory,
    }))
}

/// Switch plan; the library waits for payment again
#[utoipa::path(
    put,
    path = "/plan",
    tag = "Library",
    request_body = PlanChange,
    responses(
        (status = 200, description = "Plan changed", body = Library),
        (status = 404, description = "No such plan")
    )
)]
pub async fn put_plan(
    user: AuthUser,
    State(db): State<Db>,
    AppJson(body): AppJson<PlanChange>,
) -> Result<Json<Library>, AppError> {
    Ok(Json(service::change_plan(db.pool(), user.user_id, body.plan_id).await?))
}

/// Toggle dark theme
#[utoipa::path(
    put,
    path = "/theme",
    tag = "Library",
    request_body = ThemeChange,
    responses((status = 204, description = "Theme stored"))
)]
pub async fn put_theme(
    user: AuthUser,
    State(db): State<Db>,
    AppJson(body): AppJson<ThemeChange>,
) -> Result<StatusCode, AppError> {
    service::set_theme(db.pool(), user.user_id, body.dark_theme).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn change_status(db: &Db, id: i64, action: StatusAction) -> Result<Json<Library>, AppError> {
    let today = Utc::now().date_naive();
    Ok(Json(service::apply(db.pool(), id, action, today).await?))
}

/// Confirm payment: pending becomes active for another period
#[utoipa::path(
    put,
    path = "/admin/{id}/confirm-payment",
    tag = "Library admin",
    params(("id" = i64, Path, description = "Library id")),
    responses(
        (status = 200, description = "Library activated", body = Library),
        (status = 409, description = "Library is not pending")
    )
)]
pub async fn confirm_payment(
    _admin: AdminAccess,
    State(db): State<Db>,
    Path(id): Path<i64>,
) -> Result<Json<Library>, AppError> {
    change_status(&db, id, StatusAction::ConfirmPayment).await
}

/// Ban an active library
#[utoipa::path(
    put,
    path = "/admin/{id}/ban",
    tag = "Library admin",
    params(("id" = i64, Path, description = "Library id")),
    responses(
        (status = 200, description = "Library banned", body = Library),
        (status = 409, description = "Library is not active")
    )
)]
pub async fn ban(
    _admin: AdminAccess,
    State(db): State<Db>,
    Path(id): Path<i64>,
) -> Result<Json<Library>, AppError> {
    change_status(&db, id, StatusAction::Ban).await
}

/// Put a library back into pending
#[utoipa::path(
    put,
    path = "/admin/{id}/reset",
    tag = "Library admin",
    params(("id" = i64, Path, description = "Library id")),
    responses((status = 200, description = "Library pending", body = Library))
)]
pub async fn reset(
    _admin: AdminAccess,
    State(db): State<Db>,
    Path(id): Path<i64>,
) -> Result<Json<Library>, AppError> {
    change_status(&db, id, StatusAction::Reset).await
}

async fn view(db: &Db, view: AdminView) -> Result<Json<Vec<Library>>, AppError> {
    let today = Utc::now().date_naive();
    Ok(Json(service::admin_view(db.pool(), view, today).await?))
}

/// Libraries waiting for payment confirmation
#[utoipa::path(
    get,
    path = "/admin/in-waiting",
    tag = "Library admin",
    responses((status = 200, description = "Pending libraries", body = [Library]))
)]
pub async fn in_waiting(_admin: AdminAccess, State(db): State<Db>) -> Result<Json<Vec<Library>>, AppError> {
    view(&db, AdminView::InWaiting).await
}

/// Libraries overdue long enough to be banned
#[utoipa::path(
    get,
    path = "/admin/banned-eligible",
    tag = "Library admin",
    responses((status = 200, description = "Ban candidates", body = [Library]))
)]
pub async fn banned_eligible(
    _admin: AdminAccess,
    State(db): State<Db>,
) -> Result<Json<Vec<Library>>, AppError> {
    view(&db, AdminView::BannedEligible).await
}

/// Active libraries whose paid period ended within the last month
#[utoipa::path(
    get,
    path = "/admin/pending-eligible",
    tag = "Library admin",
    responses((status = 200, description = "Recently lapsed", body = [Library]))
)]
pub async fn pending_eligible(
    _admin: AdminAccess,
    State(db): State<Db>,
) -> Result<Json<Vec<Library>>, AppError> {
    view(&db, AdminView::PendingEligible).await
}
