use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use bookcat_authz::{AdminAccess, AppOrigin};
use bookcat_db::Db;
use bookcat_http::{AppError, AppJson};

use super::models::{Plan, PlanInput};
use super::service;

/// List all plans
#[utoipa::path(
    get,
    path = "/",
    tag = "Plans",
    responses((status = 200, description = "Plans ordered by id", body = [Plan]))
)]
pub async fn list_plans(
    _origin: AppOrigin,
    State(db): State<Db>,
) -> Result<Json<Vec<Plan>>, AppError> {
    Ok(Json(service::list(db.pool()).await?))
}

/// Create a plan
#[utoipa::path(
    post,
    path = "/",
    tag = "Plans",
    request_body = PlanInput,
    responses(
        (status = 201, description = "Plan created", body = Plan),
        (status = 403, description = "Admin token missing or rejected"),
        (status = 422, description = "Negative allowance or price")
    )
)]
pub async fn create_plan(
    _admin: AdminAccess,
    State(db): State<Db>,
    AppJson(input): AppJson<PlanInput>,
) -> Result<(StatusCode, Json<Plan>), AppError> {
    let plan = service::create(db.pool(), &input).await?;
    Ok((StatusCode::CREATED, Json(plan)))
}

/// Overwrite a plan's allowance and price
#[utoipa::path(
    put,
    path = "/{id}",
    tag = "Plans",
    params(("id" = i64, Path, description = "Plan id")),
    request_body = PlanInput,
    responses(
        (status = 204, description = "Plan updated"),
        (status = 404, description = "No such plan")
    )
)]
pub async fn update_plan(
    _admin: AdminAccess,
    State(db): State<Db>,
    Path(id): Path<i64>,
    AppJson(input): AppJson<PlanInput>,
) -> Result<StatusCode, AppError> {
    service::update(db.pool(), id, &input).await?;
    Ok(StatusCode::NO_CONTENT)
}
