use axum::{
    extract::{Multipart, State},
    Json,
};
use bookcat_authz::{AppOrigin, AuthUser, Gate};
use bookcat_db::Db;
use bookcat_http::{AppError, AppJson};

use super::models::{Credentials, ImageUpdated, Profile, RegisteredUser, Registration, TokenResponse};
use super::service;
use crate::storage::Storage;

/// Register a user together with their library
#[utoipa::path(
    post,
    path = "/register",
    tag = "User",
    request_body = Registration,
    responses(
        (status = 200, description = "User and library created", body = RegisteredUser),
        (status = 404, description = "Unknown plan"),
        (status = 409, description = "Login already taken"),
        (status = 422, description = "Blank field")
    )
)]
pub async fn register(
    _origin: AppOrigin,
    State(db): State<Db>,
    AppJson(input): AppJson<Registration>,
) -> Result<Json<RegisteredUser>, AppError> {
    Ok(Json(service::register(db.pool(), &input).await?))
}

/// Exchange credentials for a bearer token
#[utoipa::path(
    post,
    path = "/login",
    tag = "User",
    request_body = Credentials,
    responses(
        (status = 200, description = "Signed in", body = TokenResponse),
        (status = 401, description = "Wrong login or password")
    )
)]
pub async fn login(
    _origin: AppOrigin,
    State(db): State<Db>,
    State(gate): State<Gate>,
    AppJson(credentials): AppJson<Credentials>,
) -> Result<Json<TokenResponse>, AppError> {
    let (user_id, login) =
        service::authenticate(db.pool(), &credentials.userlogin, &credentials.userpassword).await?;
    let token = gate.issue_token(user_id, &login)?;
    tracing::info!(user_id, "user signed in");
    Ok(Json(TokenResponse { token }))
}

/// Signed-in user's profile
#[utoipa::path(
    get,
    path = "/me",
    tag = "User",
    responses((status = 200, description = "Profile", body = Profile))
)]
pub async fn me(
    user: AuthUser,
    State(db): State<Db>,
    State(storage): State<Storage>,
) -> Result<Json<Profile>, AppError> {
    Ok(Json(service::profile(db.pool(), &storage, user.user_id).await?))
}

/// Replace the profile image (multipart field `image`)
#[utoipa::path(
    put,
    path = "/image",
    tag = "User",
    request_body(content_type = "multipart/form-data", description = "Field `image`: jpg, jpeg, png or gif"),
    responses(
        (status = 200, description = "Image stored", body = ImageUpdated),
        (status = 400, description = "Missing, oversized or unsupported image")
    )
)]
pub async fn put_image(
    user: AuthUser,
    State(db): State<Db>,
    State(storage): State<Storage>,
    mut multipart: Multipart,
) -> Result<Json<ImageUpdated>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(e.body_text()))?
    {
        if !field.name().is_some_and(|n| n.eq_ignore_ascii_case("image")) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::bad_request(e.body_text()))?;
        let url = service::replace_image(db.pool(), &storage, user.user_id, &file_name, &bytes).await?;
        return Ok(Json(ImageUpdated { userimage: url }));
    }
    Err(AppError::bad_request("multipart field 'image' is required"))
}
