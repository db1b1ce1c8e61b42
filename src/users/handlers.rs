use axum::{
    extract::{Path, Query, State},
    routing::{get, put},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::{dto::MessageResponse, extractors::AuthUser},
    error::AppError,
    extract::{parse_id, JsonBody},
    state::AppState,
    users::{
        dto::{ListUsersQuery, UpdateRoleRequest, UserActionResponse, UserListResponse},
        model::PublicUser,
        services::UserDirectory,
    },
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/:id", get(get_user).delete(delete_user))
        .route("/users/:id/toggle-status", put(toggle_status))
        .route("/users/:id/role", put(update_role))
}

/// A malformed id cannot name an account, but non-admins still learn
/// nothing beyond 403.
fn admin_target(caller: &AuthUser, raw: &str) -> Result<Uuid, AppError> {
    match Uuid::parse_str(raw) {
        Ok(id) => Ok(id),
        Err(_) if !caller.is_admin() => Err(AppError::Forbidden),
        Err(_) => Err(AppError::NotFound("User not found")),
    }
}

#[instrument(skip(dir, _caller))]
pub async fn list_users(
    State(dir): State<UserDirectory>,
    _caller: AuthUser,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<UserListResponse>, AppError> {
    let listing = dir
        .list(query.page(), query.limit(), query.search())
        .await?;
    Ok(Json(listing))
}

#[instrument(skip(dir, _caller))]
pub async fn get_user(
    State(dir): State<UserDirectory>,
    _caller: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<PublicUser>, AppError> {
    let id = parse_id(&id, "User not found")?;
    Ok(Json(dir.get(id).await?.into()))
}

#[instrument(skip(dir, caller), fields(actor = %caller.user_id))]
pub async fn toggle_status(
    State(dir): State<UserDirectory>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<UserActionResponse>, AppError> {
    let id = admin_target(&caller, &id)?;
    let user = dir.toggle_status(&caller, id).await?;
    Ok(Json(UserActionResponse {
        message: "User status updated successfully".into(),
        user: user.into(),
    }))
}

#[instrument(skip(dir, caller, payload), fields(actor = %caller.user_id))]
pub async fn update_role(
    State(dir): State<UserDirectory>,
    caller: AuthUser,
    Path(id): Path<String>,
    JsonBody(payload): JsonBody<UpdateRoleRequest>,
) -> Result<Json<UserActionResponse>, AppError> {
    let id = admin_target(&caller, &id)?;
    let user = dir.set_role(&caller, id, payload.role.as_deref()).await?;
    Ok(Json(UserActionResponse {
        message: "User role updated successfully".into(),
        user: user.into(),
    }))
}

#[instrument(skip(dir, caller), fields(actor = %caller.user_id))]
pub async fn delete_user(
    State(dir): State<UserDirectory>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let id = admin_target(&caller, &id)?;
    dir.delete(&caller, id).await?;
    Ok(Json(MessageResponse::new("User deleted successfully")))
}
