/*
 * Responsibility
 * - /api/users 系 handler (list / create / get / delete)
 * - Path/Json は crate の extractor で受け、DTO validation → UserService 呼び出し
 * - DELETE は DELETE_USER_ROLE 設定時のみ role を要求
 */
use axum::{Json, extract::State, http::StatusCode};

use crate::{
    api::{
        dto::users::{CreateUserRequest, UserResponse},
        extractors::{ApiJson, CurrentPrincipal, UserIdPath},
    },
    error::AppError,
    state::AppState,
};

pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<UserResponse>>, AppError> {
    tracing::info!("Fetching all users");

    let rows = state.users.find_all().await?;
    Ok(Json(rows.into_iter().map(UserResponse::from).collect()))
}

pub async fn create_user(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    let valid = req
        .validate()
        .map_err(|field_errors| AppError::Validation { field_errors })?;
    tracing::info!(username = valid.username, "Creating user");

    let row = state
        .users
        .create_user(valid.username, valid.email, valid.full_name)
        .await?;

    Ok((StatusCode::CREATED, Json(UserResponse::from(row))))
}

pub async fn get_user(
    State(state): State<AppState>,
    UserIdPath(user_id): UserIdPath,
) -> Result<Json<UserResponse>, AppError> {
    tracing::info!(user_id, "Fetching user");

    let row = state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User", "id", user_id))?;

    Ok(Json(UserResponse::from(row)))
}

pub async fn delete_user(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    UserIdPath(user_id): UserIdPath,
) -> Result<StatusCode, AppError> {
    if let Some(role) = state.delete_user_role.as_deref()
        && !principal.has_role(role)
    {
        return Err(AppError::forbidden(format!(
            "{} lacks role {role}",
            principal.display_name
        )));
    }

    tracing::info!(user_id, by = %principal.display_name, "Deleting user");

    if !state.users.exists_by_id(user_id).await? {
        return Err(AppError::not_found("User", "id", user_id));
    }
    if !state.users.delete_by_id(user_id).await? {
        // Removed concurrently between the check and the delete.
        return Err(AppError::not_found("User", "id", user_id));
    }

    Ok(StatusCode::NO_CONTENT)
}
