use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use crate::{
    auth::permissions::{self, Action},
    auth::AuthUser,
    errors::ServiceError,
    services::users::{CreateUserRequest, UserResponse},
    ApiResponse, AppState,
};

pub fn users_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_user))
        .route("/mechanics", get(list_mechanics))
}

/// Create an account (mechanic-admin only)
#[utoipa::path(
    post,
    path = "/api/v1/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 400, description = "Validation failed", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    tag = "users"
)]
pub async fn create_user(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    permissions::require(&user, Action::ManageUsers)?;
    let created = state.services.users.create_user(request).await?;
    Ok((
        axum::http::StatusCode::CREATED,
        Json(ApiResponse::<UserResponse>::success(created.into())),
    ))
}

/// Mechanics available for ticket assignment
#[utoipa::path(
    get,
    path = "/api/v1/users/mechanics",
    responses(
        (status = 200, description = "Mechanics", body = [UserResponse]),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    tag = "users"
)]
pub async fn list_mechanics(
    State(state): State<AppState>,
    _user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    // Requesters need the list too, to pick assignees at creation time.
    let mechanics = state.services.users.list_mechanics().await?;
    let body: Vec<UserResponse> = mechanics.into_iter().map(Into::into).collect();
    Ok(Json(ApiResponse::success(body)))
}
