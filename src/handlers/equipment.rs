use axum::{
    extract::{Multipart, Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::{
    auth::permissions::{self, Action},
    auth::AuthUser,
    errors::ServiceError,
    services::equipment::{CreateEquipmentRequest, EquipmentFilter, UpdateEquipmentRequest},
    ApiResponse, AppState,
};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EquipmentListParams {
    /// Substring match against name or code
    pub q: Option<String>,
    pub department_id: Option<Uuid>,
    pub limit: Option<u64>,
}

pub fn equipment_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_equipment).post(create_equipment))
        .route(
            "/:id",
            get(get_equipment).put(update_equipment).delete(delete_equipment),
        )
        .route("/:id/image", post(upload_equipment_image))
}

/// List equipment with optional search
#[utoipa::path(
    get,
    path = "/api/v1/equipment",
    params(EquipmentListParams),
    responses((status = 200, description = "Equipment list")),
    tag = "equipment"
)]
pub async fn list_equipment(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(params): Query<EquipmentListParams>,
) -> Result<impl IntoResponse, ServiceError> {
    let rows = state
        .services
        .equipment
        .list(EquipmentFilter {
            search: params.q,
            department_id: params.department_id,
            limit: params.limit,
        })
        .await?;
    Ok(Json(ApiResponse::success(rows)))
}

/// Register a piece of equipment
#[utoipa::path(
    post,
    path = "/api/v1/equipment",
    request_body = CreateEquipmentRequest,
    responses(
        (status = 201, description = "Equipment created"),
        (status = 400, description = "Validation failed", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    tag = "equipment"
)]
pub async fn create_equipment(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CreateEquipmentRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    permissions::require(&user, Action::ManageCatalog)?;
    let created = state.services.equipment.create(request).await?;
    Ok((
        axum::http::StatusCode::CREATED,
        Json(ApiResponse::success(created)),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/equipment/{id}",
    params(("id" = Uuid, Path, description = "Equipment id")),
    responses(
        (status = 200, description = "Equipment"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "equipment"
)]
pub async fn get_equipment(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let found = state.services.equipment.get(id).await?;
    Ok(Json(ApiResponse::success(found)))
}

#[utoipa::path(
    put,
    path = "/api/v1/equipment/{id}",
    params(("id" = Uuid, Path, description = "Equipment id")),
    request_body = UpdateEquipmentRequest,
    responses(
        (status = 200, description = "Equipment updated"),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    tag = "equipment"
)]
pub async fn update_equipment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateEquipmentRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    permissions::require(&user, Action::ManageCatalog)?;
    let updated = state.services.equipment.update(id, request).await?;
    Ok(Json(ApiResponse::success(updated)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/equipment/{id}",
    params(("id" = Uuid, Path, description = "Equipment id")),
    responses(
        (status = 200, description = "Equipment deleted"),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    tag = "equipment"
)]
pub async fn delete_equipment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    permissions::require(&user, Action::ManageCatalog)?;
    state.services.equipment.delete(id).await?;
    Ok(Json(ApiResponse::<()>::message("Equipment deleted")))
}

/// Upload or replace the catalog photo (multipart field `image`)
#[utoipa::path(
    post,
    path = "/api/v1/equipment/{id}/image",
    params(("id" = Uuid, Path, description = "Equipment id")),
    responses(
        (status = 200, description = "Image stored"),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 413, description = "Image too large", body = crate::errors::ErrorResponse)
    ),
    tag = "equipment"
)]
pub async fn upload_equipment_image(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ServiceError> {
    permissions::require(&user, Action::ManageCatalog)?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServiceError::ValidationError(format!("Malformed multipart body: {}", e)))?
    {
        if field.name() != Some("image") {
            continue;
        }
        let filename = field.file_name().unwrap_or("upload").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ServiceError::ValidationError(format!("Failed to read upload: {}", e)))?;
        let updated = state
            .services
            .equipment
            .upload_image(id, &filename, bytes)
            .await?;
        return Ok(Json(ApiResponse::success(updated)));
    }

    Err(ServiceError::ValidationError(
        "Multipart field 'image' is required".to_string(),
    ))
}
