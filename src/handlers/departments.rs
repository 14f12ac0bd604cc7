use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::permissions::{self, Action},
    auth::AuthUser,
    entities::department,
    errors::ServiceError,
    services::departments::{CreateDepartmentRequest, UpdateDepartmentRequest},
    ApiResponse, AppState,
};

/// Row of the equipment-by-department picker.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EquipmentSummary {
    pub id: Uuid,
    pub name: String,
    pub image_url: Option<String>,
}

pub fn departments_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_departments).post(create_department))
        .route(
            "/:id",
            get(get_department)
                .put(update_department)
                .delete(delete_department),
        )
        .route("/:id/equipment", get(equipment_by_department))
}

/// List departments, ordered by name
#[utoipa::path(
    get,
    path = "/api/v1/departments",
    responses((status = 200, description = "Departments")),
    tag = "departments"
)]
pub async fn list_departments(
    State(state): State<AppState>,
    _user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    let departments = state.services.departments.list().await?;
    Ok(Json(ApiResponse::<Vec<department::Model>>::success(
        departments,
    )))
}

/// Create a department
#[utoipa::path(
    post,
    path = "/api/v1/departments",
    request_body = CreateDepartmentRequest,
    responses(
        (status = 201, description = "Department created"),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    tag = "departments"
)]
pub async fn create_department(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CreateDepartmentRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    permissions::require(&user, Action::ManageCatalog)?;
    let created = state.services.departments.create(request).await?;
    Ok((
        axum::http::StatusCode::CREATED,
        Json(ApiResponse::success(created)),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/departments/{id}",
    params(("id" = Uuid, Path, description = "Department id")),
    responses(
        (status = 200, description = "Department"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "departments"
)]
pub async fn get_department(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let found = state.services.departments.get(id).await?;
    Ok(Json(ApiResponse::success(found)))
}

#[utoipa::path(
    put,
    path = "/api/v1/departments/{id}",
    params(("id" = Uuid, Path, description = "Department id")),
    request_body = UpdateDepartmentRequest,
    responses(
        (status = 200, description = "Department updated"),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    tag = "departments"
)]
pub async fn update_department(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateDepartmentRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    permissions::require(&user, Action::ManageCatalog)?;
    let updated = state.services.departments.update(id, request).await?;
    Ok(Json(ApiResponse::success(updated)))
}

/// Delete a department. Equipment in it is removed as well.
#[utoipa::path(
    delete,
    path = "/api/v1/departments/{id}",
    params(("id" = Uuid, Path, description = "Department id")),
    responses(
        (status = 200, description = "Department deleted"),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    tag = "departments"
)]
pub async fn delete_department(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    permissions::require(&user, Action::ManageCatalog)?;
    state.services.departments.delete(id).await?;
    Ok(Json(ApiResponse::<()>::message("Department deleted")))
}

/// Equipment of one department as `{id, name, imageUrl}` rows
#[utoipa::path(
    get,
    path = "/api/v1/departments/{id}/equipment",
    params(("id" = Uuid, Path, description = "Department id")),
    responses((status = 200, description = "Equipment of the department", body = [EquipmentSummary])),
    tag = "departments"
)]
pub async fn equipment_by_department(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let rows = state.services.equipment.by_department(id).await?;
    let base = state.config.media_base_url.trim_end_matches('/').to_string();
    let summaries: Vec<EquipmentSummary> = rows
        .into_iter()
        .map(|eq| EquipmentSummary {
            id: eq.id,
            name: eq.name,
            image_url: eq.image_key.map(|key| format!("{}/{}", base, key)),
        })
        .collect();
    Ok(Json(summaries))
}
