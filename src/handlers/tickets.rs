use axum::{
    extract::{Multipart, Path, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::permissions::{self, Action},
    auth::AuthUser,
    entities::ticket::{TicketKind, TicketPriority, TicketStatus},
    entities::user::Role,
    errors::ServiceError,
    services::tickets::{CreateTicketRequest, NewTicketImage, TicketDetail, TicketResponse},
    ApiResponse, AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    /// One of `pending`, `in_progress`, `done`
    pub status: String,
    pub notes: Option<String>,
}

pub fn tickets_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_ticket))
        .route("/:id", get(get_ticket))
        .route("/:id/status", post(update_status))
}

fn parse_field<T>(value: Option<T>, name: &str) -> Result<T, ServiceError> {
    value.ok_or_else(|| ServiceError::ValidationError(format!("Field '{}' is required", name)))
}

/// Open a ticket. Multipart form: `kind`, `description`, `priority`,
/// `equipment_id` or `department_id`, repeated `mechanic_ids`, repeated
/// `images` files with optional repeated `captions`.
#[utoipa::path(
    post,
    path = "/api/v1/tickets",
    responses(
        (status = 201, description = "Ticket created", body = TicketResponse),
        (status = 400, description = "Validation failed", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 413, description = "An image exceeds the size cap", body = crate::errors::ErrorResponse)
    ),
    tag = "tickets"
)]
pub async fn create_ticket(
    State(state): State<AppState>,
    user: AuthUser,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ServiceError> {
    permissions::require(&user, Action::CreateTicket)?;

    let mut kind: Option<TicketKind> = None;
    let mut description: Option<String> = None;
    let mut priority = TicketPriority::Low;
    let mut equipment_id: Option<Uuid> = None;
    let mut department_id: Option<Uuid> = None;
    let mut mechanic_ids: Vec<Uuid> = Vec::new();
    let mut images: Vec<NewTicketImage> = Vec::new();
    let mut captions: Vec<String> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServiceError::ValidationError(format!("Malformed multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "kind" => {
                let text = read_text(field).await?;
                kind = Some(TicketKind::parse(&text).ok_or_else(|| {
                    ServiceError::ValidationError(format!("Unknown ticket kind '{}'", text))
                })?);
            }
            "description" => description = Some(read_text(field).await?),
            "priority" => {
                let text = read_text(field).await?;
                priority = TicketPriority::parse(&text).ok_or_else(|| {
                    ServiceError::ValidationError(format!("Unknown priority '{}'", text))
                })?;
            }
            "equipment_id" => equipment_id = Some(read_uuid(field).await?),
            "department_id" => department_id = Some(read_uuid(field).await?),
            "mechanic_ids" => mechanic_ids.push(read_uuid(field).await?),
            "captions" => captions.push(read_text(field).await?),
            "images" => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await.map_err(|e| {
                    ServiceError::ValidationError(format!("Failed to read upload: {}", e))
                })?;
                images.push(NewTicketImage {
                    filename,
                    content_type,
                    caption: None,
                    bytes,
                });
            }
            _ => {}
        }
    }

    for (img, caption) in images.iter_mut().zip(captions.into_iter()) {
        if !caption.is_empty() {
            img.caption = Some(caption);
        }
    }

    let request = CreateTicketRequest {
        kind: parse_field(kind, "kind")?,
        equipment_id,
        department_id,
        description: parse_field(description, "description")?,
        priority,
        mechanic_ids,
        images,
    };

    let created = state.services.tickets.create_ticket(&user, request).await?;
    Ok((
        axum::http::StatusCode::CREATED,
        Json(ApiResponse::success(created)),
    ))
}

/// Ticket detail with images, assignments and resolved department
#[utoipa::path(
    get,
    path = "/api/v1/tickets/{id}",
    params(("id" = Uuid, Path, description = "Ticket id")),
    responses(
        (status = 200, description = "Ticket detail", body = TicketDetail),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "tickets"
)]
pub async fn get_ticket(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let detail = state.services.tickets.get_ticket_detail(id).await?;

    // Requesters only see their own tickets; mechanics see everything.
    if user.role == Role::Requester && detail.ticket.requester_id != user.id {
        return Err(ServiceError::Forbidden(
            "This ticket belongs to another requester".to_string(),
        ));
    }

    Ok(Json(ApiResponse::success(detail)))
}

/// Move a ticket through its lifecycle (assigned mechanics only)
#[utoipa::path(
    post,
    path = "/api/v1/tickets/{id}/status",
    params(("id" = Uuid, Path, description = "Ticket id")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = TicketResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Ticket is done or was modified concurrently", body = crate::errors::ErrorResponse)
    ),
    tag = "tickets"
)]
pub async fn update_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    permissions::require(&user, Action::TransitionTicket)?;

    let target = TicketStatus::parse(&request.status).ok_or_else(|| {
        ServiceError::ValidationError(format!("Unknown status '{}'", request.status))
    })?;

    let updated = state
        .services
        .tickets
        .transition(&user, id, target, request.notes)
        .await?;
    Ok(Json(ApiResponse::success(updated)))
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, ServiceError> {
    field
        .text()
        .await
        .map_err(|e| ServiceError::ValidationError(format!("Failed to read field: {}", e)))
}

async fn read_uuid(field: axum::extract::multipart::Field<'_>) -> Result<Uuid, ServiceError> {
    let text = read_text(field).await?;
    Uuid::parse_str(text.trim())
        .map_err(|e| ServiceError::ValidationError(format!("Invalid id '{}': {}", text, e)))
}
