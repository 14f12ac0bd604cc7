use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::{
    auth::permissions::{self, Action},
    auth::AuthUser,
    entities::ticket::TicketStatus,
    errors::ServiceError,
    services::dashboards::{DashboardQuery, MechanicDashboard, RecencyFilter, TicketPage},
    services::tickets::TicketResponse,
    ApiResponse, AppState,
};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DashboardParams {
    /// Filter by status: `pending`, `in_progress` or `done`
    pub status: Option<String>,
    /// Recency window: `today` or `this_week`
    pub recency: Option<String>,
    /// Whitelisted ticket field to sort by
    pub sort_by: Option<String>,
    /// `asc` (default) or `desc`
    pub sort_order: Option<String>,
    /// 1-based page number
    pub page: Option<u64>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryParams {
    /// Substring match against equipment name or code
    pub q: Option<String>,
    pub department_id: Option<Uuid>,
}

impl DashboardParams {
    fn into_query(self) -> Result<DashboardQuery, ServiceError> {
        let status = match self.status.as_deref().filter(|s| !s.is_empty()) {
            Some(raw) => Some(TicketStatus::parse(raw).ok_or_else(|| {
                ServiceError::ValidationError(format!("Unknown status '{}'", raw))
            })?),
            None => None,
        };
        let recency = match self.recency.as_deref().filter(|s| !s.is_empty()) {
            Some(raw) => Some(RecencyFilter::parse(raw).ok_or_else(|| {
                ServiceError::ValidationError(format!("Unknown recency filter '{}'", raw))
            })?),
            None => None,
        };
        let sort_descending = match self.sort_order.as_deref() {
            None | Some("asc") => false,
            Some("desc") => true,
            Some(other) => {
                return Err(ServiceError::ValidationError(format!(
                    "Unknown sort order '{}'",
                    other
                )))
            }
        };

        Ok(DashboardQuery {
            status,
            recency,
            sort_by: self.sort_by,
            sort_descending,
            page: self.page.unwrap_or(1),
        })
    }
}

pub fn dashboards_router() -> Router<AppState> {
    Router::new()
        .route("/requester", get(requester_dashboard))
        .route("/mechanic", get(mechanic_dashboard))
}

pub fn history_router() -> Router<AppState> {
    Router::new()
        .route("/", get(history_overview))
        .route("/equipment/:id", get(equipment_history))
        .route("/departments/:id", get(department_history))
}

/// Tickets opened by the current requester
#[utoipa::path(
    get,
    path = "/api/v1/dashboards/requester",
    params(DashboardParams),
    responses(
        (status = 200, description = "Requester dashboard", body = TicketPage),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    tag = "dashboards"
)]
pub async fn requester_dashboard(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<DashboardParams>,
) -> Result<impl IntoResponse, ServiceError> {
    permissions::require(&user, Action::ViewRequesterDashboard)?;
    let query = params.into_query()?;
    let page = state
        .services
        .dashboards
        .requester_dashboard(user.id, &query)
        .await?;
    Ok(Json(ApiResponse::success(page)))
}

/// Tickets assigned to the current mechanic, with status counts
#[utoipa::path(
    get,
    path = "/api/v1/dashboards/mechanic",
    params(DashboardParams),
    responses(
        (status = 200, description = "Mechanic dashboard", body = MechanicDashboard),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    tag = "dashboards"
)]
pub async fn mechanic_dashboard(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<DashboardParams>,
) -> Result<impl IntoResponse, ServiceError> {
    permissions::require(&user, Action::ViewMechanicDashboard)?;
    let query = params.into_query()?;
    let dashboard = state
        .services
        .dashboards
        .mechanic_dashboard(user.id, &query)
        .await?;
    Ok(Json(ApiResponse::success(dashboard)))
}

/// Last-service overview across equipment and departments
#[utoipa::path(
    get,
    path = "/api/v1/history",
    params(HistoryParams),
    responses(
        (status = 200, description = "History overview"),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    tag = "history"
)]
pub async fn history_overview(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<HistoryParams>,
) -> Result<impl IntoResponse, ServiceError> {
    permissions::require(&user, Action::ViewHistory)?;
    let overview = state
        .services
        .dashboards
        .history_overview(params.q, params.department_id)
        .await?;
    Ok(Json(ApiResponse::success(overview)))
}

/// Every ticket ever opened against one piece of equipment
#[utoipa::path(
    get,
    path = "/api/v1/history/equipment/{id}",
    params(("id" = Uuid, Path, description = "Equipment id")),
    responses(
        (status = 200, description = "Equipment history", body = [TicketResponse]),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    tag = "history"
)]
pub async fn equipment_history(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    permissions::require(&user, Action::ViewHistory)?;
    // 404 for unknown equipment rather than an empty history.
    state.services.equipment.get(id).await?;
    let tickets = state.services.dashboards.equipment_history(id).await?;
    let body: Vec<TicketResponse> = tickets.into_iter().map(Into::into).collect();
    Ok(Json(ApiResponse::success(body)))
}

/// Ad-hoc tickets of one department
#[utoipa::path(
    get,
    path = "/api/v1/history/departments/{id}",
    params(("id" = Uuid, Path, description = "Department id")),
    responses(
        (status = 200, description = "Department ad-hoc history", body = [TicketResponse]),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    tag = "history"
)]
pub async fn department_history(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    permissions::require(&user, Action::ViewHistory)?;
    state.services.departments.get(id).await?;
    let tickets = state
        .services
        .dashboards
        .department_ad_hoc_history(id)
        .await?;
    let body: Vec<TicketResponse> = tickets.into_iter().map(Into::into).collect();
    Ok(Json(ApiResponse::success(body)))
}
