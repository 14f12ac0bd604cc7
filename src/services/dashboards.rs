use chrono::{Duration, Utc};
use sea_orm::sea_query::{Expr, Query, SimpleExpr};
use sea_orm::{
    ColumnTrait, Condition, EntityTrait, Order, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Select,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    db::DbPool,
    entities::{
        department::{self, Entity as DepartmentEntity},
        equipment::{self, Entity as EquipmentEntity},
        ticket::{self, Entity as TicketEntity, TicketKind, TicketStatus},
        ticket_assignee,
    },
    errors::ServiceError,
    services::tickets::TicketResponse,
};

/// Tickets shown per dashboard page.
pub const PAGE_SIZE: u64 = 12;

/// Rows shown per side of the history overview.
const HISTORY_OVERVIEW_LIMIT: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecencyFilter {
    /// Created within the current UTC calendar day.
    Today,
    /// Created within the last 7 days.
    ThisWeek,
}

impl RecencyFilter {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "today" => Some(RecencyFilter::Today),
            "this_week" => Some(RecencyFilter::ThisWeek),
            _ => None,
        }
    }
}

/// Filter/sort/pagination parameters shared by both dashboards.
#[derive(Debug, Default, Clone)]
pub struct DashboardQuery {
    pub status: Option<TicketStatus>,
    pub recency: Option<RecencyFilter>,
    pub sort_by: Option<String>,
    pub sort_descending: bool,
    /// 1-based page number.
    pub page: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TicketPage {
    pub items: Vec<TicketResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub total_pages: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MechanicDashboard {
    #[serde(flatten)]
    pub tickets: TicketPage,
    /// Counts over the filtered, unpaginated set.
    pub pending: u64,
    pub in_progress: u64,
    pub done: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EquipmentLastService {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub department_id: Uuid,
    pub last_service: Option<TicketResponse>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DepartmentLastService {
    pub id: Uuid,
    pub name: String,
    pub last_ad_hoc_service: Option<TicketResponse>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HistoryOverview {
    pub equipment: Vec<EquipmentLastService>,
    pub departments: Vec<DepartmentLastService>,
}

/// Sortable ticket fields, whitelisted so arbitrary column names never reach
/// the query builder.
fn sort_column(name: &str) -> Option<ticket::Column> {
    match name {
        "created_at" => Some(ticket::Column::CreatedAt),
        "updated_at" => Some(ticket::Column::UpdatedAt),
        "started_at" => Some(ticket::Column::StartedAt),
        "completed_at" => Some(ticket::Column::CompletedAt),
        "priority" => Some(ticket::Column::Priority),
        "status" => Some(ticket::Column::Status),
        "description" => Some(ticket::Column::Description),
        _ => None,
    }
}

/// CASE expression ranking statuses pending(1) → in_progress(2) → done(3),
/// anything else last.
fn status_rank_expr() -> SimpleExpr {
    Expr::case(ticket::Column::Status.eq(TicketStatus::Pending), Expr::value(1))
        .case(
            ticket::Column::Status.eq(TicketStatus::InProgress),
            Expr::value(2),
        )
        .case(ticket::Column::Status.eq(TicketStatus::Done), Expr::value(3))
        .finally(Expr::value(4))
        .into()
}

/// Membership filter: tickets having `user_id` among their assignees.
fn assigned_to_filter(user_id: Uuid) -> SimpleExpr {
    ticket::Column::Id.in_subquery(
        Query::select()
            .column(ticket_assignee::Column::TicketId)
            .from(ticket_assignee::Entity)
            .and_where(Expr::col(ticket_assignee::Column::UserId).eq(user_id))
            .to_owned(),
    )
}

/// Read-only queries backing the role dashboards and history pages
#[derive(Clone)]
pub struct DashboardService {
    db: Arc<DbPool>,
}

impl DashboardService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    fn apply_filters(
        &self,
        mut select: Select<TicketEntity>,
        query: &DashboardQuery,
    ) -> Select<TicketEntity> {
        if let Some(status) = query.status {
            select = select.filter(ticket::Column::Status.eq(status));
        }
        if let Some(recency) = query.recency {
            let now = Utc::now();
            let cutoff = match recency {
                RecencyFilter::Today => now
                    .date_naive()
                    .and_hms_opt(0, 0, 0)
                    .expect("midnight is always a valid time")
                    .and_utc(),
                RecencyFilter::ThisWeek => now - Duration::days(7),
            };
            select = select.filter(ticket::Column::CreatedAt.gte(cutoff));
        }
        select
    }

    async fn paginate(
        &self,
        select: Select<TicketEntity>,
        page: u64,
    ) -> Result<TicketPage, ServiceError> {
        let page = page.max(1);
        let paginator = select.paginate(&*self.db, PAGE_SIZE);
        let total = paginator.num_items().await?;
        let total_pages = total.div_ceil(PAGE_SIZE).max(1);
        let items = paginator.fetch_page(page.min(total_pages) - 1).await?;

        Ok(TicketPage {
            items: items.into_iter().map(Into::into).collect(),
            total,
            page: page.min(total_pages),
            per_page: PAGE_SIZE,
            total_pages,
        })
    }

    /// Tickets the user opened, filtered and newest-first unless another
    /// sort was asked for.
    #[instrument(skip(self, query))]
    pub async fn requester_dashboard(
        &self,
        user_id: Uuid,
        query: &DashboardQuery,
    ) -> Result<TicketPage, ServiceError> {
        let mut select =
            TicketEntity::find().filter(ticket::Column::RequesterId.eq(user_id));
        select = self.apply_filters(select, query);

        let order = if query.sort_descending {
            Order::Desc
        } else {
            Order::Asc
        };
        select = match query.sort_by.as_deref().and_then(sort_column) {
            Some(column) => select.order_by(column, order),
            None => select.order_by_desc(ticket::Column::CreatedAt),
        };

        self.paginate(select, query.page).await
    }

    /// Tickets assigned to the mechanic, ranked by status unless another
    /// sort was asked for, with counts over the filtered set.
    #[instrument(skip(self, query))]
    pub async fn mechanic_dashboard(
        &self,
        user_id: Uuid,
        query: &DashboardQuery,
    ) -> Result<MechanicDashboard, ServiceError> {
        let base = self.apply_filters(
            TicketEntity::find().filter(assigned_to_filter(user_id)),
            query,
        );

        // Counts reflect the filters, not the whole table, and are computed
        // before pagination.
        let pending = base
            .clone()
            .filter(ticket::Column::Status.eq(TicketStatus::Pending))
            .count(&*self.db)
            .await?;
        let in_progress = base
            .clone()
            .filter(ticket::Column::Status.eq(TicketStatus::InProgress))
            .count(&*self.db)
            .await?;
        let done = base
            .clone()
            .filter(ticket::Column::Status.eq(TicketStatus::Done))
            .count(&*self.db)
            .await?;

        let order = if query.sort_descending {
            Order::Desc
        } else {
            Order::Asc
        };
        let select = match query.sort_by.as_deref().and_then(sort_column) {
            Some(column) => base.order_by(column, order),
            None => base
                .order_by(status_rank_expr(), Order::Asc)
                .order_by_desc(ticket::Column::CreatedAt),
        };

        let tickets = self.paginate(select, query.page).await?;
        Ok(MechanicDashboard {
            tickets,
            pending,
            in_progress,
            done,
        })
    }

    /// Most recently completed ticket for a piece of equipment.
    #[instrument(skip(self))]
    pub async fn last_completed_for_equipment(
        &self,
        equipment_id: Uuid,
    ) -> Result<Option<ticket::Model>, ServiceError> {
        Ok(TicketEntity::find()
            .filter(ticket::Column::EquipmentId.eq(equipment_id))
            .filter(ticket::Column::Status.eq(TicketStatus::Done))
            .order_by_desc(ticket::Column::CompletedAt)
            .one(&*self.db)
            .await?)
    }

    /// Most recently completed ad-hoc ticket for a department.
    #[instrument(skip(self))]
    pub async fn last_ad_hoc_completed_for_department(
        &self,
        department_id: Uuid,
    ) -> Result<Option<ticket::Model>, ServiceError> {
        Ok(TicketEntity::find()
            .filter(ticket::Column::DepartmentId.eq(department_id))
            .filter(ticket::Column::Kind.eq(TicketKind::AdHoc))
            .filter(ticket::Column::Status.eq(TicketStatus::Done))
            .order_by_desc(ticket::Column::CompletedAt)
            .one(&*self.db)
            .await?)
    }

    /// Every ticket ever opened against a piece of equipment, newest first.
    #[instrument(skip(self))]
    pub async fn equipment_history(
        &self,
        equipment_id: Uuid,
    ) -> Result<Vec<ticket::Model>, ServiceError> {
        Ok(TicketEntity::find()
            .filter(ticket::Column::EquipmentId.eq(equipment_id))
            .order_by_desc(ticket::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    /// Ad-hoc tickets of a department, newest first.
    #[instrument(skip(self))]
    pub async fn department_ad_hoc_history(
        &self,
        department_id: Uuid,
    ) -> Result<Vec<ticket::Model>, ServiceError> {
        Ok(TicketEntity::find()
            .filter(ticket::Column::DepartmentId.eq(department_id))
            .filter(ticket::Column::Kind.eq(TicketKind::AdHoc))
            .order_by_desc(ticket::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    /// Combined overview: equipment matching the search with their last
    /// completed service, and departments with their last ad-hoc service.
    #[instrument(skip(self))]
    pub async fn history_overview(
        &self,
        search: Option<String>,
        department_id: Option<Uuid>,
    ) -> Result<HistoryOverview, ServiceError> {
        let mut equipment_query = EquipmentEntity::find()
            .order_by_asc(equipment::Column::Name)
            .limit(HISTORY_OVERVIEW_LIMIT);
        if let Some(q) = search.as_deref().filter(|q| !q.is_empty()) {
            equipment_query = equipment_query.filter(
                Condition::any()
                    .add(equipment::Column::Name.contains(q))
                    .add(equipment::Column::Code.contains(q)),
            );
        }
        if let Some(id) = department_id {
            equipment_query = equipment_query.filter(equipment::Column::DepartmentId.eq(id));
        }
        let equipment_rows = equipment_query.all(&*self.db).await?;

        let mut equipment = Vec::with_capacity(equipment_rows.len());
        for eq in equipment_rows {
            let last = self.last_completed_for_equipment(eq.id).await?;
            equipment.push(EquipmentLastService {
                id: eq.id,
                name: eq.name,
                code: eq.code,
                department_id: eq.department_id,
                last_service: last.map(Into::into),
            });
        }

        let mut department_query =
            DepartmentEntity::find().order_by_asc(department::Column::Name);
        if let Some(id) = department_id {
            department_query = department_query.filter(department::Column::Id.eq(id));
        } else {
            department_query = department_query.limit(HISTORY_OVERVIEW_LIMIT);
        }

        let mut departments = Vec::new();
        for dep in department_query.all(&*self.db).await? {
            let last = self.last_ad_hoc_completed_for_department(dep.id).await?;
            departments.push(DepartmentLastService {
                id: dep.id,
                name: dep.name,
                last_ad_hoc_service: last.map(Into::into),
            });
        }

        Ok(HistoryOverview {
            equipment,
            departments,
        })
    }
}
