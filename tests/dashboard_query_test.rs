//! Dashboard filtering, ordering, pagination and the history lookups.

mod common;

use chrono::{Duration, Utc};
use common::{seed_department, seed_equipment, seed_user, setup, TestCtx};
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use upkeep_api::{
    auth::AuthUser,
    entities::ticket::{self, TicketKind, TicketPriority, TicketStatus},
    entities::user::Role,
    services::dashboards::{DashboardQuery, RecencyFilter, PAGE_SIZE},
    services::tickets::CreateTicketRequest,
};
use uuid::Uuid;

async fn open_ticket(
    ctx: &TestCtx,
    requester: &AuthUser,
    department_id: Uuid,
    mechanic_ids: Vec<Uuid>,
    description: &str,
) -> Uuid {
    ctx.tickets
        .create_ticket(
            requester,
            CreateTicketRequest {
                kind: TicketKind::AdHoc,
                equipment_id: None,
                department_id: Some(department_id),
                description: description.to_string(),
                priority: TicketPriority::Medium,
                mechanic_ids,
                images: Vec::new(),
            },
        )
        .await
        .unwrap()
        .id
}

async fn backdate(ctx: &TestCtx, ticket_id: Uuid, days: i64) {
    let found = ticket::Entity::find_by_id(ticket_id)
        .one(&*ctx.db)
        .await
        .unwrap()
        .unwrap();
    let mut active: ticket::ActiveModel = found.into();
    active.created_at = Set(Utc::now() - Duration::days(days));
    active.update(&*ctx.db).await.unwrap();
}

#[tokio::test]
async fn requester_sees_only_their_own_tickets() {
    let ctx = setup().await;
    let ulla = seed_user(&ctx, "ulla", Role::Requester).await;
    let rita = seed_user(&ctx, "rita", Role::Requester).await;
    let department_id = seed_department(&ctx, "Office").await;

    open_ticket(&ctx, &ulla, department_id, Vec::new(), "ulla's ticket").await;
    open_ticket(&ctx, &rita, department_id, Vec::new(), "rita's ticket").await;

    let page = ctx
        .dashboards
        .requester_dashboard(ulla.id, &DashboardQuery::default())
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].description, "ulla's ticket");
}

#[tokio::test]
async fn recency_filters_bound_the_created_window() {
    let ctx = setup().await;
    let ulla = seed_user(&ctx, "ulla", Role::Requester).await;
    let department_id = seed_department(&ctx, "Office").await;

    let today = open_ticket(&ctx, &ulla, department_id, Vec::new(), "today").await;
    let recent = open_ticket(&ctx, &ulla, department_id, Vec::new(), "three days old").await;
    let old = open_ticket(&ctx, &ulla, department_id, Vec::new(), "ten days old").await;
    backdate(&ctx, recent, 3).await;
    backdate(&ctx, old, 10).await;

    let page = ctx
        .dashboards
        .requester_dashboard(
            ulla.id,
            &DashboardQuery {
                recency: Some(RecencyFilter::Today),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].id, today);

    let page = ctx
        .dashboards
        .requester_dashboard(
            ulla.id,
            &DashboardQuery {
                recency: Some(RecencyFilter::ThisWeek),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(page.total, 2);
    assert!(page.items.iter().all(|t| t.id != old));
}

#[tokio::test]
async fn pagination_is_twelve_per_page() {
    let ctx = setup().await;
    let ulla = seed_user(&ctx, "ulla", Role::Requester).await;
    let department_id = seed_department(&ctx, "Office").await;

    for i in 0..15 {
        open_ticket(&ctx, &ulla, department_id, Vec::new(), &format!("t{}", i)).await;
    }

    let first = ctx
        .dashboards
        .requester_dashboard(ulla.id, &DashboardQuery::default())
        .await
        .unwrap();
    assert_eq!(first.total, 15);
    assert_eq!(first.items.len() as u64, PAGE_SIZE);
    assert_eq!(first.total_pages, 2);

    let second = ctx
        .dashboards
        .requester_dashboard(
            ulla.id,
            &DashboardQuery {
                page: 2,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(second.items.len(), 3);
    assert_eq!(second.page, 2);
}

#[tokio::test]
async fn mechanic_default_order_ranks_status_then_newest() {
    let ctx = setup().await;
    let ulla = seed_user(&ctx, "ulla", Role::Requester).await;
    let marta = seed_user(&ctx, "marta", Role::Mechanic).await;
    let department_id = seed_department(&ctx, "Office").await;

    let done = open_ticket(&ctx, &ulla, department_id, vec![marta.id], "done").await;
    let in_progress =
        open_ticket(&ctx, &ulla, department_id, vec![marta.id], "in progress").await;
    let pending_old = open_ticket(&ctx, &ulla, department_id, vec![marta.id], "pending old").await;
    let pending_new = open_ticket(&ctx, &ulla, department_id, vec![marta.id], "pending new").await;
    backdate(&ctx, pending_old, 2).await;

    ctx.tickets
        .transition(&marta, in_progress, TicketStatus::InProgress, None)
        .await
        .unwrap();
    ctx.tickets
        .transition(&marta, done, TicketStatus::Done, None)
        .await
        .unwrap();

    let dashboard = ctx
        .dashboards
        .mechanic_dashboard(marta.id, &DashboardQuery::default())
        .await
        .unwrap();
    let order: Vec<Uuid> = dashboard.tickets.items.iter().map(|t| t.id).collect();
    assert_eq!(order, vec![pending_new, pending_old, in_progress, done]);

    assert_eq!(dashboard.pending, 2);
    assert_eq!(dashboard.in_progress, 1);
    assert_eq!(dashboard.done, 1);
}

#[tokio::test]
async fn counts_follow_the_active_filters() {
    let ctx = setup().await;
    let ulla = seed_user(&ctx, "ulla", Role::Requester).await;
    let marta = seed_user(&ctx, "marta", Role::Mechanic).await;
    let department_id = seed_department(&ctx, "Office").await;

    let a = open_ticket(&ctx, &ulla, department_id, vec![marta.id], "a").await;
    open_ticket(&ctx, &ulla, department_id, vec![marta.id], "b").await;
    ctx.tickets
        .transition(&marta, a, TicketStatus::Done, None)
        .await
        .unwrap();

    let filtered = ctx
        .dashboards
        .mechanic_dashboard(
            marta.id,
            &DashboardQuery {
                status: Some(TicketStatus::Pending),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(filtered.tickets.total, 1);
    assert_eq!(filtered.pending, 1);
    assert_eq!(filtered.done, 0);
}

#[tokio::test]
async fn explicit_sort_overrides_the_default() {
    let ctx = setup().await;
    let ulla = seed_user(&ctx, "ulla", Role::Requester).await;
    let department_id = seed_department(&ctx, "Office").await;

    let low = ctx
        .tickets
        .create_ticket(
            &ulla,
            CreateTicketRequest {
                kind: TicketKind::AdHoc,
                equipment_id: None,
                department_id: Some(department_id),
                description: "low".to_string(),
                priority: TicketPriority::Low,
                mechanic_ids: Vec::new(),
                images: Vec::new(),
            },
        )
        .await
        .unwrap()
        .id;
    let high = ctx
        .tickets
        .create_ticket(
            &ulla,
            CreateTicketRequest {
                kind: TicketKind::AdHoc,
                equipment_id: None,
                department_id: Some(department_id),
                description: "high".to_string(),
                priority: TicketPriority::High,
                mechanic_ids: Vec::new(),
                images: Vec::new(),
            },
        )
        .await
        .unwrap()
        .id;

    let page = ctx
        .dashboards
        .requester_dashboard(
            ulla.id,
            &DashboardQuery {
                sort_by: Some("priority".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let order: Vec<Uuid> = page.items.iter().map(|t| t.id).collect();
    assert_eq!(order, vec![high, low]);
}

#[tokio::test]
async fn history_overview_tracks_last_services() {
    let ctx = setup().await;
    let ulla = seed_user(&ctx, "ulla", Role::Requester).await;
    let marta = seed_user(&ctx, "marta", Role::Mechanic).await;
    let department_id = seed_department(&ctx, "Press Shop").await;
    let equipment_id = seed_equipment(&ctx, "Conveyor", "CNV-01", department_id).await;

    // One completed equipment ticket and one completed ad-hoc ticket.
    let eq_ticket = ctx
        .tickets
        .create_ticket(
            &ulla,
            CreateTicketRequest {
                kind: TicketKind::Equipment,
                equipment_id: Some(equipment_id),
                department_id: None,
                description: "belt".to_string(),
                priority: TicketPriority::High,
                mechanic_ids: vec![marta.id],
                images: Vec::new(),
            },
        )
        .await
        .unwrap()
        .id;
    let adhoc_ticket = open_ticket(&ctx, &ulla, department_id, vec![marta.id], "roof leak").await;
    ctx.tickets
        .transition(&marta, eq_ticket, TicketStatus::Done, None)
        .await
        .unwrap();
    ctx.tickets
        .transition(&marta, adhoc_ticket, TicketStatus::Done, None)
        .await
        .unwrap();

    let overview = ctx
        .dashboards
        .history_overview(Some("CNV".to_string()), None)
        .await
        .unwrap();
    assert_eq!(overview.equipment.len(), 1);
    let last = overview.equipment[0].last_service.as_ref().unwrap();
    assert_eq!(last.id, eq_ticket);

    let dep = overview
        .departments
        .iter()
        .find(|d| d.id == department_id)
        .unwrap();
    assert_eq!(
        dep.last_ad_hoc_service.as_ref().unwrap().id,
        adhoc_ticket
    );

    // The equipment-kind completion does not leak into the ad-hoc view.
    let history = ctx
        .dashboards
        .department_ad_hoc_history(department_id)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, adhoc_ticket);
}
