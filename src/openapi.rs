use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Upkeep API",
        description = "Maintenance ticketing: catalogs, ticket lifecycle, dashboards and history"
    ),
    paths(
        crate::handlers::auth::login,
        crate::handlers::auth::logout,
        crate::handlers::auth::me,
        crate::handlers::users::create_user,
        crate::handlers::users::list_mechanics,
        crate::handlers::departments::list_departments,
        crate::handlers::departments::create_department,
        crate::handlers::departments::get_department,
        crate::handlers::departments::update_department,
        crate::handlers::departments::delete_department,
        crate::handlers::departments::equipment_by_department,
        crate::handlers::equipment::list_equipment,
        crate::handlers::equipment::create_equipment,
        crate::handlers::equipment::get_equipment,
        crate::handlers::equipment::update_equipment,
        crate::handlers::equipment::delete_equipment,
        crate::handlers::equipment::upload_equipment_image,
        crate::handlers::tickets::create_ticket,
        crate::handlers::tickets::get_ticket,
        crate::handlers::tickets::update_status,
        crate::handlers::dashboards::requester_dashboard,
        crate::handlers::dashboards::mechanic_dashboard,
        crate::handlers::dashboards::history_overview,
        crate::handlers::dashboards::equipment_history,
        crate::handlers::dashboards::department_history,
    ),
    components(schemas(
        crate::errors::ErrorResponse,
        crate::entities::user::Role,
        crate::entities::ticket::TicketStatus,
        crate::entities::ticket::TicketKind,
        crate::entities::ticket::TicketPriority,
        crate::handlers::auth::LoginRequest,
        crate::handlers::auth::LoginResponse,
        crate::handlers::departments::EquipmentSummary,
        crate::handlers::tickets::UpdateStatusRequest,
        crate::services::users::CreateUserRequest,
        crate::services::users::UserResponse,
        crate::services::departments::CreateDepartmentRequest,
        crate::services::departments::UpdateDepartmentRequest,
        crate::services::equipment::CreateEquipmentRequest,
        crate::services::equipment::UpdateEquipmentRequest,
        crate::services::tickets::TicketResponse,
        crate::services::tickets::TicketImageResponse,
        crate::services::tickets::TicketDetail,
        crate::services::dashboards::TicketPage,
        crate::services::dashboards::MechanicDashboard,
        crate::services::dashboards::EquipmentLastService,
        crate::services::dashboards::DepartmentLastService,
        crate::services::dashboards::HistoryOverview,
    )),
    tags(
        (name = "auth", description = "Authentication"),
        (name = "users", description = "Account management"),
        (name = "departments", description = "Department catalog"),
        (name = "equipment", description = "Equipment catalog"),
        (name = "tickets", description = "Ticket lifecycle"),
        (name = "dashboards", description = "Role dashboards"),
        (name = "history", description = "Service history")
    )
)]
pub struct ApiDoc;
