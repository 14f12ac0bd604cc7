pub mod auth;
pub mod dashboards;
pub mod departments;
pub mod equipment;
pub mod tickets;
pub mod users;

use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::services::images::ImagePostProcessor;
use crate::storage::DynObjectStore;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub departments: Arc<crate::services::departments::DepartmentService>,
    pub equipment: Arc<crate::services::equipment::EquipmentService>,
    pub users: Arc<crate::services::users::UserService>,
    pub tickets: Arc<crate::services::tickets::TicketService>,
    pub dashboards: Arc<crate::services::dashboards::DashboardService>,
}

impl AppServices {
    pub fn new(
        db: Arc<DbPool>,
        event_sender: EventSender,
        store: DynObjectStore,
        config: &AppConfig,
    ) -> Self {
        let post_processor = ImagePostProcessor::new(
            db.clone(),
            store.clone(),
            Some(event_sender.clone()),
        );

        let departments = Arc::new(crate::services::departments::DepartmentService::new(
            db.clone(),
            Some(event_sender.clone()),
        ));
        let equipment = Arc::new(crate::services::equipment::EquipmentService::new(
            db.clone(),
            Some(event_sender.clone()),
            store.clone(),
            config.max_image_bytes,
        ));
        let users = Arc::new(crate::services::users::UserService::new(
            db.clone(),
            Some(event_sender.clone()),
        ));
        let tickets = Arc::new(crate::services::tickets::TicketService::new(
            db.clone(),
            Some(event_sender),
            store,
            post_processor,
            config.max_image_bytes,
            Duration::from_secs(config.image_processing_timeout_secs),
        ));
        let dashboards = Arc::new(crate::services::dashboards::DashboardService::new(db));

        Self {
            departments,
            equipment,
            users,
            tickets,
            dashboards,
        }
    }
}
