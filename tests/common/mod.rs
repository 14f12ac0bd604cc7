//! Shared fixtures: an in-memory SQLite database with the real migrations
//! applied, services wired to an in-memory object store, and seed helpers.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use uuid::Uuid;

use upkeep_api::{
    auth::AuthUser,
    entities::user::Role,
    migrator::Migrator,
    services::dashboards::DashboardService,
    services::departments::{CreateDepartmentRequest, DepartmentService},
    services::equipment::{CreateEquipmentRequest, EquipmentService},
    services::images::ImagePostProcessor,
    services::tickets::TicketService,
    services::users::{CreateUserRequest, UserService},
    storage::{DynObjectStore, InMemoryObjectStore},
};

pub const MAX_IMAGE_BYTES: usize = 2 * 1024 * 1024;

pub struct TestCtx {
    pub db: Arc<DatabaseConnection>,
    pub objects: Arc<InMemoryObjectStore>,
    pub users: UserService,
    pub departments: DepartmentService,
    pub equipment: EquipmentService,
    pub tickets: TicketService,
    pub dashboards: DashboardService,
    pub processor: ImagePostProcessor,
}

pub async fn setup() -> TestCtx {
    // A single connection: every pooled connection to `sqlite::memory:`
    // would otherwise get its own empty database.
    let mut options = ConnectOptions::new("sqlite::memory:".to_owned());
    options.max_connections(1).sqlx_logging(false);
    let db = Arc::new(
        Database::connect(options)
            .await
            .expect("sqlite in-memory connection"),
    );
    Migrator::up(&*db, None).await.expect("migrations apply");

    let objects = Arc::new(InMemoryObjectStore::new());
    let store: DynObjectStore = objects.clone();

    let processor = ImagePostProcessor::new(db.clone(), store.clone(), None);
    let tickets = TicketService::new(
        db.clone(),
        None,
        store.clone(),
        processor.clone(),
        MAX_IMAGE_BYTES,
        Duration::from_secs(30),
    );

    TestCtx {
        users: UserService::new(db.clone(), None),
        departments: DepartmentService::new(db.clone(), None),
        equipment: EquipmentService::new(db.clone(), None, store, MAX_IMAGE_BYTES),
        dashboards: DashboardService::new(db.clone()),
        processor,
        tickets,
        objects,
        db,
    }
}

pub async fn seed_user(ctx: &TestCtx, username: &str, role: Role) -> AuthUser {
    let model = ctx
        .users
        .create_user(CreateUserRequest {
            username: username.to_string(),
            password: "correct horse battery".to_string(),
            display_name: username.to_string(),
            role,
            phone: None,
        })
        .await
        .expect("user created");
    AuthUser {
        id: model.id,
        username: model.username,
        role: model.role,
    }
}

pub async fn seed_department(ctx: &TestCtx, name: &str) -> Uuid {
    ctx.departments
        .create(CreateDepartmentRequest {
            name: name.to_string(),
            description: String::new(),
        })
        .await
        .expect("department created")
        .id
}

pub async fn seed_equipment(ctx: &TestCtx, name: &str, code: &str, department_id: Uuid) -> Uuid {
    ctx.equipment
        .create(CreateEquipmentRequest {
            name: name.to_string(),
            code: code.to_string(),
            description: String::new(),
            department_id,
        })
        .await
        .expect("equipment created")
        .id
}

/// Encodes a solid PNG of the given dimensions.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::DynamicImage::ImageRgb8(image::RgbImage::new(width, height));
    let mut buf = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
        .expect("png encode");
    buf
}
