use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::hash_password,
    db::DbPool,
    entities::user::{self, Entity as UserEntity, Role},
    errors::ServiceError,
    events::{Event, EventSender},
};

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateUserRequest {
    #[validate(length(min = 1, max = 150, message = "Username must be between 1 and 150 characters"))]
    pub username: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(length(min = 1, max = 150))]
    pub display_name: String,
    pub role: Role,
    #[validate(length(max = 15, message = "Phone must be at most 15 characters"))]
    pub phone: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub display_name: String,
    pub role: Role,
    pub phone: Option<String>,
}

impl From<user::Model> for UserResponse {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            display_name: model.display_name,
            role: model.role,
            phone: model.phone,
        }
    }
}

/// Service for account management
#[derive(Clone)]
pub struct UserService {
    db: Arc<DbPool>,
    event_sender: Option<EventSender>,
}

impl UserService {
    pub fn new(db: Arc<DbPool>, event_sender: Option<EventSender>) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self, request), fields(username = %request.username))]
    pub async fn create_user(
        &self,
        request: CreateUserRequest,
    ) -> Result<user::Model, ServiceError> {
        request.validate()?;

        let taken = UserEntity::find()
            .filter(user::Column::Username.eq(request.username.clone()))
            .one(&*self.db)
            .await?
            .is_some();
        if taken {
            return Err(ServiceError::ValidationError(format!(
                "Username '{}' is already taken",
                request.username
            )));
        }

        let model = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            username: Set(request.username),
            password_hash: Set(hash_password(&request.password)?),
            display_name: Set(request.display_name),
            role: Set(request.role),
            phone: Set(request.phone),
            created_at: Set(Utc::now()),
        };

        let created = model.insert(&*self.db).await?;
        info!(user_id = %created.id, role = created.role.as_str(), "User created");
        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender.send(Event::UserCreated(created.id)).await {
                warn!(error = %e, "Failed to send user created event");
            }
        }
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<user::Model, ServiceError> {
        UserEntity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", id)))
    }

    /// Mechanics available for ticket assignment.
    #[instrument(skip(self))]
    pub async fn list_mechanics(&self) -> Result<Vec<user::Model>, ServiceError> {
        Ok(UserEntity::find()
            .filter(user::Column::Role.is_in([Role::Mechanic, Role::MechanicAdmin]))
            .order_by_asc(user::Column::Username)
            .all(&*self.db)
            .await?)
    }
}
