use chrono::Utc;
use sea_orm::{ActiveModelTrait, EntityTrait, QueryOrder, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::DbPool,
    entities::department::{self, Entity as DepartmentEntity},
    errors::ServiceError,
    events::{Event, EventSender},
};

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateDepartmentRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"))]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateDepartmentRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"))]
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Service for managing the department catalog
#[derive(Clone)]
pub struct DepartmentService {
    db: Arc<DbPool>,
    event_sender: Option<EventSender>,
}

impl DepartmentService {
    pub fn new(db: Arc<DbPool>, event_sender: Option<EventSender>) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create(
        &self,
        request: CreateDepartmentRequest,
    ) -> Result<department::Model, ServiceError> {
        request.validate()?;

        let model = department::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name),
            description: Set(request.description),
            created_at: Set(Utc::now()),
        };

        let created = model.insert(&*self.db).await.map_err(|e| {
            error!(error = %e, "Failed to create department");
            ServiceError::DatabaseError(e)
        })?;

        info!(department_id = %created.id, "Department created");
        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender.send(Event::DepartmentCreated(created.id)).await {
                warn!(error = %e, "Failed to send department created event");
            }
        }

        Ok(created)
    }

    /// All departments, ordered by name.
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<department::Model>, ServiceError> {
        Ok(DepartmentEntity::find()
            .order_by_asc(department::Column::Name)
            .all(&*self.db)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<department::Model, ServiceError> {
        DepartmentEntity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Department {} not found", id)))
    }

    #[instrument(skip(self, request))]
    pub async fn update(
        &self,
        id: Uuid,
        request: UpdateDepartmentRequest,
    ) -> Result<department::Model, ServiceError> {
        request.validate()?;

        let existing = self.get(id).await?;
        let mut active: department::ActiveModel = existing.into();
        if let Some(name) = request.name {
            active.name = Set(name);
        }
        if let Some(description) = request.description {
            active.description = Set(description);
        }

        let updated = active.update(&*self.db).await?;
        info!(department_id = %id, "Department updated");
        Ok(updated)
    }

    /// Deletes a department. Its equipment cascades away with it.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;
        let existing = DepartmentEntity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Department {} not found", id)))?;

        DepartmentEntity::delete_by_id(existing.id).exec(&txn).await?;
        txn.commit().await?;

        info!(department_id = %id, "Department deleted");
        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender.send(Event::DepartmentDeleted(id)).await {
                warn!(error = %e, "Failed to send department deleted event");
            }
        }
        Ok(())
    }
}
