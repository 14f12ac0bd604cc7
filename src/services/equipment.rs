use bytes::Bytes;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
    Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::DbPool,
    entities::{
        department::Entity as DepartmentEntity,
        equipment::{self, Entity as EquipmentEntity},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::images::ensure_within_size_limit,
    storage::{keys, DynObjectStore},
};

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateEquipmentRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"))]
    pub name: String,
    #[validate(length(min = 1, max = 50, message = "Code must be between 1 and 50 characters"))]
    pub code: String,
    #[serde(default)]
    pub description: String,
    pub department_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateEquipmentRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub department_id: Option<Uuid>,
}

/// Catalog search parameters for the history overview and catalog screens.
#[derive(Debug, Default, Clone)]
pub struct EquipmentFilter {
    /// Substring match against name or code.
    pub search: Option<String>,
    pub department_id: Option<Uuid>,
    pub limit: Option<u64>,
}

/// Service for managing the equipment catalog
#[derive(Clone)]
pub struct EquipmentService {
    db: Arc<DbPool>,
    event_sender: Option<EventSender>,
    store: DynObjectStore,
    max_image_bytes: usize,
}

impl EquipmentService {
    pub fn new(
        db: Arc<DbPool>,
        event_sender: Option<EventSender>,
        store: DynObjectStore,
        max_image_bytes: usize,
    ) -> Self {
        Self {
            db,
            event_sender,
            store,
            max_image_bytes,
        }
    }

    #[instrument(skip(self, request), fields(code = %request.code))]
    pub async fn create(
        &self,
        request: CreateEquipmentRequest,
    ) -> Result<equipment::Model, ServiceError> {
        request.validate()?;

        DepartmentEntity::find_by_id(request.department_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::ValidationError(format!(
                    "Department {} does not exist",
                    request.department_id
                ))
            })?;

        let code_taken = EquipmentEntity::find()
            .filter(equipment::Column::Code.eq(request.code.clone()))
            .one(&*self.db)
            .await?
            .is_some();
        if code_taken {
            return Err(ServiceError::ValidationError(format!(
                "Equipment code '{}' is already in use",
                request.code
            )));
        }

        let model = equipment::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name),
            code: Set(request.code),
            description: Set(request.description),
            image_key: Set(None),
            department_id: Set(request.department_id),
            created_at: Set(Utc::now()),
        };

        let created = model.insert(&*self.db).await?;
        info!(equipment_id = %created.id, "Equipment created");
        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender.send(Event::EquipmentCreated(created.id)).await {
                warn!(error = %e, "Failed to send equipment created event");
            }
        }
        Ok(created)
    }

    /// Equipment matching the filter, ordered by name.
    #[instrument(skip(self))]
    pub async fn list(&self, filter: EquipmentFilter) -> Result<Vec<equipment::Model>, ServiceError> {
        let mut query = EquipmentEntity::find().order_by_asc(equipment::Column::Name);

        if let Some(q) = filter.search.as_deref().filter(|q| !q.is_empty()) {
            query = query.filter(
                Condition::any()
                    .add(equipment::Column::Name.contains(q))
                    .add(equipment::Column::Code.contains(q)),
            );
        }
        if let Some(department_id) = filter.department_id {
            query = query.filter(equipment::Column::DepartmentId.eq(department_id));
        }
        if let Some(limit) = filter.limit {
            query = query.limit(limit);
        }

        Ok(query.all(&*self.db).await?)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<equipment::Model, ServiceError> {
        EquipmentEntity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Equipment {} not found", id)))
    }

    /// Equipment belonging to one department, for the department picker.
    #[instrument(skip(self))]
    pub async fn by_department(
        &self,
        department_id: Uuid,
    ) -> Result<Vec<equipment::Model>, ServiceError> {
        Ok(EquipmentEntity::find()
            .filter(equipment::Column::DepartmentId.eq(department_id))
            .order_by_asc(equipment::Column::Name)
            .all(&*self.db)
            .await?)
    }

    #[instrument(skip(self, request))]
    pub async fn update(
        &self,
        id: Uuid,
        request: UpdateEquipmentRequest,
    ) -> Result<equipment::Model, ServiceError> {
        request.validate()?;

        let existing = self.get(id).await?;
        let mut active: equipment::ActiveModel = existing.into();
        if let Some(name) = request.name {
            active.name = Set(name);
        }
        if let Some(description) = request.description {
            active.description = Set(description);
        }
        if let Some(department_id) = request.department_id {
            DepartmentEntity::find_by_id(department_id)
                .one(&*self.db)
                .await?
                .ok_or_else(|| {
                    ServiceError::ValidationError(format!(
                        "Department {} does not exist",
                        department_id
                    ))
                })?;
            active.department_id = Set(department_id);
        }

        let updated = active.update(&*self.db).await?;
        info!(equipment_id = %id, "Equipment updated");
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let existing = self.get(id).await?;
        EquipmentEntity::delete_by_id(existing.id).exec(&*self.db).await?;

        if let Some(key) = existing.image_key {
            if let Err(e) = self.store.delete(&key).await {
                warn!(key = %key, error = %e, "Failed to delete equipment image object");
            }
        }

        info!(equipment_id = %id, "Equipment deleted");
        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender.send(Event::EquipmentDeleted(id)).await {
                warn!(error = %e, "Failed to send equipment deleted event");
            }
        }
        Ok(())
    }

    /// Attaches a catalog photo, replacing any previous one. The payload is
    /// size-checked before anything is written.
    #[instrument(skip(self, bytes), fields(equipment_id = %id, size = bytes.len()))]
    pub async fn upload_image(
        &self,
        id: Uuid,
        original_filename: &str,
        bytes: Bytes,
    ) -> Result<equipment::Model, ServiceError> {
        ensure_within_size_limit(bytes.len(), self.max_image_bytes)?;

        let existing = self.get(id).await?;
        let new_key = keys::equipment_image_key(&existing.code, original_filename);
        self.store.write(&new_key, &bytes).await?;

        let old_key = existing.image_key.clone();
        let mut active: equipment::ActiveModel = existing.into();
        active.image_key = Set(Some(new_key.clone()));
        let updated = match active.update(&*self.db).await {
            Ok(updated) => updated,
            Err(e) => {
                if let Err(cleanup) = self.store.delete(&new_key).await {
                    warn!(key = %new_key, error = %cleanup, "Failed to clean up orphaned object");
                }
                return Err(ServiceError::DatabaseError(e));
            }
        };

        // Old object goes away only after the new one is in place.
        if let Some(old) = old_key {
            if let Err(e) = self.store.delete(&old).await {
                warn!(key = %old, error = %e, "Failed to delete replaced equipment image");
            }
        }

        info!(equipment_id = %updated.id, key = %new_key, "Equipment image stored");
        Ok(updated)
    }
}
