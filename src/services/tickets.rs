use bytes::Bytes;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::AuthUser,
    db::DbPool,
    entities::{
        department::Entity as DepartmentEntity,
        equipment::Entity as EquipmentEntity,
        ticket::{self, Entity as TicketEntity, TicketKind, TicketPriority, TicketStatus},
        ticket_assignee::{self, Entity as TicketAssigneeEntity},
        ticket_image::{self, Entity as TicketImageEntity},
        user::{self, Entity as UserEntity},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::images::{ensure_within_size_limit, ImagePostProcessor},
    storage::{keys, DynObjectStore},
};

/// One image submitted with a new ticket.
#[derive(Debug, Clone)]
pub struct NewTicketImage {
    pub filename: String,
    pub content_type: String,
    pub caption: Option<String>,
    pub bytes: Bytes,
}

#[derive(Debug, Validate)]
pub struct CreateTicketRequest {
    pub kind: TicketKind,
    pub equipment_id: Option<Uuid>,
    pub department_id: Option<Uuid>,
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,
    pub priority: TicketPriority,
    pub mechanic_ids: Vec<Uuid>,
    pub images: Vec<NewTicketImage>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TicketResponse {
    pub id: Uuid,
    pub requester_id: Uuid,
    pub kind: TicketKind,
    pub equipment_id: Option<Uuid>,
    pub department_id: Option<Uuid>,
    pub description: String,
    pub status: TicketStatus,
    pub priority: TicketPriority,
    pub created_at: chrono::DateTime<Utc>,
    pub updated_at: chrono::DateTime<Utc>,
    pub started_at: Option<chrono::DateTime<Utc>>,
    pub completed_at: Option<chrono::DateTime<Utc>>,
    pub mechanic_notes: String,
    pub version: i32,
}

impl From<ticket::Model> for TicketResponse {
    fn from(model: ticket::Model) -> Self {
        Self {
            id: model.id,
            requester_id: model.requester_id,
            kind: model.kind,
            equipment_id: model.equipment_id,
            department_id: model.department_id,
            description: model.description,
            status: model.status,
            priority: model.priority,
            created_at: model.created_at,
            updated_at: model.updated_at,
            started_at: model.started_at,
            completed_at: model.completed_at,
            mechanic_notes: model.mechanic_notes,
            version: model.version,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TicketImageResponse {
    pub id: Uuid,
    pub image_key: String,
    pub content_type: String,
    pub caption: Option<String>,
    pub uploaded_at: chrono::DateTime<Utc>,
}

impl From<ticket_image::Model> for TicketImageResponse {
    fn from(model: ticket_image::Model) -> Self {
        Self {
            id: model.id,
            image_key: model.image_key,
            content_type: model.content_type,
            caption: model.caption,
            uploaded_at: model.uploaded_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TicketDetail {
    #[serde(flatten)]
    pub ticket: TicketResponse,
    /// Department the work lands in: the ticket's own for ad-hoc work, the
    /// equipment's otherwise.
    pub department_name: String,
    pub open_duration: String,
    pub images: Vec<TicketImageResponse>,
    pub assigned_mechanic_ids: Vec<Uuid>,
}

/// Enforces the kind/target invariant: an equipment ticket references
/// equipment and no department, an ad-hoc ticket the reverse.
fn validate_kind_target(
    kind: TicketKind,
    equipment_id: Option<Uuid>,
    department_id: Option<Uuid>,
) -> Result<(), ServiceError> {
    match kind {
        TicketKind::Equipment => {
            if equipment_id.is_none() {
                return Err(ServiceError::ValidationError(
                    "An equipment ticket must reference a piece of equipment".to_string(),
                ));
            }
            if department_id.is_some() {
                return Err(ServiceError::ValidationError(
                    "An equipment ticket must not reference a department directly".to_string(),
                ));
            }
        }
        TicketKind::AdHoc => {
            if department_id.is_none() {
                return Err(ServiceError::ValidationError(
                    "An ad-hoc ticket must reference a department".to_string(),
                ));
            }
            if equipment_id.is_some() {
                return Err(ServiceError::ValidationError(
                    "An ad-hoc ticket must not reference equipment".to_string(),
                ));
            }
        }
    }
    Ok(())
}

/// Service owning the ticket lifecycle
#[derive(Clone)]
pub struct TicketService {
    db: Arc<DbPool>,
    event_sender: Option<EventSender>,
    store: DynObjectStore,
    post_processor: ImagePostProcessor,
    max_image_bytes: usize,
    processing_timeout: Duration,
}

impl TicketService {
    pub fn new(
        db: Arc<DbPool>,
        event_sender: Option<EventSender>,
        store: DynObjectStore,
        post_processor: ImagePostProcessor,
        max_image_bytes: usize,
        processing_timeout: Duration,
    ) -> Self {
        Self {
            db,
            event_sender,
            store,
            post_processor,
            max_image_bytes,
            processing_timeout,
        }
    }

    /// Creates a ticket with its assignments and attached images. Image
    /// payloads are size-checked before anything is written.
    #[instrument(skip(self, request), fields(requester_id = %requester.id, kind = ?request.kind))]
    pub async fn create_ticket(
        &self,
        requester: &AuthUser,
        request: CreateTicketRequest,
    ) -> Result<TicketResponse, ServiceError> {
        request.validate()?;
        validate_kind_target(request.kind, request.equipment_id, request.department_id)?;

        for img in &request.images {
            ensure_within_size_limit(img.bytes.len(), self.max_image_bytes)?;
        }

        if let Some(equipment_id) = request.equipment_id {
            EquipmentEntity::find_by_id(equipment_id)
                .one(&*self.db)
                .await?
                .ok_or_else(|| {
                    ServiceError::ValidationError(format!(
                        "Equipment {} does not exist",
                        equipment_id
                    ))
                })?;
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
        }

        if !request.mechanic_ids.is_empty() {
            let mechanics = UserEntity::find()
                .filter(user::Column::Id.is_in(request.mechanic_ids.clone()))
                .all(&*self.db)
                .await?;
            if mechanics.len() != request.mechanic_ids.len() {
                return Err(ServiceError::ValidationError(
                    "One or more assigned mechanics do not exist".to_string(),
                ));
            }
            if mechanics.iter().any(|m| !m.role.is_maintenance()) {
                return Err(ServiceError::ValidationError(
                    "Tickets can only be assigned to mechanics".to_string(),
                ));
            }
        }

        let now = Utc::now();
        let ticket_id = Uuid::new_v4();

        // Objects are written before the rows so a database failure cannot
        // leave rows pointing at missing blobs.
        let mut stored: Vec<(String, &NewTicketImage)> = Vec::with_capacity(request.images.len());
        for img in &request.images {
            let key = keys::ticket_image_key(ticket_id, &img.filename);
            self.store.write(&key, &img.bytes).await?;
            stored.push((key, img));
        }

        let txn = match self.db.begin().await {
            Ok(txn) => txn,
            Err(e) => {
                self.cleanup_objects(&stored).await;
                return Err(ServiceError::DatabaseError(e));
            }
        };

        let insert_result: Result<ticket::Model, ServiceError> = async {
            let created = ticket::ActiveModel {
                id: Set(ticket_id),
                requester_id: Set(requester.id),
                kind: Set(request.kind),
                equipment_id: Set(request.equipment_id),
                department_id: Set(request.department_id),
                description: Set(request.description.clone()),
                status: Set(TicketStatus::Pending),
                priority: Set(request.priority),
                created_at: Set(now),
                updated_at: Set(now),
                started_at: Set(None),
                completed_at: Set(None),
                mechanic_notes: Set(String::new()),
                version: Set(1),
            }
            .insert(&txn)
            .await?;

            if !request.mechanic_ids.is_empty() {
                let rows = request.mechanic_ids.iter().map(|user_id| {
                    ticket_assignee::ActiveModel {
                        ticket_id: Set(ticket_id),
                        user_id: Set(*user_id),
                    }
                });
                TicketAssigneeEntity::insert_many(rows).exec(&txn).await?;
            }

            for (key, img) in &stored {
                ticket_image::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    ticket_id: Set(ticket_id),
                    image_key: Set(key.clone()),
                    content_type: Set(img.content_type.clone()),
                    caption: Set(img.caption.clone()),
                    uploaded_at: Set(now),
                }
                .insert(&txn)
                .await?;
            }

            Ok(created)
        }
        .await;

        let created = match insert_result {
            Ok(created) => created,
            Err(e) => {
                self.cleanup_objects(&stored).await;
                return Err(e);
            }
        };

        if let Err(e) = txn.commit().await {
            self.cleanup_objects(&stored).await;
            return Err(ServiceError::DatabaseError(e));
        }

        info!(ticket_id = %ticket_id, images = stored.len(), "Ticket created");
        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender.send(Event::TicketCreated(ticket_id)).await {
                warn!(error = %e, "Failed to send ticket created event");
            }
        }

        Ok(created.into())
    }

    async fn cleanup_objects(&self, stored: &[(String, &NewTicketImage)]) {
        for (key, _) in stored {
            if let Err(e) = self.store.delete(key).await {
                warn!(key = %key, error = %e, "Failed to clean up orphaned object");
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn get_ticket(&self, id: Uuid) -> Result<ticket::Model, ServiceError> {
        TicketEntity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Ticket {} not found", id)))
    }

    pub async fn assigned_mechanic_ids(&self, ticket_id: Uuid) -> Result<Vec<Uuid>, ServiceError> {
        Ok(TicketAssigneeEntity::find()
            .filter(ticket_assignee::Column::TicketId.eq(ticket_id))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|row| row.user_id)
            .collect())
    }

    pub async fn images_of(
        &self,
        ticket_id: Uuid,
    ) -> Result<Vec<ticket_image::Model>, ServiceError> {
        Ok(TicketImageEntity::find()
            .filter(ticket_image::Column::TicketId.eq(ticket_id))
            .order_by_asc(ticket_image::Column::UploadedAt)
            .all(&*self.db)
            .await?)
    }

    /// Full ticket view with images, assignments and the resolved
    /// department name.
    #[instrument(skip(self))]
    pub async fn get_ticket_detail(&self, id: Uuid) -> Result<TicketDetail, ServiceError> {
        let ticket = self.get_ticket(id).await?;
        let images = self.images_of(id).await?;
        let assigned = self.assigned_mechanic_ids(id).await?;

        let department_name = match ticket.kind {
            TicketKind::AdHoc => match ticket.department_id {
                Some(department_id) => DepartmentEntity::find_by_id(department_id)
                    .one(&*self.db)
                    .await?
                    .map(|d| d.name),
                None => None,
            },
            TicketKind::Equipment => match ticket.equipment_id {
                Some(equipment_id) => {
                    match EquipmentEntity::find_by_id(equipment_id).one(&*self.db).await? {
                        Some(eq) => DepartmentEntity::find_by_id(eq.department_id)
                            .one(&*self.db)
                            .await?
                            .map(|d| d.name),
                        None => None,
                    }
                }
                None => None,
            },
        };

        let now = Utc::now();
        Ok(TicketDetail {
            open_duration: ticket.open_duration_display(now),
            department_name: department_name.unwrap_or_else(|| "N/A".to_string()),
            ticket: ticket.into(),
            images: images.into_iter().map(Into::into).collect(),
            assigned_mechanic_ids: assigned,
        })
    }

    /// Moves a ticket to `target`. Only a mechanic assigned to the ticket
    /// may do this; `done` is terminal; started/completed timestamps are set
    /// exactly once. The update is version-checked so two racing requests
    /// cannot both pass the terminal guard.
    #[instrument(skip(self, actor, notes), fields(actor_id = %actor.id, ticket_id = %ticket_id, target = target.as_str()))]
    pub async fn transition(
        &self,
        actor: &AuthUser,
        ticket_id: Uuid,
        target: TicketStatus,
        notes: Option<String>,
    ) -> Result<TicketResponse, ServiceError> {
        if !actor.is_maintenance() {
            return Err(ServiceError::Forbidden(
                "Only mechanics may update ticket status".to_string(),
            ));
        }

        let txn = self.db.begin().await?;

        let ticket = TicketEntity::find_by_id(ticket_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Ticket {} not found", ticket_id)))?;

        let assigned = TicketAssigneeEntity::find()
            .filter(ticket_assignee::Column::TicketId.eq(ticket_id))
            .filter(ticket_assignee::Column::UserId.eq(actor.id))
            .one(&txn)
            .await?
            .is_some();
        if !assigned {
            return Err(ServiceError::Forbidden(
                "Only a mechanic assigned to this ticket may update it".to_string(),
            ));
        }

        if ticket.status == TicketStatus::Done {
            return Err(ServiceError::InvalidTransition(format!(
                "Ticket {} is done and can no longer change",
                ticket_id
            )));
        }

        let old_status = ticket.status;
        let now = Utc::now();

        let mut update = TicketEntity::update_many()
            .col_expr(ticket::Column::Status, Expr::value(target))
            .col_expr(ticket::Column::UpdatedAt, Expr::value(now))
            .col_expr(ticket::Column::Version, Expr::value(ticket.version + 1));

        if target == TicketStatus::InProgress && ticket.started_at.is_none() {
            update = update.col_expr(ticket::Column::StartedAt, Expr::value(Some(now)));
        }
        if target == TicketStatus::Done && ticket.completed_at.is_none() {
            update = update.col_expr(ticket::Column::CompletedAt, Expr::value(Some(now)));
        }
        if let Some(notes) = notes.as_deref().filter(|n| !n.trim().is_empty()) {
            update = update.col_expr(
                ticket::Column::MechanicNotes,
                Expr::value(notes.to_string()),
            );
        }

        let result = update
            .filter(ticket::Column::Id.eq(ticket_id))
            .filter(ticket::Column::Version.eq(ticket.version))
            .exec(&txn)
            .await?;

        if result.rows_affected == 0 {
            // Somebody else won the race; nothing was written.
            return Err(ServiceError::ConcurrentModification(ticket_id));
        }

        let updated = TicketEntity::find_by_id(ticket_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Ticket {} not found", ticket_id)))?;

        txn.commit().await?;

        info!(
            ticket_id = %ticket_id,
            old_status = old_status.as_str(),
            new_status = target.as_str(),
            "Ticket status updated"
        );
        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender
                .send(Event::TicketStatusChanged {
                    ticket_id,
                    old_status,
                    new_status: target,
                })
                .await
            {
                warn!(error = %e, "Failed to send status changed event");
            }
        }

        if updated.status == TicketStatus::Done {
            if let Some(sender) = &self.event_sender {
                if let Err(e) = sender.send(Event::TicketCompleted(ticket_id)).await {
                    warn!(error = %e, "Failed to send ticket completed event");
                }
            }
            self.run_completion_hook(ticket_id).await;
        }

        Ok(updated.into())
    }

    /// Post-completion hook: convert attached images. Failures and timeouts
    /// are logged, never surfaced; the completed transition stands either
    /// way, and the processor is idempotent so deferred work can be retried.
    async fn run_completion_hook(&self, ticket_id: Uuid) {
        match tokio::time::timeout(
            self.processing_timeout,
            self.post_processor.process_completed_ticket(ticket_id),
        )
        .await
        {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                error!(ticket_id = %ticket_id, error = %e, "Image post-processing failed");
            }
            Err(_) => {
                warn!(
                    ticket_id = %ticket_id,
                    "Image post-processing timed out, remaining conversions deferred"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equipment_kind_requires_equipment_reference() {
        let err = validate_kind_target(TicketKind::Equipment, None, None).unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));

        let err =
            validate_kind_target(TicketKind::Equipment, Some(Uuid::new_v4()), Some(Uuid::new_v4()))
                .unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));

        assert!(validate_kind_target(TicketKind::Equipment, Some(Uuid::new_v4()), None).is_ok());
    }

    #[test]
    fn ad_hoc_kind_requires_department_reference() {
        let err = validate_kind_target(TicketKind::AdHoc, None, None).unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));

        let err = validate_kind_target(TicketKind::AdHoc, Some(Uuid::new_v4()), Some(Uuid::new_v4()))
            .unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));

        assert!(validate_kind_target(TicketKind::AdHoc, None, Some(Uuid::new_v4())).is_ok());
    }
}
