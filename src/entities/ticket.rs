use chrono::{DateTime, Duration, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "ticket_status")]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "in_progress")]
    InProgress,
    #[sea_orm(string_value = "done")]
    Done,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Pending => "pending",
            TicketStatus::InProgress => "in_progress",
            TicketStatus::Done => "done",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(TicketStatus::Pending),
            "in_progress" => Some(TicketStatus::InProgress),
            "done" => Some(TicketStatus::Done),
            _ => None,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "ticket_kind")]
#[serde(rename_all = "snake_case")]
pub enum TicketKind {
    /// Maintenance on a specific piece of equipment.
    #[sea_orm(string_value = "equipment")]
    Equipment,
    /// Facility work tied to a department rather than an asset.
    #[sea_orm(string_value = "ad_hoc")]
    AdHoc,
}

impl TicketKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "equipment" => Some(TicketKind::Equipment),
            "ad_hoc" => Some(TicketKind::AdHoc),
            _ => None,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "i32", db_type = "Integer")]
#[serde(rename_all = "snake_case")]
pub enum TicketPriority {
    #[sea_orm(num_value = 1)]
    High,
    #[sea_orm(num_value = 2)]
    Medium,
    #[sea_orm(num_value = 3)]
    Low,
}

impl TicketPriority {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "high" => Some(TicketPriority::High),
            "medium" => Some(TicketPriority::Medium),
            "low" => Some(TicketPriority::Low),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, Validate)]
#[sea_orm(table_name = "tickets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub requester_id: Uuid,
    pub kind: TicketKind,
    /// Set exactly when kind = equipment.
    pub equipment_id: Option<Uuid>,
    /// Set exactly when kind = ad_hoc.
    pub department_id: Option<Uuid>,
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,
    pub status: TicketStatus,
    pub priority: TicketPriority,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub mechanic_notes: String,
    /// Optimistic-lock counter, bumped on every write.
    pub version: i32,
}

impl Model {
    pub fn is_done(&self) -> bool {
        self.status == TicketStatus::Done
    }

    /// Time the ticket has been (or was) open.
    pub fn open_duration(&self, now: DateTime<Utc>) -> Duration {
        self.completed_at.unwrap_or(now) - self.created_at
    }

    /// Human form of the open duration: "2d 3h", "4h 12min" or "37min".
    pub fn open_duration_display(&self, now: DateTime<Utc>) -> String {
        let delta = self.open_duration(now);
        let total_minutes = delta.num_minutes().max(0);
        let hours = total_minutes / 60;
        let minutes = total_minutes % 60;
        let days = hours / 24;
        let rem_hours = hours % 24;

        if days > 0 {
            format!("{}d {}h", days, rem_hours)
        } else if hours > 0 {
            format!("{}h {}min", hours, minutes)
        } else {
            format!("{}min", minutes)
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::RequesterId",
        to = "super::user::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Requester,
    #[sea_orm(
        belongs_to = "super::equipment::Entity",
        from = "Column::EquipmentId",
        to = "super::equipment::Column::Id",
        on_update = "NoAction",
        on_delete = "SetNull"
    )]
    Equipment,
    #[sea_orm(
        belongs_to = "super::department::Entity",
        from = "Column::DepartmentId",
        to = "super::department::Column::Id",
        on_update = "NoAction",
        on_delete = "SetNull"
    )]
    Department,
    #[sea_orm(has_many = "super::ticket_image::Entity")]
    Images,
    #[sea_orm(has_many = "super::ticket_assignee::Entity")]
    Assignees,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Requester.def()
    }
}

impl Related<super::equipment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Equipment.def()
    }
}

impl Related<super::department::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Department.def()
    }
}

impl Related<super::ticket_image::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Images.def()
    }
}

impl Related<super::ticket_assignee::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Assignees.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticket_at(created: DateTime<Utc>, completed: Option<DateTime<Utc>>) -> Model {
        Model {
            id: Uuid::new_v4(),
            requester_id: Uuid::new_v4(),
            kind: TicketKind::AdHoc,
            equipment_id: None,
            department_id: Some(Uuid::new_v4()),
            description: "leaking pipe".into(),
            status: TicketStatus::Pending,
            priority: TicketPriority::Medium,
            created_at: created,
            updated_at: created,
            started_at: None,
            completed_at: completed,
            mechanic_notes: String::new(),
            version: 1,
        }
    }

    #[test]
    fn open_duration_display_buckets() {
        let created = Utc::now();

        let t = ticket_at(created, Some(created + Duration::minutes(37)));
        assert_eq!(t.open_duration_display(created), "37min");

        let t = ticket_at(created, Some(created + Duration::minutes(4 * 60 + 12)));
        assert_eq!(t.open_duration_display(created), "4h 12min");

        let t = ticket_at(created, Some(created + Duration::hours(2 * 24 + 3)));
        assert_eq!(t.open_duration_display(created), "2d 3h");
    }

    #[test]
    fn open_duration_uses_now_when_not_completed() {
        let created = Utc::now() - Duration::minutes(10);
        let t = ticket_at(created, None);
        let now = Utc::now();
        assert!(t.open_duration(now) >= Duration::minutes(10));
    }

    #[test]
    fn status_parse_round_trip() {
        for s in [
            TicketStatus::Pending,
            TicketStatus::InProgress,
            TicketStatus::Done,
        ] {
            assert_eq!(TicketStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(TicketStatus::parse("cancelled"), None);
    }
}
