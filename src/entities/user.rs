use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "user_role")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[sea_orm(string_value = "requester")]
    Requester,
    #[sea_orm(string_value = "mechanic")]
    Mechanic,
    #[sea_orm(string_value = "mechanic_admin")]
    MechanicAdmin,
}

impl Role {
    /// True for any mechanic variant.
    pub fn is_maintenance(&self) -> bool {
        matches!(self, Role::Mechanic | Role::MechanicAdmin)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Requester => "requester",
            Role::Mechanic => "mechanic",
            Role::MechanicAdmin => "mechanic_admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "requester" => Some(Role::Requester),
            "mechanic" => Some(Role::Mechanic),
            "mechanic_admin" => Some(Role::MechanicAdmin),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub display_name: String,
    pub role: Role,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::ticket::Entity")]
    Tickets,
}

impl Related<super::ticket::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tickets.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
