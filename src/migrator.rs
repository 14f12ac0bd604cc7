use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_users_table::Migration),
            Box::new(m20240101_000002_create_departments_table::Migration),
            Box::new(m20240101_000003_create_equipment_table::Migration),
            Box::new(m20240101_000004_create_tickets_table::Migration),
            Box::new(m20240101_000005_create_ticket_assignees_table::Migration),
            Box::new(m20240101_000006_create_ticket_images_table::Migration),
        ]
    }
}

// Migration implementations

mod m20240101_000001_create_users_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_users_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Users::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Users::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Users::Username)
                                .string_len(150)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Users::PasswordHash).string().not_null())
                        .col(ColumnDef::new(Users::DisplayName).string_len(150).not_null())
                        .col(ColumnDef::new(Users::Role).string_len(20).not_null())
                        .col(ColumnDef::new(Users::Phone).string_len(15).null())
                        .col(
                            ColumnDef::new(Users::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Users::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum Users {
        Table,
        Id,
        Username,
        PasswordHash,
        DisplayName,
        Role,
        Phone,
        CreatedAt,
    }
}

mod m20240101_000002_create_departments_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_departments_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Departments::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Departments::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Departments::Name).string_len(100).not_null())
                        .col(
                            ColumnDef::new(Departments::Description)
                                .text()
                                .not_null()
                                .default(""),
                        )
                        .col(
                            ColumnDef::new(Departments::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Departments::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum Departments {
        Table,
        Id,
        Name,
        Description,
        CreatedAt,
    }
}

mod m20240101_000003_create_equipment_table {
    use sea_orm_migration::prelude::*;

    use super::m20240101_000002_create_departments_table::Departments;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_equipment_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Equipment::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Equipment::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Equipment::Name).string_len(100).not_null())
                        .col(
                            ColumnDef::new(Equipment::Code)
                                .string_len(50)
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Equipment::Description)
                                .text()
                                .not_null()
                                .default(""),
                        )
                        .col(ColumnDef::new(Equipment::ImageKey).string_len(500).null())
                        .col(ColumnDef::new(Equipment::DepartmentId).uuid().not_null())
                        .col(
                            ColumnDef::new(Equipment::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk-equipment-department_id")
                                .from(Equipment::Table, Equipment::DepartmentId)
                                .to(Departments::Table, Departments::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx-equipment-department_id")
                        .table(Equipment::Table)
                        .col(Equipment::DepartmentId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Equipment::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum Equipment {
        Table,
        Id,
        Name,
        Code,
        Description,
        ImageKey,
        DepartmentId,
        CreatedAt,
    }
}

mod m20240101_000004_create_tickets_table {
    use sea_orm_migration::prelude::*;

    use super::m20240101_000001_create_users_table::Users;
    use super::m20240101_000002_create_departments_table::Departments;
    use super::m20240101_000003_create_equipment_table::Equipment;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_tickets_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Tickets::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Tickets::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Tickets::RequesterId).uuid().not_null())
                        .col(ColumnDef::new(Tickets::Kind).string_len(20).not_null())
                        .col(ColumnDef::new(Tickets::EquipmentId).uuid().null())
                        .col(ColumnDef::new(Tickets::DepartmentId).uuid().null())
                        .col(ColumnDef::new(Tickets::Description).text().not_null())
                        .col(
                            ColumnDef::new(Tickets::Status)
                                .string_len(20)
                                .not_null()
                                .default("pending"),
                        )
                        .col(
                            ColumnDef::new(Tickets::Priority)
                                .integer()
                                .not_null()
                                .default(3),
                        )
                        .col(
                            ColumnDef::new(Tickets::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Tickets::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Tickets::StartedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Tickets::CompletedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Tickets::MechanicNotes)
                                .text()
                                .not_null()
                                .default(""),
                        )
                        .col(
                            ColumnDef::new(Tickets::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk-tickets-requester_id")
                                .from(Tickets::Table, Tickets::RequesterId)
                                .to(Users::Table, Users::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk-tickets-equipment_id")
                                .from(Tickets::Table, Tickets::EquipmentId)
                                .to(Equipment::Table, Equipment::Id)
                                .on_delete(ForeignKeyAction::SetNull),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk-tickets-department_id")
                                .from(Tickets::Table, Tickets::DepartmentId)
                                .to(Departments::Table, Departments::Id)
                                .on_delete(ForeignKeyAction::SetNull),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx-tickets-requester_id")
                        .table(Tickets::Table)
                        .col(Tickets::RequesterId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx-tickets-status")
                        .table(Tickets::Table)
                        .col(Tickets::Status)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Tickets::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum Tickets {
        Table,
        Id,
        RequesterId,
        Kind,
        EquipmentId,
        DepartmentId,
        Description,
        Status,
        Priority,
        CreatedAt,
        UpdatedAt,
        StartedAt,
        CompletedAt,
        MechanicNotes,
        Version,
    }
}

mod m20240101_000005_create_ticket_assignees_table {
    use sea_orm_migration::prelude::*;

    use super::m20240101_000001_create_users_table::Users;
    use super::m20240101_000004_create_tickets_table::Tickets;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000005_create_ticket_assignees_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(TicketAssignees::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(TicketAssignees::TicketId).uuid().not_null())
                        .col(ColumnDef::new(TicketAssignees::UserId).uuid().not_null())
                        .primary_key(
                            Index::create()
                                .col(TicketAssignees::TicketId)
                                .col(TicketAssignees::UserId),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk-ticket_assignees-ticket_id")
                                .from(TicketAssignees::Table, TicketAssignees::TicketId)
                                .to(Tickets::Table, Tickets::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk-ticket_assignees-user_id")
                                .from(TicketAssignees::Table, TicketAssignees::UserId)
                                .to(Users::Table, Users::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx-ticket_assignees-user_id")
                        .table(TicketAssignees::Table)
                        .col(TicketAssignees::UserId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(TicketAssignees::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum TicketAssignees {
        Table,
        TicketId,
        UserId,
    }
}

mod m20240101_000006_create_ticket_images_table {
    use sea_orm_migration::prelude::*;

    use super::m20240101_000004_create_tickets_table::Tickets;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000006_create_ticket_images_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(TicketImages::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(TicketImages::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(TicketImages::TicketId).uuid().not_null())
                        .col(
                            ColumnDef::new(TicketImages::ImageKey)
                                .string_len(500)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TicketImages::ContentType)
                                .string_len(100)
                                .not_null(),
                        )
                        .col(ColumnDef::new(TicketImages::Caption).string_len(200).null())
                        .col(
                            ColumnDef::new(TicketImages::UploadedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk-ticket_images-ticket_id")
                                .from(TicketImages::Table, TicketImages::TicketId)
                                .to(Tickets::Table, Tickets::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx-ticket_images-ticket_id")
                        .table(TicketImages::Table)
                        .col(TicketImages::TicketId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(TicketImages::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum TicketImages {
        Table,
        Id,
        TicketId,
        ImageKey,
        ContentType,
        Caption,
        UploadedAt,
    }
}
