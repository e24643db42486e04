use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create users table
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(pk_auto(Users::Id))
                    .col(string_len(Users::Username, 50).unique_key())
                    .col(string_len(Users::Password, 255))
                    .col(string_len(Users::FullName, 100))
                    .col(string_len(Users::BadgeNumber, 20))
                    .col(string_len(Users::Role, 10).default("officer"))
                    .col(timestamp_with_time_zone(Users::CreatedAt).default(Expr::current_timestamp()))
                    .to_owned(),
            )
            .await?;

        // Create cases table
        manager
            .create_table(
                Table::create()
                    .table(Cases::Table)
                    .if_not_exists()
                    .col(pk_auto(Cases::Id))
                    .col(string_len(Cases::CaseNumber, 50).unique_key())
                    .col(text(Cases::Description))
                    .col(string_len(Cases::Location, 100))
                    .col(date(Cases::IncidentDate))
                    .col(integer(Cases::CreatedBy))
                    .col(timestamp_with_time_zone(Cases::CreatedAt).default(Expr::current_timestamp()))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_cases_created_by")
                            .from(Cases::Table, Cases::CreatedBy)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create composites table
        manager
            .create_table(
                Table::create()
                    .table(Composites::Table)
                    .if_not_exists()
                    .col(pk_auto(Composites::Id))
                    .col(integer(Composites::CaseId))
                    .col(integer(Composites::UserId))
                    .col(text(Composites::Description))
                    .col(string_len(Composites::ImagePath, 255))
                    .col(boolean(Composites::IsAccurate).default(false))
                    .col(timestamp_with_time_zone(Composites::CreatedAt).default(Expr::current_timestamp()))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_composites_case")
                            .from(Composites::Table, Composites::CaseId)
                            .to(Cases::Table, Cases::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_composites_user")
                            .from(Composites::Table, Composites::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create revisions table; user_id records who asked for the adjustment
        manager
            .create_table(
                Table::create()
                    .table(Revisions::Table)
                    .if_not_exists()
                    .col(pk_auto(Revisions::Id))
                    .col(integer(Revisions::CompositeId))
                    .col(integer_null(Revisions::UserId))
                    .col(text(Revisions::AdjustmentText))
                    .col(string_len(Revisions::RevisedImagePath, 255))
                    .col(timestamp_with_time_zone(Revisions::CreatedAt).default(Expr::current_timestamp()))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_revisions_composite")
                            .from(Revisions::Table, Revisions::CompositeId)
                            .to(Composites::Table, Composites::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_revisions_user")
                            .from(Revisions::Table, Revisions::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Listing queries filter by creator and sort by creation time
        manager
            .create_index(
                Index::create()
                    .name("idx_cases_created_by")
                    .table(Cases::Table)
                    .col(Cases::CreatedBy)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_composites_case_id")
                    .table(Composites::Table)
                    .col(Composites::CaseId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Revisions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Composites::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Cases::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    Username,
    Password,
    FullName,
    BadgeNumber,
    Role,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Cases {
    Table,
    Id,
    CaseNumber,
    Description,
    Location,
    IncidentDate,
    CreatedBy,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Composites {
    Table,
    Id,
    CaseId,
    UserId,
    Description,
    ImagePath,
    IsAccurate,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Revisions {
    Table,
    Id,
    CompositeId,
    UserId,
    AdjustmentText,
    RevisedImagePath,
    CreatedAt,
}
