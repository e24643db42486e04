use sea_orm::entity::prelude::*;

/// An investigation the sketches are produced for.
/// Cases are immutable once opened; they only grow through new composites.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "cases")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub case_number: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub location: String,
    pub incident_date: Date,
    /// The officer who opened the case; drives officer visibility.
    pub created_by: i32,
    pub created_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::CreatedBy",
        to = "super::user::Column::Id"
    )]
    User,
    #[sea_orm(has_many = "super::composite::Entity")]
    Composite,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::composite::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Composite.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
