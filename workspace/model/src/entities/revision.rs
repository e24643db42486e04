use sea_orm::entity::prelude::*;

/// A regenerated sketch produced from an adjustment request on a composite.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "revisions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub composite_id: i32,
    /// Who asked for the adjustment. Nullable so rows survive without a requester.
    pub user_id: Option<i32>,
    #[sea_orm(column_type = "Text")]
    pub adjustment_text: String,
    pub revised_image_path: String,
    pub created_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::composite::Entity",
        from = "Column::CompositeId",
        to = "super::composite::Column::Id"
    )]
    Composite,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
}

impl Related<super::composite::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Composite.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
