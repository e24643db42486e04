use sea_orm::entity::prelude::*;

/// Access level of an account.
///
/// Admins see every case and may register new users; officers only see the
/// cases they opened themselves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
pub enum Role {
    #[default]
    #[sea_orm(string_value = "officer")]
    Officer,
    #[sea_orm(string_value = "admin")]
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Officer => "officer",
            Role::Admin => "admin",
        }
    }

    /// Parses a role name as submitted on the registration form.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "officer" => Some(Role::Officer),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// An officer or administrator who can log in to the case desk.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub username: String,
    /// bcrypt hash, never the plain password.
    pub password: String,
    pub full_name: String,
    /// Badge number; also accepted as a login name.
    pub badge_number: String,
    pub role: Role,
    pub created_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Cases opened by this user.
    #[sea_orm(has_many = "super::case::Entity")]
    Case,
    /// Composites requested by this user.
    #[sea_orm(has_many = "super::composite::Entity")]
    Composite,
    #[sea_orm(has_many = "super::revision::Entity")]
    Revision,
}

impl Related<super::case::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Case.def()
    }
}

impl Related<super::composite::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Composite.def()
    }
}

impl Related<super::revision::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Revision.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Name shown next to cases and composites; falls back to the username.
    pub fn display_name(&self) -> String {
        if self.full_name.trim().is_empty() {
            self.username.clone()
        } else {
            self.full_name.clone()
        }
    }
}
