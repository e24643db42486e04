//! SeaORM entities for the composite sketch case desk.
//!
//! Four tables hang off each other: `users` open `cases`, cases collect
//! generated `composites`, and composites collect `revisions`.

pub mod case;
pub mod composite;
pub mod revision;
pub mod user;

pub mod prelude {
    //! A prelude module for easy importing of all entities.
    pub use super::case::Entity as Case;
    pub use super::composite::Entity as Composite;
    pub use super::revision::Entity as Revision;
    pub use super::user::Entity as User;
}
