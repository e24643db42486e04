pub mod auth;
pub mod cases;
pub mod composites;
pub mod dashboard;
pub mod health;
pub mod users;
