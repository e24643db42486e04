use anyhow::Result;
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};
use tracing::{debug, error, info, trace};

use crate::auth::ensure_admin_user;
use crate::config::AppConfig;

/// Run pending migrations and create the `admin` account when missing.
pub async fn init_database(config: &AppConfig) -> Result<()> {
    trace!("Entering init_database function");
    info!("Initializing database");

    trace!("Attempting to connect to database");
    let db: DatabaseConnection = match Database::connect(&config.database_url).await {
        Ok(connection) => {
            info!("Successfully connected to database");
            connection
        }
        Err(e) => {
            error!("Failed to connect to database: {}", e);
            return Err(e.into());
        }
    };

    info!("Running database migrations");
    match Migrator::up(&db, None).await {
        Ok(_) => {
            info!("Database migrations completed successfully");
            debug!("All pending migrations have been applied");
        }
        Err(e) => {
            error!("Failed to run database migrations: {}", e);
            return Err(e.into());
        }
    }

    if ensure_admin_user(&db, &config.admin_password, config.bcrypt_cost).await? {
        info!("Default admin user created");
    }

    info!("Database initialization completed successfully!");
    Ok(())
}
