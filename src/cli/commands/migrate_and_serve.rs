use anyhow::Result;
use tracing::{info, trace};

use super::{init_database, serve};
use crate::config::AppConfig;

pub async fn migrate_and_serve(config: AppConfig) -> Result<()> {
    trace!("Entering migrate_and_serve function");
    info!("Applying database migrations and starting server");

    init_database(&config).await?;
    serve(config).await
}
