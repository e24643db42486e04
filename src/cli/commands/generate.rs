use std::path::Path;

use anyhow::{Context, Result};
use sketch::prompt::suspect_subject;
use tracing::{info, trace};

use crate::config::{AppConfig, build_generator};

/// Render one sketch straight to `output`, bypassing cases and the database.
pub async fn generate(config: &AppConfig, description: &str, output: &Path) -> Result<()> {
    trace!("Entering generate function");
    info!(
        "Generating sketch with {} at {}",
        config.diffusion.model_id, config.diffusion.endpoint
    );

    let generator = build_generator(&config.diffusion);
    let path = generator
        .generate_sketch_image(&suspect_subject(description), output)
        .await
        .with_context(|| format!("generating sketch into {}", output.display()))?;

    info!("Sketch written to {}", path.display());
    Ok(())
}
