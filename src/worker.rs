//! Background sketch jobs.
//!
//! Handlers spawn one detached task per request and answer immediately. The
//! task waits on the generator's lock, writes the image, and only then
//! records the row, so every stored path names a file that exists. Failures
//! are logged and otherwise dropped.

use anyhow::{Context, Result};
use chrono::Utc;
use model::entities::{composite, revision};
use sea_orm::{ActiveModelTrait, Set};
use sketch::prompt::{revision_subject, suspect_subject};
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, trace};
use uuid::Uuid;

use crate::schemas::AppState;

/// A request for a first sketch of a suspect on a case.
#[derive(Debug, Clone)]
pub struct CompositeJob {
    pub case_id: i32,
    pub user_id: i32,
    pub description: String,
}

/// A request to redraw an existing composite with adjustments.
#[derive(Debug, Clone)]
pub struct RevisionJob {
    pub composite_id: i32,
    pub user_id: i32,
    /// Description of the composite being revised.
    pub description: String,
    pub adjustment: String,
}

/// Timestamp plus a random suffix; jobs started in the same millisecond still get distinct files.
fn unique_stamp() -> String {
    format!(
        "{}_{}",
        Utc::now().format("%Y%m%d_%H%M%S_%3f"),
        Uuid::new_v4().simple()
    )
}

pub fn composite_file_name(case_id: i32) -> String {
    format!("sketch_{}_{}.png", case_id, unique_stamp())
}

pub fn revision_file_name(composite_id: i32) -> String {
    format!("revision_{}_{}.png", composite_id, unique_stamp())
}

async fn generate_into(state: &AppState, subject: &str, file_name: &str) -> Result<()> {
    let output = state.config.upload_folder.join(file_name);
    state
        .generator
        .generate_sketch_image(subject, &output)
        .await
        .with_context(|| format!("generating {}", file_name))?;
    Ok(())
}

/// Generate the sketch for `job` and insert the composite row.
#[instrument(skip(state, job), fields(case_id = job.case_id))]
pub async fn run_composite_job(state: &AppState, job: CompositeJob) -> Result<composite::Model> {
    trace!("Starting composite job");
    let file_name = composite_file_name(job.case_id);
    generate_into(state, &suspect_subject(&job.description), &file_name).await?;

    let model = composite::ActiveModel {
        case_id: Set(job.case_id),
        user_id: Set(job.user_id),
        description: Set(job.description),
        image_path: Set(file_name),
        is_accurate: Set(false),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&state.db)
    .await
    .context("recording composite")?;

    info!("Composite {} stored for case {}", model.id, model.case_id);
    Ok(model)
}

/// Generate the revised sketch for `job` and insert the revision row.
#[instrument(skip(state, job), fields(composite_id = job.composite_id))]
pub async fn run_revision_job(state: &AppState, job: RevisionJob) -> Result<revision::Model> {
    trace!("Starting revision job");
    let file_name = revision_file_name(job.composite_id);
    let subject = revision_subject(&job.description, &job.adjustment);
    generate_into(state, &subject, &file_name).await?;

    let model = revision::ActiveModel {
        composite_id: Set(job.composite_id),
        user_id: Set(Some(job.user_id)),
        adjustment_text: Set(job.adjustment),
        revised_image_path: Set(file_name),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&state.db)
    .await
    .context("recording revision")?;

    info!("Revision {} stored for composite {}", model.id, model.composite_id);
    Ok(model)
}

pub fn spawn_composite_job(state: AppState, job: CompositeJob) -> JoinHandle<()> {
    tokio::spawn(async move {
        let case_id = job.case_id;
        if let Err(e) = run_composite_job(&state, job).await {
            error!("Composite generation for case {} failed: {:#}", case_id, e);
        }
    })
}

pub fn spawn_revision_job(state: AppState, job: RevisionJob) -> JoinHandle<()> {
    tokio::spawn(async move {
        let composite_id = job.composite_id;
        if let Err(e) = run_revision_job(&state, job).await {
            error!("Revision generation for composite {} failed: {:#}", composite_id, e);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_names() {
        let sketch = composite_file_name(12);
        assert!(sketch.starts_with("sketch_12_"));
        assert!(sketch.ends_with(".png"));
        // sketch_12_YYYYmmdd_HHMMSS_mmm_<32 hex>.png
        assert_eq!(sketch.len(), "sketch_12_".len() + 19 + 1 + 32 + ".png".len());

        let revision = revision_file_name(4);
        assert!(revision.starts_with("revision_4_"));
        assert!(revision.ends_with(".png"));

        assert_ne!(composite_file_name(12), composite_file_name(12));
    }
}
