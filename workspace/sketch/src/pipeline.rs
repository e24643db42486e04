use std::sync::Arc;

use async_trait::async_trait;
use image::DynamicImage;

use crate::error::Result;
use crate::prompt::SketchPrompt;

/// Inference settings passed to the diffusion pipeline on every call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub num_inference_steps: u32,
    pub guidance_scale: f32,
    pub width: u32,
    pub height: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            num_inference_steps: 28,
            guidance_scale: 8.0,
            width: 512,
            height: 512,
        }
    }
}

/// A loaded text-to-image model.
///
/// Implementations are not expected to be reentrant; callers go through
/// [`crate::SketchGenerator`], which serializes every call.
#[async_trait]
pub trait DiffusionPipeline: Send + Sync {
    /// Renders one image for the given prompt pair.
    async fn generate(&self, prompt: &SketchPrompt, params: &GenerationParams)
        -> Result<DynamicImage>;
}

/// Produces the shared pipeline handle. Called at most once per generator.
#[async_trait]
pub trait PipelineLoader: Send + Sync {
    async fn load(&self) -> Result<Arc<dyn DiffusionPipeline>>;
}
