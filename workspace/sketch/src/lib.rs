//! Forensic sketch generation: prompt assembly, the diffusion backend
//! boundary, the line-art post-processing chain and the serialized generator
//! that ties them together.

pub mod error;
pub mod filter;
pub mod generator;
pub mod http;
pub mod pipeline;
pub mod prompt;

pub use error::{Result, SketchError};
pub use generator::{SketchGenerator, SketchSettings};
pub use pipeline::{DiffusionPipeline, GenerationParams, PipelineLoader};
pub use prompt::SketchPrompt;
