use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use image::{DynamicImage, ImageFormat};
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, error, info, instrument, trace};

use crate::error::Result;
use crate::filter::{DEFAULT_THRESHOLD, convert_to_sketch};
use crate::pipeline::{DiffusionPipeline, GenerationParams, PipelineLoader};
use crate::prompt::SketchPrompt;

/// Knobs applied to every generation.
#[derive(Debug, Clone, PartialEq)]
pub struct SketchSettings {
    pub params: GenerationParams,
    /// Binarization level for the line-art filter.
    pub threshold: u8,
    /// When false the raw render is saved without post-processing.
    pub enhance: bool,
}

impl Default for SketchSettings {
    fn default() -> Self {
        Self {
            params: GenerationParams::default(),
            threshold: DEFAULT_THRESHOLD,
            enhance: true,
        }
    }
}

/// Owns the single diffusion pipeline of the process.
///
/// The pipeline is loaded lazily on first use and then shared. Every
/// generation holds `generation_lock` from model load to file write, so at
/// most one render runs at a time; waiting callers queue on the lock in no
/// particular order.
pub struct SketchGenerator {
    loader: Arc<dyn PipelineLoader>,
    pipeline: OnceCell<Arc<dyn DiffusionPipeline>>,
    generation_lock: Mutex<()>,
    settings: SketchSettings,
}

impl fmt::Debug for SketchGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SketchGenerator")
            .field("loaded", &self.is_loaded())
            .field("settings", &self.settings)
            .finish()
    }
}

impl SketchGenerator {
    pub fn new(loader: Arc<dyn PipelineLoader>, settings: SketchSettings) -> Self {
        Self {
            loader,
            pipeline: OnceCell::new(),
            generation_lock: Mutex::new(()),
            settings,
        }
    }

    pub fn settings(&self) -> &SketchSettings {
        &self.settings
    }

    pub fn is_loaded(&self) -> bool {
        self.pipeline.initialized()
    }

    /// Returns the cached pipeline, loading it on the first call.
    /// A failed load is not cached; the next call tries again.
    pub async fn load_model(&self) -> Result<Arc<dyn DiffusionPipeline>> {
        let pipeline = self
            .pipeline
            .get_or_try_init(|| self.loader.load())
            .await?;
        Ok(Arc::clone(pipeline))
    }

    /// Renders `subject` as a forensic sketch and writes it to `output_path` as PNG.
    #[instrument(skip(self, subject), fields(output = %output_path.display()))]
    pub async fn generate_sketch_image(&self, subject: &str, output_path: &Path) -> Result<PathBuf> {
        trace!("Waiting for generation lock");
        let _guard = self.generation_lock.lock().await;
        debug!("Generation lock acquired");

        let start = Instant::now();
        let image = match self.render(subject).await {
            Ok(image) => image,
            Err(e) => {
                error!("Sketch generation failed: {}", e);
                return Err(e);
            }
        };

        if let Some(parent) = output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let enhance = self.settings.enhance;
        let threshold = self.settings.threshold;
        let path = output_path.to_path_buf();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let image = if enhance {
                convert_to_sketch(&image, threshold)
            } else {
                image
            };
            image.save_with_format(&path, ImageFormat::Png)?;
            Ok(())
        })
        .await??;

        info!(
            "Sketch saved: {} ({:.2}s)",
            output_path.display(),
            start.elapsed().as_secs_f64()
        );
        Ok(output_path.to_path_buf())
    }

    async fn render(&self, subject: &str) -> Result<DynamicImage> {
        let pipeline = self.load_model().await?;
        let prompt = SketchPrompt::compose(subject);
        info!("Generating from prompt: {}", prompt.prompt);
        pipeline.generate(&prompt, &self.settings.params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SketchError;
    use async_trait::async_trait;
    use image::{Rgb, RgbImage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct Counters {
        loads: AtomicUsize,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    struct StripesPipeline {
        counters: Arc<Counters>,
    }

    #[async_trait]
    impl DiffusionPipeline for StripesPipeline {
        async fn generate(&self, prompt: &SketchPrompt, params: &GenerationParams) -> Result<DynamicImage> {
            assert!(prompt.prompt.contains("police composite sketch"));
            let now = self.counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.counters.max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.counters.calls.fetch_add(1, Ordering::SeqCst);

            tokio::time::sleep(Duration::from_millis(20)).await;

            self.counters.in_flight.fetch_sub(1, Ordering::SeqCst);
            let img = RgbImage::from_fn(params.width, params.height, |x, _| {
                if (x / 4) % 2 == 0 { Rgb([20, 20, 20]) } else { Rgb([230, 230, 230]) }
            });
            Ok(DynamicImage::ImageRgb8(img))
        }
    }

    struct CountingLoader {
        counters: Arc<Counters>,
        fail: bool,
    }

    #[async_trait]
    impl PipelineLoader for CountingLoader {
        async fn load(&self) -> Result<Arc<dyn DiffusionPipeline>> {
            self.counters.loads.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(SketchError::ModelLoad("no GPU".to_string()));
            }
            Ok(Arc::new(StripesPipeline {
                counters: Arc::clone(&self.counters),
            }))
        }
    }

    fn small_settings() -> SketchSettings {
        SketchSettings {
            params: GenerationParams {
                width: 32,
                height: 32,
                ..GenerationParams::default()
            },
            ..SketchSettings::default()
        }
    }

    fn generator(counters: &Arc<Counters>, fail: bool) -> Arc<SketchGenerator> {
        let loader = CountingLoader {
            counters: Arc::clone(counters),
            fail,
        };
        Arc::new(SketchGenerator::new(Arc::new(loader), small_settings()))
    }

    #[tokio::test]
    async fn test_model_is_loaded_once() {
        let counters = Arc::new(Counters::default());
        let generator = generator(&counters, false);
        assert!(!generator.is_loaded());

        generator.load_model().await.unwrap();
        generator.load_model().await.unwrap();
        assert!(generator.is_loaded());
        assert_eq!(counters.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_load_is_retried() {
        let counters = Arc::new(Counters::default());
        let generator = generator(&counters, true);

        assert!(generator.load_model().await.is_err());
        assert!(generator.load_model().await.is_err());
        assert!(!generator.is_loaded());
        assert_eq!(counters.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_generate_writes_png() {
        let counters = Arc::new(Counters::default());
        let generator = generator(&counters, false);
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("nested").join("sketch_1_test.png");

        let written = generator
            .generate_sketch_image("thin face, glasses", &output)
            .await
            .expect("generation should succeed");

        assert_eq!(written, output);
        let saved = image::open(&output).expect("saved file must be a readable image");
        assert_eq!((saved.width(), saved.height()), (32, 32));
        assert!(saved.to_luma8().pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
    }

    #[tokio::test]
    async fn test_generate_failure_leaves_no_file() {
        let counters = Arc::new(Counters::default());
        let generator = generator(&counters, true);
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("sketch.png");

        assert!(generator.generate_sketch_image("anything", &output).await.is_err());
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_concurrent_generations_are_serialized() {
        let counters = Arc::new(Counters::default());
        let generator = generator(&counters, false);
        let dir = tempfile::tempdir().unwrap();

        let mut handles = Vec::new();
        for i in 0..5 {
            let generator = Arc::clone(&generator);
            let output = dir.path().join(format!("sketch_{}.png", i));
            handles.push(tokio::spawn(async move {
                generator.generate_sketch_image("hooded suspect", &output).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(counters.calls.load(Ordering::SeqCst), 5);
        assert_eq!(counters.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(counters.loads.load(Ordering::SeqCst), 1);
    }
}
