//! Diffusion backend reached over the Stable Diffusion web API
//! (`/sdapi/v1/options` to select a checkpoint, `/sdapi/v1/txt2img` to render).

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, trace};

use crate::error::{Result, SketchError};
use crate::pipeline::{DiffusionPipeline, GenerationParams, PipelineLoader};
use crate::prompt::SketchPrompt;

/// SD 1.5 checkpoint used when none is configured.
pub const DEFAULT_MODEL_ID: &str = "dreamlike-art/dreamlike-anime-1.0";

#[derive(Debug, Serialize)]
struct OptionsRequest<'a> {
    sd_model_checkpoint: &'a str,
}

#[derive(Debug, Serialize)]
struct Txt2ImgRequest<'a> {
    prompt: &'a str,
    negative_prompt: &'a str,
    steps: u32,
    cfg_scale: f32,
    width: u32,
    height: u32,
    batch_size: u32,
}

#[derive(Debug, Deserialize)]
struct Txt2ImgResponse {
    #[serde(default)]
    images: Vec<String>,
}

/// Loads a checkpoint on a remote Stable Diffusion server.
#[derive(Debug, Clone)]
pub struct HttpPipelineLoader {
    endpoint: String,
    model_id: String,
    request_timeout: Duration,
}

impl HttpPipelineLoader {
    pub fn new(endpoint: impl Into<String>, model_id: impl Into<String>, request_timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model_id: model_id.into(),
            request_timeout,
        }
    }
}

#[async_trait]
impl PipelineLoader for HttpPipelineLoader {
    #[instrument(skip(self), fields(endpoint = %self.endpoint, model = %self.model_id))]
    async fn load(&self) -> Result<Arc<dyn DiffusionPipeline>> {
        info!("Loading diffusion pipeline");
        let start = Instant::now();

        let client = reqwest::Client::builder()
            .timeout(self.request_timeout)
            .build()?;

        let response = client
            .post(format!("{}/sdapi/v1/options", self.endpoint))
            .json(&OptionsRequest {
                sd_model_checkpoint: &self.model_id,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Backend refused checkpoint {}: {} {}", self.model_id, status, body);
            return Err(SketchError::ModelLoad(format!(
                "backend refused checkpoint '{}' with status {}",
                self.model_id, status
            )));
        }

        info!("Model loaded in {:.2}s", start.elapsed().as_secs_f64());
        Ok(Arc::new(HttpDiffusionPipeline {
            client,
            endpoint: self.endpoint.clone(),
        }))
    }
}

/// Pipeline handle bound to one backend server.
#[derive(Debug, Clone)]
pub struct HttpDiffusionPipeline {
    client: reqwest::Client,
    endpoint: String,
}

#[async_trait]
impl DiffusionPipeline for HttpDiffusionPipeline {
    async fn generate(&self, prompt: &SketchPrompt, params: &GenerationParams) -> Result<DynamicImage> {
        trace!("Posting txt2img request to {}", self.endpoint);
        let request = Txt2ImgRequest {
            prompt: &prompt.prompt,
            negative_prompt: &prompt.negative_prompt,
            steps: params.num_inference_steps,
            cfg_scale: params.guidance_scale,
            width: params.width,
            height: params.height,
            batch_size: 1,
        };

        let response = self
            .client
            .post(format!("{}/sdapi/v1/txt2img", self.endpoint))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SketchError::Backend(format!("txt2img failed with {}: {}", status, body)));
        }

        let payload: Txt2ImgResponse = response.json().await?;
        let first = payload
            .images
            .first()
            .ok_or_else(|| SketchError::Backend("txt2img returned no images".to_string()))?;
        debug!("Received {} image(s) from backend", payload.images.len());

        decode_image_payload(first)
    }
}

/// Decodes a base64 image as returned by the web API.
///
/// Some servers prefix the payload with a `data:image/png;base64,` header.
pub fn decode_image_payload(payload: &str) -> Result<DynamicImage> {
    let encoded = match payload.split_once(',') {
        Some((header, data)) if header.starts_with("data:") => data,
        _ => payload,
    };
    let bytes = STANDARD.decode(encoded.trim())?;
    Ok(image::load_from_memory(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn png_base64(width: u32, height: u32) -> String {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([10, 20, 30])));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .expect("encode png");
        STANDARD.encode(bytes)
    }

    #[test]
    fn test_decode_plain_payload() {
        let image = decode_image_payload(&png_base64(4, 3)).expect("decode");
        assert_eq!((image.width(), image.height()), (4, 3));
    }

    #[test]
    fn test_decode_data_url_payload() {
        let payload = format!("data:image/png;base64,{}", png_base64(2, 5));
        let image = decode_image_payload(&payload).expect("decode");
        assert_eq!((image.width(), image.height()), (2, 5));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode_image_payload("!!not base64!!"),
            Err(SketchError::Decode(_))
        ));
        let not_an_image = STANDARD.encode(b"plain text");
        assert!(matches!(
            decode_image_payload(&not_an_image),
            Err(SketchError::Image(_))
        ));
    }

    #[test]
    fn test_txt2img_request_shape() {
        let prompt = SketchPrompt::compose("bald, goatee");
        let params = GenerationParams::default();
        let request = Txt2ImgRequest {
            prompt: &prompt.prompt,
            negative_prompt: &prompt.negative_prompt,
            steps: params.num_inference_steps,
            cfg_scale: params.guidance_scale,
            width: params.width,
            height: params.height,
            batch_size: 1,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["steps"], 28);
        assert_eq!(json["cfg_scale"], 8.0);
        assert_eq!(json["width"], 512);
        assert!(json["prompt"].as_str().unwrap().contains("bald, goatee"));
    }

    #[test]
    fn test_loader_normalizes_endpoint() {
        let loader = HttpPipelineLoader::new("http://gpu-box:7860/", DEFAULT_MODEL_ID, Duration::from_secs(5));
        assert_eq!(loader.endpoint, "http://gpu-box:7860");
    }
}
