use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use moka::future::Cache;
use sea_orm::Database;
use sketch::http::{DEFAULT_MODEL_ID, HttpPipelineLoader};
use sketch::{GenerationParams, PipelineLoader, SketchGenerator, SketchSettings};
use thiserror::Error;
use tracing::{debug, info, trace};

use crate::schemas::AppState;

/// Configuration errors raised while reading the environment
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Settings for the diffusion backend and the sketch post-processing.
#[derive(Debug, Clone)]
pub struct DiffusionConfig {
    /// Base URL of the Stable Diffusion web API.
    pub endpoint: String,
    pub model_id: String,
    pub request_timeout: Duration,
    /// Load the model at startup instead of on the first request.
    pub preload: bool,
    pub settings: SketchSettings,
}

/// Application configuration, read from the environment (and `.env`).
#[derive(Clone)]
pub struct AppConfig {
    pub secret_key: String,
    pub database_url: String,
    pub bind_address: String,
    /// Directory generated sketches are written to and served from.
    pub upload_folder: PathBuf,
    pub session_ttl: Duration,
    /// Password given to the bootstrap `admin` account.
    pub admin_password: String,
    pub bcrypt_cost: u32,
    pub diffusion: DiffusionConfig,
}

// Keeps the secret key and admin password out of logs
impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("bind_address", &self.bind_address)
            .field("upload_folder", &self.upload_folder)
            .field("session_ttl", &self.session_ttl)
            .field("diffusion", &self.diffusion)
            .finish_non_exhaustive()
    }
}

/// Reads a variable, treating unset and empty the same way.
fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_parse<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => {
            value
                .trim()
                .parse()
                .map_err(|e: T::Err| ConfigError::InvalidValue {
                    key,
                    value: value.clone(),
                    reason: e.to_string(),
                })
        }
        _ => Ok(default),
    }
}

/// Builds a MySQL URL from the individual connection variables.
pub fn mysql_url(host: &str, user: &str, password: &str, database: &str) -> String {
    if password.is_empty() {
        format!("mysql://{}@{}/{}", user, host, database)
    } else {
        format!("mysql://{}:{}@{}/{}", user, password, host, database)
    }
}

impl AppConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        trace!("Loading configuration from environment");

        let database_url = match std::env::var("DATABASE_URL") {
            Ok(url) if !url.is_empty() => url,
            _ => mysql_url(
                &env_or("MYSQL_HOST", "localhost"),
                &env_or("MYSQL_USER", "root"),
                &env_or("MYSQL_PASSWORD", ""),
                &env_or("MYSQL_DB", "criminal_composite_db"),
            ),
        };

        let settings = SketchSettings {
            params: GenerationParams {
                num_inference_steps: env_parse("DIFFUSION_STEPS", 28)?,
                guidance_scale: env_parse("DIFFUSION_GUIDANCE", 8.0)?,
                width: env_parse("DIFFUSION_WIDTH", 512)?,
                height: env_parse("DIFFUSION_HEIGHT", 512)?,
            },
            threshold: env_parse("SKETCH_THRESHOLD", sketch::filter::DEFAULT_THRESHOLD)?,
            enhance: env_parse("SKETCH_ENHANCE", true)?,
        };

        let config = Self {
            secret_key: env_or("SECRET_KEY", "your-secret-key-here"),
            database_url,
            bind_address: env_or("BIND_ADDRESS", "0.0.0.0:3000"),
            upload_folder: PathBuf::from(env_or("UPLOAD_FOLDER", "static/generated")),
            session_ttl: Duration::from_secs(env_parse("SESSION_TTL_SECS", 8 * 60 * 60)?),
            admin_password: env_or("ADMIN_PASSWORD", "admin123"),
            bcrypt_cost: env_parse("BCRYPT_COST", bcrypt::DEFAULT_COST)?,
            diffusion: DiffusionConfig {
                endpoint: env_or("DIFFUSION_ENDPOINT", "http://127.0.0.1:7860"),
                model_id: env_or("DIFFUSION_MODEL", DEFAULT_MODEL_ID),
                request_timeout: Duration::from_secs(env_parse("DIFFUSION_TIMEOUT_SECS", 600)?),
                preload: env_parse("DIFFUSION_PRELOAD", false)?,
                settings,
            },
        };

        debug!("Configuration loaded: {:?}", config);
        Ok(config)
    }

    /// Apply command line overrides on top of the environment.
    pub fn with_overrides(mut self, database_url: Option<String>, bind_address: Option<String>) -> Self {
        if let Some(url) = database_url {
            self.database_url = url;
        }
        if let Some(address) = bind_address {
            self.bind_address = address;
        }
        self
    }
}

/// Build the sketch generator backed by the configured HTTP diffusion server.
pub fn build_generator(config: &DiffusionConfig) -> SketchGenerator {
    let loader: Arc<dyn PipelineLoader> = Arc::new(HttpPipelineLoader::new(
        config.endpoint.clone(),
        config.model_id.clone(),
        config.request_timeout,
    ));
    SketchGenerator::new(loader, config.settings.clone())
}

/// Initialize application state from a loaded configuration
pub async fn initialize_app_state(config: AppConfig) -> Result<AppState> {
    info!("Connecting to database");
    let db = Database::connect(&config.database_url).await?;

    let sessions = Cache::builder()
        .max_capacity(10_000)
        .time_to_idle(config.session_ttl)
        .build();

    let generator = Arc::new(build_generator(&config.diffusion));
    let cookie_key = crate::auth::cookie_key(&config.secret_key);

    Ok(AppState {
        db,
        sessions,
        generator,
        cookie_key,
        config: Arc::new(config),
    })
}
