use anyhow::Result;
use tokio::net::TcpListener;
use tracing::{debug, error, info, trace, warn};

use crate::auth::ensure_admin_user;
use crate::config::{AppConfig, initialize_app_state};
use crate::router::create_router;

pub async fn serve(config: AppConfig) -> Result<()> {
    trace!("Entering serve function");
    info!("SketchDesk starting up");
    let bind_address = config.bind_address.clone();
    debug!("Bind address: {}", bind_address);

    // Initialize application state
    trace!("Initializing application state");
    let state = match initialize_app_state(config).await {
        Ok(state) => {
            debug!("Application state initialized successfully");
            state
        }
        Err(e) => {
            error!("Failed to initialize application state: {}", e);
            return Err(e);
        }
    };

    if let Err(e) = ensure_admin_user(&state.db, &state.config.admin_password, state.config.bcrypt_cost).await {
        error!("Failed to bootstrap admin account: {}", e);
        return Err(e);
    }

    if state.config.diffusion.preload {
        info!("Preloading diffusion model {}", state.config.diffusion.model_id);
        let generator = state.generator.clone();
        tokio::spawn(async move {
            match generator.load_model().await {
                Ok(_) => info!("Diffusion model ready"),
                Err(e) => warn!("Model preload failed, will retry on first request: {}", e),
            }
        });
    }

    // Create router
    trace!("Creating application router");
    let app = create_router(state);
    debug!("Router created successfully");

    // Start server
    info!("Starting server on {}", bind_address);
    let listener = match TcpListener::bind(&bind_address).await {
        Ok(listener) => {
            debug!("Successfully bound to address: {}", bind_address);
            listener
        }
        Err(e) => {
            error!("Failed to bind to address {}: {}", bind_address, e);
            return Err(e.into());
        }
    };

    info!("SketchDesk API server running on http://{}", bind_address);
    info!("Swagger UI available at http://{}/swagger-ui", bind_address);

    trace!("Starting axum server");
    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    info!("Server shutdown gracefully");
    Ok(())
}
