use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod access;
mod auth;
mod cli;
mod config;
mod handlers;
mod router;
mod schemas;
mod worker;

mod openapi_tests;

use cli::Cli;

/// Main entry point for the SketchDesk application.
#[tokio::main]
async fn main() -> Result<()> {
    // .env must be loaded before the filter reads RUST_LOG
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "sketchdesk=debug,sketch=debug,tower_http=debug,axum::rejection=trace".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    cli.run().await?;

    Ok(())
}
