//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the REST API server on its own.
//!
//! ## Intended use
//! This binary is useful for development and debugging when you only want the REST server (with
//! OpenAPI/Swagger UI) and trigger refreshes by hand through `POST /refresh`. The workspace's
//! main `riskservice-run` binary also drives the scheduled refresh.

use api_rest::{router, AppState};
use riskservice_core::{RiskService, ServiceConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the standalone REST server
///
/// # Environment Variables
/// - `RISKSERVICE_HTTP_ADDR`: listen address (default: "0.0.0.0:9000")
/// - `FHIR_ENDPOINT`: clinical server base URL (required)
/// - `RISKSERVICE_MODE`: `survey` or `synthetic`
/// - `PIE_DATA_DIR`: pie storage directory (default: "pie_data")
///
/// # Returns
/// * `Ok(())` - If the server starts and runs successfully
/// * `Err(anyhow::Error)` - If configuration is invalid or the server fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?)
                .add_directive("riskservice_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServiceConfig::from_env()?;
    let service = RiskService::from_config(&config)?;

    let addr = config.http_addr();
    tracing::info!("-- Starting risk service REST API on {}", addr);

    let app = router(AppState::from(&service));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
