use api_rest::{router, AppState};
use riskservice_core::schedule::{refresh_now, spawn_refresh_schedule};
use riskservice_core::{RiskService, ServiceConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the risk service
///
/// Serves the REST API and runs the periodic refresh concurrently:
/// - REST server on port 9000 (configurable via RISKSERVICE_HTTP_ADDR)
/// - one refresh every REFRESH_INTERVAL_SECS (default one day, 0 disables the schedule)
/// - an optional refresh straight after startup (REFRESH_ON_STARTUP)
///
/// # Environment Variables
/// - `RISKSERVICE_HTTP_ADDR`: REST server address (default: "0.0.0.0:9000")
/// - `RISKSERVICE_PUBLIC_URL`: URL the pies are served under (default: discovered local address)
/// - `FHIR_ENDPOINT`: clinical server base URL (required)
/// - `RISKSERVICE_MODE`: `survey` (default) or `synthetic`
/// - `REDCAP_ENDPOINT`, `REDCAP_TOKEN`: survey source (required in survey mode)
/// - `PIE_DATA_DIR`: pie storage directory (default: "pie_data")
///
/// # Returns
/// * `Ok(())` - If the servers start and run successfully
/// * `Err(anyhow::Error)` - If configuration is invalid or the server fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("riskservice_run=info".parse()?)
                .add_directive("riskservice_core=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServiceConfig::from_env()?;
    let service = RiskService::from_config(&config)?;
    let coordinator = service.coordinator();

    let rest_addr = config.http_addr();
    tracing::info!("++ Starting risk service REST on {}", rest_addr);
    tracing::info!("++ Pies served under {}", config.basis_pie_url());

    if config.refresh_on_startup() {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { refresh_now(&coordinator).await });
    }

    let schedule = match config.refresh_interval() {
        Some(period) => Some(spawn_refresh_schedule(coordinator, period)),
        None => {
            tracing::info!("++ Scheduled refresh disabled");
            None
        }
    };

    let listener = tokio::net::TcpListener::bind(rest_addr).await?;
    let rest_app = router(AppState::from(&service));
    let rest_server = tokio::spawn(async move { axum::serve(listener, rest_app).await });

    let scheduler = async move {
        match schedule {
            Some(handle) => handle.await,
            None => Ok(()),
        }
    };

    // Run both
    let (rest_result, schedule_result) = tokio::join!(rest_server, scheduler);
    rest_result??;
    schedule_result?;

    Ok(())
}
