use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use prometheus::Registry;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cleanair_server::config::Config;
use cleanair_server::context::RequestContext;
use cleanair_server::flags::StaticFlags;
use cleanair_server::metrics::ProviderMetrics;
use cleanair_server::resilience::ReqwestTransport;
use cleanair_server::web::{AppState, create_router};

/// Budget for one background snapshot refresh, which walks every page.
const REFRESH_TIMEOUT: Duration = Duration::from_secs(120);

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env()?;
    let transport = ReqwestTransport::new(config.http_timeout)?;
    let metrics = ProviderMetrics::new(Registry::new())?;
    let flags = Arc::new(StaticFlags::from_env());

    let state = AppState::new(&config, transport, flags, metrics);

    // Keep the snapshot warm; the first tick fires immediately.
    let refresh_state = state.clone();
    let refresh_interval = config.refresh_interval;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(refresh_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let ctx = RequestContext::with_timeout(REFRESH_TIMEOUT);
            if let Err(e) = refresh_state.air_quality.refresh_snapshot(&ctx).await {
                warn!(error = %e, "air-quality refresh failed");
            }
        }
    });

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    info!(addr = %config.listen_addr, "cleanair-server listening");
    axum::serve(listener, app).await?;

    Ok(())
}
