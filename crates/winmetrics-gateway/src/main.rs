//! winmetrics gateway
//!
//! Serves the instrumented demo endpoints, `POST /rpc`, and the registry
//! snapshot at `/debug/vars`. Config path comes from `WINMETRICS_CONFIG`
//! (default `winmetrics.yaml`).

use tracing_subscriber::{fmt, EnvFilter};

use winmetrics_core::error::{Result, WinMetricsError};
use winmetrics_gateway::{app_state, config, router};

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let path = std::env::var("WINMETRICS_CONFIG").unwrap_or_else(|_| "winmetrics.yaml".into());
    let cfg = config::load_from_file(&path)?;
    let listen = cfg.gateway.listen_addr()?;

    let state = app_state::AppState::new(cfg)?;
    let app = router::build_router(state.clone());

    tracing::info!(%listen, config = %path, "winmetrics-gateway starting");
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| WinMetricsError::Internal(format!("bind {listen} failed: {e}")))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| WinMetricsError::Internal(format!("server failed: {e}")))?;

    state.shutdown();
    tracing::info!("winmetrics-gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "ctrl-c handler unavailable; running until killed");
        std::future::pending::<()>().await;
    }
}
