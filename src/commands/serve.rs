//! Serve command.

use super::ServiceContext;

/// Serve command: runs the dashboard API until Ctrl-C.
#[cfg(feature = "http")]
pub async fn cmd_serve(ctx: &ServiceContext) -> anyhow::Result<()> {
    use posturelog::server::{self, AppState};

    let state = AppState::new(ctx.aggregation(), ctx.manual_logs());
    server::serve(&ctx.config.bind_address(), state, shutdown_signal()).await?;
    Ok(())
}

/// Serve command (feature not enabled).
#[cfg(not(feature = "http"))]
#[allow(clippy::unused_async)]
pub async fn cmd_serve(_ctx: &ServiceContext) -> anyhow::Result<()> {
    Err(posturelog::Error::FeatureNotEnabled("http".to_string()).into())
}

#[cfg(feature = "http")]
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
