use std::net::SocketAddr;

use anyhow::{Context, Result, bail};
use clap::Args;
use ohclips::{AppConfig, AppState, router};
use tokio::net::TcpListener;

use super::BackendArg;
use crate::output::OutputManager;

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Port to listen on (overrides OHCLIPS_PORT)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Store backend (overrides OHCLIPS_STORE_BACKEND)
    #[arg(long, value_enum)]
    pub backend: Option<BackendArg>,
}

pub async fn handle_serve(args: ServeArgs, mut config: AppConfig, output: &OutputManager) -> Result<()> {
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(backend) = args.backend {
        config.store_backend = backend.into();
    }
    if config.has_insecure_auth_secret() {
        bail!("OHCLIPS_AUTH_SECRET must be set to a private value when OHCLIPS_APP_ENV=production");
    }
    if config.is_production() && config.mux_webhook_secret.trim().is_empty() {
        output.warning("OHCLIPS_MUX_WEBHOOK_SECRET is unset; webhook signatures are not checked");
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let state = AppState::connect(config).await.context("building application state")?;
    let app = router(state);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    output.success(&format!("ohclips listening on http://{addr}"));
    log::info!("listening on {addr}");
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    output.info("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        log::error!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    log::info!("shutdown signal received, closing connections");
}
