//! Server mode CLI logic
//!
//! Runs the HTTP API and, when proxying is on, the keep-alive watchdog.

use crate::{
    Settings,
    server::{AppState, app},
    utils::version,
    watchdog::KeepAlive,
};
use anyhow::Result;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

/// Arguments for server mode
#[derive(Debug)]
pub struct ServerArgs {
    pub port: Option<u16>,
    pub host: Option<String>,
    pub config: Option<String>,
    pub verbose: bool,
}

/// Run server mode with the given arguments
pub async fn run_server_mode(args: ServerArgs) -> Result<()> {
    // Configuration is loaded before logging so logging.level can apply
    let mut settings = super::load_settings(args.config.as_deref())?;

    if let Some(host) = args.host {
        settings.server.host = host;
    }
    if let Some(port) = args.port {
        settings.server.port = port;
    }
    settings.logging.verbose = args.verbose;

    super::init_logging(&settings, args.verbose, false);

    tracing::info!("Starting campus gateway v{}", version::get_detailed_version());

    let state = AppState::from_settings(settings.clone()).await?;

    let watchdog = if runs_watchdog(&settings) {
        let keep_alive = KeepAlive::from_settings(
            &settings,
            state.session_manager.proxy().clone(),
            state.connectivity.clone(),
        )?;
        Some(keep_alive.spawn())
    } else {
        tracing::info!("Keep-alive watchdog disabled");
        None
    };

    let app = app::create_app(state);

    let addr = resolve_listen_address(&settings.server.host, settings.server.port).await?;

    tracing::info!(
        "Campus gateway v{} listening on {}",
        version::get_version(),
        addr
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = watchdog {
        handle.abort();
    }
    tracing::info!("Campus gateway stopped");

    Ok(())
}

/// Nothing to keep alive on a direct connection
fn runs_watchdog(settings: &Settings) -> bool {
    settings.watchdog.enabled && settings.proxy.enabled
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Resolve the listen address from an IP literal
///
/// `::` falls back to `0.0.0.0` on hosts without IPv6.
pub async fn resolve_listen_address(host: &str, port: u16) -> Result<SocketAddr> {
    let ip: IpAddr = host.parse().map_err(|_| {
        anyhow::anyhow!(
            "Invalid host address: {}. Use '::' for IPv6 or '0.0.0.0' for IPv4",
            host
        )
    })?;
    let addr = SocketAddr::new(ip, port);

    if ip == IpAddr::V6(Ipv6Addr::UNSPECIFIED)
        && let Err(e) = tokio::net::TcpListener::bind(addr).await
    {
        let fallback = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port);
        tracing::warn!(
            "Could not listen on [::]:{} ({}), falling back to {}",
            port,
            e,
            fallback
        );
        return Ok(fallback);
    }

    Ok(addr)
}
