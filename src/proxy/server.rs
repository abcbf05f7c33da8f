use crate::proxy::{routes, ProxyConfig};

use anyhow::{Context, Result};
use axum::http::HeaderValue;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info};

const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared state for the proxy handlers.
#[derive(Clone)]
pub struct ProxyState {
    pub config: Arc<ProxyConfig>,
    pub client: reqwest::Client,
    pub allow_origin: HeaderValue,
}

impl ProxyState {
    pub fn new(config: ProxyConfig) -> Result<Self> {
        let allow_origin = HeaderValue::from_str(&config.allow_origin)
            .with_context(|| format!("invalid allowed origin '{}'", config.allow_origin))?;
        let client = reqwest::Client::builder()
            .timeout(UPSTREAM_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            config: Arc::new(config),
            client,
            allow_origin,
        })
    }
}

/// The development proxy server.
pub struct ProxyServer {
    state: ProxyState,
    listener: TcpListener,
    shutdown_tx: broadcast::Sender<()>,
}

impl ProxyServer {
    /// Bind the listen address. Port 0 picks an ephemeral port.
    pub async fn bind(config: ProxyConfig) -> Result<Self> {
        let listener = TcpListener::bind(config.listen)
            .await
            .with_context(|| format!("failed to bind {}", config.listen))?;
        let state = ProxyState::new(config)?;
        let (shutdown_tx, _) = broadcast::channel(1);
        Ok(Self {
            state,
            listener,
            shutdown_tx,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Sender that stops the server when signalled.
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Run until Ctrl+C, SIGTERM or the shutdown handle fires.
    pub async fn run_until_shutdown(self) -> Result<()> {
        let addr = self.local_addr()?;
        print_startup_banner(&self.state.config, &addr);

        let app: Router = routes::build_routes(self.state.clone());
        axum::serve(self.listener, app)
            .with_graceful_shutdown(shutdown_signal(self.shutdown_tx.subscribe()))
            .await?;

        info!("Proxy shut down gracefully");
        Ok(())
    }
}

/// Wait for Ctrl+C, SIGTERM or an explicit shutdown.
async fn shutdown_signal(mut shutdown_rx: broadcast::Receiver<()>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown");
        }
        _ = shutdown_rx.recv() => {
            info!("Shutdown requested");
        }
    }
}

fn print_startup_banner(config: &ProxyConfig, addr: &SocketAddr) {
    info!("-------------------------------------------");
    info!("  Sammy dev proxy v{}", env!("CARGO_PKG_VERSION"));
    info!("  Listening on: http://{}", addr);
    info!("  Upstream: {}", config.target);
    info!("  Allowed origin: {}", config.allow_origin);
    info!("  Routes: /validate/*, /api/* -> /*");
    info!("-------------------------------------------");
}
