//! HTTP server lifecycle: bind, serve, graceful stop.

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::info;
use wa_bridge::MessagingClient;
use wa_session::WhatsAppSession;

use crate::routes::router;

/// Transport server configuration.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Port to listen on (0 for OS-assigned)
    pub port: u16,
    /// Hostname to bind to
    pub hostname: String,
    /// Enable permissive CORS for the browser frontend
    pub enable_cors: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            hostname: "127.0.0.1".into(),
            enable_cors: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid bind address {0}")]
    InvalidAddress(String),

    #[error("failed to bind: {0}")]
    Bind(#[from] std::io::Error),
}

/// The HTTP server. Dropping it without [`stop`](Self::stop) leaves the
/// serve task running until the runtime shuts down.
pub struct TransportServer {
    /// Shutdown signal
    shutdown_tx: Option<mpsc::Sender<()>>,
    /// Server task handle
    handle: Option<tokio::task::JoinHandle<()>>,
    /// Actual bound port
    port: u16,
}

impl TransportServer {
    /// Bind and start serving the gateway routes for `session`.
    pub async fn start<C: MessagingClient + 'static>(
        config: TransportConfig,
        session: Arc<WhatsAppSession<C>>,
    ) -> Result<Self, TransportError> {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);

        let app = router(session, &config);

        let bind = format!("{}:{}", config.hostname, config.port);
        let addr: SocketAddr = bind
            .parse()
            .map_err(|_| TransportError::InvalidAddress(bind.clone()))?;
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let actual_port = listener.local_addr()?.port();

        info!(
            "WhatsApp gateway listening on http://{}:{}",
            config.hostname, actual_port
        );

        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.recv().await;
                })
                .await
                .ok();
        });

        Ok(Self {
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
            port: actual_port,
        })
    }

    /// Get the actual bound port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Gracefully stop the server.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
        info!("WhatsApp gateway transport stopped");
    }
}
