//! Server Implementation
//!
//! HTTP + WebSocket listener with graceful shutdown

use std::future::IntoFuture;
use std::net::SocketAddr;

use crate::api::build_app;
use crate::core::{Config, Result, ServerError, ServerState};

/// HTTP Server
pub struct Server {
    config: Config,
    state: Option<ServerState>,
}

impl Server {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            state: None,
        }
    }

    /// Create server with existing state
    pub fn with_state(config: Config, state: ServerState) -> Self {
        Self {
            config,
            state: Some(state),
        }
    }

    pub async fn run(&self) -> Result<()> {
        let state = match &self.state {
            Some(s) => s.clone(),
            None => ServerState::initialize(&self.config).await?,
        };

        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.http_port));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        tracing::info!("Dispatch server listening on {}", addr);

        let app = build_app(state.clone());
        let shutdown = state.shutdown.clone();
        let grace = self.config.shutdown_timeout();

        let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down...");
            // Open WebSocket sessions watch this token and close themselves
            shutdown.cancel();
        })
        .into_future();

        let token = state.shutdown.clone();
        tokio::select! {
            result = serve => {
                result.map_err(|e| ServerError::Internal(e.into()))?;
            }
            _ = async {
                token.cancelled().await;
                tokio::time::sleep(grace).await;
            } => {
                tracing::warn!("Graceful shutdown exceeded {:?}, exiting", grace);
            }
        }

        tracing::info!("Server stopped");
        Ok(())
    }
}
