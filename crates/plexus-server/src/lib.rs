//! Server assembly for the Plexus gateway
//!
//! Builds the axum application from configuration: gateway routes, the
//! health endpoint, request-context middleware, and request tracing; runs
//! it with graceful shutdown.

mod health;
mod request_context;

use std::net::SocketAddr;

use axum::Router;
use plexus_config::Config;
use plexus_llm::GatewayState;
use tower_http::trace::TraceLayer;

/// Assembled server: routes, middleware, listen address
pub struct Server {
    router: Router,
    listen_address: SocketAddr,
    state: GatewayState,
}

impl Server {
    /// Build the server from configuration
    ///
    /// # Errors
    ///
    /// Returns an error when gateway state construction fails, which means
    /// the configuration is inconsistent.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let listen_address = config
            .server
            .listen_address
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

        let state = GatewayState::from_config(config)?;

        let router = Router::new()
            .merge(plexus_llm::gateway_router(state.clone()))
            .route(&config.server.health_path, axum::routing::get(health::health_handler))
            // Request context runs just before the handlers
            .layer(axum::middleware::from_fn(request_context::request_context_middleware))
            .layer(TraceLayer::new_for_http());

        Ok(Self {
            router,
            listen_address,
            state,
        })
    }

    /// Configured listen address
    #[must_use]
    pub const fn listen_address(&self) -> SocketAddr {
        self.listen_address
    }

    /// Shared gateway state, for embedded use and ledger consumers
    pub fn state(&self) -> &GatewayState {
        &self.state
    }

    /// Consume the server and return the inner router
    ///
    /// Useful for tests that manage their own listener.
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Serve until the cancellation token fires
    ///
    /// # Errors
    ///
    /// Returns an error if binding the listener or serving fails.
    pub async fn serve(self, shutdown: tokio_util::sync::CancellationToken) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.listen_address).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(%local_addr, "gateway listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                tracing::info!("graceful shutdown initiated");
            })
            .await?;

        Ok(())
    }
}
