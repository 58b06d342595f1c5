//! Test server wrapper that starts the gateway on a random port

use std::net::SocketAddr;

use plexus_config::Config;
use plexus_llm::GatewayState;
use plexus_server::Server;
use tokio_util::sync::CancellationToken;

/// A running gateway instance under test
pub struct TestServer {
    addr: SocketAddr,
    shutdown: CancellationToken,
    client: reqwest::Client,
    state: GatewayState,
}

impl TestServer {
    /// Start the gateway with the given configuration on an ephemeral port
    pub async fn start(config: Config) -> anyhow::Result<Self> {
        let server = Server::new(&config)?;
        let state = server.state().clone();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_task = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, server.into_router())
                .with_graceful_shutdown(async move {
                    shutdown_task.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self {
            addr,
            shutdown,
            client: reqwest::Client::new(),
            state,
        })
    }

    /// Absolute URL for a path on the running server
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// The HTTP client
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// The gateway state behind the server, for ledger assertions
    pub fn state(&self) -> &GatewayState {
        &self.state
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
