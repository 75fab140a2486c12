use std::sync::Arc;

use paperchat_common::Result;
use paperchat_config::AppConfig;
use tokio::net::TcpListener;
use tracing::info;

use crate::bootstrap;
use crate::router::build_router;

/// The main server that binds to a port and serves the HTTP API.
pub struct GatewayServer {
    config: AppConfig,
}

impl GatewayServer {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub async fn run(self) -> Result<()> {
        let addr = format!("{}:{}", self.config.gateway.host, self.config.gateway.port);

        let state = Arc::new(bootstrap::build_state(self.config)?);
        let app = build_router(state);

        let listener = TcpListener::bind(&addr).await?;
        info!("paperchat gateway listening on {addr}");

        axum::serve(listener, app)
            .await
            .map_err(|e| paperchat_common::Error::Gateway(format!("server error: {e}")))?;

        Ok(())
    }
}
