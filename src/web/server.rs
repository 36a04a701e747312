use crate::config::Config;
use crate::error::{Error, Result};
use crate::web::api::{self, ApiState};
use crate::web::relay::{self, RelayForwarder};
use log::{error, info};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use warp::Filter;

pub struct WebServer {
    relay: Arc<RelayForwarder>,
    state: ApiState,
    max_body_bytes: u64,
}

impl WebServer {
    pub fn new(relay: Arc<RelayForwarder>, state: ApiState, max_body_bytes: u64) -> Self {
        Self {
            relay,
            state,
            max_body_bytes,
        }
    }

    pub fn from_config(config: &Config, state: ApiState) -> Result<Self> {
        let relay = RelayForwarder::from_config(&config.relay)?;
        Ok(Self::new(Arc::new(relay), state, config.server.max_body_bytes))
    }

    pub fn routes(
        &self,
    ) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
        relay::notify_route(self.relay.clone(), self.max_body_bytes)
            .or(api::routes(self.state.clone()))
            .unify()
            .with(warp::log("tvlp::web"))
    }

    /// Binds `addr` (port 0 picks a free one) and returns the bound address
    /// with the future that serves until `shutdown` resolves.
    pub fn bind(
        &self,
        addr: SocketAddr,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(SocketAddr, impl Future<Output = ()>)> {
        let (bound, server) = warp::serve(self.routes())
            .try_bind_with_graceful_shutdown(addr, shutdown)
            .map_err(|e| Error::InternalError(format!("Failed to bind {}: {}", addr, e)))?;
        info!("Listening on http://{}", bound);
        Ok((bound, server))
    }

    pub async fn start(&self, host: &str, port: u16) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .map_err(|e| Error::ConfigError(format!("Invalid listen address {}:{}: {}", host, port, e)))?;
        let (_, server) = self.bind(addr, shutdown_signal())?;
        server.await;
        Ok(())
    }
}

/// Resolves on ctrl-c. Never resolves when the signal handler cannot be installed.
async fn shutdown_signal() {
    wait_for_shutdown(tokio::signal::ctrl_c()).await
}

async fn wait_for_shutdown<F>(signal: F)
where
    F: Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => info!("Shutting down web server"),
        Err(e) => {
            error!("Failed to listen for ctrl-c, serving until the process is killed: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_signal_error_keeps_serving() {
        let failed = wait_for_shutdown(async {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "no signal handler"))
        });
        let waited = tokio::time::timeout(Duration::from_millis(50), failed).await;
        assert!(waited.is_err(), "shutdown must not resolve on a signal error");

        let received = wait_for_shutdown(async { Ok(()) });
        assert!(tokio::time::timeout(Duration::from_millis(50), received).await.is_ok());
    }
}
