//! TCP transport: binds the listener and spawns one task per connection.

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::connection::handle_connection;
use crate::identity::NamePool;
use crate::shared::SharedCoordinator;

/// Transport error types
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Failed to bind socket to {0}: {1}")]
    BindFailed(SocketAddr, std::io::Error),

    #[error("Failed to determine bound address: {0}")]
    LocalAddrFailed(std::io::Error),
}

/// Listening server sharing one coordinator across all connections
pub struct Server {
    listener: TcpListener,
    coordinator: SharedCoordinator,
}

impl Server {
    /// Bind `config.bind_address` with a freshly shuffled name pool.
    pub async fn bind(config: ServerConfig) -> Result<Self, TransportError> {
        let address = config.bind_address;
        let coordinator = SharedCoordinator::new(config, NamePool::default());
        Self::bind_with(address, coordinator).await
    }

    pub async fn bind_with(
        address: SocketAddr,
        coordinator: SharedCoordinator,
    ) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(address)
            .await
            .map_err(|e| TransportError::BindFailed(address, e))?;

        Ok(Self {
            listener,
            coordinator,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.listener
            .local_addr()
            .map_err(TransportError::LocalAddrFailed)
    }

    pub fn coordinator(&self) -> SharedCoordinator {
        self.coordinator.clone()
    }

    /// Accept connections forever.
    pub async fn run(self) -> Result<(), TransportError> {
        info!(address = %self.local_addr()?, "Listening");

        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    if let Err(err) = stream.set_nodelay(true) {
                        warn!(%peer, error = %err, "Failed to set TCP_NODELAY");
                    }
                    tokio::spawn(handle_connection(stream, peer.ip(), self.coordinator.clone()));
                }
                Err(err) => {
                    // Per-connection failures (reset before accept, fd limits)
                    // must not stop the listener.
                    warn!(error = %err, "Accept failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn binds_ephemeral_port() {
        let config = ServerConfig {
            bind_address: "127.0.0.1:0".parse().unwrap(),
            ..Default::default()
        };

        match Server::bind(config).await {
            Ok(server) => assert_ne!(server.local_addr().unwrap().port(), 0),
            Err(TransportError::BindFailed(_, err))
                if err.kind() == std::io::ErrorKind::PermissionDenied =>
            {
                // Some sandboxed environments disallow socket binds.
            }
            Err(err) => panic!("transport error: {err:?}"),
        }
    }

    #[tokio::test]
    async fn bind_conflict_is_reported() {
        let first = match TcpListener::bind("127.0.0.1:0").await {
            Ok(listener) => listener,
            Err(_) => return,
        };
        let taken = first.local_addr().unwrap();
        let coordinator = SharedCoordinator::new(ServerConfig::default(), NamePool::default());

        let result = Server::bind_with(taken, coordinator).await;
        assert!(matches!(result, Err(TransportError::BindFailed(addr, _)) if addr == taken));
    }
}
