use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use nestexec_frame::FrameConfig;
use nestexec_transport::TcpTransport;
use tracing::{debug, info, warn};

use crate::dispatcher::handle_connection;
use crate::error::Result;
use crate::registry::Registry;
use crate::spawner::OsSpawner;

/// Fixed listen address of `nestexec serve`.
pub const DEFAULT_ADDR: &str = "0.0.0.0:8888";

/// Size of each read from a child's stdout or stderr.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 1024;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address. Default: `0.0.0.0:8888`.
    pub addr: String,
    /// Bytes per read from output pipes. Default: 1024.
    pub read_chunk_size: usize,
    pub frame: FrameConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            frame: FrameConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Default configuration listening on `addr`.
    pub fn with_addr(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            ..Self::default()
        }
    }
}

/// Accepts connections and serves each on its own thread.
pub struct Server {
    transport: TcpTransport,
    registry: Arc<Registry>,
    config: ServerConfig,
    next_conn_id: AtomicU64,
}

impl Server {
    /// Bind with a fresh registry that spawns real processes.
    pub fn bind(config: ServerConfig) -> Result<Self> {
        Self::with_registry(config, Arc::new(Registry::new(OsSpawner::new())))
    }

    /// Bind serving an existing registry.
    pub fn with_registry(config: ServerConfig, registry: Arc<Registry>) -> Result<Self> {
        let transport = TcpTransport::bind(config.addr.as_str())?;
        info!(addr = %transport.local_addr(), "nestexec server listening");
        Ok(Self {
            transport,
            registry,
            config,
            next_conn_id: AtomicU64::new(1),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Run the accept loop on the calling thread.
    ///
    /// Accept failures are logged and the loop keeps going.
    pub fn serve(self) -> Result<()> {
        loop {
            let stream = match self.transport.accept() {
                Ok(stream) => stream,
                Err(err) => {
                    warn!(error = %err, "accept failed");
                    continue;
                }
            };

            let conn_id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
            let peer = stream.peer_addr().ok();
            debug!(conn_id, ?peer, "connection accepted");

            let registry = Arc::clone(&self.registry);
            let frame_config = self.config.frame.clone();
            let read_chunk_size = self.config.read_chunk_size;
            let spawned = thread::Builder::new()
                .name(format!("nestexec-conn-{conn_id}"))
                .spawn(move || {
                    if let Err(err) =
                        handle_connection(&registry, stream, &frame_config, read_chunk_size)
                    {
                        debug!(conn_id, error = %err, "connection ended with error");
                    }
                });
            if let Err(err) = spawned {
                warn!(conn_id, error = %err, "failed to start connection thread");
            }
        }
    }

    /// Run the accept loop on a background thread.
    pub fn spawn(self) -> Result<JoinHandle<Result<()>>> {
        let handle = thread::Builder::new()
            .name("nestexec-accept".to_string())
            .spawn(move || self.serve())?;
        Ok(handle)
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("addr", &self.local_addr())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.addr, "0.0.0.0:8888");
        assert_eq!(config.read_chunk_size, 1024);
        assert_eq!(ServerConfig::with_addr("127.0.0.1:0").read_chunk_size, 1024);
    }

    #[test]
    fn binds_ephemeral_port() {
        let server = Server::bind(ServerConfig::with_addr("127.0.0.1:0")).unwrap();
        assert_ne!(server.local_addr().port(), 0);
        assert!(server.registry().is_empty());
        assert_eq!(server.config().read_chunk_size, DEFAULT_READ_CHUNK_SIZE);
    }

    #[test]
    fn bind_conflict_is_error() {
        let first = Server::bind(ServerConfig::with_addr("127.0.0.1:0")).unwrap();
        let taken = first.local_addr().to_string();
        assert!(Server::bind(ServerConfig::with_addr(taken)).is_err());
    }
}
