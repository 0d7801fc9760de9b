//! TCP listener and accept loop
//!
//! Binds the proxy port, accepts replica connections, and spawns one
//! detached session per replica. Sessions are fully independent; an error in
//! one never affects the listener or the others.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::filter::KeyFilter;
use crate::session::Session;

/// Keysieve proxy server
pub struct Server {
    /// Proxy configuration
    config: Config,

    /// Compiled key predicate, shared read-only by every session
    filter: Arc<KeyFilter>,

    /// TCP listener for replica connections
    listener: TcpListener,

    /// Shutdown signal sender
    shutdown_tx: broadcast::Sender<()>,
}

impl Server {
    /// Create a new server instance
    pub async fn new(config: Config) -> Result<Self> {
        let filter = Arc::new(KeyFilter::new(&config.filter.key_pattern)?);

        let addr = config.proxy_addr();
        let listener = TcpListener::bind(&addr).await?;

        info!("Waiting for replica connections on {}", addr);
        info!("Relaying replication from master at {}", config.master_addr());

        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            config,
            filter,
            listener,
            shutdown_tx,
        })
    }

    /// The address the listener actually bound (useful with port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Run the server until a shutdown signal is received
    pub async fn run(self) -> Result<()> {
        let shutdown_tx = self.shutdown_tx.clone();

        tokio::spawn(async move {
            if let Err(e) = signal::ctrl_c().await {
                error!("Failed to listen for ctrl-c: {}", e);
                return;
            }
            info!("Shutdown signal received");
            let _ = shutdown_tx.send(());
        });

        self.accept_loop().await
    }

    /// Accept connections in a loop
    async fn accept_loop(self) -> Result<()> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((slave, addr)) => {
                            info!("Replica connection from {}", addr);
                            self.spawn_session(slave, addr);
                        }
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Proxy shutting down");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Dial the master and run one session, detached.
    fn spawn_session(&self, slave: TcpStream, addr: SocketAddr) {
        let master_addr = self.config.master_addr();
        let filter = self.filter.clone();

        tokio::spawn(async move {
            let master = match TcpStream::connect(&master_addr).await {
                Ok(master) => master,
                Err(e) => {
                    // The replica connection drops here; it will retry and
                    // land back in the accept loop.
                    warn!("Failed to connect to master at {}: {}", master_addr, e);
                    return;
                }
            };

            Session::new(filter).run(slave, master).await;
            info!("Replica {} session ended", addr);
        });
    }
}
