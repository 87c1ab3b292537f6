//! TCP Server
//!
//! Binds the listener and runs the accept loop. Each accepted socket is
//! handed to its own [`handle_connection`] task; the loop itself never waits
//! on a client.
//!
//! Shutdown is driven by a caller-supplied future. When it resolves the
//! listener is dropped and the accept loop ends, but connection tasks that
//! are already running are left to finish on their own.

use crate::commands::CommandHandler;
use crate::connection::{handle_connection, ConnectionStats};
use crate::storage::Engine;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, ToSocketAddrs};
use tracing::{error, info, warn};

const ACCEPT_BACKOFF_BASE: Duration = Duration::from_millis(10);
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// A bound, not yet running, server.
pub struct Server {
    listener: TcpListener,
    engine: Arc<Engine>,
    password: Arc<str>,
    stats: Arc<ConnectionStats>,
    max_connections: Option<u64>,
}

impl Server {
    /// Binds a listener on `addr`.
    pub async fn bind(
        addr: impl ToSocketAddrs,
        engine: Arc<Engine>,
        password: impl Into<Arc<str>>,
    ) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;

        Ok(Self {
            listener,
            engine,
            password: password.into(),
            stats: Arc::new(ConnectionStats::new()),
            max_connections: None,
        })
    }

    /// Sets the advisory connection limit. Exceeding it only logs a warning.
    pub fn with_max_connections(mut self, max: Option<u64>) -> Self {
        self.max_connections = max;
        self
    }

    /// The address actually bound (useful with port 0).
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Shared connection statistics.
    pub fn stats(&self) -> Arc<ConnectionStats> {
        Arc::clone(&self.stats)
    }

    /// Accepts connections until `shutdown` resolves.
    pub async fn run(self, shutdown: impl Future<Output = ()>) {
        if let Ok(addr) = self.local_addr() {
            info!(addr = %addr, "Listening");
        }

        tokio::select! {
            _ = self.accept_loop() => {}
            _ = shutdown => {
                info!("Shutdown requested, closing listener");
            }
        }
    }

    /// Main loop that accepts incoming connections
    async fn accept_loop(&self) {
        let mut consecutive_errors = 0u32;

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    consecutive_errors = 0;

                    if let Some(max) = self.max_connections {
                        let active = self.stats.active();
                        if active >= max {
                            warn!(
                                client = %addr,
                                active,
                                max,
                                "Connection limit exceeded, accepting anyway"
                            );
                        }
                    }

                    // Create a command handler for this connection
                    let handler = CommandHandler::new(Arc::clone(&self.engine));
                    let password = Arc::clone(&self.password);
                    let stats = Arc::clone(&self.stats);

                    // Spawn a task to handle this connection
                    tokio::spawn(async move {
                        handle_connection(stream, addr, password, handler, stats).await;
                    });
                }
                Err(e) => {
                    consecutive_errors = consecutive_errors.saturating_add(1);
                    let delay = accept_backoff(consecutive_errors);
                    error!(
                        error = %e,
                        retry_in_ms = delay.as_millis() as u64,
                        "Failed to accept connection"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Delay before retrying after `errors` consecutive accept failures.
///
/// Doubles from 10ms and caps at 1s, so a persistent failure such as running
/// out of file descriptors does not spin the loop.
fn accept_backoff(errors: u32) -> Duration {
    let exp = errors.saturating_sub(1).min(7);
    (ACCEPT_BACKOFF_BASE * 2u32.pow(exp)).min(ACCEPT_BACKOFF_MAX)
}
