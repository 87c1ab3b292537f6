//! Connection Handler Module
//!
//! This module handles individual client connections to jsonkv.
//! Each client gets its own handler task that runs in a loop,
//! reading lines and sending one reply per line.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Client connects (TCP handshake)
//!        │
//!        ▼
//! 2. ConnectionHandler spawned, sends AUTH_REQUIRED
//!        │
//!        ▼
//! 3. ┌──────────────────────────────┐
//!    │      Main Loop               │
//!    │                              │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Read bytes from socket  │ │
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Split off complete line │ │
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ AUTH gate / execute     │ │
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Send one-line reply     │ │
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │         [Loop back]          │
//!    └──────────────────────────────┘
//!        │
//!        ▼
//! 4. End of stream / transport error
//!        │
//!        ▼
//! 5. Session closed, handler task ends
//! ```
//!
//! Malformed commands never end the loop; they get an `ERROR` reply.
//! Blank lines are ignored without a reply.

use crate::commands::CommandHandler;
use crate::connection::session::{Session, SessionState};
use crate::protocol::{parse_command, Reply};
use bytes::BytesMut;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::{debug, info, trace, warn};

/// Maximum length of a single command line (8 MiB)
pub const MAX_LINE_LENGTH: usize = 8 * 1024 * 1024;

/// Initial buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total commands processed (authenticated and unauthenticated)
    pub commands_processed: AtomicU64,
    /// Total `AUTH` attempts with a wrong password
    pub auth_failures: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a new connection and returns its id.
    pub fn connection_opened(&self) -> u64 {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
        self.connections_accepted.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn active(&self) -> u64 {
        self.active_connections.load(Ordering::Relaxed)
    }

    pub fn command_processed(&self) {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn auth_failed(&self) {
        self.auth_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written
            .fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Handles a single client connection.
///
/// Generic over the stream so the same state machine drives TCP sockets and
/// in-memory test streams.
pub struct ConnectionHandler<S> {
    /// The stream for this connection
    stream: BufWriter<S>,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// Buffer for incoming data
    buffer: BytesMut,

    /// Authentication state
    session: Session,

    /// Password every session must present
    password: Arc<str>,

    /// The command handler (shared engine)
    command_handler: CommandHandler,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,
}

impl<S> ConnectionHandler<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new connection handler.
    ///
    /// # Arguments
    ///
    /// * `stream` - The stream for this connection
    /// * `addr` - The client's socket address
    /// * `password` - The server password
    /// * `command_handler` - The command handler for executing commands
    /// * `stats` - Shared connection statistics
    pub fn new(
        stream: S,
        addr: SocketAddr,
        password: Arc<str>,
        command_handler: CommandHandler,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        let id = stats.connection_opened();

        Self {
            stream: BufWriter::new(stream),
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            session: Session::new(id),
            password,
            command_handler,
            stats,
        }
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Runs the connection until the client disconnects or an error occurs.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, id = self.session.id(), "Client connected");

        let result = self.main_loop().await;
        self.session.close();

        match &result {
            Ok(()) => info!(client = %self.addr, "Client disconnected gracefully"),
            Err(e) => match e {
                ConnectionError::ClientDisconnected => {
                    debug!(client = %self.addr, "Client disconnected")
                }
                ConnectionError::IoError(io_err)
                    if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
                {
                    debug!(client = %self.addr, "Connection reset by client")
                }
                _ => warn!(client = %self.addr, error = %e, "Connection error"),
            },
        }

        self.stats.connection_closed();
        result
    }

    /// The main read-execute-respond loop.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        self.send_reply(&Reply::AuthRequired).await?;

        loop {
            while let Some(line) = self.next_line()? {
                if let Some(reply) = self.process_line(&line) {
                    self.send_reply(&reply).await?;
                }
            }

            // Need more data - read from the socket
            self.read_more_data().await?;
        }
    }

    /// Splits the next complete line off the buffer, without its terminator.
    fn next_line(&mut self) -> Result<Option<String>, ConnectionError> {
        match self.buffer.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                let raw = self.buffer.split_to(pos + 1);
                let line = String::from_utf8_lossy(&raw[..pos]);
                Ok(Some(line.trim_end_matches('\r').to_string()))
            }
            None if self.buffer.len() >= MAX_LINE_LENGTH => {
                warn!(
                    client = %self.addr,
                    size = self.buffer.len(),
                    "Line length limit exceeded"
                );
                Err(ConnectionError::LineTooLong)
            }
            None => Ok(None),
        }
    }

    /// Handles one line and returns the reply to send, if any.
    fn process_line(&mut self, line: &str) -> Option<Reply> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        self.session.touch();
        self.stats.command_processed();
        trace!(client = %self.addr, line = %line, "Received line");

        if !self.session.is_authenticated() {
            let failed_before = self.session.failed_attempts();
            let result = self.session.authenticate(line, &self.password);
            if self.session.failed_attempts() > failed_before {
                self.stats.auth_failed();
            }

            return Some(match result {
                Ok(()) => {
                    info!(client = %self.addr, id = self.session.id(), "Client authenticated");
                    Reply::ok()
                }
                Err(e) => {
                    warn!(client = %self.addr, error = %e, "Rejected unauthenticated command");
                    Reply::error(e)
                }
            });
        }

        Some(match parse_command(line) {
            Ok(command) => self.command_handler.execute(command),
            Err(e) => {
                debug!(client = %self.addr, error = %e, "Invalid command");
                Reply::error(e)
            }
        })
    }

    /// Reads more data from the socket into the buffer.
    async fn read_more_data(&mut self) -> Result<(), ConnectionError> {
        // Ensure we have some capacity
        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(4096);
        }

        let n = self.stream.get_mut().read_buf(&mut self.buffer).await?;

        if n == 0 {
            // Connection closed by client
            if self.buffer.is_empty() {
                return Err(ConnectionError::ClientDisconnected);
            } else {
                // Unterminated line in buffer
                return Err(ConnectionError::UnexpectedEof);
            }
        }

        self.stats.bytes_read(n);
        trace!(client = %self.addr, bytes = n, "Read data");

        Ok(())
    }

    /// Sends a reply to the client.
    async fn send_reply(&mut self, reply: &Reply) -> Result<(), ConnectionError> {
        let bytes = reply.serialize();
        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;
        self.stats.bytes_written(bytes.len());
        trace!(
            client = %self.addr,
            bytes = bytes.len(),
            "Sent reply"
        );
        Ok(())
    }
}

/// Errors that end a connection.
///
/// Only transport-level failures appear here; protocol errors are replied to
/// with an `ERROR` line.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Client disconnected normally
    #[error("Client disconnected")]
    ClientDisconnected,

    /// Stream ended in the middle of a line
    #[error("Unexpected end of stream")]
    UnexpectedEof,

    /// A line exceeded [`MAX_LINE_LENGTH`]
    #[error("Line length limit exceeded")]
    LineTooLong,
}

/// Handles a client connection.
///
/// This is a convenience function that creates a ConnectionHandler
/// and runs it to completion.
pub async fn handle_connection<S>(
    stream: S,
    addr: SocketAddr,
    password: Arc<str>,
    command_handler: CommandHandler,
    stats: Arc<ConnectionStats>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let handler = ConnectionHandler::new(stream, addr, password, command_handler, stats);
    if let Err(e) = handler.run().await {
        match e {
            ConnectionError::ClientDisconnected => {}
            ConnectionError::IoError(ref io_err)
                if io_err.kind() == std::io::ErrorKind::ConnectionReset => {}
            _ => {
                debug!(client = %addr, error = %e, "Connection ended with error");
            }
        }
    }
}
