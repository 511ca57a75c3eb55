//! Drive Session I/O
//!
//! A [`Session`] owns one TCP connection to one drive, the read buffer that
//! feeds its correlator, and the identity the drive announced on connect.
//!
//! ## Session Lifecycle
//!
//! ```text
//! 1. TCP connect (nodelay + keep-alive)
//!        │
//!        ▼
//! 2. Await the drive's unsolicited handshake PDU
//!    (connection_id, cluster_version)
//!        │
//!        ▼
//! 3. ┌──────────────────────────────┐
//!    │   exchange() per request     │
//!    │                              │
//!    │  write frame                 │
//!    │      │                       │
//!    │      ▼                       │
//!    │  read ─> correlator.advance  │
//!    │      ▲          │            │
//!    │      └── None ──┘            │
//!    │                 │ Resolved   │
//!    │                 ▼            │
//!    │          return to caller    │
//!    └──────────────────────────────┘
//!        │
//!        ▼
//! 4. Dropped on replacement or teardown
//! ```
//!
//! ## Buffer Management
//!
//! Socket reads land in a `BytesMut`. The correlator splits consumed bytes
//! off the front, so the buffer only ever holds one partially received
//! header + message, or the current slice of a GET value.

use crate::connection::correlator::{Correlator, Event, Phase, Resolution};
use crate::error::{KineticError, Result};
use crate::protocol::{OpKind, ParseError, Pdu, HEADER_SIZE, MAX_MESSAGE_SIZE};
use crate::session::{Drive, SessionState};
use bytes::{Bytes, BytesMut};
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, error, info, trace, warn};

/// Bytes requested from the socket per read
const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Initial buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Largest amount of unconsumed data a session will buffer
const MAX_BUFFER_SIZE: usize = HEADER_SIZE + MAX_MESSAGE_SIZE + READ_CHUNK_SIZE;

/// Statistics shared by every session of a client
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Sessions that completed a handshake
    pub connections_opened: AtomicU64,
    /// Sessions currently alive
    pub active_connections: AtomicU64,
    /// Sessions replaced on sequence exhaustion or timeout
    pub replacements: AtomicU64,
    /// Requests written
    pub requests_sent: AtomicU64,
    /// Requests resolved by a response
    pub responses_received: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn session_replaced(&self) {
        self.replacements.fetch_add(1, Ordering::Relaxed);
    }

    pub fn request_sent(&self, bytes: usize) {
        self.requests_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_written
            .fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn response_received(&self) {
        self.responses_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// A live, handshaken connection to one drive.
pub struct Session<S = TcpStream> {
    state: SessionState,
    stream: S,
    buffer: BytesMut,
    correlator: Correlator,
    stats: Arc<ConnectionStats>,
}

impl Session<TcpStream> {
    /// Connects to `drive` and waits for its handshake.
    ///
    /// Connect and handshake together are bounded by `connect_timeout`.
    pub async fn open(
        drive: &Drive,
        connect_timeout: Duration,
        stats: Arc<ConnectionStats>,
    ) -> Result<Self> {
        let address = drive.address();
        debug!(drive = %drive, "Connecting");

        let connect = async {
            let stream = TcpStream::connect(&address).await?;
            configure_socket(&stream)?;
            Session::handshake(drive.clone(), stream, stats).await
        };

        match tokio::time::timeout(connect_timeout, connect).await {
            Ok(result) => result,
            Err(_) => {
                warn!(drive = %drive, timeout = ?connect_timeout, "Connect timed out");
                Err(KineticError::Timeout(connect_timeout))
            }
        }
    }
}

/// Disables Nagle's algorithm and turns on TCP keep-alive.
fn configure_socket(stream: &TcpStream) -> io::Result<()> {
    stream.set_nodelay(true)?;
    socket2::SockRef::from(stream).set_keepalive(true)?;
    Ok(())
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Reads the drive's unsolicited handshake from `stream` and builds a
    /// ready session from it.
    pub async fn handshake(drive: Drive, mut stream: S, stats: Arc<ConnectionStats>) -> Result<Self> {
        let mut buffer = BytesMut::with_capacity(INITIAL_BUFFER_SIZE);
        let mut correlator = Correlator::new();

        let pdu = loop {
            match correlator.advance(&mut buffer)? {
                Some(Event::Unsolicited(pdu)) => break pdu,
                // Nothing is pending, so the correlator cannot resolve anything.
                Some(Event::Resolved(_)) => {
                    return Err(KineticError::UnexpectedResponse {
                        expected: None,
                        received: None,
                    })
                }
                None => {}
            }

            let n = fill_buffer(&mut stream, &mut buffer).await?;
            if n == 0 {
                return Err(correlator.on_eof());
            }
            stats.bytes_read(n);
        };

        pdu.outcome()?;
        stats.connection_opened();

        let state = SessionState::from_handshake(drive, pdu.connection_id, pdu.cluster_version);
        info!(
            drive = %state.drive,
            connection_id = state.connection_id,
            cluster_version = state.cluster_version,
            "Session ready"
        );

        Ok(Self {
            state,
            stream,
            buffer,
            correlator,
            stats,
        })
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut SessionState {
        &mut self.state
    }

    /// Phase of the request/response correlator.
    pub fn phase(&self) -> Phase {
        self.correlator.phase()
    }

    /// Announced length of a GET value currently being received.
    pub fn pending_chunk_size(&self) -> Option<u64> {
        self.correlator.pending_chunk_size()
    }

    /// Writes one request frame and waits for the response that answers it.
    ///
    /// Unsolicited status PDUs arriving in between are logged and skipped.
    pub async fn exchange(&mut self, kind: OpKind, frame: Bytes) -> Result<Resolution> {
        self.correlator.begin(kind)?;
        self.send(&frame).await?;

        loop {
            while let Some(event) = self.correlator.advance(&mut self.buffer)? {
                match event {
                    Event::Unsolicited(pdu) => self.note_unsolicited(&pdu),
                    Event::Resolved(result) => {
                        self.stats.response_received();
                        trace!(
                            drive = %self.state.drive,
                            op = %kind,
                            ok = result.is_ok(),
                            "Request resolved"
                        );
                        return result;
                    }
                }
            }

            self.read_more().await?;
        }
    }

    fn note_unsolicited(&self, pdu: &Pdu) {
        if pdu.connection_id != 0 && pdu.connection_id != self.state.connection_id {
            warn!(
                drive = %self.state.drive,
                announced = pdu.connection_id,
                current = self.state.connection_id,
                "Unsolicited status carries a different connection ID"
            );
        }
        match pdu.outcome() {
            Ok(()) => debug!(drive = %self.state.drive, "Unsolicited status"),
            Err(e) => warn!(drive = %self.state.drive, error = %e, "Drive reported unsolicited status"),
        }
    }

    /// Reads more data from the socket into the buffer.
    async fn read_more(&mut self) -> Result<()> {
        if self.buffer.len() >= MAX_BUFFER_SIZE {
            error!(
                drive = %self.state.drive,
                size = self.buffer.len(),
                "Buffer size limit exceeded"
            );
            return Err(ParseError::MessageTooLarge {
                size: self.buffer.len(),
                max: MAX_BUFFER_SIZE,
            }
            .into());
        }

        let n = fill_buffer(&mut self.stream, &mut self.buffer).await?;
        if n == 0 {
            debug!(drive = %self.state.drive, phase = ?self.correlator.phase(), "Drive closed the connection");
            return Err(self.correlator.on_eof());
        }

        self.stats.bytes_read(n);
        trace!(drive = %self.state.drive, bytes = n, "Read data");
        Ok(())
    }

    /// Writes a complete frame to the drive.
    async fn send(&mut self, frame: &[u8]) -> Result<()> {
        self.stream.write_all(frame).await?;
        self.stream.flush().await?;
        self.stats.request_sent(frame.len());
        trace!(drive = %self.state.drive, bytes = frame.len(), "Sent request");
        Ok(())
    }
}

impl<S> Drop for Session<S> {
    fn drop(&mut self) {
        self.stats.connection_closed();
        debug!(
            drive = %self.state.drive,
            connection_id = self.state.connection_id,
            "Session closed"
        );
    }
}

async fn fill_buffer<S>(stream: &mut S, buffer: &mut BytesMut) -> io::Result<usize>
where
    S: AsyncRead + Unpin,
{
    if buffer.capacity() - buffer.len() < 1024 {
        buffer.reserve(READ_CHUNK_SIZE);
    }
    stream.read_buf(buffer).await
}
