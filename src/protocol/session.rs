//! Primary RCON session: connection, one-time authentication, command execution.
//!
//! ```text
//! Idle ──connect──▶ Connected ──handshake──▶ Authenticated ──close──▶ Closed
//!   └───────────── any unrecoverable error ─────────────▶ Failed ──close──▶ Closed
//! ```
//!
//! `Connected` is never observable from outside: [`RconClient::connect`]
//! either returns an authenticated session or fails. Every method that does
//! I/O takes `&mut self`, so at most one request is ever in flight.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::config::{Endpoint, RconConfig};
use crate::core::packet::{decode_length, Packet, PacketKind, LENGTH_PREFIX_SIZE};
use crate::error::{ProtocolError, Result};
use crate::protocol::request_id::{RandomIds, RequestIdSource};
use crate::transport::Transport;
use crate::utils::metrics::{Metrics, Timer};

/// Lifecycle state of an [`RconClient`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Configured, no connection attempted yet
    Idle,
    /// Transport open, handshake not finished
    Connected,
    /// Ready for commands
    Authenticated,
    /// Closed by the caller
    Closed,
    /// Hit an unrecoverable error; the connection has been released
    Failed,
}

/// Client for the primary RCON protocol
pub struct RconClient {
    config: RconConfig,
    endpoint: Endpoint,
    state: SessionState,
    transport: Option<Transport>,
    ids: Box<dyn RequestIdSource>,
    metrics: Option<Arc<Metrics>>,
    // Set while a request is on the wire; still set on entry means the
    // previous call was cancelled mid-exchange and the stream is out of sync.
    in_flight: bool,
}

impl fmt::Debug for RconClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RconClient")
            .field("endpoint", &self.endpoint)
            .field("state", &self.state)
            .field("timeout", &self.config.timeout)
            .finish_non_exhaustive()
    }
}

impl RconClient {
    /// Create a client from configuration. No I/O happens until [`connect`](Self::connect).
    pub fn new(config: RconConfig) -> Self {
        let endpoint = config.endpoint();
        Self {
            config,
            endpoint,
            state: SessionState::Idle,
            transport: None,
            ids: Box::new(RandomIds::new()),
            metrics: None,
            in_flight: false,
        }
    }

    /// Replace the request id generator
    pub fn with_request_ids<I>(mut self, ids: I) -> Self
    where
        I: RequestIdSource + 'static,
    {
        self.ids = Box::new(ids);
        self
    }

    /// Record connection and command activity into shared counters
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_authenticated(&self) -> bool {
        self.state == SessionState::Authenticated
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn timeout(&self) -> Duration {
        self.config.timeout
    }

    /// Open the connection and authenticate.
    ///
    /// On failure the connection is released and the client is left in
    /// [`SessionState::Failed`]. Calling this on an authenticated client is a no-op;
    /// a closed or failed client cannot reconnect.
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    pub async fn connect(&mut self) -> Result<()> {
        match self.state {
            SessionState::Authenticated => return Ok(()),
            SessionState::Idle => {}
            SessionState::Connected | SessionState::Closed | SessionState::Failed => {
                return Err(ProtocolError::ConnectionClosed)
            }
        }

        let transport = match Transport::open(&self.endpoint, self.config.timeout).await {
            Ok(transport) => transport,
            Err(e) => {
                if let Some(metrics) = &self.metrics {
                    metrics.connection_error();
                    if e.is_timeout() {
                        metrics.timeout();
                    }
                }
                warn!(error = %e, "Connection failed");
                self.state = SessionState::Failed;
                return Err(e);
            }
        };

        self.transport = Some(transport);
        self.state = SessionState::Connected;
        if let Some(metrics) = &self.metrics {
            metrics.connection_established();
            metrics.handshake_attempt();
        }

        match self.authenticate().await {
            Ok(()) => {
                if let Some(metrics) = &self.metrics {
                    metrics.handshake_success();
                }
                info!("Authenticated");
                Ok(())
            }
            Err(e) => {
                if let Some(metrics) = &self.metrics {
                    metrics.handshake_failed();
                }
                self.fail(&e).await;
                Err(e)
            }
        }
    }

    /// Send the credential once and check the reply for the rejection sentinel.
    ///
    /// Only `id == -1` is a rejected credential; every other failure keeps its own kind.
    async fn authenticate(&mut self) -> Result<()> {
        let request = Packet::auth(self.config.password.expose())?;
        let reply = self.round_trip(&request).await?;

        if reply.is_auth_failure() {
            return Err(ProtocolError::InvalidCredential);
        }

        debug!(kind = ?reply.kind(), id = reply.id(), "Handshake reply accepted");
        self.state = SessionState::Authenticated;
        Ok(())
    }

    /// Run a command and return its output as text.
    ///
    /// The configured [`CommandEncoding`](crate::protocol::encoding::CommandEncoding)
    /// is applied to the command and to the output. Invalid UTF-8 in the output
    /// is replaced with U+FFFD rather than failing.
    pub async fn execute(&mut self, command: &str) -> Result<String> {
        let encoding = self.config.encoding;
        let reply = self.execute_raw(&encoding.encode_command(command)).await?;
        Ok(encoding.decode_response(reply.into_payload()))
    }

    /// Send `command` as-is and return the decoded response packet.
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    pub async fn execute_raw(&mut self, command: &str) -> Result<Packet> {
        if self.state != SessionState::Authenticated {
            return Err(ProtocolError::NotAuthenticated);
        }
        if self.in_flight {
            let err = ProtocolError::ConnectionClosed;
            warn!("Previous request was cancelled mid-exchange");
            self.fail(&err).await;
            return Err(err);
        }

        let _timer = Timer::start("rcon_execute");
        let id = self.ids.next_id();
        let request = Packet::command(id, command)?;

        let reply = match self.round_trip(&request).await {
            Ok(reply) => reply,
            Err(e) => {
                self.fail(&e).await;
                return Err(e);
            }
        };

        if let Some(metrics) = &self.metrics {
            metrics.command_sent(request.frame_len() as u64);
            metrics.response_received(reply.frame_len() as u64);
        }

        if reply.is_auth_failure() {
            let err = ProtocolError::InvalidCredential;
            self.fail(&err).await;
            return Err(err);
        }

        if reply.kind() != PacketKind::ResponseValue {
            if let Some(metrics) = &self.metrics {
                metrics.protocol_error();
            }
            return Err(ProtocolError::UnexpectedResponseKind {
                expected: PacketKind::ResponseValue,
                actual: reply.kind(),
            });
        }

        if reply.id() != id {
            warn!(sent = id, received = reply.id(), "Response id does not echo request id");
        }

        debug!(id, bytes = reply.payload().len(), "Command completed");
        Ok(reply)
    }

    /// Close the connection. Safe to call any number of times.
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    pub async fn close(&mut self) {
        self.release().await;
        self.in_flight = false;
        if self.state != SessionState::Closed {
            debug!(previous = ?self.state, "Session closed");
            self.state = SessionState::Closed;
        }
    }

    /// Write one packet and read exactly one reply frame.
    async fn round_trip(&mut self, request: &Packet) -> Result<Packet> {
        let max_response_size = self.config.max_response_size;
        let transport = self
            .transport
            .as_mut()
            .ok_or(ProtocolError::ConnectionClosed)?;

        self.in_flight = true;
        transport.write_all(&request.to_bytes()).await?;

        let prefix = transport.read_exact(LENGTH_PREFIX_SIZE).await?;
        let body_len = decode_length(&prefix)?;
        if body_len > max_response_size {
            return Err(ProtocolError::OversizedPacket(body_len));
        }

        let body = transport.read_exact(body_len).await?;
        self.in_flight = false;

        Packet::from_body(&body, request.kind())
    }

    async fn fail(&mut self, error: &ProtocolError) {
        if let Some(metrics) = &self.metrics {
            if error.is_timeout() {
                metrics.timeout();
            } else if !matches!(error, ProtocolError::Io(_) | ProtocolError::ConnectionClosed) {
                metrics.protocol_error();
            }
        }
        warn!(error = %error, "Session failed, releasing connection");
        self.release().await;
        self.in_flight = false;
        self.state = SessionState::Failed;
    }

    async fn release(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.close().await;
            if let Some(metrics) = &self.metrics {
                metrics.connection_closed();
            }
        }
    }
}

impl Drop for RconClient {
    fn drop(&mut self) {
        // The socket itself is closed when the transport drops.
        if self.transport.is_some() {
            if let Some(metrics) = &self.metrics {
                metrics.connection_closed();
            }
        }
    }
}

/// Connect to `host:port` and authenticate with `password`.
///
/// `timeout` bounds the connect and every later read and write.
pub async fn connect(
    host: &str,
    port: u16,
    password: &str,
    timeout: Duration,
) -> Result<RconClient> {
    let config = RconConfig::new(host, port, password).with_timeout(timeout);
    let mut client = RconClient::new(config);
    client.connect().await?;
    Ok(client)
}
