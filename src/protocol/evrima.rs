//! Evrima RCON dialect.
//!
//! A stripped-down sibling of the primary protocol: the login frame is
//! `0x01 || password || 0x00` with no length prefix, success is signalled by
//! the word `Accepted` somewhere in the reply, and commands are raw bytes.
//!
//! Unlike [`RconClient`](crate::protocol::session::RconClient), this client
//! never returns `Err`. Every outcome, including failures, comes back as an
//! [`EvrimaStatus`] or [`EvrimaReply`] value whose `Display` output is the
//! status text callers show to users.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::config::{Endpoint, EvrimaConfig};
use crate::error::{constants, Result};
use crate::transport::Transport;
use crate::utils::metrics::Metrics;

/// First byte of the login frame
pub const LOGIN_TAG: u8 = 0x01;

/// Marker the server includes in its reply to a valid login
pub const ACCEPTED_MARKER: &[u8] = b"Accepted";

/// Outcome of [`EvrimaClient::connect`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvrimaStatus {
    Connected,
    /// Reply did not contain the acceptance marker, or the peer closed
    LoginFailed,
    TimedOut,
    SocketError(String),
}

impl EvrimaStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, EvrimaStatus::Connected)
    }
}

impl fmt::Display for EvrimaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvrimaStatus::Connected => f.write_str("Connected"),
            EvrimaStatus::LoginFailed => f.write_str("Login failed"),
            EvrimaStatus::TimedOut => f.write_str("Connection timed out"),
            EvrimaStatus::SocketError(msg) => write!(f, "Socket error: {msg}"),
        }
    }
}

/// Outcome of [`EvrimaClient::send`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvrimaReply {
    /// Server reply decoded as UTF-8
    Response(String),
    /// Description of what went wrong
    Error(String),
}

impl EvrimaReply {
    pub fn is_error(&self) -> bool {
        matches!(self, EvrimaReply::Error(_))
    }

    /// Reply text, if the exchange succeeded
    pub fn text(&self) -> Option<&str> {
        match self {
            EvrimaReply::Response(text) => Some(text),
            EvrimaReply::Error(_) => None,
        }
    }
}

impl fmt::Display for EvrimaReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvrimaReply::Response(text) => f.write_str(text),
            EvrimaReply::Error(msg) => write!(f, "Error sending command: {msg}"),
        }
    }
}

/// Build the login frame for `password`
pub fn login_frame(password: &str) -> Vec<u8> {
    let mut frame = Vec::with_capacity(password.len() + 2);
    frame.push(LOGIN_TAG);
    frame.extend_from_slice(password.as_bytes());
    frame.push(0x00);
    frame
}

/// True if `reply` contains the acceptance marker
pub fn is_accepted(reply: &[u8]) -> bool {
    reply
        .windows(ACCEPTED_MARKER.len())
        .any(|window| window == ACCEPTED_MARKER)
}

/// Client for the Evrima dialect
#[derive(Debug)]
pub struct EvrimaClient {
    config: EvrimaConfig,
    endpoint: Endpoint,
    transport: Option<Transport>,
    metrics: Option<Arc<Metrics>>,
}

impl EvrimaClient {
    pub fn new(config: EvrimaConfig) -> Self {
        let endpoint = config.endpoint();
        Self {
            config,
            endpoint,
            transport: None,
            metrics: None,
        }
    }

    /// Record connection and command activity into shared counters
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    /// Open the connection and log in. Any existing connection is closed first.
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    pub async fn connect(&mut self) -> EvrimaStatus {
        self.close().await;

        let result = self.login().await;
        if let Some(metrics) = &self.metrics {
            record_login(metrics, self.transport.is_some(), &result);
        }

        let status = match result {
            Ok(true) => EvrimaStatus::Connected,
            Ok(false) => EvrimaStatus::LoginFailed,
            Err(e) if e.is_timeout() => EvrimaStatus::TimedOut,
            Err(e) => EvrimaStatus::SocketError(e.to_string()),
        };

        if status.is_connected() {
            debug!("Evrima login accepted");
        } else {
            warn!(%status, "Evrima login did not succeed");
            self.close().await;
        }
        status
    }

    async fn login(&mut self) -> Result<bool> {
        let transport = Transport::open(&self.endpoint, self.config.timeout).await?;
        let transport = self.transport.insert(transport);

        transport
            .write_all(&login_frame(self.config.password.expose()))
            .await?;
        let reply = transport.read_some(self.config.read_buffer_size).await?;
        Ok(is_accepted(&reply))
    }

    /// Write `command` verbatim and return the reply text.
    ///
    /// Transport failures release the connection; a later `send` then reports
    /// that it is not connected. A peer that hangs up instead of replying
    /// yields an empty response and the connection is released the same way.
    #[instrument(skip_all, fields(endpoint = %self.endpoint, bytes = command.len()))]
    pub async fn send(&mut self, command: &[u8]) -> EvrimaReply {
        let transport = match self.transport.as_mut() {
            Some(transport) => transport,
            None => return EvrimaReply::Error(constants::ERR_NOT_CONNECTED.to_string()),
        };

        let exchanged = exchange(transport, command, self.config.read_buffer_size).await;
        let bytes = match exchanged {
            Ok(bytes) => bytes,
            Err(e) => {
                if let Some(metrics) = &self.metrics {
                    if e.is_timeout() {
                        metrics.timeout();
                    }
                }
                warn!(error = %e, "Evrima command failed, releasing connection");
                self.close().await;
                return EvrimaReply::Error(e.to_string());
            }
        };

        if let Some(metrics) = &self.metrics {
            metrics.command_sent(command.len() as u64);
            metrics.response_received(bytes.len() as u64);
        }

        if bytes.is_empty() {
            debug!("Peer closed after the command, releasing connection");
            self.close().await;
            return EvrimaReply::Response(String::new());
        }

        match String::from_utf8(bytes) {
            Ok(text) => EvrimaReply::Response(text),
            Err(e) => EvrimaReply::Error(e.to_string()),
        }
    }

    /// Close the connection. Safe to call any number of times.
    pub async fn close(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.close().await;
            if let Some(metrics) = &self.metrics {
                metrics.connection_closed();
            }
        }
    }
}

impl Drop for EvrimaClient {
    fn drop(&mut self) {
        if self.transport.is_some() {
            if let Some(metrics) = &self.metrics {
                metrics.connection_closed();
            }
        }
    }
}

/// `opened` is whether the socket was established before the outcome was known
fn record_login(metrics: &Metrics, opened: bool, result: &Result<bool>) {
    if opened {
        metrics.connection_established();
        metrics.handshake_attempt();
        match result {
            Ok(true) => metrics.handshake_success(),
            _ => metrics.handshake_failed(),
        }
    } else {
        metrics.connection_error();
    }
    if matches!(result, Err(e) if e.is_timeout()) {
        metrics.timeout();
    }
}

async fn exchange(transport: &mut Transport, command: &[u8], max: usize) -> Result<Vec<u8>> {
    transport.write_all(command).await?;
    transport.read_some(max).await
}
