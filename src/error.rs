//! # Error Types
//!
//! Error handling for the RCON client core.
//!
//! Every failure the primary session can hit is a distinct variant so callers
//! can decide their own retry or abort policy. Nothing in this crate retries.
//!
//! ## Error Categories
//! - **Connection Errors**: connect timeouts, refused or unreachable endpoints
//! - **Transport Errors**: read/write timeouts, peer closure, raw I/O failures
//! - **Framing Errors**: bad terminators, truncated or oversized frames, unknown kinds
//! - **Session Errors**: rejected credentials, commands before authentication,
//!   unexpected response kinds
//! - **Configuration Errors**: invalid or unreadable configuration
//!
//! The secondary (Evrima) dialect does not use this type at its API boundary;
//! see [`crate::protocol::evrima`].
//!
//! ## Example Usage
//! ```rust,no_run
//! use gamercon::error::ProtocolError;
//! use std::time::Duration;
//! use tracing::{error, info};
//!
//! # async fn run() {
//! match gamercon::connect("127.0.0.1", 27015, "secret", Duration::from_secs(5)).await {
//!     Ok(mut client) => {
//!         if let Ok(players) = client.execute("ListPlayers").await {
//!             info!(%players, "Players online");
//!         }
//!         client.close().await;
//!     }
//!     Err(ProtocolError::InvalidCredential) => error!("Wrong RCON password"),
//!     Err(e) if e.is_timeout() => error!(error = %e, "Server did not answer in time"),
//!     Err(e) => error!(error = %e, "RCON connection failed"),
//! }
//! # }
//! ```

use crate::core::packet::PacketKind;
use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Framing errors
    pub const ERR_BAD_TERMINATOR: &str = "Packet terminator is not two null bytes";
    pub const ERR_SHORT_BODY: &str = "Frame body shorter than the 10-byte minimum";
    pub const ERR_NEGATIVE_LENGTH: &str = "Negative frame length prefix";
    pub const ERR_LENGTH_MISMATCH: &str = "Length prefix does not match frame size";
    pub const ERR_TRUNCATED_FRAME: &str = "Peer closed the connection mid-frame";

    /// Connection errors
    pub const ERR_NOT_CONNECTED: &str = "Not connected";
}

/// Primary error type for all RCON operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Connection attempt timed out")]
    ConnectTimeout,

    #[error("Error connecting to {endpoint}: {source}")]
    ConnectError {
        endpoint: String,
        #[source]
        source: io::Error,
    },

    #[error("Read timed out")]
    ReadTimeout,

    #[error("Write timed out")]
    WriteTimeout,

    #[error("Peer closed the connection without responding")]
    EmptyResponse,

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Framing error: {0}")]
    FramingError(String),

    #[error("Unknown packet kind: {0}")]
    UnknownPacketKind(i32),

    #[error("Incorrect password")]
    InvalidCredential,

    #[error("Client not authenticated")]
    NotAuthenticated,

    #[error("Unexpected response kind: expected {expected:?}, got {actual:?}")]
    UnexpectedResponseKind {
        expected: PacketKind,
        actual: PacketKind,
    },

    #[error("Packet too large: {0} bytes")]
    OversizedPacket(usize),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ProtocolError {
    /// True for the three timeout variants (connect, read, write)
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            ProtocolError::ConnectTimeout | ProtocolError::ReadTimeout | ProtocolError::WriteTimeout
        )
    }

    /// True when the underlying connection can no longer be trusted.
    ///
    /// A session that hits one of these errors has already released its socket.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ProtocolError::ConnectTimeout
                | ProtocolError::ConnectError { .. }
                | ProtocolError::ReadTimeout
                | ProtocolError::WriteTimeout
                | ProtocolError::EmptyResponse
                | ProtocolError::ConnectionClosed
                | ProtocolError::FramingError(_)
                | ProtocolError::Io(_)
        )
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
