//! # gamercon
//!
//! Async client core for RCON-style game server administration.
//!
//! Two dialects are supported:
//! - the length-prefixed binary RCON protocol ([`RconClient`]), where failures
//!   are distinct [`ProtocolError`] variants;
//! - the Evrima dialect ([`EvrimaClient`]), where every outcome is a status
//!   value with a human-readable `Display`.
//!
//! ## Example
//! ```rust,no_run
//! use std::time::Duration;
//!
//! # async fn run() -> gamercon::Result<()> {
//! let mut client = gamercon::connect("127.0.0.1", 27015, "secret", Duration::from_secs(5)).await?;
//! let players = client.execute("ListPlayers").await?;
//! println!("{players}");
//! client.close().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod transport;
pub mod utils;

pub use crate::config::{ClientConfig, Credential, Endpoint, EvrimaConfig, RconConfig};
pub use crate::core::codec::PacketCodec;
pub use crate::core::packet::{Packet, PacketKind};
pub use crate::error::{ProtocolError, Result};
pub use crate::protocol::encoding::CommandEncoding;
pub use crate::protocol::evrima::{EvrimaClient, EvrimaReply, EvrimaStatus};
pub use crate::protocol::request_id::{RandomIds, RequestIdSource, SequentialIds};
pub use crate::protocol::session::{connect, RconClient, SessionState};
