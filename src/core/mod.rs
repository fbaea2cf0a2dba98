//! # Core Protocol Components
//!
//! Low-level packet handling and codecs.
//!
//! This module provides the foundation for the RCON protocol, handling packet
//! framing, encoding/decoding, and the wire format.
//!
//! ## Components
//! - **Packet**: Binary packet layout with id, kind, payload and terminator
//! - **Codec**: Tokio codec for framing over byte streams
//!
//! ## Wire Format
//! ```text
//! [Length(4)] [Id(4)] [Kind(4)] [Payload(N)] [0x00 0x00]
//! ```
//!
//! ## Safety Limits
//! - Incoming frames above the configured maximum are refused before allocation
//! - Outgoing packets whose length prefix would overflow `i32` cannot be built
//! - Terminators are validated strictly

pub mod codec;
pub mod packet;
