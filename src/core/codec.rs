//! Tokio codec for framing RCON packets over a byte stream.
//!
//! The decoder needs to know the kind most recently encoded so that wire tag
//! `2` resolves to `AuthResponse` after an auth request and `Command`
//! otherwise. Use one codec instance per connection.

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::config::MAX_RESPONSE_SIZE;
use crate::core::packet::{decode_length, Packet, PacketKind, LENGTH_PREFIX_SIZE};
use crate::error::{ProtocolError, Result};

#[derive(Debug, Clone)]
pub struct PacketCodec {
    last_sent: PacketKind,
    max_frame_size: usize,
}

impl Default for PacketCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketCodec {
    pub fn new() -> Self {
        Self::with_max_frame_size(MAX_RESPONSE_SIZE)
    }

    /// Codec that rejects any incoming body larger than `max_frame_size`
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            last_sent: PacketKind::Command,
            max_frame_size,
        }
    }

    /// Kind of the last packet this codec encoded
    pub fn last_sent(&self) -> PacketKind {
        self.last_sent
    }
}

impl Decoder for PacketCodec {
    type Item = Packet;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Packet>> {
        if src.len() < LENGTH_PREFIX_SIZE {
            return Ok(None);
        }

        let body_len = decode_length(&src[..LENGTH_PREFIX_SIZE])?;
        if body_len > self.max_frame_size {
            return Err(ProtocolError::OversizedPacket(body_len));
        }

        if src.len() < LENGTH_PREFIX_SIZE + body_len {
            src.reserve(LENGTH_PREFIX_SIZE + body_len - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_PREFIX_SIZE);
        let body = src.split_to(body_len);
        Packet::from_body(&body, self.last_sent).map(Some)
    }
}

impl Encoder<Packet> for PacketCodec {
    type Error = ProtocolError;

    fn encode(&mut self, packet: Packet, dst: &mut BytesMut) -> Result<()> {
        dst.reserve(packet.frame_len());
        packet.encode_into(dst);
        self.last_sent = packet.kind();
        Ok(())
    }
}
