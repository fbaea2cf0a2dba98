//! RCON packet layout and the byte-level encoder/decoder.
//!
//! ```text
//! [Length(4)] [Id(4)] [Kind(4)] [Payload(N)] [0x00 0x00]
//! ```
//!
//! All integers are signed 32-bit little-endian. `Length` counts every byte
//! after itself.

use crate::error::{constants, ProtocolError, Result};
use bytes::BufMut;
use std::borrow::Cow;

/// Bytes taken by the length prefix
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Id + kind + terminator: the smallest legal frame body
pub const MIN_BODY_SIZE: usize = 10;

/// Two null bytes closing every packet
pub const TERMINATOR: [u8; 2] = [0x00, 0x00];

/// Id used for the authentication request
pub const AUTH_REQUEST_ID: i32 = 0;

/// Id the server echoes back when it rejects the credential
pub const AUTH_FAILED_ID: i32 = -1;

/// Largest payload whose frame length still fits in an `i32`
pub const MAX_ENCODABLE_PAYLOAD: usize = i32::MAX as usize - MIN_BODY_SIZE;

/// Packet kind tag.
///
/// `Command` and `AuthResponse` share wire value `2`. Which one a received `2`
/// means depends on what was last sent, see [`PacketKind::from_wire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketKind {
    /// Authentication request (3)
    Auth,
    /// Command request (2)
    Command,
    /// Authentication response (2)
    AuthResponse,
    /// Command response value (0)
    ResponseValue,
}

impl PacketKind {
    /// Wire tag for this kind
    pub fn to_wire(self) -> i32 {
        match self {
            PacketKind::Auth => 3,
            PacketKind::Command | PacketKind::AuthResponse => 2,
            PacketKind::ResponseValue => 0,
        }
    }

    /// Interpret a wire tag given the kind most recently sent on the connection.
    pub fn from_wire(tag: i32, last_sent: PacketKind) -> Result<Self> {
        match tag {
            3 => Ok(PacketKind::Auth),
            2 if last_sent == PacketKind::Auth => Ok(PacketKind::AuthResponse),
            2 => Ok(PacketKind::Command),
            0 => Ok(PacketKind::ResponseValue),
            other => Err(ProtocolError::UnknownPacketKind(other)),
        }
    }
}

/// A single protocol message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    id: i32,
    kind: PacketKind,
    payload: Vec<u8>,
}

impl Packet {
    /// Build a packet, rejecting payloads whose frame length would overflow `i32`.
    pub fn new(id: i32, kind: PacketKind, payload: impl Into<Vec<u8>>) -> Result<Self> {
        let payload = payload.into();
        if payload.len() > MAX_ENCODABLE_PAYLOAD {
            return Err(ProtocolError::OversizedPacket(payload.len()));
        }
        Ok(Self { id, kind, payload })
    }

    /// Authentication request carrying the credential
    pub fn auth(credential: &str) -> Result<Self> {
        Self::new(AUTH_REQUEST_ID, PacketKind::Auth, credential.as_bytes())
    }

    /// Command request with a caller-chosen id
    pub fn command(id: i32, command: &str) -> Result<Self> {
        Self::new(id, PacketKind::Command, command.as_bytes())
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn kind(&self) -> PacketKind {
        self.kind
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// True when this packet carries the rejected-credential sentinel
    pub fn is_auth_failure(&self) -> bool {
        self.id == AUTH_FAILED_ID
    }

    /// Payload decoded as UTF-8, invalid sequences replaced with U+FFFD
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }

    /// Size of the frame body (everything after the length prefix)
    pub fn body_len(&self) -> usize {
        MIN_BODY_SIZE + self.payload.len()
    }

    /// Size of the full encoded frame
    pub fn frame_len(&self) -> usize {
        LENGTH_PREFIX_SIZE + self.body_len()
    }

    /// Append the full frame to `dst`
    pub fn encode_into<B: BufMut>(&self, dst: &mut B) {
        // Bounded by MAX_ENCODABLE_PAYLOAD in the constructor
        dst.put_i32_le(self.body_len() as i32);
        dst.put_i32_le(self.id);
        dst.put_i32_le(self.kind.to_wire());
        dst.put_slice(&self.payload);
        dst.put_slice(&TERMINATOR);
    }

    /// Serialize to a complete length-prefixed frame
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.frame_len());
        self.encode_into(&mut out);
        out
    }

    /// Decode a frame body, i.e. the bytes following the length prefix.
    pub fn from_body(body: &[u8], last_sent: PacketKind) -> Result<Self> {
        if body.len() < MIN_BODY_SIZE {
            return Err(ProtocolError::FramingError(
                constants::ERR_SHORT_BODY.to_string(),
            ));
        }

        let (head, terminator) = body.split_at(body.len() - TERMINATOR.len());
        if terminator != TERMINATOR {
            return Err(ProtocolError::FramingError(
                constants::ERR_BAD_TERMINATOR.to_string(),
            ));
        }

        let id = read_i32(&head[0..4]);
        let kind = PacketKind::from_wire(read_i32(&head[4..8]), last_sent)?;

        Ok(Self {
            id,
            kind,
            payload: head[8..].to_vec(),
        })
    }

    /// Decode a complete frame including its length prefix.
    pub fn from_bytes(frame: &[u8], last_sent: PacketKind) -> Result<Self> {
        if frame.len() < LENGTH_PREFIX_SIZE {
            return Err(ProtocolError::FramingError(
                constants::ERR_SHORT_BODY.to_string(),
            ));
        }
        let declared = decode_length(&frame[..LENGTH_PREFIX_SIZE])?;
        let body = &frame[LENGTH_PREFIX_SIZE..];
        if declared != body.len() {
            return Err(ProtocolError::FramingError(format!(
                "{}: declared {declared}, actual {}",
                constants::ERR_LENGTH_MISMATCH,
                body.len()
            )));
        }
        Self::from_body(body, last_sent)
    }
}

/// Parse a length prefix and check it against the minimum body size.
pub fn decode_length(prefix: &[u8]) -> Result<usize> {
    let length = read_i32(prefix);
    if length < 0 {
        return Err(ProtocolError::FramingError(format!(
            "{}: {length}",
            constants::ERR_NEGATIVE_LENGTH
        )));
    }
    let length = length as usize;
    if length < MIN_BODY_SIZE {
        return Err(ProtocolError::FramingError(format!(
            "{}: {length}",
            constants::ERR_SHORT_BODY
        )));
    }
    Ok(length)
}

#[inline]
fn read_i32(bytes: &[u8]) -> i32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[..4]);
    i32::from_le_bytes(raw)
}
