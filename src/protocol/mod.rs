//! # Protocol Sessions
//!
//! Connection state machines built on the packet codec and the transport.
//!
//! ## Components
//! - **Session**: primary RCON client with a one-time password handshake
//! - **Request ids**: id generators owned by each session
//! - **Encoding**: optional base64 wrapping of command text and output
//! - **Evrima**: secondary dialect that reports outcomes as values instead of errors

pub mod encoding;
pub mod evrima;
pub mod request_id;
pub mod session;
