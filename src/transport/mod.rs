//! # Transport Layer
//!
//! Owned byte streams with bounded-time reads and writes.
//!
//! Both the primary RCON session and the Evrima dialect sit on top of
//! [`Transport`]; neither touches the socket directly.
//!
//! ## Guarantees
//! - `read_exact` keeps reading until the requested count arrives or the deadline passes
//! - Connect, read and write timeouts are reported as distinct errors
//! - `close` is idempotent and the stream is also released on drop

pub mod tcp;

pub use tcp::Transport;
