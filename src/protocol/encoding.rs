//! Command payload encodings for the primary RCON session.
//!
//! Some servers wrap command text and its output in base64. Replies that are
//! not valid base64 of UTF-8 text come back as the server sent them.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// How command text and response output are carried in packet payloads
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandEncoding {
    /// UTF-8 text as-is
    #[default]
    Plain,
    /// Standard-alphabet base64 of the UTF-8 text
    Base64,
}

impl CommandEncoding {
    /// Payload text for `command`
    pub fn encode_command<'a>(&self, command: &'a str) -> Cow<'a, str> {
        match self {
            CommandEncoding::Plain => Cow::Borrowed(command),
            CommandEncoding::Base64 => Cow::Owned(STANDARD.encode(command)),
        }
    }

    /// Output text for a response payload. Never fails.
    pub fn decode_response(&self, payload: Vec<u8>) -> String {
        match self {
            CommandEncoding::Plain => into_text(payload),
            CommandEncoding::Base64 => match STANDARD.decode(&payload) {
                Ok(decoded) => String::from_utf8(decoded).unwrap_or_else(|_| into_text(payload)),
                Err(_) => into_text(payload),
            },
        }
    }
}

fn into_text(payload: Vec<u8>) -> String {
    match String::from_utf8(payload) {
        Ok(text) => text,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_is_passthrough() {
        let encoding = CommandEncoding::Plain;
        assert!(matches!(encoding.encode_command("status"), Cow::Borrowed("status")));
        assert_eq!(encoding.decode_response(b"ok".to_vec()), "ok");
        assert_eq!(encoding.decode_response(vec![b'o', 0xFF]), "o\u{FFFD}");
    }

    #[test]
    fn test_base64_command() {
        let encoding = CommandEncoding::Base64;
        assert_eq!(encoding.encode_command("ListPlayers"), "TGlzdFBsYXllcnM=");
        assert_eq!(encoding.encode_command(""), "");
    }

    #[test]
    fn test_base64_response_decodes() {
        let encoding = CommandEncoding::Base64;
        assert_eq!(
            encoding.decode_response(b"bm8gcGxheWVycyBvbmxpbmU=".to_vec()),
            "no players online"
        );
    }

    #[test]
    fn test_base64_response_falls_back_to_raw_text() {
        let encoding = CommandEncoding::Base64;
        // Not base64 at all
        assert_eq!(
            encoding.decode_response(b"Unknown command".to_vec()),
            "Unknown command"
        );
        // Valid base64, but the decoded bytes are not UTF-8
        assert_eq!(encoding.decode_response(b"/w==".to_vec()), "/w==");
    }
}
