//! base64 (RFC 4648) for SASL payloads and MIME attachment bodies.
//!
//! One-shot encode/decode goes through the `base64` crate's `Engine` trait.
//! `encode_wrapped` folds the output at 76 columns with CRLF, as RFC 2045
//! §6.8 requires for a `base64` MIME body.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::{ErrorKind, SmtpError};

/// Encode bytes to a single unbroken base64 line (SASL responses, headers).
pub fn encode(input: &[u8]) -> String {
    STANDARD.encode(input)
}

/// Decode a base64 string, ignoring surrounding whitespace.
pub fn decode(input: &str) -> Result<Vec<u8>, SmtpError> {
    STANDARD
        .decode(input.trim())
        .map_err(|e| SmtpError::new(ErrorKind::EncodingError, format!("invalid base64: {}", e)))
}

/// Encode bytes as base64, wrapped at 76 characters per line with CRLF, for
/// use as a MIME `Content-Transfer-Encoding: base64` body.
pub fn encode_wrapped(input: &[u8]) -> Vec<u8> {
    let encoded = STANDARD.encode(input);
    let mut out = Vec::with_capacity(encoded.len() + encoded.len() / 76 * 2 + 2);
    for chunk in encoded.as_bytes().chunks(76) {
        out.extend_from_slice(chunk);
        out.extend_from_slice(b"\r\n");
    }
    out
}
