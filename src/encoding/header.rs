//! RFC 2047 encoded-words and header line folding (RFC 5322 §2.2.3).

use crate::encoding::base64;
use crate::encoding::quoted_printable;

/// RFC 2047 encoded-word scheme: `B` (base64) or `Q` (quoted-printable-like).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    B,
    Q,
}

/// Return true if every byte in `s` is printable US-ASCII (0x20-0x7e) plus
/// tab, i.e. the value needs no RFC 2047 encoding.
fn is_plain_ascii(s: &str) -> bool {
    s.bytes().all(|b| b == b'\t' || (0x20..=0x7e).contains(&b))
}

/// Encode a header value for the wire using the `B` (base64) scheme. ASCII
/// values pass through unchanged; anything containing non-ASCII is wrapped
/// in one or more `=?UTF-8?B?...?=` encoded-words, chunked so each stays
/// within 75 characters. Convenience wrapper over [`encode_header_scheme`]
/// for the composer's headers, which only ever use `B`.
pub fn encode_header(value: &str) -> String {
    encode_header_scheme(value, Scheme::B, "UTF-8")
}

/// Only alphanumerics pass through literally in the `Q` scheme; everything
/// else (including the `=?charset?Q?...?=` delimiters' own reserved
/// characters) must be percent-escaped, and SPACE encodes as `_`.
fn q_encode_word(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        if b == b' ' {
            out.push('_');
        } else if b.is_ascii_alphanumeric() {
            out.push(b as char);
        } else {
            out.push_str(&format!("={:02X}", b));
        }
    }
    out
}

/// Encode `value` as one or more RFC 2047 encoded-words in the given
/// `scheme`/`charset`. ASCII-only input is returned unchanged.
pub fn encode_header_scheme(value: &str, scheme: Scheme, charset: &str) -> String {
    if is_plain_ascii(value) {
        return value.to_string();
    }
    const MAX_ENCODED_WORD_CHARS: usize = 45; // base64 of 45 bytes is 60 chars, inside the 75-char encoded-word limit
    let bytes = value.as_bytes();
    let mut words = Vec::new();
    let mut start = 0;
    while start < bytes.len() {
        let mut end = (start + MAX_ENCODED_WORD_CHARS).min(bytes.len());
        while end > start && !is_char_boundary(value, end) {
            end -= 1;
        }
        let payload = match scheme {
            Scheme::B => base64::encode(&bytes[start..end]),
            Scheme::Q => q_encode_word(&bytes[start..end]),
        };
        let tag = match scheme {
            Scheme::B => "B",
            Scheme::Q => "Q",
        };
        words.push(format!("=?{}?{}?{}?=", charset, tag, payload));
        start = end;
    }
    words.join(" ")
}

fn is_char_boundary(s: &str, idx: usize) -> bool {
    idx == s.len() || s.is_char_boundary(idx)
}

/// Fold a header `Name: value` across continuation lines so no line exceeds
/// `max_len` columns, inserting CRLF + a single space before each
/// continuation per RFC 5322 §2.2.3. Folds only at existing whitespace
/// boundaries in `value`; a value with no whitespace is left on one line.
pub fn fold_header(name: &str, value: &str, max_len: usize) -> String {
    let prefix = format!("{}: ", name);
    let mut out = String::new();
    let mut line_len = prefix.len();
    out.push_str(&prefix);
    for (i, word) in value.split(' ').enumerate() {
        let sep_len = if i == 0 { 0 } else { 1 };
        if i > 0 && line_len + sep_len + word.len() > max_len {
            out.push_str("\r\n ");
            line_len = 1;
        } else if i > 0 {
            out.push(' ');
            line_len += 1;
        }
        out.push_str(word);
        line_len += word.len();
    }
    out
}

/// Decode RFC 2047 encoded-words in a header value back to a plain string,
/// leaving non-encoded segments unchanged. On a malformed encoded-word
/// payload, the original `=?...` segment is returned as-is rather than the
/// function failing outright.
pub fn decode_header(s: &str) -> String {
    let mut out = String::new();
    let bytes = s.as_bytes();
    let len = bytes.len();
    let mut pos = 0;
    while pos < len {
        if let Some(start) = find_encoded_word(bytes, pos) {
            out.push_str(std::str::from_utf8(&bytes[pos..start]).unwrap_or(""));
            if let Some((decoded, end)) = decode_one_word(bytes, len, start) {
                out.push_str(&decoded);
                pos = end;
            } else {
                out.push_str(std::str::from_utf8(&bytes[start..(start + 2).min(len)]).unwrap_or(""));
                pos = (start + 2).min(len);
            }
        } else {
            out.push_str(std::str::from_utf8(&bytes[pos..]).unwrap_or(""));
            break;
        }
    }
    out
}

fn find_encoded_word(bytes: &[u8], from: usize) -> Option<usize> {
    bytes[from..]
        .windows(2)
        .position(|w| w == b"=?")
        .map(|i| from + i)
}

fn decode_one_word(bytes: &[u8], len: usize, start: usize) -> Option<(String, usize)> {
    let mut pos = start + 2;
    let qmark1 = bytes[pos..].iter().position(|&b| b == b'?')? + pos;
    let charset = std::str::from_utf8(&bytes[pos..qmark1]).ok()?;
    let encoding = bytes.get(qmark1 + 1)?.to_ascii_lowercase();
    if bytes.get(qmark1 + 2) != Some(&b'?') {
        return None;
    }
    pos = qmark1 + 3;
    let end_in_rest = bytes[pos..].windows(2).position(|w| w == b"?=")?;
    let payload = &bytes[pos..pos + end_in_rest];
    pos += end_in_rest + 2;
    let decoded_bytes = match encoding {
        b'b' => base64::decode(std::str::from_utf8(payload).ok()?).ok()?,
        b'q' => {
            let unescaped: Vec<u8> = payload
                .iter()
                .map(|&b| if b == b'_' { b' ' } else { b })
                .collect();
            quoted_printable::decode(&unescaped)
        }
        _ => return None,
    };
    let _ = charset;
    Some((String::from_utf8_lossy(&decoded_bytes).into_owned(), pos))
}
