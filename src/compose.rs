//! MIME composer: header assembly, body structure selection, attachment
//! encoding, and boundary generation for an RFC 5322/MIME (RFC 2045)
//! message. Plain-text-only messages get a single part; text+HTML gets
//! `multipart/alternative`; attachments wrap either in `multipart/mixed`.
//! Header values are RFC 2047-encoded where needed.

use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime as ChronoDateTime, FixedOffset, Utc};
use rand::Rng;

use crate::address::Address;
use crate::encoding::{base64, header::encode_header, quoted_printable};
use crate::error::{ErrorKind, SmtpError};
use crate::message::{Attachment, AttachmentContent, AttachmentEncoding, Message, Priority};

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

fn random_base36(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect()
}

fn epoch_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}

/// `----=_Part_<epoch_ms>_<12 random base36>`, regenerated if it collides
/// with any line already in the body so it stays unique per nesting level
/// and unambiguous as a delimiter.
fn unique_boundary(existing: &[u8]) -> String {
    loop {
        let candidate = format!("----=_Part_{}_{}", epoch_millis(), random_base36(12));
        let needle = candidate.as_bytes();
        if !existing
            .windows(needle.len().max(1))
            .any(|w| w == needle)
        {
            return candidate;
        }
    }
}

fn append_header(out: &mut Vec<u8>, name: &str, value: &str) {
    out.extend_from_slice(name.as_bytes());
    out.extend_from_slice(b": ");
    out.extend_from_slice(value.as_bytes());
    out.extend_from_slice(b"\r\n");
}

/// Split an address string/struct into (display name, bare address) for
/// header emission, so only the display name goes through RFC 2047 (the
/// address itself must stay literal).
fn split_name_address(addr: &Address) -> (Option<String>, String) {
    match addr {
        Address::Structured { name, address } => (name.clone(), address.clone()),
        Address::Bare(s) => (None, s.clone()),
        Address::Display(s) => {
            if let Some(open) = s.find('<') {
                if let Some(close) = s[open..].find('>') {
                    let name = s[..open].trim().trim_matches('"').to_string();
                    let address = s[open + 1..open + close].trim().to_string();
                    return (if name.is_empty() { None } else { Some(name) }, address);
                }
            }
            (None, s.trim().to_string())
        }
    }
}

fn format_address_header(addr: &Address) -> String {
    let (name, address) = split_name_address(addr);
    match name {
        Some(n) if !n.is_empty() => {
            let encoded = encode_header(&n);
            if encoded == n && (n.contains(',') || n.contains('"')) {
                format!("\"{}\" <{}>", n.replace('"', "\\\""), address)
            } else {
                format!("{} <{}>", encoded, address)
            }
        }
        _ => format!("<{}>", address),
    }
}

fn join_address_headers(addrs: &[Address]) -> String {
    addrs
        .iter()
        .map(format_address_header)
        .collect::<Vec<_>>()
        .join(", ")
}

fn priority_header_value(p: Priority) -> &'static str {
    match p {
        Priority::High => "1 (Highest)",
        Priority::Normal => "3 (Normal)",
        Priority::Low => "5 (Lowest)",
    }
}

fn generate_message_id(hostname: &str) -> String {
    format!("<{}.{}@{}>", epoch_millis(), random_base36(10), hostname)
}

fn append_text_part(out: &mut Vec<u8>, content_type: &str, body: &str) {
    append_header(out, "Content-Type", &format!("{}; charset=utf-8", content_type));
    append_header(out, "Content-Transfer-Encoding", "quoted-printable");
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(&quoted_printable::encode(body.as_bytes()));
    out.extend_from_slice(b"\r\n");
}

fn append_body(out: &mut Vec<u8>, message: &Message) {
    let has_plain = message.text.as_deref().map_or(false, |s| !s.is_empty());
    let has_html = message.html.as_deref().map_or(false, |s| !s.is_empty());

    match (has_plain, has_html) {
        (true, true) => {
            let boundary = unique_boundary(out);
            append_header(
                out,
                "Content-Type",
                &format!("multipart/alternative; boundary=\"{}\"", boundary),
            );
            out.extend_from_slice(b"\r\n");
            out.extend_from_slice(b"--");
            out.extend_from_slice(boundary.as_bytes());
            out.extend_from_slice(b"\r\n");
            append_text_part(out, "text/plain", message.text.as_deref().unwrap_or(""));
            out.extend_from_slice(b"--");
            out.extend_from_slice(boundary.as_bytes());
            out.extend_from_slice(b"\r\n");
            append_text_part(out, "text/html", message.html.as_deref().unwrap_or(""));
            out.extend_from_slice(b"--");
            out.extend_from_slice(boundary.as_bytes());
            out.extend_from_slice(b"--\r\n");
        }
        (false, true) => append_text_part(out, "text/html", message.html.as_deref().unwrap_or("")),
        _ => append_text_part(out, "text/plain", message.text.as_deref().unwrap_or("")),
    }
}

fn append_attachment(out: &mut Vec<u8>, att: &Attachment) -> Result<(), SmtpError> {
    let bytes = match &att.content {
        AttachmentContent::Bytes(b) => b.clone(),
        AttachmentContent::Path(path) => std::fs::read(path).map_err(|e| {
            SmtpError::new(
                ErrorKind::InvalidConfig,
                format!("could not read attachment {}: {}", path.display(), e),
            )
        })?,
    };

    let filename = att.filename.clone().or_else(|| {
        if let AttachmentContent::Path(path) = &att.content {
            path.file_name().map(|n| n.to_string_lossy().into_owned())
        } else {
            None
        }
    });

    let content_type = if let Some(ref name) = filename {
        format!("{}; name=\"{}\"", att.content_type, name)
    } else {
        att.content_type.clone()
    };
    append_header(out, "Content-Type", &content_type);
    if let Some(ref name) = filename {
        let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
        append_header(
            out,
            "Content-Disposition",
            &format!("{}; filename=\"{}\"", att.content_disposition, escaped),
        );
    } else {
        append_header(out, "Content-Disposition", &att.content_disposition);
    }
    if let Some(ref cid) = att.cid {
        append_header(out, "Content-ID", &format!("<{}>", cid));
    }
    for (name, value) in &att.headers {
        append_header(out, name, value);
    }

    match att.encoding {
        AttachmentEncoding::Base64 => {
            append_header(out, "Content-Transfer-Encoding", "base64");
            out.extend_from_slice(b"\r\n");
            out.extend_from_slice(&base64::encode_wrapped(&bytes));
        }
        AttachmentEncoding::QuotedPrintable => {
            append_header(out, "Content-Transfer-Encoding", "quoted-printable");
            out.extend_from_slice(b"\r\n");
            let text = String::from_utf8_lossy(&bytes);
            out.extend_from_slice(&quoted_printable::encode(text.as_bytes()));
            out.extend_from_slice(b"\r\n");
        }
        AttachmentEncoding::SevenBit => {
            append_header(out, "Content-Transfer-Encoding", "7bit");
            out.extend_from_slice(b"\r\n");
            out.extend_from_slice(&bytes);
            out.extend_from_slice(b"\r\n");
        }
    }
    Ok(())
}

/// Compose RFC 5322/MIME bytes for `message`. `hostname` is used both for
/// the EHLO-style local identity and as the right-hand side of a
/// synthesized `Message-ID` when the caller didn't supply one. Returns the
/// composed bytes and the `Message-ID` actually used, which the send
/// orchestrator falls back to when the server's response carries no
/// `queued as` fragment.
pub fn compose(message: &Message, hostname: &str) -> Result<(Vec<u8>, String), SmtpError> {
    let mut out = Vec::new();

    append_header(&mut out, "From", &format_address_header(&message.from));
    append_header(&mut out, "To", &join_address_headers(&message.to));
    if !message.cc.is_empty() {
        append_header(&mut out, "Cc", &join_address_headers(&message.cc));
    }
    append_header(&mut out, "Subject", &encode_header(&message.subject));

    let date: ChronoDateTime<FixedOffset> = message
        .date
        .unwrap_or_else(|| Utc::now().with_timezone(&FixedOffset::east_opt(0).unwrap()));
    append_header(&mut out, "Date", &date.to_rfc2822());

    let message_id = message
        .message_id
        .clone()
        .unwrap_or_else(|| generate_message_id(hostname));
    append_header(&mut out, "Message-ID", &message_id);

    if let Some(priority) = message.priority {
        append_header(&mut out, "X-Priority", priority_header_value(priority));
    }
    if let Some(ref references) = message.references {
        append_header(&mut out, "References", references);
    }
    if let Some(ref in_reply_to) = message.in_reply_to {
        append_header(&mut out, "In-Reply-To", in_reply_to);
    }
    for (name, value) in &message.headers {
        append_header(&mut out, name, value);
    }

    append_header(&mut out, "MIME-Version", "1.0");

    if message.attachments.is_empty() {
        append_body(&mut out, message);
    } else {
        let boundary = unique_boundary(&out);
        append_header(
            &mut out,
            "Content-Type",
            &format!("multipart/mixed; boundary=\"{}\"", boundary),
        );
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(b"--");
        out.extend_from_slice(boundary.as_bytes());
        out.extend_from_slice(b"\r\n");
        append_body(&mut out, message);
        for att in &message.attachments {
            out.extend_from_slice(b"--");
            out.extend_from_slice(boundary.as_bytes());
            out.extend_from_slice(b"\r\n");
            append_attachment(&mut out, att)?;
        }
        out.extend_from_slice(b"--");
        out.extend_from_slice(boundary.as_bytes());
        out.extend_from_slice(b"--\r\n");
    }

    Ok((out, message_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_message() -> Message {
        let mut m = Message::new(Address::bare("a@x.com"), vec![Address::bare("b@y.com")], "hi");
        m.text = Some("hello".to_string());
        m
    }

    #[test]
    fn plain_text_only_uses_single_part() {
        let (bytes, _) = compose(&base_message(), "localhost").unwrap();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("Content-Type: text/plain; charset=utf-8"));
        assert!(!text.contains("multipart"));
        assert!(text.contains("From: <a@x.com>"));
        assert!(text.contains("To: <b@y.com>"));
    }

    #[test]
    fn alternative_used_when_both_bodies_present() {
        let mut m = base_message();
        m.html = Some("<b>hello</b>".to_string());
        let (bytes, _) = compose(&m, "localhost").unwrap();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("multipart/alternative"));
        assert!(text.contains("text/plain"));
        assert!(text.contains("text/html"));
    }

    #[test]
    fn attachments_wrap_body_in_mixed() {
        let mut m = base_message();
        m.attachments.push(Attachment::from_bytes(b"file contents".to_vec()));
        let (bytes, _) = compose(&m, "localhost").unwrap();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("multipart/mixed"));
        assert!(text.contains("Content-Transfer-Encoding: base64"));
    }

    #[test]
    fn bcc_never_appears_in_headers() {
        let mut m = base_message();
        m.bcc = vec![Address::bare("hidden@z.com")];
        let (bytes, _) = compose(&m, "localhost").unwrap();
        let text = String::from_utf8_lossy(&bytes);
        assert!(!text.contains("hidden@z.com"));
        assert!(!text.to_lowercase().contains("bcc:"));
    }

    #[test]
    fn message_id_is_generated_when_absent() {
        let (_, id) = compose(&base_message(), "mail.example.com").unwrap();
        assert!(id.starts_with('<'));
        assert!(id.ends_with("@mail.example.com>"));
    }

    #[test]
    fn non_ascii_subject_is_encoded_and_ascii_passes_through() {
        let mut m = base_message();
        m.subject = "Caf\u{e9}".to_string();
        let (bytes, _) = compose(&m, "localhost").unwrap();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("Subject: =?UTF-8?B?"));

        let (bytes2, _) = compose(&base_message(), "localhost").unwrap();
        let text2 = String::from_utf8_lossy(&bytes2);
        assert!(text2.contains("Subject: hi\r\n"));
    }
}
