//! Message data model and envelope derivation.

use std::path::PathBuf;

use crate::address::Address;

/// Message priority, mapped to an `X-Priority` header by the composer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Priority {
    High,
    #[default]
    Normal,
    Low,
}

/// Content-Transfer-Encoding selection for an attachment part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentEncoding {
    Base64,
    QuotedPrintable,
    SevenBit,
}

impl Default for AttachmentEncoding {
    fn default() -> Self {
        AttachmentEncoding::Base64
    }
}

/// Attachment content source: either literal bytes or a path to read from.
#[derive(Debug, Clone)]
pub enum AttachmentContent {
    Bytes(Vec<u8>),
    Path(PathBuf),
}

#[derive(Debug, Clone)]
pub struct Attachment {
    pub content: AttachmentContent,
    pub filename: Option<String>,
    pub content_type: String,
    pub content_disposition: String,
    pub encoding: AttachmentEncoding,
    pub cid: Option<String>,
    pub headers: Vec<(String, String)>,
}

impl Attachment {
    pub fn from_bytes(content: Vec<u8>) -> Self {
        Self {
            content: AttachmentContent::Bytes(content),
            filename: None,
            content_type: "application/octet-stream".to_string(),
            content_disposition: "attachment".to_string(),
            encoding: AttachmentEncoding::Base64,
            cid: None,
            headers: Vec::new(),
        }
    }

    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            content: AttachmentContent::Path(path.into()),
            ..Self::from_bytes(Vec::new())
        }
    }
}

/// An outbound message, built up by the caller before composition and send.
#[derive(Debug, Clone)]
pub struct Message {
    pub from: Address,
    pub to: Vec<Address>,
    pub cc: Vec<Address>,
    pub bcc: Vec<Address>,
    pub subject: String,
    pub text: Option<String>,
    pub html: Option<String>,
    pub attachments: Vec<Attachment>,
    pub headers: Vec<(String, String)>,
    /// `None` when the caller did not specify a priority: no `X-Priority`
    /// header is emitted in that case, unlike the always-present
    /// `Subject`/`Date`.
    pub priority: Option<Priority>,
    pub references: Option<String>,
    pub in_reply_to: Option<String>,
    pub message_id: Option<String>,
    pub date: Option<chrono::DateTime<chrono::FixedOffset>>,
}

impl Message {
    pub fn new(from: Address, to: Vec<Address>, subject: impl Into<String>) -> Self {
        Self {
            from,
            to,
            cc: Vec::new(),
            bcc: Vec::new(),
            subject: subject.into(),
            text: None,
            html: None,
            attachments: Vec::new(),
            headers: Vec::new(),
            priority: None,
            references: None,
            in_reply_to: None,
            message_id: None,
            date: None,
        }
    }
}

/// Derived SMTP envelope: `from` is the extracted bare sender, `to` is the
/// deduplicated union of `to ∪ cc ∪ bcc` in first-occurrence order. `cc` is
/// retained separately because it is echoed in headers, unlike `bcc`,
/// which must never appear there.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub from: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
}

/// Derive the SMTP envelope from a message: the deduplicated concatenation
/// `to ++ cc ++ bcc`, preserving first-occurrence order.
pub fn derive_envelope(message: &Message) -> Envelope {
    let from = message.from.extract();
    let cc: Vec<String> = message.cc.iter().map(Address::extract).collect();

    let mut seen = std::collections::HashSet::new();
    let mut to = Vec::new();
    for addr in message
        .to
        .iter()
        .chain(message.cc.iter())
        .chain(message.bcc.iter())
    {
        let extracted = addr.extract();
        if seen.insert(extracted.clone()) {
            to.push(extracted);
        }
    }

    Envelope { from, to, cc }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_dedupes_preserving_order() {
        let mut msg = Message::new(Address::bare("a@x"), vec![Address::bare("b@y")], "hi");
        msg.cc = vec![Address::bare("b@y"), Address::bare("c@z")];
        msg.bcc = vec![Address::bare("d@w")];
        let env = derive_envelope(&msg);
        assert_eq!(env.from, "a@x");
        assert_eq!(env.to, vec!["b@y", "c@z", "d@w"]);
        assert_eq!(env.cc, vec!["b@y", "c@z"]);
    }
}
