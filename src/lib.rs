//! Async SMTP submission client: connection state machine, SASL
//! authentication, and a MIME composer, for submitting outbound mail to a
//! submission server (RFC 5321/5322/2045/2047/3207).
//!
//! The public entry point is [`client::SmtpClient`]; compose a
//! [`message::Message`], connect, and `send` it.

pub mod address;
pub mod auth;
pub mod capabilities;
pub mod client;
pub mod compose;
pub mod connection;
pub mod dot_stuffer;
pub mod encoding;
pub mod error;
pub mod message;
pub mod net;
pub mod response;

pub use address::Address;
pub use auth::{Credentials, Mechanism};
pub use client::{Options, RejectedRecipient, SendResult, SmtpClient};
pub use connection::{ConnectionOptions, Event};
pub use error::{ErrorKind, Result, SmtpError};
pub use message::{Attachment, AttachmentContent, AttachmentEncoding, Envelope, Message, Priority};
