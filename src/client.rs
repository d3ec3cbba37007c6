//! Send orchestrator: the public `SmtpClient` surface — connect, send,
//! verify, close. Implements the RFC 5321 envelope/transaction sequence
//! (MAIL FROM, RCPT TO, DATA) on top of a [`crate::connection::Connection`],
//! composing the message body up front rather than streaming it.

use std::time::Duration;

use tokio::sync::mpsc;

use crate::auth::{authenticate, Credentials};
use crate::compose::compose;
use crate::connection::{Connection, ConnectionOptions, Event};
use crate::dot_stuffer::DotStuffer;
use crate::error::{ErrorKind, SmtpError};
use crate::message::{derive_envelope, Envelope, Message};

/// Connection options exposed to callers. `port` defaults to 465 when
/// `secure` is set, else 587.
#[derive(Debug, Clone)]
pub struct Options {
    pub host: String,
    pub port: Option<u16>,
    pub secure: bool,
    pub name: String,
    pub reject_unauthorized: bool,
    pub connection_timeout_ms: u64,
    pub greeting_timeout_ms: u64,
    pub socket_timeout_ms: u64,
    /// Allow opportunistic STARTTLS to be disabled even when advertised.
    pub starttls: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: None,
            secure: false,
            name: "localhost".to_string(),
            reject_unauthorized: true,
            connection_timeout_ms: 10_000,
            greeting_timeout_ms: 5_000,
            socket_timeout_ms: 60_000,
            starttls: true,
        }
    }
}

impl Options {
    fn resolved_port(&self) -> u16 {
        self.port.unwrap_or(if self.secure { 465 } else { 587 })
    }

    fn to_connection_options(&self) -> ConnectionOptions {
        ConnectionOptions {
            host: self.host.clone(),
            port: self.resolved_port(),
            secure: self.secure,
            reject_unauthorized: self.reject_unauthorized,
            name: self.name.clone(),
            connection_timeout: Duration::from_millis(self.connection_timeout_ms),
            greeting_timeout: Duration::from_millis(self.greeting_timeout_ms),
            socket_timeout: Duration::from_millis(self.socket_timeout_ms),
            starttls: self.starttls,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RejectedRecipient {
    pub address: String,
    pub code: u16,
    pub response: String,
}

#[derive(Debug, Clone)]
pub struct SendResult {
    pub message_id: String,
    pub accepted: Vec<String>,
    pub rejected: Vec<RejectedRecipient>,
    pub response: String,
    pub envelope: Envelope,
}

/// Extract a `messageId` from a `queued as XXXX` fragment in the server's
/// final DATA response, if present.
fn extract_queued_id(text: &str) -> Option<String> {
    let lower = text.to_lowercase();
    let idx = lower.find("queued as ")?;
    let rest = &text[idx + "queued as ".len()..];
    let token: String = rest
        .chars()
        .take_while(|c| !c.is_whitespace() && *c != ')' && *c != ';')
        .collect();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

pub struct SmtpClient {
    opts: Options,
    credentials: Option<Credentials>,
    conn: Option<Connection>,
    events_rx: Option<mpsc::UnboundedReceiver<Event>>,
}

impl SmtpClient {
    pub fn new(opts: Options) -> Self {
        Self {
            opts,
            credentials: None,
            conn: None,
            events_rx: None,
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Drain lifecycle notifications — command, error, and close events.
    /// `None` until `connect`/`send` has run at least once.
    pub fn events(&mut self) -> Option<&mut mpsc::UnboundedReceiver<Event>> {
        self.events_rx.as_mut()
    }

    /// Open the connection: socket, greeting, EHLO, optional STARTTLS,
    /// then authenticate if credentials were supplied. No-op if already
    /// connected.
    pub async fn connect(&mut self) -> Result<(), SmtpError> {
        if self.conn.is_some() {
            return Ok(());
        }
        let conn_opts = self.opts.to_connection_options();
        let (mut conn, rx) = Connection::connect(&conn_opts).await?;

        if let Some(mut creds) = self.credentials.take() {
            if conn.capabilities.auth.is_empty() {
                return Err(SmtpError::new(
                    ErrorKind::AuthFailed,
                    "Server does not support authentication",
                ));
            }
            let result = authenticate(&mut conn, &mut creds).await;
            result?;
        }

        self.conn = Some(conn);
        self.events_rx = Some(rx);
        Ok(())
    }

    async fn ensure_ready(&mut self) -> Result<(), SmtpError> {
        if self.conn.is_none() {
            self.connect().await?;
        }
        Ok(())
    }

    /// Compose and submit `message`, opening the connection first if it
    /// isn't already.
    pub async fn send(&mut self, message: &Message) -> Result<SendResult, SmtpError> {
        self.ensure_ready().await?;
        let envelope = derive_envelope(message);
        let conn = self.conn.as_mut().expect("connected by ensure_ready");

        let mail_resp = conn
            .send_command(&format!("MAIL FROM:<{}>", envelope.from))
            .await?;
        if !mail_resp.is_success() {
            return Err(SmtpError::smtp(mail_resp.code, mail_resp.joined_message()));
        }

        let mut accepted = Vec::new();
        let mut rejected = Vec::new();
        for rcpt in &envelope.to {
            let resp = conn.send_command(&format!("RCPT TO:<{}>", rcpt)).await?;
            if resp.is_success() {
                accepted.push(rcpt.clone());
            } else {
                rejected.push(RejectedRecipient {
                    address: rcpt.clone(),
                    code: resp.code,
                    response: resp.joined_message(),
                });
            }
        }
        if accepted.is_empty() {
            return Err(SmtpError::new(
                ErrorKind::InvalidRecipient,
                "All recipients were rejected",
            ));
        }

        let data_resp = conn.send_command("DATA").await?;
        if data_resp.code != 354 {
            return Err(SmtpError::smtp(data_resp.code, data_resp.joined_message()));
        }

        let (payload, message_id) = compose(message, &self.opts.name)?;
        let mut wire = Vec::with_capacity(payload.len() + 8);
        let mut stuffer = DotStuffer::new();
        stuffer.process_chunk(&payload, |chunk| wire.extend_from_slice(chunk));
        stuffer.end_message(|chunk| wire.extend_from_slice(chunk));

        let final_resp = conn.send_data_payload(&wire).await?;
        if !final_resp.is_success() {
            return Err(SmtpError::smtp(final_resp.code, final_resp.joined_message()));
        }

        let response = final_resp.joined_message();
        let message_id = extract_queued_id(&response).unwrap_or(message_id);

        Ok(SendResult {
            message_id,
            accepted,
            rejected,
            response,
            envelope,
        })
    }

    /// Open the connection (if needed) and issue `NOOP`; `true` on `2xx`,
    /// `false` on any error.
    pub async fn verify(&mut self) -> bool {
        if self.ensure_ready().await.is_err() {
            return false;
        }
        let conn = match self.conn.as_mut() {
            Some(c) => c,
            None => return false,
        };
        matches!(conn.send_command("NOOP").await, Ok(r) if r.is_success())
    }

    /// `QUIT` and tear down the socket.
    pub async fn close(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            conn.quit().await;
        }
        self.events_rx = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_port_depends_on_secure() {
        let plain = Options::default();
        assert_eq!(plain.resolved_port(), 587);
        let secure = Options { secure: true, ..Options::default() };
        assert_eq!(secure.resolved_port(), 465);
    }

    #[test]
    fn explicit_port_overrides_default() {
        let opts = Options { port: Some(2525), ..Options::default() };
        assert_eq!(opts.resolved_port(), 2525);
    }

    #[test]
    fn extracts_queued_as_message_id() {
        let id = extract_queued_id("2.0.0 OK queued as 1A2B3C4D");
        assert_eq!(id.as_deref(), Some("1A2B3C4D"));
    }

    #[test]
    fn falls_back_when_no_queued_fragment() {
        assert_eq!(extract_queued_id("2.0.0 OK"), None);
    }
}
