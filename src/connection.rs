//! Connection state machine: opening, greeting, EHLO/HELO, STARTTLS upgrade,
//! and a single-outstanding-command send path over a plain or TLS transport
//! (RFC 5321, STARTTLS per RFC 3207).
//!
//! The plain/TLS code paths are written once against the sum-typed
//! [`crate::net::Transport`] rather than duplicated per variant. Commands
//! are serialized implicitly: the public API only ever hands out one `&mut
//! Connection`, so "exactly one outstanding command" falls out of exclusive
//! borrowing instead of needing an explicit queue.

use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::capabilities::Capabilities;
use crate::error::{ErrorKind, SmtpError};
use crate::net::{PlainStream, Transport};
use crate::response::{read_response, Response};

/// Connection lifecycle. `Error` is terminal, same as `Closed`, but
/// distinguishes a connection that failed from one that shut down cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Closed,
    Connecting,
    Connected,
    Ready,
    Sending,
    Closing,
    Error,
}

/// Notifications emitted alongside the request/response API, delivered on
/// an explicit channel rather than via callbacks.
#[derive(Debug, Clone)]
pub enum Event {
    Command(String),
    Error(String),
    Close,
}

#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    pub host: String,
    pub port: u16,
    pub secure: bool,
    pub reject_unauthorized: bool,
    /// Local identity sent with EHLO/HELO.
    pub name: String,
    pub connection_timeout: Duration,
    pub greeting_timeout: Duration,
    pub socket_timeout: Duration,
    /// Opportunistically upgrade with STARTTLS when the server advertises
    /// it and the connection isn't already secure. Set false to keep a
    /// plaintext session even when STARTTLS is offered.
    pub starttls: bool,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 587,
            secure: false,
            reject_unauthorized: true,
            name: "localhost".to_string(),
            connection_timeout: Duration::from_millis(10_000),
            greeting_timeout: Duration::from_millis(5_000),
            socket_timeout: Duration::from_millis(60_000),
            starttls: true,
        }
    }
}

pub struct Connection {
    transport: Option<Transport>,
    state: State,
    pub capabilities: Capabilities,
    buf: Vec<u8>,
    events: mpsc::UnboundedSender<Event>,
    socket_timeout: Duration,
}

impl Connection {
    pub fn state(&self) -> State {
        self.state
    }

    pub fn is_tls(&self) -> bool {
        self.transport.as_ref().map_or(false, Transport::is_tls)
    }

    /// Open the socket (implicit TLS if `secure`, else plain), read the
    /// greeting, and EHLO. Returns the connection plus the event receiver
    /// the caller should drain for connection-lifecycle notifications.
    pub async fn connect(
        opts: &ConnectionOptions,
    ) -> Result<(Self, mpsc::UnboundedReceiver<Event>), SmtpError> {
        let (tx, rx) = mpsc::unbounded_channel();

        let transport = if opts.secure {
            let tls = timeout(
                opts.connection_timeout,
                crate::net::TlsStreamWrapper::connect_implicit_tls(
                    &opts.host,
                    opts.port,
                    opts.reject_unauthorized,
                ),
            )
            .await
            .map_err(|_| SmtpError::new(ErrorKind::ConnectionTimeout, "connect timed out"))?
            .map_err(|e| SmtpError::new(ErrorKind::TlsFailed, e.to_string()))?;
            Transport::Tls(tls)
        } else {
            let plain = timeout(
                opts.connection_timeout,
                PlainStream::connect(&opts.host, opts.port),
            )
            .await
            .map_err(|_| SmtpError::new(ErrorKind::ConnectionTimeout, "connect timed out"))?
            .map_err(|e| SmtpError::new(ErrorKind::ConnectionFailed, e.to_string()))?;
            Transport::Plain(plain)
        };

        let mut conn = Self {
            transport: Some(transport),
            state: State::Connecting,
            capabilities: Capabilities::default(),
            buf: Vec::new(),
            events: tx,
            socket_timeout: opts.socket_timeout,
        };
        conn.state = State::Connected;

        let greeting = timeout(
            opts.greeting_timeout,
            read_response(conn.transport.as_mut().expect("transport present after connect"), &mut conn.buf),
        )
        .await
        .map_err(|_| SmtpError::new(ErrorKind::ConnectionTimeout, "greeting timed out"))?
        .map_err(SmtpError::from)?;

        if greeting.code != 220 {
            conn.state = State::Error;
            return Err(SmtpError::smtp(greeting.code, greeting.joined_message()));
        }

        conn.ehlo(&opts.name).await?;

        if !opts.secure && opts.starttls && conn.capabilities.starttls {
            conn.starttls(opts).await?;
        }

        conn.state = State::Ready;
        Ok((conn, rx))
    }

    /// EHLO, falling back to HELO (and default capabilities) if the server
    /// rejects it. Capabilities are always reset first, since they must be
    /// re-negotiated on every EHLO.
    async fn ehlo(&mut self, name: &str) -> Result<(), SmtpError> {
        self.capabilities = Capabilities::default();
        let resp = self.send_raw(&format!("EHLO {}", name)).await?;
        if resp.is_success() {
            self.capabilities = Capabilities::parse(&resp.lines);
            return Ok(());
        }
        let resp = self.send_raw(&format!("HELO {}", name)).await?;
        if !resp.is_success() {
            self.state = State::Error;
            return Err(SmtpError::smtp(resp.code, resp.joined_message()));
        }
        Ok(())
    }

    /// Upgrade a plaintext connection to TLS after the server accepts
    /// `STARTTLS`, then re-EHLO: capabilities advertised before the upgrade
    /// cannot be trusted and must be re-negotiated over the encrypted
    /// channel.
    pub async fn starttls(&mut self, opts: &ConnectionOptions) -> Result<(), SmtpError> {
        if !self.capabilities.starttls {
            return Err(SmtpError::new(
                ErrorKind::TlsFailed,
                "server did not advertise STARTTLS",
            ));
        }
        let resp = self.send_raw("STARTTLS").await?;
        if resp.code != 220 {
            return Err(SmtpError::smtp(resp.code, resp.joined_message()));
        }

        let plain = match self.transport.take() {
            Some(Transport::Plain(p)) => p,
            other => {
                self.transport = other;
                return Err(SmtpError::new(
                    ErrorKind::TlsFailed,
                    "STARTTLS requested on a connection with no plaintext transport",
                ));
            }
        };
        let tls = plain
            .upgrade_to_tls(&opts.host, opts.reject_unauthorized)
            .await
            .map_err(|e| SmtpError::new(ErrorKind::TlsFailed, e.to_string()))?;
        self.transport = Some(Transport::Tls(tls));

        self.ehlo(&opts.name).await?;
        Ok(())
    }

    /// Send one command and wait for its response. Logs and broadcasts an
    /// `Event::Command` with the line redacted if it looks like an `AUTH`
    /// command (credentials or SASL payloads must never hit the log).
    pub async fn send_command(&mut self, line: &str) -> Result<Response, SmtpError> {
        self.state = State::Sending;
        let redacted = if line.len() >= 4 && line[..4].eq_ignore_ascii_case("AUTH") {
            "AUTH ***".to_string()
        } else {
            line.to_string()
        };
        tracing::debug!(command = %redacted, "sending SMTP command");
        let _ = self.events.send(Event::Command(redacted));
        let resp = self.send_raw(line).await;
        self.state = if resp.is_ok() { State::Ready } else { State::Error };
        if let Err(ref e) = resp {
            let _ = self.events.send(Event::Error(e.to_string()));
        }
        resp
    }

    /// Send a line belonging to a SASL exchange: always redacted in logs,
    /// regardless of whether it textually starts with `AUTH` (continuation
    /// lines carry raw base64 credentials with no such prefix).
    pub async fn send_auth_line(&mut self, line: &str) -> Result<Response, SmtpError> {
        self.state = State::Sending;
        tracing::debug!(command = "AUTH ***", "sending SASL line");
        let _ = self.events.send(Event::Command("AUTH ***".to_string()));
        let resp = self.send_raw(line).await;
        self.state = if resp.is_ok() { State::Ready } else { State::Error };
        resp
    }

    /// Write an already dot-stuffed, already `.\r\n`-terminated DATA payload
    /// and wait for the final response. Distinct from `send_command`/
    /// `send_raw` because the payload is raw bytes, not one CRLF-terminated
    /// command line.
    pub async fn send_data_payload(&mut self, payload: &[u8]) -> Result<Response, SmtpError> {
        self.state = State::Sending;
        tracing::debug!(bytes = payload.len(), "sending DATA payload");
        let _ = self
            .events
            .send(Event::Command(format!("DATA <{} bytes>", payload.len())));
        {
            let transport = self
                .transport
                .as_mut()
                .expect("connection transport missing");
            timeout(self.socket_timeout, transport.write_all(payload))
                .await
                .map_err(|_| SmtpError::new(ErrorKind::ConnectionTimeout, "write timed out"))?
                .map_err(SmtpError::from)?;
            timeout(self.socket_timeout, transport.flush())
                .await
                .map_err(|_| SmtpError::new(ErrorKind::ConnectionTimeout, "write timed out"))?
                .map_err(SmtpError::from)?;
        }
        let resp = timeout(
            self.socket_timeout,
            read_response(
                self.transport.as_mut().expect("connection transport missing"),
                &mut self.buf,
            ),
        )
        .await
        .map_err(|_| SmtpError::new(ErrorKind::ConnectionTimeout, "read timed out"))?
        .map_err(SmtpError::from)?;
        self.state = if resp.is_success() { State::Ready } else { State::Error };
        Ok(resp)
    }

    async fn send_raw(&mut self, line: &str) -> Result<Response, SmtpError> {
        {
            let transport = self
                .transport
                .as_mut()
                .expect("connection transport missing");
            let write = async {
                transport.write_all(line.as_bytes()).await?;
                transport.write_all(b"\r\n").await?;
                transport.flush().await
            };
            timeout(self.socket_timeout, write)
                .await
                .map_err(|_| SmtpError::new(ErrorKind::ConnectionTimeout, "write timed out"))??;
        }
        let resp = timeout(
            self.socket_timeout,
            read_response(
                self.transport.as_mut().expect("connection transport missing"),
                &mut self.buf,
            ),
        )
        .await
        .map_err(|_| SmtpError::new(ErrorKind::ConnectionTimeout, "read timed out"))?
        .map_err(SmtpError::from)?;
        Ok(resp)
    }

    /// Send `QUIT`, ignore whatever comes back, and tear down the socket.
    pub async fn quit(&mut self) {
        self.state = State::Closing;
        let _ = timeout(self.socket_timeout, async {
            if let Some(transport) = self.transport.as_mut() {
                let _ = transport.write_all(b"QUIT\r\n").await;
                let _ = transport.flush().await;
                let mut discard = Vec::new();
                let _ = read_response(transport, &mut discard).await;
            }
        })
        .await;
        self.transport = None;
        self.state = State::Closed;
        let _ = self.events.send(Event::Close);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_have_expected_values() {
        let opts = ConnectionOptions::default();
        assert_eq!(opts.port, 587);
        assert!(!opts.secure);
        assert!(opts.reject_unauthorized);
        assert_eq!(opts.connection_timeout, Duration::from_millis(10_000));
        assert_eq!(opts.greeting_timeout, Duration::from_millis(5_000));
        assert_eq!(opts.socket_timeout, Duration::from_millis(60_000));
    }
}
