//! SASL authentication: mechanism selection and the PLAIN/LOGIN/CRAM-MD5/
//! XOAUTH2 protocols (RFC 4616, RFC 2195, XOAUTH2's initial-response
//! exchange).

use hmac::{Hmac, Mac};
use md5::Md5;
use zeroize::Zeroize;

use crate::connection::Connection;
use crate::encoding::base64;
use crate::error::{ErrorKind, SmtpError};
use crate::response::Response;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mechanism {
    Plain,
    Login,
    CramMd5,
    XOAuth2,
}

impl Mechanism {
    fn name(&self) -> &'static str {
        match self {
            Mechanism::Plain => "PLAIN",
            Mechanism::Login => "LOGIN",
            Mechanism::CramMd5 => "CRAM-MD5",
            Mechanism::XOAuth2 => "XOAUTH2",
        }
    }
}

/// Credentials supplied by the caller. `mechanism` pins an explicit choice:
/// it must be in the server's advertised list or authentication fails
/// immediately. Left `None`, the mechanism is picked automatically.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: Option<String>,
    pub oauth_token: Option<String>,
    pub mechanism: Option<Mechanism>,
}

impl Credentials {
    pub fn plain(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: Some(password.into()),
            oauth_token: None,
            mechanism: None,
        }
    }

    pub fn xoauth2(username: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: None,
            oauth_token: Some(token.into()),
            mechanism: Some(Mechanism::XOAuth2),
        }
    }

    /// Overwrite secret material in place once authentication has finished,
    /// so it doesn't linger in memory longer than the exchange needs it.
    fn zero(&mut self) {
        self.username.zeroize();
        if let Some(p) = self.password.as_mut() {
            p.zeroize();
        }
        if let Some(t) = self.oauth_token.as_mut() {
            t.zeroize();
        }
    }
}

/// Mechanism selection: an explicit `credentials.mechanism` must be
/// advertised or auth fails immediately; otherwise XOAUTH2 is used when a
/// token is present and advertised, else the first of CRAM-MD5 > LOGIN >
/// PLAIN that the server advertises.
fn select_mechanism(creds: &Credentials, caps: &crate::capabilities::Capabilities) -> Result<Mechanism, SmtpError> {
    if let Some(explicit) = creds.mechanism {
        return if caps.supports_mechanism(explicit.name()) {
            Ok(explicit)
        } else {
            Err(SmtpError::new(
                ErrorKind::AuthFailed,
                format!("server does not advertise requested mechanism {}", explicit.name()),
            ))
        };
    }
    if creds.oauth_token.is_some() && caps.supports_mechanism("XOAUTH2") {
        return Ok(Mechanism::XOAuth2);
    }
    for candidate in [Mechanism::CramMd5, Mechanism::Login, Mechanism::Plain] {
        if caps.supports_mechanism(candidate.name()) {
            return Ok(candidate);
        }
    }
    Err(SmtpError::new(
        ErrorKind::AuthFailed,
        "server advertises no mechanism this client supports",
    ))
}

fn fail(resp: &Response, solution: &str) -> SmtpError {
    SmtpError::auth_failed(SmtpError::smtp(resp.code, resp.joined_message()), solution)
}

/// Authenticate `conn` with `creds`, picking a mechanism per
/// `select_mechanism`. Credentials are zeroed before returning, success or
/// failure.
pub async fn authenticate(conn: &mut Connection, creds: &mut Credentials) -> Result<(), SmtpError> {
    let mechanism = select_mechanism(creds, &conn.capabilities)?;
    let result = match mechanism {
        Mechanism::Plain => auth_plain(conn, creds).await,
        Mechanism::Login => auth_login(conn, creds).await,
        Mechanism::CramMd5 => auth_cram_md5(conn, creds).await,
        Mechanism::XOAuth2 => auth_xoauth2(conn, creds).await,
    };
    creds.zero();
    result
}

async fn auth_plain(conn: &mut Connection, creds: &Credentials) -> Result<(), SmtpError> {
    let password = creds
        .password
        .as_deref()
        .ok_or_else(|| SmtpError::new(ErrorKind::AuthFailed, "PLAIN requires a password"))?;
    let payload = format!("\0{}\0{}", creds.username, password);
    let resp = conn
        .send_auth_line(&format!("AUTH PLAIN {}", base64::encode(payload.as_bytes())))
        .await?;
    if resp.is_success() {
        Ok(())
    } else {
        Err(fail(&resp, "Check username and password"))
    }
}

async fn auth_login(conn: &mut Connection, creds: &Credentials) -> Result<(), SmtpError> {
    let password = creds
        .password
        .as_deref()
        .ok_or_else(|| SmtpError::new(ErrorKind::AuthFailed, "LOGIN requires a password"))?;

    let resp = conn.send_auth_line("AUTH LOGIN").await?;
    if resp.code != 334 {
        return Err(fail(&resp, "Check username and password"));
    }
    let resp = conn
        .send_auth_line(&base64::encode(creds.username.as_bytes()))
        .await?;
    if resp.code != 334 {
        return Err(fail(&resp, "Check username and password"));
    }
    let resp = conn
        .send_auth_line(&base64::encode(password.as_bytes()))
        .await?;
    if resp.is_success() {
        Ok(())
    } else {
        Err(fail(&resp, "Check username and password"))
    }
}

/// `HMAC-MD5(password, challenge)`, hex-encoded, as RFC 2195 specifies.
/// Split out from `auth_cram_md5` so the RFC's worked example can be
/// tested without a live connection.
fn cram_md5_digest(password: &str, challenge: &[u8]) -> String {
    let mut mac =
        Hmac::<Md5>::new_from_slice(password.as_bytes()).expect("HMAC accepts a key of any length");
    mac.update(challenge);
    let digest = mac.finalize().into_bytes();
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

async fn auth_cram_md5(conn: &mut Connection, creds: &Credentials) -> Result<(), SmtpError> {
    let password = creds
        .password
        .as_deref()
        .ok_or_else(|| SmtpError::new(ErrorKind::AuthFailed, "CRAM-MD5 requires a password"))?;

    let resp = conn.send_auth_line("AUTH CRAM-MD5").await?;
    if resp.code != 334 {
        return Err(fail(&resp, "Check username and password"));
    }
    let challenge = base64::decode(resp.message())?;
    let digest = cram_md5_digest(password, &challenge);
    let response_payload = format!("{} {}", creds.username, digest);
    let resp = conn
        .send_auth_line(&base64::encode(response_payload.as_bytes()))
        .await?;
    if resp.is_success() {
        Ok(())
    } else {
        Err(fail(&resp, "Check username and password"))
    }
}

async fn auth_xoauth2(conn: &mut Connection, creds: &Credentials) -> Result<(), SmtpError> {
    let token = creds
        .oauth_token
        .as_deref()
        .ok_or_else(|| SmtpError::new(ErrorKind::AuthFailed, "XOAUTH2 requires an access token"))?;
    let payload = format!("user={}\x01auth=Bearer {}\x01\x01", creds.username, token);
    let resp = conn
        .send_auth_line(&format!("AUTH XOAUTH2 {}", base64::encode(payload.as_bytes())))
        .await?;
    if resp.is_success() {
        return Ok(());
    }
    if resp.code == 334 {
        // Server returned a structured error as a continuation; RFC
        // requires an empty response before it will emit the final failure.
        let final_resp = conn.send_auth_line("").await?;
        return Err(fail(&final_resp, "Check access token validity and scopes"));
    }
    Err(fail(&resp, "Check access token validity and scopes"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::Capabilities;

    #[test]
    fn cram_md5_matches_rfc2195_vector() {
        let challenge = base64::decode("PDEyMzQ1LjY3ODkwQGV4YW1wbGUuY29tPg==").unwrap();
        assert_eq!(
            String::from_utf8(challenge.clone()).unwrap(),
            "<12345.67890@example.com>"
        );
        let digest = cram_md5_digest("tanstaaftanstaaf", &challenge);
        assert_eq!(digest, "b913a602c7eda7a495b4e6e7334d3890");
        let response_payload = format!("tim {}", digest);
        assert_eq!(
            base64::encode(response_payload.as_bytes()),
            base64::encode(b"tim b913a602c7eda7a495b4e6e7334d3890")
        );
    }

    fn caps(methods: &[&str]) -> Capabilities {
        let mut c = Capabilities::default();
        c.auth = methods.iter().map(|s| s.to_string()).collect();
        c
    }

    #[test]
    fn prefers_cram_md5_over_login_and_plain() {
        let creds = Credentials::plain("tim", "tanstaaftanstaaf");
        let picked = select_mechanism(&creds, &caps(&["PLAIN", "LOGIN", "CRAM-MD5"])).unwrap();
        assert_eq!(picked, Mechanism::CramMd5);
    }

    #[test]
    fn falls_back_to_plain_when_nothing_else_advertised() {
        let creds = Credentials::plain("tim", "secret");
        let picked = select_mechanism(&creds, &caps(&["PLAIN"])).unwrap();
        assert_eq!(picked, Mechanism::Plain);
    }

    #[test]
    fn xoauth2_preferred_when_token_present_and_advertised() {
        let creds = Credentials {
            username: "tim".to_string(),
            password: None,
            oauth_token: Some("tok".to_string()),
            mechanism: None,
        };
        let picked = select_mechanism(&creds, &caps(&["PLAIN", "XOAUTH2"])).unwrap();
        assert_eq!(picked, Mechanism::XOAuth2);
    }

    #[test]
    fn explicit_mechanism_not_advertised_fails_immediately() {
        let mut creds = Credentials::plain("tim", "secret");
        creds.mechanism = Some(Mechanism::CramMd5);
        let err = select_mechanism(&creds, &caps(&["PLAIN"])).unwrap_err();
        assert_eq!(err.kind, ErrorKind::AuthFailed);
    }

    #[test]
    fn no_supported_mechanism_advertised_fails() {
        let creds = Credentials::plain("tim", "secret");
        let err = select_mechanism(&creds, &caps(&["DIGEST-MD5"])).unwrap_err();
        assert_eq!(err.kind, ErrorKind::AuthFailed);
    }
}
