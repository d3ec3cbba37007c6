//! Capability table parsed from an EHLO reply.
//!
//! Extracts `AUTH` mechanisms, `SIZE`, and the bare-token capabilities
//! (`STARTTLS`, `8BITMIME`, `PIPELINING`, `ENHANCEDSTATUSCODES`, `SMTPUTF8`,
//! `CHUNKING`) a server may advertise.

/// Capabilities advertised by the server in its EHLO reply. Reset on every
/// EHLO, initial and post-STARTTLS.
#[derive(Debug, Clone, Default)]
pub struct Capabilities {
    pub auth: Vec<String>,
    pub size: Option<u64>,
    pub starttls: bool,
    pub eightbitmime: bool,
    pub pipelining: bool,
    pub enhanced_status_codes: bool,
    pub smtputf8: bool,
    pub chunking: bool,
}

impl Capabilities {
    /// Parse from the EHLO reply's lines, skipping the first line, which
    /// echoes the server's hostname rather than naming a capability.
    pub fn parse(lines: &[String]) -> Self {
        let mut caps = Capabilities::default();
        for line in lines.iter().skip(1) {
            let upper = line.to_uppercase();
            if upper == "STARTTLS" {
                caps.starttls = true;
            } else if upper == "8BITMIME" {
                caps.eightbitmime = true;
            } else if upper == "PIPELINING" {
                caps.pipelining = true;
            } else if upper == "ENHANCEDSTATUSCODES" {
                caps.enhanced_status_codes = true;
            } else if upper == "SMTPUTF8" {
                caps.smtputf8 = true;
            } else if upper == "CHUNKING" {
                caps.chunking = true;
            } else if let Some(rest) = upper.strip_prefix("AUTH ") {
                for word in rest.split_whitespace() {
                    caps.auth.push(word.to_string());
                }
            } else if let Some(rest) = upper.strip_prefix("SIZE ") {
                caps.size = rest.trim().parse().ok();
            }
        }
        caps
    }

    pub fn supports_mechanism(&self, name: &str) -> bool {
        self.auth.iter().any(|m| m.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_auth_methods_and_flags() {
        let caps = Capabilities::parse(&lines(&[
            "mail.example.com",
            "AUTH PLAIN LOGIN CRAM-MD5",
            "SIZE 35882577",
            "STARTTLS",
            "8BITMIME",
            "PIPELINING",
            "ENHANCEDSTATUSCODES",
            "SMTPUTF8",
        ]));
        assert_eq!(caps.auth, vec!["PLAIN", "LOGIN", "CRAM-MD5"]);
        assert_eq!(caps.size, Some(35882577));
        assert!(caps.starttls);
        assert!(caps.eightbitmime);
        assert!(caps.pipelining);
        assert!(caps.enhanced_status_codes);
        assert!(caps.smtputf8);
        assert!(caps.supports_mechanism("plain"));
    }

    #[test]
    fn unknown_server_leaves_defaults() {
        let caps = Capabilities::parse(&lines(&["mail.example.com"]));
        assert!(caps.auth.is_empty());
        assert!(!caps.starttls);
    }
}
