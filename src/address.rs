//! Address parsing and formatting for RFC 5322 mailbox fields.
//!
//! `format_display` builds `"name" <addr>` display strings for outbound
//! headers; `extract_address` does the inverse, pulling the bare
//! `addr@domain` out of a display-form or bracketed string. Callers may also
//! supply a structured `{ name, address }` form directly.

/// One address as supplied by a caller: bare, display-form, or structured.
#[derive(Debug, Clone)]
pub enum Address {
    /// `addr@domain`, with no display name.
    Bare(String),
    /// `"Name" <addr@domain>` or `Name <addr@domain>`.
    Display(String),
    /// Structured `{ name, address }`.
    Structured { name: Option<String>, address: String },
}

impl Address {
    pub fn bare(address: impl Into<String>) -> Self {
        Address::Bare(address.into())
    }

    pub fn named(name: impl Into<String>, address: impl Into<String>) -> Self {
        Address::Structured {
            name: Some(name.into()),
            address: address.into(),
        }
    }

    /// Extract the bare `addr@domain`: the bracketed part if present, else
    /// the structured `address` field, else the whole string.
    pub fn extract(&self) -> String {
        match self {
            Address::Bare(s) => extract_address(s),
            Address::Display(s) => extract_address(s),
            Address::Structured { address, .. } => address.clone(),
        }
    }

    /// Format for an RFC 5322 header: `"name" <address>` when a display
    /// name is available, else the raw string/address.
    pub fn format_display(&self) -> String {
        match self {
            Address::Bare(s) => s.clone(),
            Address::Display(s) => s.clone(),
            Address::Structured { name, address } => match name {
                Some(n) if !n.is_empty() => format!("\"{}\" <{}>", n, address),
                _ => address.clone(),
            },
        }
    }
}

/// `extract_address("Name <a@b>") == "a@b"`; idempotent for bare addresses.
pub fn extract_address(s: &str) -> String {
    if let Some(open) = s.find('<') {
        if let Some(close) = s[open..].find('>') {
            return s[open + 1..open + close].trim().to_string();
        }
    }
    s.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_bracketed_address() {
        assert_eq!(extract_address("Name <a@b>"), "a@b");
        assert_eq!(extract_address("\"Doe, J\" <j@d.com>"), "j@d.com");
    }

    #[test]
    fn bare_address_is_idempotent() {
        assert_eq!(extract_address("a@b.com"), "a@b.com");
        assert_eq!(extract_address(&extract_address("a@b.com")), "a@b.com");
    }

    #[test]
    fn structured_extracts_address_field() {
        let a = Address::named("Jane", "jane@example.com");
        assert_eq!(a.extract(), "jane@example.com");
        assert_eq!(a.format_display(), "\"Jane\" <jane@example.com>");
    }

    #[test]
    fn structured_without_name_formats_bare() {
        let a = Address::Structured { name: None, address: "a@b.com".into() };
        assert_eq!(a.format_display(), "a@b.com");
    }
}
