//! SMTP response parser: byte accumulation, CRLF line splitting, and
//! multi-line response assembly (RFC 5321 §4.2), validating each line
//! against the `^(\d{3})([- ])(.*)$` shape and discarding malformed lines
//! rather than failing the read.

use tokio::io::{AsyncRead, AsyncReadExt};

/// One complete SMTP response: a status code shared by every line, and the
/// text of each line (continuation marker stripped).
#[derive(Debug, Clone)]
pub struct Response {
    pub code: u16,
    pub lines: Vec<String>,
}

impl Response {
    /// The text of the final line, used for error messages.
    pub fn message(&self) -> &str {
        self.lines.last().map(|s| s.as_str()).unwrap_or("")
    }

    /// `code ∈ [200,399]` is treated as success at the command-queue layer;
    /// 2xx/3xx both resolve a command (354 "start mail input" notably).
    pub fn is_success(&self) -> bool {
        (200..400).contains(&self.code)
    }

    /// Join every line's text with spaces, for a single-string rendering.
    pub fn joined_message(&self) -> String {
        self.lines.join(" ")
    }
}

/// Parse one line against `^(\d{3})([- ])(.*)$`. Returns `(code,
/// continuation, text)` or `None` if the line is malformed, in which case
/// it is discarded rather than aborting the read.
fn parse_line(line: &str) -> Option<(u16, bool, &str)> {
    if line.len() < 3 {
        return None;
    }
    let (code_str, rest) = line.split_at(3);
    let code: u16 = code_str.parse().ok()?;
    match rest.chars().next() {
        Some('-') => Some((code, true, rest[1..].trim_start())),
        Some(' ') => Some((code, false, rest[1..].trim_start())),
        None => Some((code, false, "")),
        _ => None,
    }
}

/// Read one complete SMTP response (single-line or multi-line) from the
/// stream, accumulating bytes until a terminating non-continuation line.
pub async fn read_response<S>(stream: &mut S, buf: &mut Vec<u8>) -> std::io::Result<Response>
where
    S: AsyncRead + Unpin,
{
    buf.clear();
    let mut lines = Vec::new();
    loop {
        while buf.len() < 2 || &buf[buf.len() - 2..] != b"\r\n" {
            let mut b = [0u8; 1];
            let n = stream.read(&mut b).await?;
            if n == 0 {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed while reading response",
                ));
            }
            buf.push(b[0]);
        }
        let line_end = buf.len() - 2;
        let line = String::from_utf8_lossy(&buf[..line_end]).to_string();
        buf.clear();
        match parse_line(&line) {
            Some((code, continuation, text)) => {
                lines.push(text.to_string());
                if !continuation {
                    return Ok(Response { code, lines });
                }
            }
            None => continue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn parses_single_line() {
        let mut stream = Cursor::new(b"250 OK\r\n".to_vec());
        let mut buf = Vec::new();
        let r = read_response(&mut stream, &mut buf).await.unwrap();
        assert_eq!(r.code, 250);
        assert_eq!(r.lines, vec!["OK".to_string()]);
        assert!(r.is_success());
    }

    #[tokio::test]
    async fn parses_multi_line() {
        let mut stream = Cursor::new(b"250-PIPELINING\r\n250-SIZE 10240000\r\n250 HELP\r\n".to_vec());
        let mut buf = Vec::new();
        let r = read_response(&mut stream, &mut buf).await.unwrap();
        assert_eq!(r.code, 250);
        assert_eq!(r.lines, vec!["PIPELINING", "SIZE 10240000", "HELP"]);
    }

    #[tokio::test]
    async fn discards_malformed_lines() {
        let mut stream = Cursor::new(b"not-a-response\r\n250 OK\r\n".to_vec());
        let mut buf = Vec::new();
        let r = read_response(&mut stream, &mut buf).await.unwrap();
        assert_eq!(r.code, 250);
        assert_eq!(r.lines, vec!["OK".to_string()]);
    }

    #[test]
    fn five_xx_is_not_success() {
        let r = Response { code: 550, lines: vec!["rejected".into()] };
        assert!(!r.is_success());
    }
}
