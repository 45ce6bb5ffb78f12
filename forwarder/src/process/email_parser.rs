//! RFC 5322 validation using mailparse.
//!
//! The forwarder relays the stored message byte for byte. It only checks that
//! the bytes start with a well-formed header block (possibly empty), and pulls
//! a few headers out for logs.

use mailparse::{parse_headers, MailHeaderMap};
use sha2::{Digest, Sha256};
use tracing::info;

use crate::error::ForwardError;

/// Summary of a validated raw email.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedEmail {
    /// Message-Id header value (without angle brackets)
    pub message_id: Option<String>,
    /// Subject header value
    pub subject: Option<String>,
    /// Number of header fields
    pub header_count: usize,
    /// Size of the body after the header block
    pub body_length: usize,
    /// Hex SHA-256 of the full raw message
    pub sha256: String,
}

/// Longest piece of an offending header line quoted in an error.
const LINE_PREVIEW_LEN: usize = 64;

/// Validate raw RFC 5322 content (headers + body).
pub fn parse_raw_email(raw: &[u8]) -> Result<ParsedEmail, ForwardError> {
    if raw.is_empty() {
        return Err(ForwardError::MalformedEmail("empty message".to_string()));
    }

    check_header_block(raw).map_err(ForwardError::MalformedEmail)?;

    let (headers, body_offset) =
        parse_headers(raw).map_err(|e| ForwardError::MalformedEmail(e.to_string()))?;

    let message_id = headers
        .get_first_value("Message-ID")
        .map(|id| id.trim().trim_matches(|c| c == '<' || c == '>').to_string());

    let subject = headers.get_first_value("Subject");

    let parsed = ParsedEmail {
        message_id,
        subject,
        header_count: headers.len(),
        body_length: raw.len().saturating_sub(body_offset),
        sha256: hex::encode(Sha256::digest(raw)),
    };

    info!(
        message_id = ?parsed.message_id,
        subject = ?parsed.subject,
        header_count = parsed.header_count,
        body_length = parsed.body_length,
        sha256 = %parsed.sha256,
        "email_parse_complete"
    );

    Ok(parsed)
}

/// Check every header line up to the first blank line. mailparse turns a line
/// without a colon into a header named after the whole line, so this runs first.
fn check_header_block(raw: &[u8]) -> Result<(), String> {
    let mut seen_field = false;

    for line in raw.split(|&b| b == b'\n') {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.is_empty() {
            break;
        }

        if matches!(line[0], b' ' | b'\t') {
            if !seen_field {
                return Err(format!(
                    "continuation line before first header field: {}",
                    preview(line)
                ));
            }
            continue;
        }

        let name = match line.iter().position(|&b| b == b':') {
            Some(colon) => &line[..colon],
            None => return Err(format!("header line without colon: {}", preview(line))),
        };
        if !is_field_name(name) {
            return Err(format!("invalid header field name: {}", preview(name)));
        }
        seen_field = true;
    }

    Ok(())
}

/// RFC 5322 field-name: one or more printable US-ASCII bytes except ':'.
fn is_field_name(name: &[u8]) -> bool {
    !name.is_empty() && name.iter().all(|&b| (33..=126).contains(&b) && b != b':')
}

fn preview(bytes: &[u8]) -> String {
    let end = bytes.len().min(LINE_PREVIEW_LEN);
    String::from_utf8_lossy(&bytes[..end]).escape_debug().to_string()
}
