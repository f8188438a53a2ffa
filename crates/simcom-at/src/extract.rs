//! Pulling payload out of collected response lines.
//!
//! Information responses repeat the command name before their data
//! (`AT+CSQ` answers `+CSQ: 18,0`). These helpers strip that prefix and split
//! the comma separated, optionally quoted, field lists most responses and
//! unsolicited codes use.

use std::sync::LazyLock;

use regex::Regex;

use simcom_core::types::Response;

static COMMAND_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^AT([^=?]*)").expect("command name pattern"));

/// Split a field list, honouring double quotes.
///
/// Quotes are removed, commas inside quotes are kept, each field is trimmed
/// and a trailing empty field is dropped.
///
/// ```
/// use simcom_at::extract::parse_fields;
///
/// assert_eq!(parse_fields(r#""SM",3"#), vec!["SM", "3"]);
/// assert_eq!(parse_fields(r#"1,"Hi, there",15"#), vec!["1", "Hi, there", "15"]);
/// ```
pub fn parse_fields(s: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut item = String::new();
    let mut quoted = false;

    for c in s.chars() {
        match c {
            '"' => quoted = !quoted,
            ',' if !quoted => fields.push(std::mem::take(&mut item)),
            _ => item.push(c),
        }
    }
    if !item.is_empty() {
        fields.push(item);
    }

    fields.into_iter().map(|f| f.trim().to_string()).collect()
}

/// The name an information response is prefixed with: `AT+CSQ` → `+CSQ`,
/// `AT+CREG?` → `+CREG`, `ATI` → `I`.
pub fn command_name(command: &str) -> Option<&str> {
    COMMAND_NAME
        .captures(command)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Data lines of `response` with the command name prefix removed.
///
/// The prefix is stripped from the first line that carries it; a blank line
/// resets that, so every block of a multi-block answer is stripped once.
/// A line that is nothing but the prefix is dropped.
pub fn extract_response(response: &Response) -> Vec<String> {
    let Some(name) = command_name(&response.command) else {
        return Vec::new();
    };

    let mut result = Vec::new();
    let mut matched = false;

    for line in &response.lines {
        if line.is_empty() {
            matched = false;
            continue;
        }
        match strip_name(line, name, &mut matched) {
            Some(text) => result.push(text.to_string()),
            None => continue,
        }
    }
    result
}

/// A header line paired with the PDU line that followed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PduEntry {
    /// Header with the command prefix stripped (`1,"REC READ",,23`).
    pub header: String,
    /// The raw PDU (hex) line.
    pub pdu: String,
}

/// Pair each header line with the PDU line after it, as `+CMGR` and
/// `+CMGL` answer in PDU mode. A header with no following line is dropped.
pub fn extract_pdu_pairs(response: &Response) -> Vec<PduEntry> {
    let Some(name) = command_name(&response.command) else {
        return Vec::new();
    };

    let mut entries = Vec::new();
    let mut matched = false;
    let mut header: Option<String> = None;

    for line in &response.lines {
        if line.is_empty() {
            matched = false;
            continue;
        }
        match header.take() {
            Some(h) => entries.push(PduEntry {
                header: h,
                pdu: line.clone(),
            }),
            None => {
                if let Some(text) = strip_name(line, name, &mut matched) {
                    header = Some(text.to_string());
                }
            }
        }
    }
    entries
}

fn strip_name<'a>(line: &'a str, name: &str, matched: &mut bool) -> Option<&'a str> {
    if *matched || name.is_empty() {
        return Some(line);
    }
    match line.strip_prefix(name) {
        Some(rest) => {
            *matched = true;
            let rest = rest.trim_start_matches(|c: char| c == ':' || c.is_whitespace());
            (!rest.is_empty()).then_some(rest)
        }
        None => Some(line),
    }
}
