//! Command and response types shared by the engine and its callers.

use std::fmt;
use std::time::Duration;

/// Ctrl-Z, the byte that ends an SMS body after a `> ` prompt.
pub const CTRL_Z: u8 = 0x1A;

// ---------------------------------------------------------------------------
// Token sets
// ---------------------------------------------------------------------------

/// Alternate start/end token lists for one exchange.
///
/// While no start token has matched, every line is treated as unsolicited.
/// Once a start token matches, lines accumulate until a line equals one of
/// the enders. With `soft` set, a start matches when any non-empty start
/// token occurs inside the line, which tolerates echoes mangled with control
/// characters (`"\0AT"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSet {
    /// Lines that mark the beginning of the awaited response.
    pub starts: Vec<String>,
    /// Lines that complete the awaited response.
    pub enders: Vec<String>,
    /// Accept a start when a token is contained in the line.
    pub soft: bool,
}

impl TokenSet {
    /// Build an exact-match token set.
    pub fn new<S, E>(starts: S, enders: E) -> Self
    where
        S: IntoIterator,
        S::Item: Into<String>,
        E: IntoIterator,
        E::Item: Into<String>,
    {
        TokenSet {
            starts: starts.into_iter().map(Into::into).collect(),
            enders: enders.into_iter().map(Into::into).collect(),
            soft: false,
        }
    }

    /// Switch start matching to substring containment.
    pub fn soft(mut self) -> Self {
        self.soft = true;
        self
    }

    /// Does `line` begin the awaited response?
    pub fn is_start(&self, line: &str) -> bool {
        if self.soft {
            soft_contains(&self.starts, line)
        } else {
            self.starts.iter().any(|t| t == line)
        }
    }

    /// Does `line` complete the awaited response?
    pub fn is_end(&self, line: &str) -> bool {
        self.enders.iter().any(|t| t == line)
    }
}

/// True when any non-empty token occurs inside `line`.
///
/// ```
/// use simcom_core::types::soft_contains;
///
/// let tokens = ["Apple".to_string(), "Pear".to_string()];
/// assert!(soft_contains(&tokens, "Pear"));
/// assert!(soft_contains(&tokens, "Pearing"));
/// assert!(!soft_contains(&tokens, "Pe"));
/// ```
pub fn soft_contains(tokens: &[String], line: &str) -> bool {
    tokens
        .iter()
        .any(|t| !t.is_empty() && line.contains(t.as_str()))
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// A command request queued on the engine.
///
/// Built fluently:
///
/// ```
/// use simcom_core::types::Command;
/// use std::time::Duration;
///
/// let cmd = Command::new("AT+CMGS=\"+15551234\"")
///     .timeout(Duration::from_secs(10))
///     .payload(b"hello".to_vec());
/// assert_eq!(cmd.token(), "AT+CMGS=\"+15551234\"");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Bytes written before the command terminator.
    pub text: Vec<u8>,
    /// Time allowed for a final result; the engine default when `None`.
    pub timeout: Option<Duration>,
    /// Pattern the final result code must match (anchored, case-insensitive).
    pub expected_result: Option<String>,
    /// Body written after a `> ` prompt or `CONNECT` line.
    pub payload: Option<Vec<u8>>,
    /// Alternate start/end token lists.
    pub tokens: Option<TokenSet>,
}

impl Command {
    /// A textual AT command.
    pub fn new(text: impl Into<String>) -> Self {
        Self::raw(text.into().into_bytes())
    }

    /// A command made of raw bytes (for binary continuation stages).
    pub fn raw(bytes: impl Into<Vec<u8>>) -> Self {
        Command {
            text: bytes.into(),
            timeout: None,
            expected_result: None,
            payload: None,
            tokens: None,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Require the final result code to match `pattern`.
    pub fn expect(mut self, pattern: impl Into<String>) -> Self {
        self.expected_result = Some(pattern.into());
        self
    }

    pub fn payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    /// Correlate this command with alternate start/end tokens.
    pub fn tokens(mut self, tokens: TokenSet) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// The command token as the modem echoes it: the first line of the
    /// command text, decoded lossily.
    pub fn token(&self) -> String {
        let first = self
            .text
            .split(|&b| b == b'\r' || b == b'\n')
            .next()
            .unwrap_or(&[]);
        String::from_utf8_lossy(first).into_owned()
    }
}

impl From<&str> for Command {
    fn from(text: &str) -> Self {
        Command::new(text)
    }
}

impl From<String> for Command {
    fn from(text: String) -> Self {
        Command::new(text)
    }
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

/// The structured result of one command exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// The terminal line that ended the exchange (`OK`, `+CME ERROR: 3`, …).
    pub result_code: String,
    /// The command token that was issued (`AT+CSQ`).
    pub command: String,
    /// Data lines received between dispatch and the terminal line, in order,
    /// with the echo removed and one leading blank line trimmed.
    pub lines: Vec<String>,
    /// Whether `result_code` matched the expected pattern; `None` when the
    /// command carried no expectation.
    pub success: Option<bool>,
}

impl Response {
    /// First non-empty data line.
    pub fn first_line(&self) -> Option<&str> {
        self.lines
            .iter()
            .map(String::as_str)
            .find(|l| !l.trim().is_empty())
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.command, self.result_code)?;
        if !self.lines.is_empty() {
            write!(f, " [{}]", self.lines.join(" | "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_token_stops_at_carriage_return() {
        let cmd = Command::new("AT+CMGS=\"123\"\rhello");
        assert_eq!(cmd.token(), "AT+CMGS=\"123\"");
    }

    #[test]
    fn raw_command_token_is_lossy() {
        let cmd = Command::raw(vec![CTRL_Z]);
        assert_eq!(cmd.token(), "\u{1a}");
    }

    #[test]
    fn builder_sets_every_field() {
        let cmd = Command::new("ATD123;")
            .timeout(Duration::from_millis(250))
            .expect("OK")
            .payload(vec![1, 2])
            .tokens(TokenSet::new(["ATD123;"], ["OK"]));
        assert_eq!(cmd.timeout, Some(Duration::from_millis(250)));
        assert_eq!(cmd.expected_result.as_deref(), Some("OK"));
        assert_eq!(cmd.payload, Some(vec![1, 2]));
        assert!(cmd.tokens.is_some());
    }

    #[test]
    fn soft_token_set_accepts_mangled_echo() {
        let set = TokenSet::new(["AT", "\u{0}AT", "OK"], ["OK"]).soft();
        assert!(set.is_start("\u{0}AT"));
        assert!(set.is_start("xxATxx"));
        assert!(!set.is_start("RING"));
    }

    #[test]
    fn exact_token_set_rejects_substring() {
        let set = TokenSet::new(["OK"], ["OK"]);
        assert!(set.is_start("OK"));
        assert!(!set.is_start("+OK:"));
        assert!(!set.is_start("OKAY"));
    }

    #[test]
    fn empty_soft_token_never_matches() {
        let set = TokenSet::new([""], ["OK"]).soft();
        assert!(!set.is_start("anything"));
    }

    #[test]
    fn enders_are_exact() {
        let set = TokenSet::new(["+CMGS: "], ["OK", "ERROR"]).soft();
        assert!(set.is_end("OK"));
        assert!(!set.is_end("OK "));
    }

    #[test]
    fn first_line_skips_blanks() {
        let r = Response {
            result_code: "OK".into(),
            command: "AT+GSN".into(),
            lines: vec!["".into(), "861234".into(), "".into()],
            success: None,
        };
        assert_eq!(r.first_line(), Some("861234"));
        assert_eq!(r.to_string(), "AT+GSN -> OK [ | 861234 | ]");
    }
}
