//! Byte-stream to line framing.
//!
//! The module answers in terminator-delimited lines, with one exception: the
//! SMS write prompt `"> "` arrives with no terminator at all and the module
//! then waits for the body. [`LineFramer`] therefore emits a buffer that
//! exactly equals a known prompt token without waiting for a terminator.

use bytes::{Buf, BytesMut};
use tracing::warn;

/// Default line terminator.
pub const DEFAULT_LINE_END: &str = "\r\n";

/// Bare prompt sent before an SMS body.
pub const DEFAULT_PROMPT: &str = "> ";

/// Maximum bytes held without a terminator before the buffer is flushed as
/// one line. AT lines are rarely longer than a few hundred bytes.
pub const MAX_BUF: usize = 8192;

/// Accumulates raw bytes and splits them into lines.
#[derive(Debug)]
pub struct LineFramer {
    buf: BytesMut,
    terminator: Vec<u8>,
    prompts: Vec<Vec<u8>>,
}

impl LineFramer {
    /// Create a framer splitting on `terminator`, recognising the default
    /// `"> "` prompt. An empty terminator falls back to `"\r\n"`.
    pub fn new(terminator: &str) -> Self {
        let terminator = if terminator.is_empty() {
            DEFAULT_LINE_END
        } else {
            terminator
        };
        LineFramer {
            buf: BytesMut::with_capacity(256),
            terminator: terminator.as_bytes().to_vec(),
            prompts: vec![DEFAULT_PROMPT.as_bytes().to_vec()],
        }
    }

    /// Replace the set of terminator-less prompt tokens.
    pub fn with_prompts<I, S>(mut self, prompts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.prompts = prompts
            .into_iter()
            .map(|p| p.as_ref().as_bytes().to_vec())
            .filter(|p| !p.is_empty())
            .collect();
        self
    }

    /// Append `bytes` and iterate over every line now complete.
    ///
    /// The iterator is lazy; lines not pulled stay buffered and are returned
    /// by the next call.
    pub fn feed(&mut self, bytes: &[u8]) -> Lines<'_> {
        self.buf.extend_from_slice(bytes);
        Lines { framer: self }
    }

    /// Pop the next complete line, if any.
    pub fn next_line(&mut self) -> Option<String> {
        if let Some(pos) = find(&self.buf, &self.terminator) {
            let line = self.buf.split_to(pos);
            self.buf.advance(self.terminator.len());
            return Some(decode(&line));
        }

        if self.prompts.iter().any(|p| self.buf[..] == p[..]) {
            let prompt = self.buf.split();
            return Some(String::from_utf8_lossy(&prompt).into_owned());
        }

        if self.buf.len() > MAX_BUF {
            warn!(len = self.buf.len(), "no terminator within MAX_BUF, flushing as a line");
            let line = self.buf.split();
            return Some(decode(&line));
        }
        None
    }

    /// Number of bytes waiting for a terminator.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Discard any partial line.
    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new(DEFAULT_LINE_END)
    }
}

/// Lines completed by one [`LineFramer::feed`] call.
pub struct Lines<'a> {
    framer: &'a mut LineFramer,
}

impl Iterator for Lines<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.framer.next_line()
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Lossy decode with trailing carriage control removed. A module that echoes
/// `AT\r` before answering `\r\n` would otherwise leave `\r` on the echo.
fn decode(line: &[u8]) -> String {
    String::from_utf8_lossy(line)
        .trim_end_matches(['\r', '\n'])
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all(framer: &mut LineFramer, bytes: &[u8]) -> Vec<String> {
        framer.feed(bytes).collect()
    }

    #[test]
    fn splits_multiple_lines_in_one_chunk() {
        let mut f = LineFramer::default();
        let lines = all(&mut f, b"AT+GSN\r\r\n861234\r\n\r\nOK\r\n");
        assert_eq!(lines, vec!["AT+GSN", "861234", "", "OK"]);
        assert_eq!(f.buffered(), 0);
    }

    #[test]
    fn keeps_partial_line_for_next_feed() {
        let mut f = LineFramer::default();
        assert_eq!(all(&mut f, b"+CSQ: 1"), Vec::<String>::new());
        assert_eq!(f.buffered(), 7);
        assert_eq!(all(&mut f, b"8,0\r\nOK"), vec!["+CSQ: 18,0"]);
        assert_eq!(all(&mut f, b"\r\n"), vec!["OK"]);
    }

    #[test]
    fn terminator_split_across_feeds() {
        let mut f = LineFramer::default();
        assert!(all(&mut f, b"OK\r").is_empty());
        assert_eq!(all(&mut f, b"\n"), vec!["OK"]);
    }

    #[test]
    fn chunk_boundaries_do_not_change_output() {
        let stream: &[u8] =
            b"AT+CMGL=\"ALL\"\r\r\n+CMGL: 1,\"REC READ\",\"+100\"\r\nhi\r\n\r\nRING\r\n\r\nOK\r\n";
        let mut whole = LineFramer::default();
        let expected = all(&mut whole, stream);

        for size in 1..stream.len() {
            let mut f = LineFramer::default();
            let mut got = Vec::new();
            for chunk in stream.chunks(size) {
                got.extend(f.feed(chunk));
            }
            assert_eq!(got, expected, "chunk size {size}");
        }
    }

    #[test]
    fn bare_prompt_is_emitted_without_terminator() {
        let mut f = LineFramer::default();
        let lines = all(&mut f, b"AT+CMGS=\"+100\"\r\r\n> ");
        assert_eq!(lines, vec!["AT+CMGS=\"+100\"", "> "]);
        assert_eq!(f.buffered(), 0);
    }

    #[test]
    fn prompt_is_not_emitted_twice() {
        let mut f = LineFramer::default();
        assert_eq!(all(&mut f, b"> "), vec!["> "]);
        assert!(all(&mut f, b"").is_empty());
        assert_eq!(all(&mut f, b"\r\n+CMGS: 7\r\n"), vec!["", "+CMGS: 7"]);
    }

    #[test]
    fn prompt_prefix_waits_for_more() {
        let mut f = LineFramer::default();
        assert!(all(&mut f, b">").is_empty());
        assert_eq!(all(&mut f, b" "), vec!["> "]);
    }

    #[test]
    fn custom_terminator() {
        let mut f = LineFramer::new("\n");
        assert_eq!(all(&mut f, b"OK\r\nERROR\n"), vec!["OK", "ERROR"]);
    }

    #[test]
    fn custom_prompts() {
        let mut f = LineFramer::default().with_prompts(["DOWNLOAD"]);
        assert_eq!(all(&mut f, b"DOWNLOAD"), vec!["DOWNLOAD"]);
        assert!(all(&mut f, b"> ").is_empty());
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let mut f = LineFramer::default();
        let lines = all(&mut f, &[0xFF, b'O', b'K', b'\r', b'\n']);
        assert_eq!(lines, vec!["\u{FFFD}OK"]);
    }

    #[test]
    fn lazy_iteration_keeps_unpulled_lines() {
        let mut f = LineFramer::default();
        let first = f.feed(b"A\r\nB\r\n").next();
        assert_eq!(first.as_deref(), Some("A"));
        assert_eq!(f.next_line().as_deref(), Some("B"));
        assert!(f.next_line().is_none());
    }

    #[test]
    fn runaway_buffer_is_flushed_not_dropped() {
        let mut f = LineFramer::default();
        let noise = vec![b'A'; MAX_BUF + 1];
        let lines = all(&mut f, &noise);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].len(), MAX_BUF + 1);
        assert_eq!(f.buffered(), 0);
        assert_eq!(all(&mut f, b"OK\r\n"), vec!["OK"]);
    }

    #[test]
    fn empty_terminator_falls_back_to_default() {
        let mut f = LineFramer::new("");
        assert_eq!(all(&mut f, b"OK\r\n"), vec!["OK"]);
    }
}
