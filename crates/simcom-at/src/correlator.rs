//! Per-exchange state machine.
//!
//! The correlator decides, line by line, whether a line belongs to the
//! exchange in flight, completes it, or belongs to nobody. It never touches
//! the transport: writes are returned as [`Step::Write`] and carried out by
//! the engine.
//!
//! Two framings share one path. Without a [`TokenSet`] the exchange starts
//! at the command echo (or at dispatch when echo is off) and ends on any
//! result line. With one, lines are unclaimed until a start token matches,
//! and the exchange ends on an exact ender.
//!
//! Lines that arrive before an exchange has started are never collected. If
//! an earlier exchange timed out they are attributed to it as stale.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, trace, warn};

use simcom_core::error::{Error, Result};
use simcom_core::types::{CTRL_Z, Command, Response, TokenSet};

use crate::classify;
use crate::queue::ExchangeId;

/// Where an active exchange is in its write stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Command written, payload waiting for a `> ` prompt, `DOWNLOAD` or
    /// `CONNECT`.
    AwaitingPrompt,
    /// Command written, waiting for the final result.
    AwaitingResult,
    /// Payload written, waiting for the final result.
    AwaitingResultAfterPayload,
}

#[derive(Debug)]
struct Exchange {
    id: ExchangeId,
    token: String,
    expected: Option<String>,
    payload: Option<Vec<u8>>,
    payload_echo: Vec<String>,
    tokens: Option<TokenSet>,
    started: bool,
    lines: Vec<String>,
    phase: Phase,
    deadline: Instant,
}

#[derive(Debug)]
enum State {
    Idle,
    Active(Exchange),
    /// A timed-out exchange whose late lines are still being swallowed.
    Draining { id: ExchangeId, until: Instant },
}

/// What the engine should do with one line.
#[derive(Debug)]
pub enum Step {
    /// No exchange claimed the line.
    Unsolicited,
    /// The line was the command (or payload) echo and was dropped.
    Echo,
    /// The line was appended to the exchange's data lines.
    Collected,
    /// A late line from a timed-out exchange, dropped.
    Stale(ExchangeId),
    /// Write these bytes; the exchange continues.
    Write(Vec<u8>),
    /// Too many lines without an ender; these were discarded and the
    /// exchange fell back to default framing.
    Overflow(Vec<String>),
    /// The exchange is over.
    Finished {
        id: ExchangeId,
        outcome: Result<Response>,
    },
}

/// Tracks the single exchange in flight.
#[derive(Debug)]
pub struct Correlator {
    state: State,
    command_end: Vec<u8>,
    max_lines: usize,
    echo: bool,
    /// The last exchange that timed out, until a later one starts.
    stale: Option<ExchangeId>,
}

impl Correlator {
    /// `command_end` is appended to every command written; `max_lines` caps
    /// token-framed accumulation. Echo starts out on, as after power-up.
    pub fn new(command_end: &str, max_lines: usize) -> Self {
        Correlator {
            state: State::Idle,
            command_end: command_end.as_bytes().to_vec(),
            max_lines,
            echo: true,
            stale: None,
        }
    }

    /// Set whether the module echoes commands.
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// Whether default framing waits for the command echo.
    ///
    /// Tracks successful `ATE0`/`ATE1`/`ATZ`/`AT&F` exchanges.
    pub fn echo(&self) -> bool {
        self.echo
    }

    /// True when no exchange is active and no drain is running.
    pub fn is_idle(&self) -> bool {
        matches!(self.state, State::Idle)
    }

    /// Id of the active exchange.
    pub fn active(&self) -> Option<ExchangeId> {
        match &self.state {
            State::Active(ex) => Some(ex.id),
            _ => None,
        }
    }

    /// Current write stage of the active exchange.
    pub fn phase(&self) -> Option<Phase> {
        match &self.state {
            State::Active(ex) => Some(ex.phase),
            _ => None,
        }
    }

    /// When the engine next needs [`expire`](Self::expire) or
    /// [`on_drain_elapsed`](Self::on_drain_elapsed) called.
    pub fn deadline(&self) -> Option<Instant> {
        match &self.state {
            State::Idle => None,
            State::Active(ex) => Some(ex.deadline),
            State::Draining { until, .. } => Some(*until),
        }
    }

    /// Start exchange `id` and return the bytes to write.
    ///
    /// Replaces whatever state was current; the engine only calls this when
    /// [`is_idle`](Self::is_idle).
    pub fn begin(&mut self, id: ExchangeId, command: &Command, deadline: Instant) -> Vec<u8> {
        let payload_echo = command
            .payload
            .as_deref()
            .map(echo_lines)
            .unwrap_or_default();
        let phase = if command.payload.is_some() {
            Phase::AwaitingPrompt
        } else {
            Phase::AwaitingResult
        };
        let exchange = Exchange {
            id,
            token: command.token(),
            expected: command.expected_result.clone(),
            payload: command.payload.clone(),
            payload_echo,
            tokens: command.tokens.clone(),
            started: command.tokens.is_none() && !self.echo,
            lines: Vec::new(),
            phase,
            deadline,
        };
        debug!(%id, command = %exchange.token, ?phase, "dispatch");
        self.state = State::Active(exchange);

        let mut bytes = command.text.clone();
        bytes.extend_from_slice(&self.command_end);
        bytes
    }

    /// Feed one line that the unsolicited router did not consume.
    pub fn on_line(&mut self, line: &str, now: Instant) -> Step {
        if let State::Draining { id, until } = self.state {
            if now < until {
                if classify::is_result_line(line) {
                    debug!(%id, line, "late result, drain over");
                    self.state = State::Idle;
                } else {
                    trace!(%id, line, "late line dropped");
                }
                return Step::Stale(id);
            }
            self.state = State::Idle;
        }

        let State::Active(ex) = &mut self.state else {
            return Step::Unsolicited;
        };

        if ex.tokens.is_none() && !ex.started {
            if classify::is_echo(line, &ex.token) {
                trace!(id = %ex.id, line, "echo, exchange started");
                ex.started = true;
                self.stale = None;
                return Step::Echo;
            }
            return match self.stale {
                Some(id) => {
                    trace!(%id, line, "late line before echo dropped");
                    Step::Stale(id)
                }
                None => Step::Unsolicited,
            };
        }

        let step = match ex.tokens.clone() {
            Some(tokens) => token_line(ex, &tokens, line, self.max_lines),
            None => default_line(ex, line),
        };
        match step {
            Line::Step(step) => step,
            Line::Finish(code) => self.finish(code),
        }
    }

    /// Time out the active exchange if its deadline has passed.
    ///
    /// With a non-zero `grace` the correlator then drains: late lines are
    /// dropped until `grace` elapses or a late result line arrives.
    pub fn expire(&mut self, now: Instant, grace: Duration) -> Option<Step> {
        let State::Active(ex) = &self.state else {
            return None;
        };
        if now < ex.deadline {
            return None;
        }
        let id = ex.id;
        warn!(%id, command = %ex.token, "command timed out");
        self.stale = Some(id);
        self.state = if grace.is_zero() {
            State::Idle
        } else {
            State::Draining {
                id,
                until: now + grace,
            }
        };
        Some(Step::Finished {
            id,
            outcome: Err(Error::Timeout),
        })
    }

    /// End a drain whose window has passed. Returns true if one ended.
    pub fn on_drain_elapsed(&mut self, now: Instant) -> bool {
        match self.state {
            State::Draining { until, .. } if now >= until => {
                self.state = State::Idle;
                true
            }
            _ => false,
        }
    }

    /// Drop any exchange or drain, returning the active exchange id.
    pub fn abort(&mut self) -> Option<ExchangeId> {
        match std::mem::replace(&mut self.state, State::Idle) {
            State::Active(ex) => Some(ex.id),
            _ => None,
        }
    }

    fn finish(&mut self, result_code: String) -> Step {
        let State::Active(ex) = std::mem::replace(&mut self.state, State::Idle) else {
            return Step::Unsolicited;
        };

        let mut lines = ex.lines;
        if lines.first().is_some_and(|l| l.is_empty()) {
            lines.remove(0);
        }
        let success = ex
            .expected
            .as_deref()
            .map(|pattern| classify::matches_expected(pattern, &result_code));
        let response = Response {
            result_code,
            command: ex.token,
            lines,
            success,
        };
        debug!(id = %ex.id, result = %response.result_code, lines = response.lines.len(), "exchange finished");

        self.stale = None;
        if !classify::is_error_line(&response.result_code) {
            if let Some(echo) = classify::echo_setting(&response.command) {
                debug!(echo, "command echo mode changed");
                self.echo = echo;
            }
        }

        let outcome = if classify::is_error_line(&response.result_code) {
            Err(Error::Response {
                response: Box::new(response),
            })
        } else if success == Some(false) {
            Err(Error::Mismatch {
                response: Box::new(response),
            })
        } else {
            Ok(response)
        };
        Step::Finished { id: ex.id, outcome }
    }
}

enum Line {
    Step(Step),
    Finish(String),
}

fn default_line(ex: &mut Exchange, line: &str) -> Line {
    if is_payload_echo(ex, line) || classify::is_echo(line, &ex.token) {
        trace!(id = %ex.id, line, "echo");
        return Line::Step(Step::Echo);
    }
    if let Some(bytes) = payload_write(ex, line) {
        return Line::Step(Step::Write(bytes));
    }
    if classify::is_result_line(line) {
        return Line::Finish(line.to_string());
    }
    ex.lines.push(line.to_string());
    Line::Step(Step::Collected)
}

fn token_line(ex: &mut Exchange, tokens: &TokenSet, line: &str, max_lines: usize) -> Line {
    if !ex.started {
        if !tokens.is_start(line) {
            return Line::Step(Step::Unsolicited);
        }
        trace!(id = %ex.id, line, "start token");
        ex.started = true;
    }

    if let Some(bytes) = payload_write(ex, line) {
        return Line::Step(Step::Write(bytes));
    }
    if tokens.is_end(line) {
        return Line::Finish(line.to_string());
    }

    let echo = classify::is_echo(line, &ex.token)
        || (tokens.soft && !ex.token.is_empty() && line.contains(ex.token.as_str()));
    if echo || is_payload_echo(ex, line) {
        return Line::Step(Step::Echo);
    }

    ex.lines.push(line.to_string());
    if ex.lines.len() > max_lines {
        warn!(id = %ex.id, lines = ex.lines.len(), "no end token, dropping buffered lines");
        ex.tokens = None;
        ex.started = true;
        return Line::Step(Step::Overflow(std::mem::take(&mut ex.lines)));
    }
    Line::Step(Step::Collected)
}

/// On a prompt, `DOWNLOAD` or `CONNECT` with a payload pending, take the
/// bytes to write. Only the `> ` prompt gets a trailing Ctrl-Z.
fn payload_write(ex: &mut Exchange, line: &str) -> Option<Vec<u8>> {
    let prompt = classify::is_prompt(line);
    if !prompt && !classify::is_download(line) && !classify::is_connect(line) {
        return None;
    }
    let mut bytes = ex.payload.take()?;
    if prompt {
        bytes.push(CTRL_Z);
    }
    debug!(id = %ex.id, len = bytes.len(), "writing payload");
    ex.phase = Phase::AwaitingResultAfterPayload;
    Some(bytes)
}

fn is_payload_echo(ex: &Exchange, line: &str) -> bool {
    if ex.phase != Phase::AwaitingResultAfterPayload {
        return false;
    }
    let body = line
        .trim_start_matches("> ")
        .trim_end_matches(char::from(CTRL_Z))
        .trim_end();
    !body.is_empty() && ex.payload_echo.iter().any(|l| l == body)
}

fn echo_lines(payload: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(payload)
        .split(['\r', '\n'])
        .map(|l| l.trim_end_matches(char::from(CTRL_Z)).trim_end().to_string())
        .filter(|l| !l.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LONG: Duration = Duration::from_secs(5);

    fn now() -> Instant {
        Instant::from_std(std::time::Instant::now())
    }

    fn start(c: &mut Correlator, cmd: &Command) -> (ExchangeId, Instant) {
        let t = now();
        let id = ExchangeId(1);
        c.begin(id, cmd, t + LONG);
        (id, t)
    }

    fn finished(step: Step) -> Result<Response> {
        match step {
            Step::Finished { outcome, .. } => outcome,
            other => panic!("expected Finished, got {other:?}"),
        }
    }

    #[test]
    fn begin_writes_text_and_terminator() {
        let mut c = Correlator::new("\r", 15);
        let bytes = c.begin(ExchangeId(7), &Command::new("AT+CSQ"), now() + LONG);
        assert_eq!(bytes, b"AT+CSQ\r");
        assert_eq!(c.active(), Some(ExchangeId(7)));
        assert_eq!(c.phase(), Some(Phase::AwaitingResult));
    }

    #[test]
    fn ok_response_collects_data_and_trims_leading_blank() {
        let mut c = Correlator::new("\r", 15);
        let (_, t) = start(&mut c, &Command::new("AT+GSN"));
        assert!(matches!(c.on_line("AT+GSN", t), Step::Echo));
        assert!(matches!(c.on_line("", t), Step::Collected));
        assert!(matches!(c.on_line("861234567890123", t), Step::Collected));
        assert!(matches!(c.on_line("", t), Step::Collected));
        let r = finished(c.on_line("OK", t)).unwrap();
        assert_eq!(r.result_code, "OK");
        assert_eq!(r.command, "AT+GSN");
        assert_eq!(r.lines, vec!["861234567890123", ""]);
        assert_eq!(r.success, None);
        assert!(c.is_idle());
    }

    #[test]
    fn error_result_rejects_with_response() {
        let mut c = Correlator::new("\r", 15);
        let (_, t) = start(&mut c, &Command::new("AT+CPIN?"));
        c.on_line("AT+CPIN?", t);
        let err = finished(c.on_line("+CME ERROR: 10", t)).unwrap_err();
        match err {
            Error::Response { response } => {
                assert_eq!(response.result_code, "+CME ERROR: 10");
                assert_eq!(response.command, "AT+CPIN?");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn expected_result_match_and_mismatch() {
        let mut c = Correlator::new("\r", 15);
        let (_, t) = start(&mut c, &Command::new("ATD123").expect("CONNECT.*"));
        c.on_line("ATD123", t);
        let r = finished(c.on_line("CONNECT 9600", t)).unwrap();
        assert_eq!(r.success, Some(true));

        let (_, t) = start(&mut c, &Command::new("ATD123").expect("CONNECT"));
        c.on_line("ATD123", t);
        match finished(c.on_line("OK", t)).unwrap_err() {
            Error::Mismatch { response } => assert_eq!(response.success, Some(false)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn prompt_without_payload_is_terminal() {
        let mut c = Correlator::new("\r", 15);
        let (_, t) = start(&mut c, &Command::new("AT+CMGS=\"+100\""));
        c.on_line("AT+CMGS=\"+100\"", t);
        let r = finished(c.on_line("> ", t)).unwrap();
        assert_eq!(r.result_code, "> ");
    }

    #[test]
    fn payload_written_once_after_prompt() {
        let mut c = Correlator::new("\r", 15);
        let cmd = Command::new("AT+CMGS=\"+100\"").payload(b"hello".to_vec());
        let (_, t) = start(&mut c, &cmd);
        assert_eq!(c.phase(), Some(Phase::AwaitingPrompt));
        assert!(matches!(c.on_line("AT+CMGS=\"+100\"", t), Step::Echo));

        match c.on_line("> ", t) {
            Step::Write(bytes) => assert_eq!(bytes, b"hello\x1a"),
            other => panic!("expected Write, got {other:?}"),
        }
        assert_eq!(c.phase(), Some(Phase::AwaitingResultAfterPayload));

        assert!(matches!(c.on_line("> hello", t), Step::Echo));
        assert!(matches!(c.on_line("", t), Step::Collected));
        assert!(matches!(c.on_line("+CMGS: 42", t), Step::Collected));
        let r = finished(c.on_line("OK", t)).unwrap();
        assert_eq!(r.lines, vec!["+CMGS: 42"]);
    }

    #[test]
    fn connect_writes_payload_without_ctrl_z() {
        let mut c = Correlator::new("\r", 15);
        let cmd = Command::new("AT+CIPSEND").payload(vec![0x01, 0x02]);
        let (_, t) = start(&mut c, &cmd);
        c.on_line("AT+CIPSEND", t);
        match c.on_line("CONNECT", t) {
            Step::Write(bytes) => assert_eq!(bytes, vec![0x01, 0x02]),
            other => panic!("expected Write, got {other:?}"),
        }
        assert!(finished(c.on_line("OK", t)).is_ok());
    }

    #[test]
    fn download_writes_payload_without_ctrl_z() {
        let mut c = Correlator::new("\r", 15);
        let cmd = Command::new("AT+HTTPDATA=5,10000").payload(b"hello".to_vec());
        let (_, t) = start(&mut c, &cmd);
        c.on_line("AT+HTTPDATA=5,10000", t);
        match c.on_line("DOWNLOAD", t) {
            Step::Write(bytes) => assert_eq!(bytes, b"hello"),
            other => panic!("expected Write, got {other:?}"),
        }
        assert_eq!(c.phase(), Some(Phase::AwaitingResultAfterPayload));
        let r = finished(c.on_line("OK", t)).unwrap();
        assert!(r.lines.is_empty());
    }

    #[test]
    fn download_without_payload_is_terminal() {
        let mut c = Correlator::new("\r", 15);
        let (_, t) = start(&mut c, &Command::new("AT+HTTPDATA=5,10000"));
        c.on_line("AT+HTTPDATA=5,10000", t);
        assert_eq!(finished(c.on_line("DOWNLOAD", t)).unwrap().result_code, "DOWNLOAD");
    }

    #[test]
    fn lines_before_echo_are_not_collected() {
        let mut c = Correlator::new("\r", 15);
        let (_, t) = start(&mut c, &Command::new("AT+CSQ"));
        assert!(matches!(c.on_line("OK", t), Step::Unsolicited));
        assert!(matches!(c.on_line("AT+CSQ", t), Step::Echo));
        assert!(matches!(c.on_line("+CSQ: 18,0", t), Step::Collected));
        let r = finished(c.on_line("OK", t)).unwrap();
        assert_eq!(r.lines, vec!["+CSQ: 18,0"]);
    }

    #[test]
    fn late_reply_after_drain_is_stale_for_next_exchange() {
        let mut c = Correlator::new("\r", 15);
        let t = now();
        let grace = Duration::from_millis(250);
        c.begin(ExchangeId(1), &Command::new("AT+COPS=?"), t);
        c.expire(t, grace);
        assert!(c.on_drain_elapsed(t + grace));

        let later = t + grace;
        c.begin(ExchangeId(2), &Command::new("AT+CSQ"), later + LONG);
        assert!(matches!(
            c.on_line("+COPS: (2,\"X\",\"\",\"1\")", later),
            Step::Stale(ExchangeId(1))
        ));
        assert!(matches!(c.on_line("OK", later), Step::Stale(ExchangeId(1))));
        assert_eq!(c.active(), Some(ExchangeId(2)));

        assert!(matches!(c.on_line("AT+CSQ", later), Step::Echo));
        assert!(matches!(c.on_line("+CSQ: 5,0", later), Step::Collected));
        let r = finished(c.on_line("OK", later)).unwrap();
        assert_eq!(r.command, "AT+CSQ");
        assert_eq!(r.lines, vec!["+CSQ: 5,0"]);
    }

    #[test]
    fn echo_off_starts_at_dispatch() {
        let mut c = Correlator::new("\r", 15).with_echo(false);
        let (_, t) = start(&mut c, &Command::new("AT+CSQ"));
        assert!(matches!(c.on_line("+CSQ: 18,0", t), Step::Collected));
        assert!(finished(c.on_line("OK", t)).is_ok());
    }

    #[test]
    fn echo_mode_follows_ate_commands() {
        let mut c = Correlator::new("\r", 15);
        let (_, t) = start(&mut c, &Command::new("ATE0"));
        c.on_line("ATE0", t);
        finished(c.on_line("OK", t)).unwrap();
        assert!(!c.echo());

        let (_, t) = start(&mut c, &Command::new("AT+GSN"));
        assert!(matches!(c.on_line("861234", t), Step::Collected));
        finished(c.on_line("OK", t)).unwrap();

        let (_, t) = start(&mut c, &Command::new("ATE1"));
        finished(c.on_line("OK", t)).unwrap();
        assert!(c.echo());

        let (_, t) = start(&mut c, &Command::new("ATE0"));
        c.on_line("ATE0", t);
        finished(c.on_line("ERROR", t)).unwrap_err();
        assert!(c.echo());
    }

    #[test]
    fn idle_lines_are_unsolicited() {
        let mut c = Correlator::new("\r", 15);
        assert!(matches!(c.on_line("OK", now()), Step::Unsolicited));
    }

    #[test]
    fn timeout_then_drain_swallows_late_lines() {
        let mut c = Correlator::new("\r", 15);
        let t = now();
        c.begin(ExchangeId(3), &Command::new("AT+COPS=?"), t + LONG);
        assert!(c.expire(t, Duration::from_millis(250)).is_none());

        let late = t + LONG;
        let step = c.expire(late, Duration::from_millis(250)).unwrap();
        assert!(matches!(finished(step), Err(Error::Timeout)));
        assert!(!c.is_idle());
        assert_eq!(c.deadline(), Some(late + Duration::from_millis(250)));

        assert!(matches!(c.on_line("+COPS: (2,\"X\")", late), Step::Stale(ExchangeId(3))));
        assert!(matches!(c.on_line("OK", late), Step::Stale(ExchangeId(3))));
        assert!(c.is_idle());
    }

    #[test]
    fn drain_ends_when_window_passes() {
        let mut c = Correlator::new("\r", 15);
        let t = now();
        c.begin(ExchangeId(1), &Command::new("AT"), t);
        c.expire(t, Duration::from_millis(100));
        assert!(!c.on_drain_elapsed(t + Duration::from_millis(50)));
        assert!(c.on_drain_elapsed(t + Duration::from_millis(100)));
        assert!(c.is_idle());
    }

    #[test]
    fn zero_grace_skips_drain() {
        let mut c = Correlator::new("\r", 15);
        let t = now();
        c.begin(ExchangeId(1), &Command::new("AT"), t);
        assert!(c.expire(t, Duration::ZERO).is_some());
        assert!(c.is_idle());
        assert!(matches!(c.on_line("OK", t), Step::Unsolicited));
    }

    #[test]
    fn soft_tokens_accept_mangled_echo() {
        let mut c = Correlator::new("\r", 15);
        let tokens = TokenSet::new(["AT", "\u{0}AT", "OK"], ["OK"]).soft();
        let (_, t) = start(&mut c, &Command::new("AT").tokens(tokens));
        assert!(matches!(c.on_line("RDY", t), Step::Unsolicited));
        assert!(matches!(c.on_line("\u{0}AT", t), Step::Echo));
        let r = finished(c.on_line("OK", t)).unwrap();
        assert!(r.lines.is_empty());
    }

    #[test]
    fn exact_tokens_reject_containing_line() {
        let mut c = Correlator::new("\r", 15);
        let tokens = TokenSet::new(["OK"], ["OK"]);
        let (_, t) = start(&mut c, &Command::new("AT").tokens(tokens));
        assert!(matches!(c.on_line("NOT OK", t), Step::Unsolicited));
        assert!(finished(c.on_line("OK", t)).is_ok());
    }

    #[test]
    fn token_framing_collects_between_start_and_end() {
        let mut c = Correlator::new("\r", 15);
        let tokens = TokenSet::new(["+CIFSR"], ["OK", "ERROR"]);
        let (_, t) = start(&mut c, &Command::new("AT+CIFSR").tokens(tokens));
        assert!(matches!(c.on_line("10.0.0.1", t), Step::Unsolicited));
        assert!(matches!(c.on_line("+CIFSR", t), Step::Collected));
        assert!(matches!(c.on_line("10.0.0.2", t), Step::Collected));
        let r = finished(c.on_line("OK", t)).unwrap();
        assert_eq!(r.lines, vec!["+CIFSR", "10.0.0.2"]);
    }

    #[test]
    fn token_framing_overflow_falls_back_to_default_framing() {
        let mut c = Correlator::new("\r", 2);
        let tokens = TokenSet::new(["START"], ["END"]);
        let (_, t) = start(&mut c, &Command::new("AT+X").tokens(tokens));
        c.on_line("START", t);
        c.on_line("a", t);
        match c.on_line("b", t) {
            Step::Overflow(lines) => assert_eq!(lines, vec!["START", "a", "b"]),
            other => panic!("expected Overflow, got {other:?}"),
        }
        assert!(matches!(c.on_line("c", t), Step::Collected));
        assert_eq!(c.active(), Some(ExchangeId(1)));
        let r = finished(c.on_line("OK", t)).unwrap();
        assert_eq!(r.lines, vec!["c"]);
    }

    #[test]
    fn abort_returns_active_id() {
        let mut c = Correlator::new("\r", 15);
        start(&mut c, &Command::new("AT"));
        assert_eq!(c.abort(), Some(ExchangeId(1)));
        assert!(c.is_idle());
        assert_eq!(c.abort(), None);
    }
}
