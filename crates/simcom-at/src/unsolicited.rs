//! Unsolicited result code routing.
//!
//! The module pushes notifications (incoming call, new SMS, USSD reply,
//! supply warnings) on the same line stream that carries command
//! responses. Every line passes through [`UnsolicitedRouter::route`] before
//! the active exchange sees it, so these never end up in a response body.
//!
//! Each router holds its own ordered rule table: the built-in notifications
//! first, then any prefixes registered with
//! [`with_prefixes`](UnsolicitedRouter::with_prefixes).

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use simcom_core::events::{ModemEvent, UssdNotice};

use crate::extract::parse_fields;

/// Which notification shape a line matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrcKind {
    OverVoltage,
    UnderVoltage,
    Ring,
    /// `NO CARRIER` while a call is ringing.
    EndRing,
    NewMessage,
    SimError,
    Ussd,
    /// A caller-registered prefix.
    Notification,
}

/// A matched notification and the substrings its pattern captured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrcMatch {
    pub kind: UrcKind,
    pub captures: Vec<String>,
}

/// Outcome of routing one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Routed {
    /// Events to broadcast.
    pub events: Vec<ModemEvent>,
    /// When `false` the line continues to normal processing as well.
    pub consumed: bool,
}

#[derive(Debug, Clone)]
struct Rule {
    kind: UrcKind,
    pattern: Regex,
    passthrough: bool,
    /// The registered prefix, for [`UrcKind::Notification`] rules.
    prefix: Option<String>,
}

impl Rule {
    fn new(kind: UrcKind, pattern: &str, passthrough: bool) -> Self {
        Rule {
            kind,
            pattern: Regex::new(pattern).expect("unsolicited pattern"),
            passthrough,
            prefix: None,
        }
    }

    fn prefix(prefix: &str) -> Self {
        Rule {
            kind: UrcKind::Notification,
            pattern: Regex::new(&format!("^{}", regex::escape(prefix)))
                .expect("escaped prefix pattern"),
            passthrough: false,
            prefix: Some(prefix.to_string()),
        }
    }
}

// First match wins.
static BUILT_IN: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        Rule::new(UrcKind::OverVoltage, r"(?i)^OVER-VOLTAGE WARNN?ING$", false),
        Rule::new(UrcKind::UnderVoltage, r"(?i)^UNDER-VOLTAGE WARNN?ING$", false),
        Rule::new(UrcKind::Ring, r"(?i)^RING$", false),
        Rule::new(UrcKind::EndRing, r"(?i)^NO CARRIER$", false),
        Rule::new(UrcKind::NewMessage, r"(?i)^\+CMTI:\s*(.+)$", false),
        Rule::new(UrcKind::SimError, r"(?i)^\+CPIN: (NOT .+)$", true),
        Rule::new(UrcKind::Ussd, r"(?i)^\+CUSD:\s*(.+)$", false),
    ]
});

/// Matches lines against an ordered notification table.
///
/// Besides the table, the router tracks whether a call is ringing, which
/// decides if `NO CARRIER` means "caller hung up" or is a command result.
#[derive(Debug)]
pub struct UnsolicitedRouter {
    rules: Vec<Rule>,
    ringing: bool,
}

impl UnsolicitedRouter {
    /// A router with the built-in notifications only.
    pub fn new() -> Self {
        UnsolicitedRouter {
            rules: BUILT_IN.clone(),
            ringing: false,
        }
    }

    /// Append a rule per prefix. A line starting with one (case-sensitive)
    /// is consumed and reported as [`ModemEvent::Notification`]. Empty
    /// prefixes are ignored.
    pub fn with_prefixes<S: AsRef<str>>(mut self, prefixes: &[S]) -> Self {
        for prefix in prefixes {
            self.add_prefix(prefix.as_ref());
        }
        self
    }

    /// Append one prefix rule after the existing ones.
    pub fn add_prefix(&mut self, prefix: &str) {
        if prefix.is_empty() {
            return;
        }
        debug!(prefix, "notification prefix registered");
        self.rules.push(Rule::prefix(prefix));
    }

    /// Whether a `RING` was seen with no `NO CARRIER` after it.
    pub fn is_ringing(&self) -> bool {
        self.ringing
    }

    /// Find the rule `line` matches, given the current ringing state.
    pub fn match_line(&self, line: &str) -> Option<UrcMatch> {
        self.find(line).map(|(rule, captures)| UrcMatch {
            kind: rule.kind,
            captures,
        })
    }

    /// Route one line. `None` means no notification matched and the line
    /// belongs to normal processing.
    pub fn route(&mut self, line: &str) -> Option<Routed> {
        let (rule, captures) = self.find(line)?;
        let (kind, passthrough, prefix) = (rule.kind, rule.passthrough, rule.prefix.clone());
        let event = match kind {
            UrcKind::OverVoltage => ModemEvent::OverVoltage,
            UrcKind::UnderVoltage => ModemEvent::UnderVoltage,
            UrcKind::Ring => {
                self.ringing = true;
                ModemEvent::Ring
            }
            UrcKind::EndRing => {
                self.ringing = false;
                ModemEvent::EndRing
            }
            UrcKind::NewMessage => new_message(line, &captures),
            UrcKind::SimError => ModemEvent::SimError {
                status: captures.into_iter().next().unwrap_or_default(),
            },
            UrcKind::Ussd => ModemEvent::Ussd(UssdNotice::from_fields(&captures)),
            UrcKind::Notification => ModemEvent::Notification {
                prefix: prefix.unwrap_or_default(),
                line: line.to_string(),
            },
        };
        debug!(?kind, line, "unsolicited");

        Some(Routed {
            events: vec![event],
            consumed: !passthrough,
        })
    }

    fn find(&self, line: &str) -> Option<(&Rule, Vec<String>)> {
        self.rules.iter().find_map(|rule| {
            if rule.kind == UrcKind::EndRing && !self.ringing {
                return None;
            }
            let caps = rule.pattern.captures(line)?;
            let captures = match rule.kind {
                UrcKind::NewMessage | UrcKind::Ussd => parse_fields(&caps[1]),
                _ => caps
                    .iter()
                    .skip(1)
                    .flatten()
                    .map(|m| m.as_str().to_string())
                    .collect(),
            };
            Some((rule, captures))
        })
    }
}

impl Default for UnsolicitedRouter {
    fn default() -> Self {
        Self::new()
    }
}

fn new_message(line: &str, captures: &[String]) -> ModemEvent {
    match captures {
        [storage, index, ..] => match index.parse() {
            Ok(index) => ModemEvent::NewMessage {
                storage: storage.clone(),
                index,
            },
            Err(_) => ModemEvent::Unsolicited { line: line.into() },
        },
        _ => ModemEvent::Unsolicited { line: line.into() },
    }
}
