//! The synchronous core of the AT engine.
//!
//! [`Engine`] ties the framer, router, queue and correlator together and
//! turns each input (a submitted command, received bytes, a timer tick) into
//! a list of [`Output`]s. It performs no IO and reads no clock; the IO task
//! feeds it and carries out what it returns.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, trace};

use simcom_core::error::{Error, Result};
use simcom_core::events::ModemEvent;
use simcom_core::types::{Command, Response};

use crate::correlator::{Correlator, Step};
use crate::framer::LineFramer;
use crate::io::IoConfig;
use crate::queue::{CommandQueue, ExchangeId};
use crate::unsolicited::UnsolicitedRouter;

/// Something the IO task must do, in order.
#[derive(Debug)]
pub enum Output<R> {
    /// Write bytes to the transport.
    Write(Vec<u8>),
    /// Broadcast an event.
    Event(ModemEvent),
    /// Deliver a command outcome.
    Settle { reply: R, outcome: Result<Response> },
}

/// Framing, routing and correlation for one transport.
///
/// `R` is whatever carries an outcome back to the caller; the IO task uses a
/// oneshot sender, tests use plain tags.
#[derive(Debug)]
pub struct Engine<R> {
    framer: LineFramer,
    router: UnsolicitedRouter,
    queue: CommandQueue<R>,
    correlator: Correlator,
    default_timeout: Duration,
    timeout_grace: Duration,
}

impl<R> Engine<R> {
    pub fn new(config: &IoConfig) -> Self {
        Engine {
            framer: LineFramer::new(&config.line_end).with_prompts([config.prompt.as_str()]),
            router: UnsolicitedRouter::new().with_prefixes(&config.notification_prefixes),
            queue: CommandQueue::new(),
            correlator: Correlator::new(&config.command_end, config.max_response_lines)
                .with_echo(config.echo),
            default_timeout: config.default_timeout,
            timeout_grace: config.timeout_grace,
        }
    }

    /// Queue `command`; it is written at once if nothing is in flight.
    pub fn submit(&mut self, command: Command, reply: R, now: Instant) -> Vec<Output<R>> {
        let id = self.queue.push(command, reply);
        trace!(%id, queued = self.queue.len(), "command queued");
        let mut out = Vec::new();
        self.dispatch(now, &mut out);
        out
    }

    /// Frame `bytes` and process every complete line.
    pub fn on_bytes(&mut self, bytes: &[u8], now: Instant) -> Vec<Output<R>> {
        let lines: Vec<String> = self.framer.feed(bytes).collect();
        let mut out = Vec::new();
        for line in &lines {
            self.on_line(line, now, &mut out);
        }
        out
    }

    /// Process one framed line.
    pub fn on_line(&mut self, line: &str, now: Instant, out: &mut Vec<Output<R>>) {
        trace!(line, "rx");

        if let Some(routed) = self.router.route(line) {
            out.extend(routed.events.into_iter().map(Output::Event));
            if routed.consumed {
                return;
            }
        }

        match self.correlator.on_line(line, now) {
            Step::Unsolicited => {
                if !line.trim().is_empty() {
                    out.push(Output::Event(ModemEvent::Unsolicited { line: line.into() }));
                }
            }
            Step::Echo | Step::Collected | Step::Stale(_) => {}
            Step::Write(bytes) => out.push(Output::Write(bytes)),
            Step::Overflow(lines) => out.push(Output::Event(ModemEvent::Overflow { lines })),
            Step::Finished { id, outcome } => self.settle(id, outcome, out),
        }
        self.dispatch(now, out);
    }

    /// Fire whatever timer is due at `now`.
    pub fn poll_timers(&mut self, now: Instant) -> Vec<Output<R>> {
        let mut out = Vec::new();
        if let Some(Step::Finished { id, outcome }) =
            self.correlator.expire(now, self.timeout_grace)
        {
            self.settle(id, outcome, &mut out);
        }
        if self.correlator.on_drain_elapsed(now) {
            trace!("drain window closed");
        }
        self.dispatch(now, &mut out);
        out
    }

    /// When [`poll_timers`](Self::poll_timers) next has work.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.correlator.deadline()
    }

    /// Fail every pending command and forget any partial line.
    pub fn fail_all(&mut self, make_err: impl Fn() -> Error) -> Vec<Output<R>> {
        self.correlator.abort();
        self.framer.clear();
        self.queue
            .drain()
            .into_iter()
            .map(|p| Output::Settle {
                reply: p.reply,
                outcome: Err(make_err()),
            })
            .collect()
    }

    /// Commands in flight plus queued.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    fn settle(&mut self, id: ExchangeId, outcome: Result<Response>, out: &mut Vec<Output<R>>) {
        match self.queue.complete(id) {
            Some(pending) => out.push(Output::Settle {
                reply: pending.reply,
                outcome,
            }),
            None => debug!(%id, "stale completion ignored"),
        }
    }

    fn dispatch(&mut self, now: Instant, out: &mut Vec<Output<R>>) {
        if !self.correlator.is_idle() {
            return;
        }
        if let Some(head) = self.queue.advance() {
            let timeout = head.command.timeout.unwrap_or(self.default_timeout);
            let bytes = self.correlator.begin(head.id, &head.command, now + timeout);
            out.push(Output::Write(bytes));
        }
    }
}
