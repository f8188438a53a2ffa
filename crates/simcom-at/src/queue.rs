//! FIFO of pending command requests.
//!
//! Only the head is ever in flight. Each request gets an [`ExchangeId`] when
//! queued so late events (a timer firing, a terminal line after a timeout)
//! can be checked against the current head and dropped when stale.

use std::collections::VecDeque;
use std::fmt;

use simcom_core::types::Command;

/// Identity of one command exchange, unique per engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExchangeId(pub u64);

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A queued request and where its outcome goes.
#[derive(Debug)]
pub struct Pending<R> {
    pub id: ExchangeId,
    pub command: Command,
    pub reply: R,
}

/// Pending requests plus the one in flight.
#[derive(Debug)]
pub struct CommandQueue<R> {
    waiting: VecDeque<Pending<R>>,
    head: Option<Pending<R>>,
    next_id: u64,
}

impl<R> CommandQueue<R> {
    pub fn new() -> Self {
        CommandQueue {
            waiting: VecDeque::new(),
            head: None,
            next_id: 1,
        }
    }

    /// Append a request; it waits until it reaches the head.
    pub fn push(&mut self, command: Command, reply: R) -> ExchangeId {
        let id = ExchangeId(self.next_id);
        self.next_id += 1;
        self.waiting.push_back(Pending { id, command, reply });
        id
    }

    /// Promote the next waiting request when nothing is in flight.
    ///
    /// Returns the new head, or `None` if a request is already in flight or
    /// nothing is waiting.
    pub fn advance(&mut self) -> Option<&Pending<R>> {
        if self.head.is_some() {
            return None;
        }
        self.head = self.waiting.pop_front();
        self.head.as_ref()
    }

    /// The request in flight.
    pub fn head(&self) -> Option<&Pending<R>> {
        self.head.as_ref()
    }

    /// Remove the head if it is exchange `id`.
    ///
    /// A mismatched id is a stale completion and leaves the queue unchanged.
    pub fn complete(&mut self, id: ExchangeId) -> Option<Pending<R>> {
        if self.head.as_ref().map(|p| p.id) == Some(id) {
            self.head.take()
        } else {
            None
        }
    }

    /// Remove every request, in-flight first.
    pub fn drain(&mut self) -> Vec<Pending<R>> {
        self.head.take().into_iter().chain(self.waiting.drain(..)).collect()
    }

    /// Requests in flight plus waiting.
    pub fn len(&self) -> usize {
        self.waiting.len() + usize::from(self.head.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when nothing is in flight.
    pub fn is_idle(&self) -> bool {
        self.head.is_none()
    }
}

impl<R> Default for CommandQueue<R> {
    fn default() -> Self {
        Self::new()
    }
}
