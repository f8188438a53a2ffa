//! Mock transport for deterministic testing of the AT engine.
//!
//! [`MockTransport`] implements the [`Transport`] trait with pre-loaded
//! request/response pairs. Each response is queued for reading as soon as
//! its request is written, so a test scripts a modem conversation up front.
//! Bytes the modem would push on its own (`RING`, `+CMTI`) are injected
//! through a [`MockHandle`] while the engine owns the transport.
//!
//! # Example
//!
//! ```
//! use simcom_test_harness::MockTransport;
//!
//! let mut mock = MockTransport::new();
//! // When the engine writes `AT+CSQ\r`, the modem answers with signal quality.
//! mock.expect(b"AT+CSQ\r", b"AT+CSQ\r\r\n+CSQ: 18,0\r\n\r\nOK\r\n");
//! let handle = mock.handle();
//! handle.push_incoming(b"\r\nRING\r\n");
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use simcom_core::error::{Error, Result};
use simcom_core::transport::Transport;

/// A pre-loaded request/response pair for the mock transport.
#[derive(Debug, Clone)]
struct Expectation {
    /// The exact bytes we expect to be sent.
    request: Vec<u8>,
    /// The bytes made readable once the request is received.
    response: Vec<u8>,
}

#[derive(Debug)]
struct MockState {
    expectations: VecDeque<Expectation>,
    incoming: VecDeque<u8>,
    connected: bool,
    sent_log: Vec<Vec<u8>>,
    chunk_size: usize,
}

/// A mock [`Transport`] for testing the engine without hardware.
///
/// Expectations are consumed in order. When `send()` is called, the sent
/// data is recorded and matched against the next expectation; its response
/// is appended to the incoming bytes returned by `receive()`.
///
/// A send that does not match, or arrives after the expectations are
/// exhausted, fails with [`Error::Transport`].
#[derive(Debug)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// Create a new mock transport in the connected state.
    pub fn new() -> Self {
        MockTransport {
            state: Arc::new(Mutex::new(MockState {
                expectations: VecDeque::new(),
                incoming: VecDeque::new(),
                connected: true,
                sent_log: Vec::new(),
                chunk_size: usize::MAX,
            })),
        }
    }

    /// Add an expected request/response pair.
    pub fn expect(&mut self, request: &[u8], response: &[u8]) {
        lock(&self.state).expectations.push_back(Expectation {
            request: request.to_vec(),
            response: response.to_vec(),
        });
    }

    /// Expect `request` and answer nothing.
    pub fn expect_silence(&mut self, request: &[u8]) {
        self.expect(request, &[]);
    }

    /// Deliver at most `n` bytes per `receive()` call.
    pub fn chunk_size(&mut self, n: usize) {
        lock(&self.state).chunk_size = n.max(1);
    }

    /// Make `bytes` readable without any request.
    pub fn push_incoming(&self, bytes: &[u8]) {
        lock(&self.state).incoming.extend(bytes);
    }

    /// A handle that keeps working after the transport is moved into the
    /// engine.
    pub fn handle(&self) -> MockHandle {
        MockHandle {
            state: Arc::clone(&self.state),
        }
    }

    /// All data sent through this transport, one element per `send()` call.
    pub fn sent_data(&self) -> Vec<Vec<u8>> {
        lock(&self.state).sent_log.clone()
    }

    /// Return the number of expectations that have not yet been consumed.
    pub fn remaining_expectations(&self) -> usize {
        lock(&self.state).expectations.len()
    }

    /// Set the connected state of the mock transport.
    ///
    /// When set to `false`, subsequent `send()` and `receive()` calls will
    /// return [`Error::NotConnected`].
    pub fn set_connected(&mut self, connected: bool) {
        lock(&self.state).connected = connected;
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared control over a [`MockTransport`] owned elsewhere.
#[derive(Debug, Clone)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockHandle {
    /// Make `bytes` readable, as if the modem sent them unprompted.
    pub fn push_incoming(&self, bytes: &[u8]) {
        lock(&self.state).incoming.extend(bytes);
    }

    pub fn sent_data(&self) -> Vec<Vec<u8>> {
        lock(&self.state).sent_log.clone()
    }

    pub fn remaining_expectations(&self) -> usize {
        lock(&self.state).expectations.len()
    }

    /// Simulate the device disappearing (`false`) or coming back.
    pub fn set_connected(&self, connected: bool) {
        lock(&self.state).connected = connected;
    }
}

// The mock never panics while holding the lock, so a poisoned mutex only
// follows a failed test assertion elsewhere.
fn lock(state: &Mutex<MockState>) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let mut state = lock(&self.state);
        if !state.connected {
            return Err(Error::NotConnected);
        }

        state.sent_log.push(data.to_vec());

        match state.expectations.pop_front() {
            Some(expectation) if data == expectation.request.as_slice() => {
                state.incoming.extend(expectation.response);
                Ok(())
            }
            Some(expectation) => Err(Error::Transport(format!(
                "unexpected send data: expected {:?}, got {:?}",
                String::from_utf8_lossy(&expectation.request),
                String::from_utf8_lossy(data)
            ))),
            None => Err(Error::Transport(format!(
                "no more expectations in mock transport, got {:?}",
                String::from_utf8_lossy(data)
            ))),
        }
    }

    async fn receive(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize> {
        let mut state = lock(&self.state);
        if !state.connected {
            return Err(Error::NotConnected);
        }
        if state.incoming.is_empty() {
            return Err(Error::Timeout);
        }

        let n = state.incoming.len().min(buf.len()).min(state.chunk_size);
        for (slot, byte) in buf.iter_mut().zip(state.incoming.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    async fn close(&mut self) -> Result<()> {
        let mut state = lock(&self.state);
        state.connected = false;
        state.incoming.clear();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        lock(&self.state).connected
    }
}
