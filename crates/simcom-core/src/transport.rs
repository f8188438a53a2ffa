//! Transport trait for modem communication.
//!
//! The [`Transport`] trait abstracts over the byte link to the module. The
//! serial implementation lives in `simcom-transport`; a scriptable mock lives
//! in `simcom-test-harness`. The AT engine only ever writes from its dispatch
//! and payload steps and reads from its IO loop.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Asynchronous byte-level transport to a modem.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Write raw bytes, returning once they have been handed to the device.
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Read whatever bytes are available into `buf`.
    ///
    /// Waits up to `timeout`; returns [`Error::Timeout`](crate::error::Error::Timeout)
    /// if nothing arrived. Must be cancel safe: the IO loop drops the future
    /// when another event wins.
    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Close the connection. Later calls return
    /// [`Error::NotConnected`](crate::error::Error::NotConnected).
    async fn close(&mut self) -> Result<()>;

    fn is_connected(&self) -> bool;
}
