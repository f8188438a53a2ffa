//! Modem -- the caller-facing handle to one running AT engine.
//!
//! Constructed via [`ModemBuilder`](crate::builder::ModemBuilder). Every
//! command goes through the IO task spawned at build time; the handle itself
//! holds no transport and can be shared behind an `Arc`.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::broadcast;
use tracing::debug;

use simcom_at::ModemIo;
use simcom_core::error::{Error, Result};
use simcom_core::events::ModemEvent;
use simcom_core::types::{Command, Response};

use crate::builder::ModemConfig;

/// A connected modem.
pub struct Modem {
    io: ModemIo,
    event_tx: broadcast::Sender<ModemEvent>,
    outstanding: Arc<AtomicUsize>,
    device: String,
    config: ModemConfig,
}

/// Counts one caller waiting on the engine until dropped.
struct Outstanding(Arc<AtomicUsize>);

impl Drop for Outstanding {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl Modem {
    pub(crate) fn new(
        io: ModemIo,
        event_tx: broadcast::Sender<ModemEvent>,
        device: String,
        config: ModemConfig,
    ) -> Self {
        Modem {
            io,
            event_tx,
            outstanding: Arc::new(AtomicUsize::new(0)),
            device,
            config,
        }
    }

    /// Queue a command and wait for its outcome.
    ///
    /// Commands run strictly one at a time in submission order. The future
    /// always settles: with the response, the modem's error result, a
    /// mismatch against the expected pattern, or [`Error::Timeout`].
    pub async fn execute(&self, command: impl Into<Command>) -> Result<Response> {
        self.outstanding.fetch_add(1, Ordering::AcqRel);
        let _guard = Outstanding(Arc::clone(&self.outstanding));
        self.io.execute(command.into()).await
    }

    /// Like [`execute`](Self::execute), but fail with [`Error::Busy`]
    /// instead of queueing behind another command.
    pub async fn try_execute(&self, command: impl Into<Command>) -> Result<Response> {
        if self
            .outstanding
            .compare_exchange(0, 1, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::Busy);
        }
        let _guard = Outstanding(Arc::clone(&self.outstanding));
        self.io.execute(command.into()).await
    }

    /// Run commands in order, stopping at the first failure.
    pub async fn execute_batch<I>(&self, commands: I) -> Result<Vec<Response>>
    where
        I: IntoIterator,
        I::Item: Into<Command>,
    {
        let mut responses = Vec::new();
        for command in commands {
            let command = command.into();
            let token = command.token();
            match self.execute(command).await {
                Ok(response) => responses.push(response),
                Err(e) => {
                    debug!(device = %self.device, command = %token, error = %e, "batch stopped");
                    return Err(e);
                }
            }
        }
        Ok(responses)
    }

    /// Subscribe to lifecycle and unsolicited events.
    pub fn subscribe(&self) -> broadcast::Receiver<ModemEvent> {
        self.event_tx.subscribe()
    }

    /// Commands waiting on the engine, in flight included.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn config(&self) -> &ModemConfig {
        &self.config
    }

    /// Whether the IO task is still running.
    pub fn is_open(&self) -> bool {
        self.io.is_running()
    }

    /// Close the transport. Queued and in-flight commands fail with
    /// [`Error::Closed`]; later commands fail with [`Error::NotConnected`].
    pub async fn close(&self) -> Result<()> {
        match self.io.close().await {
            Err(Error::NotConnected) => Ok(()),
            other => other,
        }
    }
}

impl Drop for Modem {
    fn drop(&mut self) {
        self.io.cancel.cancel();
    }
}
