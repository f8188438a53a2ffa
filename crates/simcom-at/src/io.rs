//! IO task types and implementation for the AT engine.
//!
//! One tokio task owns the transport exclusively. It feeds received bytes and
//! submitted commands to an [`Engine`], fires the exchange deadline, and
//! carries out the writes, events and outcomes the engine returns. Because
//! every input passes through one `select!` loop, a timer firing and a line
//! arriving are never processed concurrently.

use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

use simcom_core::error::{Error, Result};
use simcom_core::events::ModemEvent;
use simcom_core::transport::Transport;
use simcom_core::types::{Command, Response};

use crate::engine::{Engine, Output};
use crate::framer::{DEFAULT_LINE_END, DEFAULT_PROMPT};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Configuration for the AT IO task.
#[derive(Debug, Clone)]
pub struct IoConfig {
    /// Terminator the module ends its lines with.
    pub line_end: String,
    /// Terminator appended to every command written.
    pub command_end: String,
    /// Bare write prompt the module sends without a terminator.
    pub prompt: String,
    /// Timeout for commands that do not carry their own.
    pub default_timeout: Duration,
    /// Cap on lines accumulated by a token-framed exchange.
    pub max_response_lines: usize,
    /// How long late lines of a timed-out exchange are swallowed.
    pub timeout_grace: Duration,
    /// Whether the module echoes commands (`ATE1`, the power-up default).
    pub echo: bool,
    /// Extra line prefixes reported as [`ModemEvent::Notification`].
    pub notification_prefixes: Vec<String>,
}

impl Default for IoConfig {
    fn default() -> Self {
        IoConfig {
            line_end: DEFAULT_LINE_END.into(),
            command_end: "\r".into(),
            prompt: DEFAULT_PROMPT.into(),
            default_timeout: Duration::from_secs(5),
            max_response_lines: 15,
            timeout_grace: Duration::from_millis(250),
            echo: true,
            notification_prefixes: Vec::new(),
        }
    }
}

/// A request sent from the modem handle to the IO task.
pub enum Request {
    /// Queue a command and report its outcome.
    Execute {
        command: Command,
        reply: oneshot::Sender<Result<Response>>,
    },
    /// Fail everything pending, close the transport and stop.
    Close { reply: oneshot::Sender<Result<()>> },
}

/// Handle to the IO task.
pub struct ModemIo {
    /// Command channel into the IO loop.
    pub cmd_tx: mpsc::Sender<Request>,
    /// Cancellation token for abrupt shutdown.
    pub cancel: CancellationToken,
    /// Join handle for the IO task.
    pub task: JoinHandle<()>,
}

impl ModemIo {
    /// Queue `command` and wait for its outcome.
    ///
    /// No outer timeout is applied: the IO task settles every command it
    /// accepts, at the latest when the command's own timeout fires.
    pub async fn execute(&self, command: Command) -> Result<Response> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(Request::Execute {
                command,
                reply: reply_tx,
            })
            .await
            .map_err(|_| Error::NotConnected)?;

        match reply_rx.await {
            Ok(result) => result,
            Err(_) => Err(Error::NotConnected),
        }
    }

    /// Ask the IO task to close the transport. Pending commands fail with
    /// [`Error::Closed`].
    pub async fn close(&self) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(Request::Close { reply: reply_tx })
            .await
            .map_err(|_| Error::NotConnected)?;
        reply_rx.await.map_err(|_| Error::NotConnected)?
    }

    /// Whether the IO task is still running.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Cancel the IO task and wait for it to exit. Pending commands fail
    /// with [`Error::Closed`] and the transport is closed.
    pub async fn shutdown(self) -> Result<()> {
        self.cancel.cancel();
        self.task
            .await
            .map_err(|e| Error::Transport(format!("IO task failed: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Spawn
// ---------------------------------------------------------------------------

/// Spawn the IO task. Returns the handle for sending commands.
pub fn spawn_io_task(
    transport: Box<dyn Transport>,
    config: IoConfig,
    event_tx: broadcast::Sender<ModemEvent>,
) -> ModemIo {
    let (cmd_tx, cmd_rx) = mpsc::channel::<Request>(32);
    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();

    let task = tokio::spawn(io_loop(transport, config, event_tx, cmd_rx, cancel_clone));

    ModemIo {
        cmd_tx,
        cancel,
        task,
    }
}

// ---------------------------------------------------------------------------
// IO Loop
// ---------------------------------------------------------------------------

/// How long one receive call may block before the loop re-checks its arms.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

type Reply = oneshot::Sender<Result<Response>>;

/// The main IO loop. Runs as a spawned Tokio task.
///
/// Uses `tokio::select! { biased; }` to prioritize:
/// 1. Cancellation
/// 2. Command requests
/// 3. The exchange deadline
/// 4. Reading from the transport
async fn io_loop(
    mut transport: Box<dyn Transport>,
    config: IoConfig,
    event_tx: broadcast::Sender<ModemEvent>,
    mut cmd_rx: mpsc::Receiver<Request>,
    cancel: CancellationToken,
) {
    let mut engine: Engine<Reply> = Engine::new(&config);

    loop {
        let deadline = engine.next_deadline();

        let outputs = tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("AT IO task cancelled");
                let _ = shut_down(&mut engine, &mut *transport, &event_tx).await;
                return;
            }

            req = cmd_rx.recv() => {
                match req {
                    Some(Request::Execute { command, reply }) => {
                        engine.submit(command, reply, Instant::now())
                    }
                    Some(Request::Close { reply }) => {
                        debug!("IO task close requested");
                        let result = shut_down(&mut engine, &mut *transport, &event_tx).await;
                        let _ = reply.send(result);
                        return;
                    }
                    None => {
                        debug!("command channel closed, exiting IO task");
                        let _ = shut_down(&mut engine, &mut *transport, &event_tx).await;
                        return;
                    }
                }
            }

            _ = sleep_until(deadline), if deadline.is_some() => {
                engine.poll_timers(Instant::now())
            }

            read = async {
                let mut buf = [0u8; 512];
                match transport.receive(&mut buf, POLL_INTERVAL).await {
                    Ok(n) if n > 0 => Ok(Some(buf[..n].to_vec())),
                    Ok(_) | Err(Error::Timeout) => {
                        // Yield briefly so the loop can check the other arms.
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        Ok(None)
                    }
                    Err(e) => Err(e),
                }
            } => {
                match read {
                    Ok(Some(bytes)) => {
                        trace!(len = bytes.len(), "rx bytes");
                        engine.on_bytes(&bytes, Instant::now())
                    }
                    Ok(None) => continue,
                    Err(e) => {
                        fail(&mut engine, &mut *transport, &event_tx, e).await;
                        return;
                    }
                }
            }
        };

        if let Err(e) = apply(outputs, &mut *transport, &event_tx).await {
            fail(&mut engine, &mut *transport, &event_tx, e).await;
            return;
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Carry out engine outputs in order.
///
/// After a failed write the remaining writes are skipped, but outcomes and
/// events are still delivered. Returns the write error, if any.
async fn apply(
    outputs: Vec<Output<Reply>>,
    transport: &mut dyn Transport,
    event_tx: &broadcast::Sender<ModemEvent>,
) -> Result<()> {
    let mut write_err = None;
    for output in outputs {
        match output {
            Output::Write(bytes) => {
                if write_err.is_some() {
                    continue;
                }
                trace!(len = bytes.len(), "tx bytes");
                if let Err(e) = transport.send(&bytes).await {
                    write_err = Some(e);
                }
            }
            Output::Event(event) => {
                let _ = event_tx.send(event);
            }
            Output::Settle { reply, outcome } => {
                let _ = reply.send(outcome);
            }
        }
    }
    match write_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Transport failure: fail everything and report it.
async fn fail(
    engine: &mut Engine<Reply>,
    transport: &mut dyn Transport,
    event_tx: &broadcast::Sender<ModemEvent>,
    err: Error,
) {
    let message = err.to_string();
    error!(%message, "transport failed, stopping IO task");
    let _ = apply(
        engine.fail_all(|| Error::Transport(message.clone())),
        transport,
        event_tx,
    )
    .await;
    let _ = transport.close().await;
    let _ = event_tx.send(ModemEvent::Error { message });
    let _ = event_tx.send(ModemEvent::Closed);
}

/// Orderly close: fail pending commands with [`Error::Closed`].
async fn shut_down(
    engine: &mut Engine<Reply>,
    transport: &mut dyn Transport,
    event_tx: &broadcast::Sender<ModemEvent>,
) -> Result<()> {
    let pending = engine.pending();
    if pending > 0 {
        debug!(pending, "failing pending commands on close");
    }
    let _ = apply(engine.fail_all(|| Error::Closed), transport, event_tx).await;
    let result = transport.close().await;
    let _ = event_tx.send(ModemEvent::Closed);
    result
}
