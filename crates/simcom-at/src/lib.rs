//! AT command engine for SIMCom GSM modules.
//!
//! This crate demultiplexes the single serial channel a module shares
//! between command/response exchanges and the notifications it pushes on its
//! own. One tokio task owns the transport exclusively; everything it decides
//! is made by a synchronous [`engine::Engine`] it drives.
//!
//! # Architecture
//!
//! - [`framer`] — bytes to lines, including the terminator-less `> ` prompt
//! - [`classify`] — stateless result/error/prompt predicates
//! - [`unsolicited`] — `RING`, `+CMTI`, `+CUSD`, voltage warnings
//! - [`queue`] — FIFO of pending commands, one in flight
//! - [`correlator`] — per-exchange state machine
//! - [`engine`] — ties the above together, no IO
//! - [`extract`] — helpers for pulling data out of a [`Response`](simcom_core::Response)
//! - [`io`] — IO task types, spawn, and the select loop

pub mod classify;
pub mod correlator;
pub mod engine;
pub mod extract;
pub mod framer;
pub mod io;
pub mod queue;
pub mod unsolicited;

pub use extract::{PduEntry, extract_pdu_pairs, extract_response, parse_fields};
pub use io::{IoConfig, ModemIo, spawn_io_task};
