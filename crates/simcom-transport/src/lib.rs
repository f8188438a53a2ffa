//! Transport implementations for the SIMCom AT engine.
//!
//! This crate provides [`SerialTransport`], the concrete
//! [`Transport`](simcom_core::Transport) used to reach a module over a UART
//! or USB virtual COM port.

pub mod serial;

pub use serial::{DEFAULT_BAUD_RATE, FlowControl, SerialConfig, SerialTransport};
