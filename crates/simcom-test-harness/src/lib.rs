//! simcom-test-harness: Test utilities and a scriptable mock transport for
//! the SIMCom AT engine.
//!
//! This crate provides [`MockTransport`] for deterministic testing of the
//! engine without a real modem attached.

pub mod mock_serial;

pub use mock_serial::{MockHandle, MockTransport};
