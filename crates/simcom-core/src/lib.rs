//! simcom-core: shared types, events, errors and the transport trait.
//!
//! This crate defines what the AT engine exchanges with its callers and with
//! the byte link underneath it, without pulling in the engine itself.
//!
//! # Key types
//!
//! - [`Command`] / [`Response`] -- one request and its structured result
//! - [`TokenSet`] -- alternate start/end correlation for awkward commands
//! - [`ModemEvent`] -- lifecycle changes and unsolicited result codes
//! - [`Transport`] -- byte-level communication channel
//! - [`PduCodec`] -- boundary to an external SMS/USSD codec
//! - [`Error`] / [`Result`] -- error handling

pub mod codec;
pub mod error;
pub mod events;
pub mod transport;
pub mod types;

pub use codec::{PduCodec, PduParams};
pub use error::{Error, Result};
pub use events::{DCS_UCS2, ModemEvent, UssdNotice};
pub use transport::Transport;
pub use types::{CTRL_Z, Command, Response, TokenSet};
