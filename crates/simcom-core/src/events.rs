//! Asynchronous modem event types.
//!
//! Events are emitted by the IO task through a `tokio::sync::broadcast`
//! channel. They carry both lifecycle changes (open, close, transport error)
//! and unsolicited result codes the modem pushes without being asked.

use crate::codec::PduCodec;
use crate::error::{Error, Result};

/// An event emitted by the engine.
///
/// Delivered on a best-effort basis through a bounded broadcast channel;
/// slow consumers may miss events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModemEvent {
    /// The modem answered the open probe.
    Opened,

    /// The engine stopped and the transport was closed.
    Closed,

    /// The transport failed. Every pending command has been failed too.
    Error {
        /// Description of the transport failure.
        message: String,
    },

    /// Incoming call (`RING`).
    Ring,

    /// The caller hung up before the call was answered (`NO CARRIER` while
    /// ringing).
    EndRing,

    /// Supply voltage above the module's limit.
    OverVoltage,

    /// Supply voltage below the module's limit.
    UnderVoltage,

    /// A new SMS was stored (`+CMTI: "SM",3`).
    NewMessage {
        /// Message storage (`SM`, `ME`, …).
        storage: String,
        /// Index of the message within the storage.
        index: u32,
    },

    /// The SIM is not ready (`+CPIN: NOT READY`, `+CPIN: NOT INSERTED`).
    SimError {
        /// Status text after `+CPIN: `.
        status: String,
    },

    /// A USSD reply or network-initiated USSD (`+CUSD: …`).
    Ussd(UssdNotice),

    /// A line starting with a caller-registered prefix.
    Notification {
        /// The registered prefix that matched.
        prefix: String,
        /// The whole line.
        line: String,
    },

    /// A line that no exchange claimed and no pattern recognised.
    Unsolicited {
        /// The raw line.
        line: String,
    },

    /// An alternate-mode exchange accumulated too many lines without an
    /// ender; the buffered lines were dropped.
    Overflow {
        /// The lines that were buffered when the cap was hit.
        lines: Vec<String>,
    },
}

/// Parsed `+CUSD: <status>[,"<message>"[,<dcs>]]` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UssdNotice {
    /// `0` no further action, `1` further action required, `2` terminated.
    pub status: Option<u8>,
    /// The message as sent by the network, still encoded per `dcs`.
    pub message: Option<String>,
    /// Cell broadcast data coding scheme.
    pub dcs: Option<u8>,
}

/// Data coding scheme value announcing a UCS2 (16-bit) USSD message.
pub const DCS_UCS2: u8 = 72;

impl UssdNotice {
    /// Build a notice from already split `+CUSD` fields.
    pub fn from_fields(fields: &[String]) -> Self {
        UssdNotice {
            status: fields.first().and_then(|s| s.trim().parse().ok()),
            message: fields.get(1).map(|s| s.trim().to_string()),
            dcs: fields.get(2).and_then(|s| s.trim().parse().ok()),
        }
    }

    /// Whether the message is UCS2 encoded.
    pub fn is_ucs2(&self) -> bool {
        self.dcs == Some(DCS_UCS2)
    }

    /// Decode the message text through an external PDU codec.
    pub fn decode_with(&self, codec: &dyn PduCodec) -> Result<String> {
        let message = self
            .message
            .as_deref()
            .ok_or_else(|| Error::InvalidParameter("USSD notice carries no message".into()))?;
        codec.decode(message.as_bytes(), self.dcs.unwrap_or(0))
    }
}
