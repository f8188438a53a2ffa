//! Boundary to an external PDU codec.
//!
//! SMS bodies and USSD strings travel as GSM 7-bit or UCS2 encoded text.
//! The engine treats them as opaque bytes; encoding and decoding belong to
//! a codec supplied by the caller.

use crate::error::Result;

/// Parameters for encoding an outgoing SMS.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PduParams {
    /// Destination number.
    pub receiver: String,
    /// Message text.
    pub text: String,
    /// Service centre address, when not taken from the SIM.
    pub smsc: Option<String>,
}

/// Encoder/decoder for SMS and USSD payloads.
pub trait PduCodec: Send + Sync {
    /// Encode an outgoing message into the bytes written after the `> ` prompt.
    fn encode(&self, params: &PduParams) -> Result<Vec<u8>>;

    /// Decode message bytes using the given data coding scheme.
    fn decode(&self, bytes: &[u8], dcs: u8) -> Result<String>;
}
