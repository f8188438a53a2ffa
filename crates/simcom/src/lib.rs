//! # simcom -- async AT command engine for SIM900-class GSM modules
//!
//! `simcom` turns the interleaved byte stream of a GSM/GPRS module (command
//! echoes, result codes, multi-line data and notifications the module pushes
//! on its own) into a single-flight request/response API with timeouts and
//! structured results.
//!
//! ## Quick Start
//!
//! ```no_run
//! use simcom::{Command, ModemBuilder, ModemEvent};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> simcom::Result<()> {
//!     let modem = ModemBuilder::new()
//!         .serial_port("/dev/ttyUSB0")
//!         .build()
//!         .await?;
//!
//!     let signal = modem.execute("AT+CSQ").await?;
//!     println!("{:?}", simcom::extract_response(&signal));
//!
//!     let sms = Command::new("AT+CMGS=\"+15551234567\"")
//!         .timeout(Duration::from_secs(30))
//!         .payload(b"hello".to_vec());
//!     modem.execute(sms).await?;
//!
//!     let mut events = modem.subscribe();
//!     while let Ok(event) = events.recv().await {
//!         if let ModemEvent::NewMessage { storage, index } = event {
//!             println!("new message {storage}/{index}");
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! | Crate                 | Purpose                                           |
//! |-----------------------|---------------------------------------------------|
//! | `simcom-core`         | Types, events, errors, the `Transport` trait      |
//! | `simcom-at`           | Framing, correlation, unsolicited routing, IO task |
//! | `simcom-transport`    | Serial transport                                  |
//! | **`simcom`**          | This facade: builder, modem handle, registry      |
//!
//! Commands run strictly one at a time. Notifications (`RING`, `+CMTI`,
//! `+CUSD`, voltage warnings) are delivered as [`ModemEvent`]s and never
//! end up in a command's [`Response`].

pub mod builder;
pub mod modem;
pub mod registry;

pub use builder::{ModemBuilder, ModemConfig, probe_command};
pub use modem::Modem;
pub use registry::ModemRegistry;

pub use simcom_at::{PduEntry, extract_pdu_pairs, extract_response, parse_fields};
pub use simcom_core::*;
pub use simcom_transport::{FlowControl, SerialConfig, SerialTransport};
