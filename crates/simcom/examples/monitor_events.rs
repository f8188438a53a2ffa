//! Monitor modem events.
//!
//! Opens a modem, enables new-message indications, then prints every event
//! for 60 seconds: incoming calls, stored SMS, USSD replies, registration
//! changes, supply warnings and any line the engine did not recognise.
//!
//! # Usage
//!
//! ```sh
//! RUST_LOG=simcom_at=debug cargo run -p simcom --example monitor_events -- /dev/ttyUSB0
//! ```

use std::time::Duration;

use simcom::{ModemBuilder, ModemEvent};
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let serial_port = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/dev/ttyUSB0".to_string());
    println!("Connecting to modem on {}...", serial_port);

    let (event_tx, mut events) = broadcast::channel(64);
    let modem = ModemBuilder::new()
        .serial_port(&serial_port)
        .urc_prefix("+CREG:")
        .events(event_tx)
        .build()
        .await?;

    // Echo off, PDU mode, buffer new-message indications as +CMTI,
    // report registration changes as +CREG.
    modem
        .execute_batch(["ATE0", "AT+CMGF=0", "AT+CNMI=2,1", "AT+CREG=1"])
        .await?;

    let signal = modem.execute("AT+CSQ").await?;
    println!("Signal quality: {:?}\n", simcom::extract_response(&signal));

    println!("{:<12} Event", "Timestamp");
    println!("{:-<12} {:-<50}", "", "");

    let start = tokio::time::Instant::now();
    let deadline = start + Duration::from_secs(60);

    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            break;
        }

        match tokio::time::timeout(remaining, events.recv()).await {
            Ok(Ok(event)) => {
                let elapsed = start.elapsed();
                let timestamp = format!("{:>6}.{:03}s", elapsed.as_secs(), elapsed.subsec_millis());

                match event {
                    ModemEvent::Ring => println!("{} Ring", timestamp),
                    ModemEvent::EndRing => println!("{} EndRing", timestamp),
                    ModemEvent::NewMessage { storage, index } => {
                        println!("{} NewMessage        {} #{}", timestamp, storage, index);
                        let msg = modem.execute(format!("AT+CMGR={}", index)).await?;
                        for entry in simcom::extract_pdu_pairs(&msg) {
                            println!("{:>12} {} / {}", "", entry.header, entry.pdu);
                        }
                    }
                    ModemEvent::Ussd(notice) => {
                        println!(
                            "{} Ussd              status {:?} dcs {:?} {:?}",
                            timestamp, notice.status, notice.dcs, notice.message
                        );
                    }
                    ModemEvent::SimError { status } => {
                        println!("{} SimError          {}", timestamp, status);
                    }
                    ModemEvent::OverVoltage => println!("{} OverVoltage", timestamp),
                    ModemEvent::UnderVoltage => println!("{} UnderVoltage", timestamp),
                    ModemEvent::Notification { prefix, line } => {
                        println!("{} Notification {:<5} {}", timestamp, prefix, line);
                    }
                    ModemEvent::Unsolicited { line } => {
                        println!("{} Unsolicited       {}", timestamp, line);
                    }
                    ModemEvent::Overflow { lines } => {
                        println!("{} Overflow          {} lines dropped", timestamp, lines.len());
                    }
                    ModemEvent::Opened => println!("{} Opened", timestamp),
                    ModemEvent::Error { message } => {
                        println!("{} Error             {}", timestamp, message);
                    }
                    ModemEvent::Closed => {
                        println!("{} Closed", timestamp);
                        break;
                    }
                }
            }
            Ok(Err(broadcast::error::RecvError::Lagged(n))) => {
                println!("(missed {} events due to lag)", n);
            }
            Ok(Err(broadcast::error::RecvError::Closed)) => {
                println!("Event channel closed.");
                break;
            }
            Err(_) => break,
        }
    }

    modem.close().await?;
    println!("\nMonitoring complete.");
    Ok(())
}
