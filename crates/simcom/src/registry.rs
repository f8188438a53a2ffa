//! One engine per physical device.
//!
//! Two engines reading the same serial port would steal each other's bytes.
//! [`ModemRegistry`] maps a device identifier to its running [`Modem`]: the
//! first bind creates it, later binds get the same instance back, and
//! [`unbind`](ModemRegistry::unbind) tears it down.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use simcom_core::error::{Error, Result};

use crate::builder::ModemBuilder;
use crate::modem::Modem;

/// Device identifier to running modem.
#[derive(Default)]
pub struct ModemRegistry {
    modems: Mutex<HashMap<String, Arc<Modem>>>,
}

impl ModemRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The modem for the builder's serial port, building it on first use.
    pub async fn bind(&self, builder: ModemBuilder) -> Result<Arc<Modem>> {
        let device = builder
            .device_name()
            .ok_or_else(|| Error::InvalidParameter("bind requires a serial_port or device".into()))?
            .to_string();
        self.bind_with(&device, || builder.build()).await
    }

    /// The modem for `device`, created with `connect` on first use.
    ///
    /// The registry stays locked while `connect` runs, so concurrent binds
    /// of one device never open it twice. A modem whose IO task has stopped
    /// is replaced.
    pub async fn bind_with<F, Fut>(&self, device: &str, connect: F) -> Result<Arc<Modem>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Modem>>,
    {
        let mut modems = self.modems.lock().await;
        if let Some(modem) = modems.get(device) {
            if modem.is_open() {
                debug!(device, "reusing bound modem");
                return Ok(Arc::clone(modem));
            }
            debug!(device, "bound modem has stopped, rebinding");
        }

        let modem = Arc::new(connect().await?);
        info!(device, "modem bound");
        modems.insert(device.to_string(), Arc::clone(&modem));
        Ok(modem)
    }

    pub async fn get(&self, device: &str) -> Option<Arc<Modem>> {
        self.modems.lock().await.get(device).cloned()
    }

    /// Remove `device` and close its modem.
    pub async fn unbind(&self, device: &str) -> Result<()> {
        let modem = self.modems.lock().await.remove(device);
        match modem {
            Some(modem) => {
                info!(device, "modem unbound");
                modem.close().await
            }
            None => Err(Error::NotConnected),
        }
    }

    pub async fn len(&self) -> usize {
        self.modems.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.modems.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simcom_test_harness::MockTransport;

    async fn connect(name: &str) -> Result<Modem> {
        ModemBuilder::new()
            .device(name)
            .probe_on_open(false)
            .build_with_transport(Box::new(MockTransport::new()))
            .await
    }

    #[tokio::test(start_paused = true)]
    async fn second_bind_reuses_modem() {
        let registry = ModemRegistry::new();
        let a = registry.bind_with("ttyUSB0", || connect("ttyUSB0")).await.unwrap();
        let b = registry
            .bind_with("ttyUSB0", || async { Err::<Modem, _>(Error::Closed) })
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn devices_are_independent() {
        let registry = ModemRegistry::new();
        let a = registry.bind_with("ttyUSB0", || connect("ttyUSB0")).await.unwrap();
        let b = registry.bind_with("ttyUSB1", || connect("ttyUSB1")).await.unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn unbind_closes_and_forgets() {
        let registry = ModemRegistry::new();
        let modem = registry.bind_with("ttyUSB0", || connect("ttyUSB0")).await.unwrap();
        let mut events = modem.subscribe();

        registry.unbind("ttyUSB0").await.unwrap();
        assert_eq!(
            events.recv().await.unwrap(),
            simcom_core::ModemEvent::Closed
        );
        assert!(registry.get("ttyUSB0").await.is_none());
        assert!(registry.is_empty().await);
        assert!(matches!(
            registry.unbind("ttyUSB0").await,
            Err(Error::NotConnected)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_connect_binds_nothing() {
        let registry = ModemRegistry::new();
        let result = registry
            .bind_with("ttyUSB0", || async { Err::<Modem, _>(Error::Transport("no such port".into())) })
            .await;
        assert!(result.is_err());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn bind_requires_a_device_name() {
        let registry = ModemRegistry::new();
        let result = registry.bind(ModemBuilder::new()).await;
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
    }
}
