//! BLE client for the tolva vendor service.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use btleplug::api::{
    Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use tokio::sync::Mutex;

/// Vendor service UUIDs
pub const VENDOR_SERVICE_UUID: uuid::Uuid = uuid::Uuid::from_u128(0x49696277_f2f0_47c6_8854_e2dc31396481);
const VENDOR_READ_UUID: uuid::Uuid = uuid::Uuid::from_u128(0x49696277_f2f0_47c6_8854_e2dc31396482); // Read / notify
const VENDOR_WRITE_UUID: uuid::Uuid = uuid::Uuid::from_u128(0x49696277_f2f0_47c6_8854_e2dc31396483); // Encrypted write

/// BLE client for a tolva device.
pub struct TolvaClient {
    peripheral: Peripheral,
    read_char: Characteristic,
    write_char: Characteristic,
    /// Notifications received on the read characteristic, oldest first
    notifications: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl TolvaClient {
    /// Scan for a device by name and connect.
    pub async fn connect_by_name(name: &str, scan_timeout: Duration) -> Result<Self> {
        let manager = Manager::new().await?;
        let adapters = manager.adapters().await?;
        let adapter = adapters
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No Bluetooth adapters found"))?;

        adapter.start_scan(ScanFilter::default()).await?;
        let peripheral = Self::find_device_by_name(&adapter, name, scan_timeout).await?;
        adapter.stop_scan().await?;

        peripheral.connect().await?;
        peripheral.discover_services().await?;

        let characteristics = peripheral.characteristics();

        let read_char = characteristics
            .iter()
            .find(|c| c.uuid == VENDOR_READ_UUID)
            .cloned()
            .ok_or_else(|| anyhow!("vendor read characteristic not found"))?;

        let write_char = characteristics
            .iter()
            .find(|c| c.uuid == VENDOR_WRITE_UUID)
            .cloned()
            .ok_or_else(|| anyhow!("vendor write characteristic not found"))?;

        let notifications = Arc::new(Mutex::new(Vec::new()));

        let sink = notifications.clone();
        let peripheral_clone = peripheral.clone();
        tokio::spawn(async move {
            let mut stream = match peripheral_clone.notifications().await {
                Ok(s) => s,
                Err(_) => return,
            };

            while let Some(data) = stream.next().await {
                if data.uuid == VENDOR_READ_UUID {
                    sink.lock().await.push(data.value);
                }
            }
        });

        Ok(Self {
            peripheral,
            read_char,
            write_char,
            notifications,
        })
    }

    /// Find a device by name within the scan timeout.
    async fn find_device_by_name(
        adapter: &Adapter,
        name: &str,
        scan_timeout: Duration,
    ) -> Result<Peripheral> {
        let start = std::time::Instant::now();

        while start.elapsed() < scan_timeout {
            for peripheral in adapter.peripherals().await? {
                if let Some(props) = peripheral.properties().await? {
                    if props.local_name.as_deref() == Some(name) {
                        return Ok(peripheral);
                    }
                }
            }

            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        Err(anyhow!("Device '{}' not found within timeout", name))
    }

    /// Service UUIDs seen in the advertisement.
    pub async fn advertised_services(&self) -> Result<Vec<uuid::Uuid>> {
        let props = self
            .peripheral
            .properties()
            .await?
            .ok_or_else(|| anyhow!("no advertisement properties"))?;
        Ok(props.services)
    }

    /// Read characteristic A.
    pub async fn read_value(&self) -> Result<Vec<u8>> {
        Ok(self.peripheral.read(&self.read_char).await?)
    }

    /// Write characteristic B. The host pairs first if the link is not encrypted.
    pub async fn write_control(&self, data: &[u8]) -> Result<()> {
        self.peripheral
            .write(&self.write_char, data, WriteType::WithResponse)
            .await?;
        Ok(())
    }

    /// Enable notifications on characteristic A.
    pub async fn subscribe(&self) -> Result<()> {
        self.notifications.lock().await.clear();
        self.peripheral.subscribe(&self.read_char).await?;
        Ok(())
    }

    /// Disable notifications on characteristic A.
    pub async fn unsubscribe(&self) -> Result<()> {
        self.peripheral.unsubscribe(&self.read_char).await?;
        Ok(())
    }

    /// Notifications received since the last subscribe.
    pub async fn take_notifications(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut *self.notifications.lock().await)
    }

    /// Disconnect from the device.
    pub async fn disconnect(&self) -> Result<()> {
        self.peripheral.disconnect().await?;
        Ok(())
    }
}
