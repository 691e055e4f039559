//! btleplug-backed discovery and streaming link for BerryMed-class
//! pulse oximeters.

use std::collections::HashSet;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use btleplug::api::{
    Central, CentralEvent, CharPropFlags, Manager as _, Peripheral as _, ScanFilter,
    ValueNotification,
};
use btleplug::platform::{Manager, Peripheral};
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::{frame, DeviceIdentity, PulseLink, MANUFACTURER_PLACEHOLDER, MODEL_PLACEHOLDER};
use crate::errors::AppError;
use crate::sample::RawSample;

pub const PULSE_OXIMETER_SERVICE_UUID: Uuid =
    Uuid::from_u128(0x49535343_fe7d_4ae5_8fa9_9fafd205e455);
pub const PULSE_MEASUREMENT_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x49535343_1e4d_4bd9_ba61_23c647249616);

pub const MANUFACTURER_NAME_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x00002a29_0000_1000_8000_00805f9b34fb);
pub const MODEL_NUMBER_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x00002a24_0000_1000_8000_00805f9b34fb);

/// Advertised names may carry embedded null terminators ("BerryMed\0\0");
/// matching is exact equality after those are removed.
pub fn advertised_name_matches(advertised: &str, target: &str) -> bool {
    advertised.replace('\0', "") == target
}

/// Scan until an advertisement whose name matches `target` appears, then
/// connect to it and set up the streaming link. Every distinct newly-seen
/// non-matching name is reported once when `verbose`. The scan is stopped
/// on both outcomes; a fruitless `timeout` is a typed error and leaves no
/// connection behind.
pub async fn discover_by_name(
    target: &str,
    timeout: Duration,
    verbose: bool,
) -> Result<BleLink, AppError> {
    let manager = Manager::new().await?;
    let central = manager
        .adapters()
        .await?
        .into_iter()
        .next()
        .ok_or(AppError::NoAdapter)?;

    central.start_scan(ScanFilter::default()).await?;
    let mut events = central.events().await?;

    info!("Scanning for \"{target}\"...");
    let mut seen_names: HashSet<String> = HashSet::new();
    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);

    let matched = loop {
        tokio::select! {
            Some(event) = events.next() => {
                let (CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id)) = event
                else {
                    continue;
                };
                let Ok(peripheral) = central.peripheral(&id).await else {
                    continue;
                };
                let properties = peripheral
                    .properties()
                    .await
                    .ok()
                    .flatten()
                    .unwrap_or_default();
                let Some(name) = properties.local_name else {
                    continue;
                };
                if advertised_name_matches(&name, target) {
                    break peripheral;
                }
                let name = name.replace('\0', "");
                if seen_names.insert(name.clone()) && verbose {
                    info!("Found \"{name}\"");
                }
            }
            _ = &mut deadline => {
                let _ = central.stop_scan().await;
                return Err(AppError::DiscoveryTimeout {
                    target: target.to_owned(),
                    timeout,
                });
            }
        }
    };

    central.stop_scan().await?;
    info!("Connecting to \"{target}\"...");
    BleLink::establish(matched).await
}

/// A connected BerryMed oximeter: the peripheral handle plus a background
/// reader task that decodes notification packets into a frame queue.
#[derive(Clone)]
pub struct BleLink {
    peripheral: Peripheral,
    frames: Arc<Mutex<mpsc::UnboundedReceiver<RawSample>>>,
    reader_cancel: CancellationToken,
}

impl BleLink {
    /// Connect the peripheral, subscribe to the streaming characteristic,
    /// and spawn the notification reader.
    pub async fn establish(peripheral: Peripheral) -> Result<Self, AppError> {
        peripheral.connect().await?;
        peripheral.discover_services().await?;

        let Some(characteristic) = peripheral.characteristics().into_iter().find(|c| {
            c.uuid == PULSE_MEASUREMENT_CHARACTERISTIC_UUID
                && c.properties.contains(CharPropFlags::NOTIFY)
        }) else {
            error!("Peripheral is missing the streaming characteristic");
            let _ = peripheral.disconnect().await;
            return Err(AppError::Bt(btleplug::Error::NoSuchCharacteristic));
        };
        peripheral.subscribe(&characteristic).await?;
        let notifications = peripheral.notifications().await?;

        let (tx, rx) = mpsc::unbounded_channel();
        let reader_cancel = CancellationToken::new();
        tokio::spawn(reader_loop(notifications, tx, reader_cancel.clone()));

        Ok(Self {
            peripheral,
            frames: Arc::new(Mutex::new(rx)),
            reader_cancel,
        })
    }
}

async fn read_string(
    peripheral: &Peripheral,
    characteristic: &btleplug::api::Characteristic,
) -> Option<String> {
    let bytes = peripheral.read(characteristic).await.ok()?;
    Some(String::from_utf8_lossy(&bytes).replace('\0', ""))
}

async fn reader_loop(
    mut notifications: Pin<Box<dyn Stream<Item = ValueNotification> + Send>>,
    tx: mpsc::UnboundedSender<RawSample>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            notification = notifications.next() => {
                let Some(data) = notification else {
                    debug!("Notification stream closed");
                    return;
                };
                if data.uuid != PULSE_MEASUREMENT_CHARACTERISTIC_UUID {
                    continue;
                }
                for sample in frame::parse_packet(&data.value) {
                    if tx.send(sample).is_err() {
                        return;
                    }
                }
            }
            _ = cancel.cancelled() => {
                debug!("Shutting down notification reader");
                return;
            }
        }
    }
}

impl PulseLink for BleLink {
    fn latest_sample(&self) -> Option<RawSample> {
        let mut frames = self.frames.lock().expect("frame queue lock poisoned");
        let mut latest = None;
        while let Ok(sample) = frames.try_recv() {
            latest = Some(sample);
        }
        latest
    }

    async fn is_connected(&self) -> bool {
        self.peripheral.is_connected().await.unwrap_or(false)
    }

    async fn read_identity(&self) -> Option<DeviceIdentity> {
        let characteristics = self.peripheral.characteristics();
        let manufacturer = characteristics
            .iter()
            .find(|c| c.uuid == MANUFACTURER_NAME_CHARACTERISTIC_UUID);
        let model = characteristics
            .iter()
            .find(|c| c.uuid == MODEL_NUMBER_CHARACTERISTIC_UUID);
        if manufacturer.is_none() && model.is_none() {
            return None;
        }

        let manufacturer = match manufacturer {
            Some(c) => read_string(&self.peripheral, c)
                .await
                .unwrap_or_else(|| MANUFACTURER_PLACEHOLDER.to_owned()),
            None => MANUFACTURER_PLACEHOLDER.to_owned(),
        };
        let model = match model {
            Some(c) => read_string(&self.peripheral, c)
                .await
                .unwrap_or_else(|| MODEL_PLACEHOLDER.to_owned()),
            None => MODEL_PLACEHOLDER.to_owned(),
        };
        Some(DeviceIdentity {
            manufacturer,
            model,
        })
    }

    async fn disconnect(&self) -> Result<(), AppError> {
        self.reader_cancel.cancel();
        match self.peripheral.disconnect().await {
            Ok(()) | Err(btleplug::Error::NotConnected) => Ok(()),
            Err(e) => {
                error!("BLE disconnect failed: {e}");
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::advertised_name_matches;

    #[test]
    fn matches_after_null_stripping() {
        assert!(advertised_name_matches("BerryMed\0\0", "BerryMed"));
        assert!(advertised_name_matches("BerryMed", "BerryMed"));
    }

    #[test]
    fn requires_exact_name() {
        assert!(!advertised_name_matches("BerryMedX", "BerryMed"));
        assert!(!advertised_name_matches("Berry", "BerryMed"));
    }

    #[test]
    fn strips_embedded_nulls_too() {
        assert!(advertised_name_matches("Berry\0Med", "BerryMed"));
    }
}
