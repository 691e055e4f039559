//! A simulated pulse oximeter for tests and the `dummy` subcommand: emits
//! frames at a fixed cadence, sweeping the pulse rate between two bounds.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{DeviceIdentity, PulseLink};
use crate::errors::AppError;
use crate::sample::RawSample;

#[derive(Debug, Clone)]
pub struct DummySettings {
    /// Cadence of emitted frames.
    pub interval: Duration,
    pub low_bpm: u8,
    pub high_bpm: u8,
    pub spo2: u8,
    /// Every Nth frame is emitted with the finger reported off the sensor;
    /// 0 keeps the finger on throughout.
    pub finger_lift_every: u32,
    pub identity: Option<DeviceIdentity>,
}

impl Default for DummySettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(100),
            low_bpm: 60,
            high_bpm: 90,
            spo2: 98,
            finger_lift_every: 0,
            identity: Some(DeviceIdentity {
                manufacturer: "Berry Instruments".into(),
                model: "BM1000-SIM".into(),
            }),
        }
    }
}

/// The simulated link. `disconnect` (or dropping out via
/// [`DummyLink::drop_transport`]) behaves like the peripheral going away:
/// the connectivity predicate flips and the frame feed stops.
#[derive(Clone)]
pub struct DummyLink {
    settings: DummySettings,
    connected: Arc<AtomicBool>,
    frames: Arc<Mutex<mpsc::UnboundedReceiver<RawSample>>>,
    feeder_cancel: CancellationToken,
}

impl DummyLink {
    pub fn spawn(settings: DummySettings) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let connected = Arc::new(AtomicBool::new(true));
        let feeder_cancel = CancellationToken::new();
        tokio::spawn(feeder_loop(
            settings.clone(),
            tx,
            connected.clone(),
            feeder_cancel.clone(),
        ));
        Self {
            settings,
            connected,
            frames: Arc::new(Mutex::new(rx)),
            feeder_cancel,
        }
    }

    /// Simulate the peripheral dropping without a clean disconnect
    /// (out of range, battery died).
    pub fn drop_transport(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.feeder_cancel.cancel();
    }
}

async fn feeder_loop(
    settings: DummySettings,
    tx: mpsc::UnboundedSender<RawSample>,
    connected: Arc<AtomicBool>,
    cancel: CancellationToken,
) {
    let mut interval = time::interval(settings.interval);
    let mut pulse = settings.low_bpm;
    let mut rising = true;
    let mut pleth: u8 = 0;
    let mut emitted: u32 = 0;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if !connected.load(Ordering::SeqCst) {
                    return;
                }
                let bound = if rising {
                    pulse = pulse.saturating_add(1);
                    settings.high_bpm
                } else {
                    pulse = pulse.saturating_sub(1);
                    settings.low_bpm
                };
                if pulse == bound {
                    rising = !rising;
                }
                pleth = (pleth + 7) % 101;
                emitted += 1;
                let finger_present = settings.finger_lift_every == 0
                    || emitted % settings.finger_lift_every != 0;
                let sample = RawSample {
                    valid: true,
                    spo2: settings.spo2,
                    pulse_rate: pulse,
                    plethysmogram: pleth,
                    finger_present,
                };
                if tx.send(sample).is_err() {
                    return;
                }
            }
            _ = cancel.cancelled() => {
                debug!("Shutting down dummy feeder");
                return;
            }
        }
    }
}

impl PulseLink for DummyLink {
    fn latest_sample(&self) -> Option<RawSample> {
        let mut frames = self.frames.lock().expect("frame queue lock poisoned");
        let mut latest = None;
        while let Ok(sample) = frames.try_recv() {
            latest = Some(sample);
        }
        latest
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn read_identity(&self) -> Option<DeviceIdentity> {
        self.settings.identity.clone()
    }

    async fn disconnect(&self) -> Result<(), AppError> {
        // Disconnecting twice is as fine here as it is over the air.
        self.connected.store(false, Ordering::SeqCst);
        self.feeder_cancel.cancel();
        Ok(())
    }
}
