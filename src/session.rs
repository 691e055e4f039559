use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::acquisition::{acquisition_loop, AcquisitionHandle, AcquisitionRun};
use crate::errors::AppError;
use crate::transport::{ble, BleLink, DeviceIdentity, PulseLink};

/// Where the session currently stands. Identity strings live inside
/// `Connected`, so reading them before a connection exists is impossible
/// rather than merely discouraged.
#[derive(Debug)]
pub enum SessionState<L> {
    Disconnected,
    Scanning,
    Connected {
        link: L,
        identity: Option<DeviceIdentity>,
    },
}

/// A session with one pulse oximeter: discovery, identity, acquisition,
/// teardown. Starts and ends `Disconnected`; every disconnect discards the
/// transport handle unconditionally.
///
/// An inline acquisition holds the `&mut self` borrow for its whole run; a
/// background one hands the caller an [`AcquisitionHandle`] instead.
/// Connecting or disconnecting from another task while a background run is
/// active is out of contract.
pub struct Session<L: PulseLink = BleLink> {
    state: SessionState<L>,
    verbose: bool,
}

impl Session<BleLink> {
    pub fn new(verbose: bool) -> Self {
        Self {
            state: SessionState::Disconnected,
            verbose,
        }
    }

    /// Scan for an advertisement whose null-stripped name equals `target`
    /// and connect to the first match. On timeout the session stays
    /// `Disconnected` and the caller may retry.
    pub async fn connect(&mut self, target: &str, timeout: Duration) -> Result<(), AppError> {
        self.state = SessionState::Scanning;
        match ble::discover_by_name(target, timeout, self.verbose).await {
            Ok(link) => {
                self.state = SessionState::Connected {
                    link,
                    identity: None,
                };
                info!("Device connected");
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Disconnected;
                Err(e)
            }
        }
    }
}

impl<L: PulseLink> Session<L> {
    /// Wrap an already-established link (the simulated peripheral, or a
    /// link connected by other means) in a `Connected` session.
    pub fn with_link(link: L, verbose: bool) -> Self {
        Self {
            state: SessionState::Connected {
                link,
                identity: None,
            },
            verbose,
        }
    }

    pub fn state(&self) -> &SessionState<L> {
        &self.state
    }

    /// Re-derived from the live transport on every call; the peripheral can
    /// drop without notice, so this is never a cached flag.
    pub async fn is_connected(&self) -> bool {
        match &self.state {
            SessionState::Connected { link, .. } => link.is_connected().await,
            _ => false,
        }
    }

    /// Identity strings cached by the last [`Session::read_identity`] call.
    pub fn identity(&self) -> Option<&DeviceIdentity> {
        match &self.state {
            SessionState::Connected { identity, .. } => identity.as_ref(),
            _ => None,
        }
    }

    /// Read manufacturer and model from the peripheral. Fields the device
    /// does not expose come back as fixed placeholders; a device with no
    /// identity service at all yields `None`. Neither case tears down the
    /// session.
    pub async fn read_identity(&mut self) -> Result<Option<DeviceIdentity>, AppError> {
        let SessionState::Connected { link, identity } = &mut self.state else {
            return Err(AppError::NotConnected);
        };
        match link.read_identity().await {
            Some(id) => {
                info!("Device: {} {}", id.manufacturer, id.model);
                *identity = Some(id.clone());
                Ok(Some(id))
            }
            None => {
                info!("No device information available");
                Ok(None)
            }
        }
    }

    /// Close the transport and return to `Disconnected`. The handle is
    /// discarded before any transport error can propagate, and a transport
    /// that already dropped on its own is a satisfied postcondition.
    pub async fn disconnect(&mut self) -> Result<(), AppError> {
        let state = std::mem::replace(&mut self.state, SessionState::Disconnected);
        if let SessionState::Connected { link, .. } = state {
            link.disconnect().await?;
        }
        Ok(())
    }

    /// Run an acquisition inline, blocking this caller until the peripheral
    /// disconnects or `duration` elapses. A mid-run transport drop is
    /// absorbed into a clean local disconnect, never an error.
    pub async fn acquire(&mut self, duration: Option<Duration>) -> Result<AcquisitionRun, AppError> {
        let SessionState::Connected { link, .. } = &self.state else {
            return Err(AppError::NotConnected);
        };
        let link = link.clone();
        let run = acquisition_loop(
            link.clone(),
            duration,
            CancellationToken::new(),
            self.verbose,
        )
        .await;
        if !link.is_connected().await {
            self.disconnect().await?;
        }
        Ok(run)
    }

    /// Run an acquisition on a dedicated worker. The returned handle is the
    /// only supported way to stop it: cancellation is cooperative, checked
    /// once per poll cycle.
    pub fn acquire_in_background(
        &self,
        duration: Option<Duration>,
    ) -> Result<AcquisitionHandle, AppError> {
        let SessionState::Connected { link, .. } = &self.state else {
            return Err(AppError::NotConnected);
        };
        Ok(AcquisitionHandle::spawn(
            link.clone(),
            duration,
            self.verbose,
        ))
    }
}
