pub mod ble;
pub mod dummy;
pub mod frame;

use std::future::Future;

use crate::errors::AppError;
use crate::sample::RawSample;

pub use ble::BleLink;
pub use dummy::{DummyLink, DummySettings};

/// Manufacturer and model strings read from the peripheral's identity
/// service. Fields the device does not expose are filled with these fixed
/// placeholders.
pub const MANUFACTURER_PLACEHOLDER: &str = "(Manufacturer not specified)";
pub const MODEL_PLACEHOLDER: &str = "(Model number not specified)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub manufacturer: String,
    pub model: String,
}

/// An established streaming link to a pulse oximeter.
///
/// The session and acquisition layers only ever talk to the peripheral
/// through this capability: a non-blocking latest-sample accessor, a
/// connectivity predicate derived from the live transport, an identity
/// read, and an idempotent disconnect. [`BleLink`] is the real device;
/// [`DummyLink`] is the simulated one used by tests and the `dummy`
/// subcommand.
pub trait PulseLink: Clone + Send + Sync + 'static {
    /// The newest decoded frame, or `None` when the peripheral has not
    /// notified since the previous call. Never blocks; older undrained
    /// frames are superseded.
    fn latest_sample(&self) -> Option<RawSample>;

    /// Whether the transport currently reports itself connected. Re-derived
    /// on every call, never cached: the peripheral can drop out of range or
    /// power off without this side being told first.
    fn is_connected(&self) -> impl Future<Output = bool> + Send;

    /// Manufacturer and model, with per-field placeholders, or `None` when
    /// the peripheral exposes no identity service at all. Never fails the
    /// session.
    fn read_identity(&self) -> impl Future<Output = Option<DeviceIdentity>> + Send;

    /// Close the transport. An already-closed transport is a satisfied
    /// postcondition, not an error.
    fn disconnect(&self) -> impl Future<Output = Result<(), AppError>> + Send;
}
