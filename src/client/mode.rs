//! Connection-mode markers.
//!
//! [`MqttClient`](crate::MqttClient) is parameterized by one of these types.
//! The mode only changes how `connect()` and `disconnect()` report
//! completion; subscribe, publish and message delivery are shared.

mod sealed {
    pub trait Sealed {}
}

/// Marker trait for connection modes. Sealed; implemented by [`Blocking`]
/// and [`Deferred`] only.
pub trait ConnectMode: sealed::Sealed + Send + Sync + 'static {
    /// Human-readable mode name, used in log lines.
    const NAME: &'static str;
}

/// `connect()` resolves with the outcome; `disconnect()` waits for the
/// flush up to a caller-supplied timeout.
#[derive(Debug, Clone, Copy, Default)]
pub struct Blocking;

/// `connect()` resolves once the attempt is accepted and reports the outcome
/// to a handler; `disconnect()` does not wait for the flush.
#[derive(Debug, Clone, Copy, Default)]
pub struct Deferred;

impl sealed::Sealed for Blocking {}
impl sealed::Sealed for Deferred {}

impl ConnectMode for Blocking {
    const NAME: &'static str = "blocking";
}

impl ConnectMode for Deferred {
    const NAME: &'static str = "deferred";
}
