// src/domain/engine.rs

//! Engine domain abstractions.
//!
//! This module defines the seam between the client adapter and the MQTT
//! engine that actually runs the session. It intentionally avoids any
//! reference to concrete client libraries; engine-specific types stay inside
//! `src/engine/`.
//!
//! The engine is responsible for connection state, delivery guarantees and
//! network I/O. The adapter above it only validates input, tracks lifecycle
//! state and wraps consumer handlers.
//!
//! Concrete implementations of this interface live under `src/engine/`.
use std::sync::{Arc, RwLock};
use std::time::Duration;

use bytes::Bytes;

use crate::{
    //
    log_debug,
    ConnectOptions,
    Error,
    Result,
};

/// MQTT delivery guarantee level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum QoS {
    /// QoS 0
    #[default]
    AtMostOnce,
    /// QoS 1
    AtLeastOnce,
    /// QoS 2
    ExactlyOnce,
}

impl TryFrom<u8> for QoS {
    type Error = Error;

    fn try_from(level: u8) -> Result<Self> {
        match level {
            0 => Ok(Self::AtMostOnce),
            1 => Ok(Self::AtLeastOnce),
            2 => Ok(Self::ExactlyOnce),
            other => Err(Error::InvalidQos(other)),
        }
    }
}

impl From<QoS> for u8 {
    fn from(qos: QoS) -> Self {
        match qos {
            QoS::AtMostOnce => 0,
            QoS::AtLeastOnce => 1,
            QoS::ExactlyOnce => 2,
        }
    }
}

/// Outcome of a connect attempt as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectStatus {
    /// Broker accepted the session.
    Success,
    /// Broker refused, the network failed, or the attempt timed out.
    Failure,
}

impl ConnectStatus {
    /// Numeric status code: 0 for success, 1 for failure.
    pub fn code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
        }
    }

    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

/// Receiver of inbound messages.
///
/// Invoked on the engine's own task for every inbound publish, with topic and
/// payload already decoded to text. Implementations must tolerate being
/// called concurrently with connect-result handlers.
///
/// Any `Fn(&str, &str) + Send + Sync` closure is a `MessageHandler`; state
/// the handler needs travels as closure captures.
pub trait MessageHandler: Send + Sync {
    fn on_message(&self, topic: &str, payload: &str);
}

impl<F> MessageHandler for F
where
    F: Fn(&str, &str) + Send + Sync,
{
    fn on_message(&self, topic: &str, payload: &str) {
        self(topic, payload)
    }
}

/// Receiver of a single connect outcome.
///
/// Consumed by its one invocation. Any `FnOnce(ConnectStatus) + Send`
/// closure is a `ConnectResultHandler`.
pub trait ConnectResultHandler: Send + 'static {
    fn on_connect_result(self: Box<Self>, status: ConnectStatus);
}

impl<F> ConnectResultHandler for F
where
    F: FnOnce(ConnectStatus) + Send + 'static,
{
    fn on_connect_result(self: Box<Self>, status: ConnectStatus) {
        (*self)(status)
    }
}

/// Boxed connect-result handler as handed to engines.
pub type ConnectResultFn = Box<dyn ConnectResultHandler>;

/// Shared slot holding the currently registered message handler.
///
/// The adapter owns the registration; engines hold a clone and call
/// [`MessageSlot::deliver`] for every inbound publish. Replacing the handler
/// takes effect for the next delivery.
#[derive(Clone, Default)]
pub struct MessageSlot {
    // ---
    handler: Arc<RwLock<Option<Arc<dyn MessageHandler>>>>,
}

impl MessageSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler`, replacing any previous registration.
    pub fn set(&self, handler: Arc<dyn MessageHandler>) {
        *self.write() = Some(handler);
    }

    /// Remove the current registration, if any.
    pub fn clear(&self) {
        *self.write() = None;
    }

    pub fn is_set(&self) -> bool {
        self.read().is_some()
    }

    /// Decode an inbound publish and hand it to the registered handler.
    ///
    /// Topic and payload are decoded as UTF-8; invalid sequences become
    /// U+FFFD. The payload is length-delimited, never NUL-terminated. The lock
    /// is released before the handler runs.
    ///
    /// Returns `false` when no handler is registered and the message was
    /// dropped.
    pub fn deliver(&self, _client_id: &str, topic: &str, payload: &[u8]) -> bool {
        // ---
        let handler = self.read().clone();

        let Some(handler) = handler else {
            log_debug!("{_client_id}: no message handler, dropping message on {topic}");
            return false;
        };

        let payload = String::from_utf8_lossy(payload);
        handler.on_message(topic, &payload);
        true
    }

    // Poisoning only means a handler panicked mid-registration; the slot
    // value itself is always consistent.
    fn read(&self) -> std::sync::RwLockReadGuard<'_, Option<Arc<dyn MessageHandler>>> {
        match self.handler.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Option<Arc<dyn MessageHandler>>> {
        match self.handler.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl std::fmt::Debug for MessageSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageSlot")
            .field("registered", &self.is_set())
            .finish()
    }
}

/// Observer for session changes an engine makes on its own.
///
/// Fired with `false` when an established session is lost (broker drop,
/// takeover by another session with the same client ID) and with `true`
/// when the engine restores it by reconnecting. Outcomes of `connect()` and
/// `disconnect()` calls are not reported here.
#[derive(Clone)]
pub struct SessionWatch(Arc<dyn Fn(bool) + Send + Sync>);

impl SessionWatch {
    pub fn new(observer: impl Fn(bool) + Send + Sync + 'static) -> Self {
        Self(Arc::new(observer))
    }

    /// Watch that ignores every change.
    pub fn detached() -> Self {
        Self::new(|_connected| {})
    }

    pub fn notify(&self, connected: bool) {
        (self.0)(connected)
    }
}

impl Default for SessionWatch {
    fn default() -> Self {
        Self::detached()
    }
}

impl std::fmt::Debug for SessionWatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionWatch")
    }
}

/// Configuration for creating an engine instance.
///
/// Passed to engine factory functions (`create_*_engine()`).
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Server URI (e.g. `"tcp://localhost:1883"`, `"memory://"`)
    pub server_uri: String,
    /// Session client ID, already generated if the caller supplied none.
    pub client_id: String,
    /// Slot inbound messages are delivered through.
    pub messages: MessageSlot,
    /// Receives session losses and restores the engine detects itself.
    pub watch: SessionWatch,
}

/// Shared base state for all engine implementations.
///
/// Each concrete engine embeds this as a field named `base`:
///
/// ```ignore
/// struct MqttEngine {
///     base: EngineBase,
///     // ... engine specific fields
/// }
///
/// impl Engine for MqttEngine {
///     fn base(&self) -> &EngineBase { &self.base }
/// }
/// ```
#[derive(Debug)]
pub struct EngineBase {
    /// Session client ID.
    pub client_id: String,
    /// Server URI the engine was created for.
    pub server_uri: String,
}

impl From<&EngineConfig> for EngineBase {
    /// Clones only the identifying fields, leaving `config` available for
    /// engine-specific use.
    fn from(config: &EngineConfig) -> Self {
        // ---
        Self {
            client_id: config.client_id.clone(),
            server_uri: config.server_uri.clone(),
        }
    }
}

/// MQTT engine abstraction.
///
/// An `Engine` runs one MQTT session on behalf of one adapter. It defines the
/// minimal contract the adapter needs without committing to any specific
/// client library.
///
/// Implementations must ensure that:
/// - `connect()` returning `Ok` means `on_result` fires exactly once later;
///   returning `Err` means it never fires.
/// - Once `subscribe()` returns successfully, matching publishes are
///   delivered through the engine's `MessageSlot`.
/// - `shutdown()` releases the session without blocking.
///
/// The in-memory engine serves as the reference implementation of these
/// semantics.
#[async_trait::async_trait]
pub trait Engine: Send + Sync {
    // ---
    /// Returns a reference to the shared base state.
    fn base(&self) -> &EngineBase;

    /// Returns the session client ID.
    ///
    /// Default implementation delegates to `base()`.
    fn client_id(&self) -> &str {
        &self.base().client_id
    }

    /// Start a connect attempt.
    ///
    /// Returns once the attempt has been accepted; the outcome is reported
    /// through `on_result`.
    async fn connect(&self, options: ConnectOptions, on_result: ConnectResultFn) -> Result<()>;

    /// Disconnect the session.
    ///
    /// With `Some(timeout)` waits up to `timeout` for the disconnect to be
    /// flushed (`Error::Timeout` otherwise). With `None` returns once the
    /// request is accepted.
    async fn disconnect(&self, timeout: Option<Duration>) -> Result<()>;

    /// Subscribe to `topic`, resolving once the subscription is confirmed.
    async fn subscribe(&self, topic: &str, qos: QoS) -> Result<()>;

    /// Remove the subscription to `topic`.
    async fn unsubscribe(&self, topic: &str) -> Result<()>;

    /// Publish `payload` to `topic`.
    async fn publish(&self, topic: &str, payload: Bytes, qos: QoS) -> Result<()>;

    /// Release the session and any background resources. Must not block.
    fn shutdown(&self);
}

/// Owned engine pointer.
///
/// Engines are owned by exactly one adapter, so this is a `Box` rather than
/// the shared `Arc` a transport would use.
pub type EnginePtr = Box<dyn Engine>;

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_qos_conversion() {
        // ---
        assert_eq!(QoS::try_from(0).unwrap(), QoS::AtMostOnce);
        assert_eq!(QoS::try_from(2).unwrap(), QoS::ExactlyOnce);
        assert!(matches!(QoS::try_from(3), Err(Error::InvalidQos(3))));
        assert_eq!(u8::from(QoS::AtLeastOnce), 1);
    }

    #[test]
    fn test_connect_status_codes() {
        // ---
        assert_eq!(ConnectStatus::Success.code(), 0);
        assert_eq!(ConnectStatus::Failure.code(), 1);
    }

    #[test]
    fn test_deliver_without_handler_drops() {
        // ---
        let slot = MessageSlot::new();
        assert!(!slot.deliver("test", "a/b", b"ignored"));
    }

    #[test]
    fn test_deliver_decodes_length_delimited_payload() {
        // ---
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let slot = MessageSlot::new();
        slot.set(Arc::new(move |topic: &str, payload: &str| {
            sink.lock().unwrap().push((topic.to_owned(), payload.to_owned()));
        }));

        // Embedded NUL must survive, invalid UTF-8 is replaced.
        assert!(slot.deliver("test", "demo/topic", b"he\0llo"));
        assert!(slot.deliver("test", "demo/topic", &[b'o', b'k', 0xff]));

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0], ("demo/topic".to_owned(), "he\0llo".to_owned()));
        assert_eq!(seen[1].1, "ok\u{fffd}");
    }

    #[test]
    fn test_set_replaces_previous_handler() {
        // ---
        let hits = Arc::new(Mutex::new((0, 0)));
        let first = Arc::clone(&hits);
        let second = Arc::clone(&hits);

        let slot = MessageSlot::new();
        slot.set(Arc::new(move |_: &str, _: &str| first.lock().unwrap().0 += 1));
        slot.deliver("test", "t", b"1");

        slot.set(Arc::new(move |_: &str, _: &str| second.lock().unwrap().1 += 1));
        slot.deliver("test", "t", b"2");

        assert_eq!(*hits.lock().unwrap(), (1, 1));

        slot.clear();
        assert!(!slot.deliver("test", "t", b"3"));
    }

    #[test]
    fn test_closure_is_connect_result_handler() {
        // ---
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);

        let handler: ConnectResultFn = Box::new(move |status: ConnectStatus| {
            *sink.lock().unwrap() = Some(status.code());
        });
        handler.on_connect_result(ConnectStatus::Failure);

        assert_eq!(*seen.lock().unwrap(), Some(1));
    }

    #[test]
    fn test_session_watch_forwards_changes() {
        // ---
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let watch = SessionWatch::new(move |connected| sink.lock().unwrap().push(connected));
        watch.clone().notify(false);
        watch.notify(true);
        SessionWatch::detached().notify(false);

        assert_eq!(*seen.lock().unwrap(), vec![false, true]);
    }
}
