//! MQTT client adapter.
//!
//! [`MqttClient`] owns at most one engine handle and exposes a small,
//! string-oriented surface over it. The connection mode ([`Blocking`] or
//! [`Deferred`]) only affects `connect()` and `disconnect()`; everything else
//! is shared.

mod lifecycle;
mod mode;

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::oneshot;

pub use lifecycle::ClientState;
pub use mode::{Blocking, ConnectMode, Deferred};

use lifecycle::Lifecycle;

use crate::engine::{self, MemoryHub};
use crate::{
    // ---
    log_debug,
    log_error,
    log_info,
    log_warn,
    ClientId,
    ConnectOptions,
    ConnectResultFn,
    ConnectResultHandler,
    ConnectStatus,
    Engine,
    EngineConfig,
    EnginePtr,
    Error,
    MessageHandler,
    MessageSlot,
    QoS,
    Result,
    SessionWatch,
};

/// Extra time granted to the engine past `connect_timeout` before a
/// blocking connect gives up on its own.
const CONNECT_GRACE: Duration = Duration::from_secs(1);

/// MQTT strings are length-prefixed with a u16.
const MAX_TOPIC_LEN: usize = u16::MAX as usize;

/// Client adapter with blocking connect/disconnect.
pub type SyncClient = MqttClient<Blocking>;

/// Client adapter with callback-driven connect.
pub type AsyncClient = MqttClient<Deferred>;

/// MQTT client adapter.
///
/// Owns the engine handle exclusively. The handle is created by `init()` and
/// released by `destroy()` or when the adapter is dropped. Every operation
/// other than `init()` fails with [`Error::HandleMissing`] while no handle
/// exists.
///
/// # Example
///
/// ```no_run
/// use mom_mqtt::{ConnectOptions, QoS, SyncClient};
/// use std::time::Duration;
///
/// # async fn example() -> mom_mqtt::Result<()> {
/// let mut client = SyncClient::new();
/// client.init("tcp://localhost:1883", "")?;
///
/// client.set_callback(|topic: &str, payload: &str| {
///     println!("{topic}: {payload}");
/// })?;
///
/// client.connect(&ConnectOptions::default()).await?;
/// client.subscribe("demo/topic", QoS::AtMostOnce).await?;
/// client.publish("demo/topic", "hello", QoS::AtMostOnce).await?;
///
/// client.disconnect(Duration::from_secs(10)).await?;
/// client.destroy();
/// # Ok(())
/// # }
/// ```
pub struct MqttClient<M: ConnectMode> {
    // ---
    handle: Option<EnginePtr>,
    messages: MessageSlot,
    lifecycle: Lifecycle,
    _mode: PhantomData<M>,
}

impl<M: ConnectMode> MqttClient<M> {
    // ---

    /// Create an adapter without a handle.
    pub fn new() -> Self {
        Self {
            handle: None,
            messages: MessageSlot::new(),
            lifecycle: Lifecycle::default(),
            _mode: PhantomData,
        }
    }

    /// Create the engine handle for `server_uri`.
    ///
    /// An empty `client_id` is replaced by a generated UUID. The engine is
    /// picked from the URI scheme (`tcp://`, `mqtt://` or `memory://`). No
    /// network activity happens until `connect()`.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyInitialized`] if a handle is live; it is left intact
    /// - [`Error::InvalidUri`] if the URI cannot be parsed
    /// - [`Error::Engine`] if the engine needs a tokio runtime and none is
    ///   running
    pub fn init(&mut self, server_uri: &str, client_id: &str) -> Result<()> {
        self.init_with(server_uri, client_id, engine::create_engine)
    }

    /// Create a memory engine handle bound to `hub`.
    ///
    /// # ⚠️  Testing Only - Subject to Change
    ///
    /// Gives tests an isolated in-process broker. `server_uri` is recorded
    /// but not dialed.
    pub fn init_with_hub(
        &mut self,
        hub: Arc<MemoryHub>,
        server_uri: &str,
        client_id: &str,
    ) -> Result<()> {
        self.init_with(server_uri, client_id, move |config| {
            engine::create_engine_with_hub(config, hub)
        })
    }

    /// Create the engine handle with a caller-supplied factory.
    ///
    /// The factory receives the resolved client ID, the message slot the
    /// engine must deliver through and the watch it reports session losses
    /// to.
    pub fn init_with<F>(&mut self, server_uri: &str, client_id: &str, factory: F) -> Result<()>
    where
        F: FnOnce(EngineConfig) -> Result<EnginePtr>,
    {
        // ---
        if let Some(live) = &self.handle {
            log_error!("{}: init called while a handle is live", live.client_id());
            return Err(Error::AlreadyInitialized);
        }

        let client_id = ClientId::or_generate(client_id);
        let messages = MessageSlot::new();

        // The epoch `begin()` installs below; `&mut self` keeps it stable.
        let epoch = self.lifecycle.epoch() + 1;
        let lifecycle = self.lifecycle.clone();
        let watch = SessionWatch::new(move |connected| lifecycle.session_changed(epoch, connected));

        let engine = factory(EngineConfig {
            server_uri: server_uri.to_owned(),
            client_id: client_id.to_string(),
            messages: messages.clone(),
            watch,
        })?;

        log_info!(
            "{client_id}: initialized for {server_uri} ({} mode)",
            M::NAME
        );

        self.messages = messages;
        self.handle = Some(engine);
        self.lifecycle.begin();

        Ok(())
    }

    /// Release the handle if present. Idempotent.
    ///
    /// The registered message handler is dropped with it.
    pub fn destroy(&mut self) {
        // ---
        let Some(engine) = self.handle.take() else {
            return;
        };

        log_debug!("{}: destroying client handle", engine.client_id());

        engine.shutdown();
        self.messages.clear();
        self.lifecycle.end();
    }

    /// Session client ID, if a handle is live.
    pub fn client_id(&self) -> Option<&str> {
        self.handle.as_ref().map(|engine| engine.client_id())
    }

    /// Current lifecycle state.
    ///
    /// Tracks the session as the engine sees it: a broker drop moves a
    /// connected client to `Disconnected`, an automatic reconnect back to
    /// `Connected`.
    pub fn state(&self) -> ClientState {
        self.lifecycle.state()
    }

    pub fn is_initialized(&self) -> bool {
        self.handle.is_some()
    }

    /// Register the inbound message handler, replacing any previous one.
    ///
    /// The handler runs on the engine's task. Closures taking
    /// `(&str, &str)` qualify; annotate the parameter types.
    pub fn set_callback(&self, handler: impl MessageHandler + 'static) -> Result<()> {
        // ---
        self.engine()?;
        self.messages.set(Arc::new(handler));
        Ok(())
    }

    /// Remove the inbound message handler. Later messages are dropped.
    pub fn clear_callback(&self) -> Result<()> {
        // ---
        self.engine()?;
        self.messages.clear();
        Ok(())
    }

    /// Subscribe to `topic`, resolving once the engine confirms it.
    pub async fn subscribe(&self, topic: &str, qos: QoS) -> Result<()> {
        // ---
        let engine = self.engine()?;
        validate_filter(topic)?;
        engine.subscribe(topic, qos).await
    }

    /// Remove the subscription to `topic`.
    pub async fn unsubscribe(&self, topic: &str) -> Result<()> {
        // ---
        let engine = self.engine()?;
        validate_filter(topic)?;
        engine.unsubscribe(topic).await
    }

    /// Publish a text payload to `topic`.
    ///
    /// The payload is sent as its UTF-8 bytes, without a terminator.
    pub async fn publish(&self, topic: &str, payload: &str, qos: QoS) -> Result<()> {
        self.publish_bytes(topic, Bytes::copy_from_slice(payload.as_bytes()), qos)
            .await
    }

    /// Publish an opaque byte payload to `topic`.
    pub async fn publish_bytes(
        &self,
        topic: &str,
        payload: impl Into<Bytes>,
        qos: QoS,
    ) -> Result<()> {
        // ---
        let engine = self.engine()?;
        validate_topic_name(topic)?;
        engine.publish(topic, payload.into(), qos).await
    }

    fn engine(&self) -> Result<&dyn Engine> {
        self.handle.as_deref().ok_or(Error::HandleMissing)
    }

    /// Wraps `inner` so a successful outcome moves this handle to
    /// `Connected` before the consumer sees it.
    fn track_connect(&self, inner: ConnectResultFn) -> ConnectResultFn {
        // ---
        let lifecycle = self.lifecycle.clone();
        let epoch = lifecycle.epoch();

        Box::new(move |status: ConnectStatus| {
            if status.is_success() {
                lifecycle.transition(epoch, ClientState::Connected);
            }
            inner.on_connect_result(status);
        })
    }

    fn mark_disconnected(&self) {
        let epoch = self.lifecycle.epoch();
        self.lifecycle.transition(epoch, ClientState::Disconnected);
    }
}

impl MqttClient<Blocking> {
    // ---

    /// Connect and wait for the outcome.
    ///
    /// The wait is bounded by `options.connect_timeout()` (plus a short grace
    /// period for the engine) when one is set.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectFailed`] if the broker refused or the network failed
    /// - [`Error::Timeout`] if no outcome arrived in time
    /// - [`Error::HandleMissing`] without a handle
    pub async fn connect(&self, options: &ConnectOptions) -> Result<()> {
        // ---
        let engine = self.engine()?;

        let (tx, rx) = oneshot::channel();
        let on_result = self.track_connect(Box::new(move |status: ConnectStatus| {
            let _ = tx.send(status);
        }));

        engine.connect(options.clone(), on_result).await?;

        let status = match options.connect_timeout() {
            Some(limit) => tokio::time::timeout(limit + CONNECT_GRACE, rx)
                .await
                .map_err(|_| Error::Timeout)?,
            None => rx.await,
        }
        .map_err(|_| Error::Engine("engine dropped the connect attempt".into()))?;

        if status.is_success() {
            Ok(())
        } else {
            log_error!("{}: connect failed", engine.client_id());
            Err(Error::ConnectFailed)
        }
    }

    /// Disconnect, waiting up to `timeout` for the engine to flush.
    ///
    /// The session counts as disconnected once the request was made, even if
    /// the flush timed out.
    pub async fn disconnect(&self, timeout: Duration) -> Result<()> {
        // ---
        let engine = self.engine()?;

        let result = match tokio::time::timeout(timeout, engine.disconnect(Some(timeout))).await {
            Ok(result) => result,
            Err(_elapsed) => Err(Error::Timeout),
        };

        if matches!(result, Ok(()) | Err(Error::Timeout)) {
            self.mark_disconnected();
        }
        result
    }
}

impl MqttClient<Deferred> {
    // ---

    /// Start a connect attempt; `on_result` fires once with the outcome.
    ///
    /// Returns as soon as the engine accepted the attempt. If it returns an
    /// error, `on_result` is never invoked.
    pub async fn connect(
        &self,
        options: &ConnectOptions,
        on_result: impl ConnectResultHandler,
    ) -> Result<()> {
        self.start_connect(options, Box::new(on_result)).await
    }

    /// Start a connect attempt without a result handler.
    ///
    /// The outcome is only observable through [`state()`](Self::state).
    pub async fn connect_detached(&self, options: &ConnectOptions) -> Result<()> {
        // ---
        if let Some(client_id) = self.client_id() {
            log_warn!("{client_id}: connect without result handler");
        }
        self.start_connect(options, Box::new(|_status: ConnectStatus| {}))
            .await
    }

    /// Request a disconnect without waiting for the flush.
    pub async fn disconnect(&self) -> Result<()> {
        // ---
        let engine = self.engine()?;
        engine.disconnect(None).await?;
        self.mark_disconnected();
        Ok(())
    }

    async fn start_connect(&self, options: &ConnectOptions, on_result: ConnectResultFn) -> Result<()> {
        // ---
        let engine = self.engine()?;
        let on_result = self.track_connect(on_result);
        engine.connect(options.clone(), on_result).await
    }
}

impl<M: ConnectMode> Default for MqttClient<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: ConnectMode> Drop for MqttClient<M> {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl<M: ConnectMode> std::fmt::Debug for MqttClient<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttClient")
            .field("mode", &M::NAME)
            .field("client_id", &self.client_id())
            .field("state", &self.state())
            .finish()
    }
}

/// Subscribe/unsubscribe filters: wildcards allowed, matching left to the
/// broker.
fn validate_filter(topic: &str) -> Result<()> {
    if topic.is_empty() || topic.len() > MAX_TOPIC_LEN || topic.contains('\0') {
        return Err(Error::InvalidTopic(topic.to_owned()));
    }
    Ok(())
}

/// Publish topics must be concrete names.
fn validate_topic_name(topic: &str) -> Result<()> {
    validate_filter(topic)?;
    if topic.contains(['+', '#']) {
        return Err(Error::InvalidTopic(topic.to_owned()));
    }
    Ok(())
}
