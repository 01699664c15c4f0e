// src/engine/memory/engine.rs

//! In-memory engine implementation.
//!
//! This file contains the concrete implementation of the domain-level
//! `Engine` trait using in-process data structures only.
//!
//! The memory engine is the **reference implementation** of engine
//! semantics. Other engines are expected to approximate this behavior as
//! closely as their underlying client libraries allow and to document any
//! unavoidable deviations.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use std::time::Duration;

use bytes::Bytes;

use crate::{
    // ---
    log_debug,
    log_error,
    log_info,
    ConnectOptions,
    ConnectResultFn,
    ConnectStatus,
    Engine,
    EngineBase,
    EngineConfig,
    EnginePtr,
    Error,
    MessageSlot,
    QoS,
    Result,
    SessionWatch,
};

/// Acquire mutex guard, ignoring poisoning
fn lock_ignore_poison<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// One memory engine's view of its broker session.
///
/// Hub entries hold the `Arc`, so two engines sharing a client ID are still
/// told apart by pointer identity.
struct Session {
    // ---
    client_id: String,
    connected: AtomicBool,
    watch: SessionWatch,
}

impl Session {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

struct Subscriber {
    // ---
    session: Arc<Session>,
    qos: QoS,
    messages: MessageSlot,
}

#[derive(Default)]
struct HubState {
    // ---
    sessions: HashMap<String, Arc<Session>>,
    subscriptions: HashMap<String, Vec<Subscriber>>,
}

impl HubState {
    fn drop_subscriptions(&mut self, session: &Arc<Session>) {
        self.subscriptions.retain(|_, entries| {
            entries.retain(|s| !Arc::ptr_eq(&s.session, session));
            !entries.is_empty()
        });
    }
}

/// In-process broker shared by memory engines.
///
/// All memory engines bound to the same hub can publish and receive each
/// other's messages, exactly as sessions connected to a real broker would.
///
/// # ⚠️  Testing Only - Subject to Change
///
/// **This type is exposed only for `mom-mqtt`'s own integration tests.**
/// It may change or be removed in future versions without a deprecation cycle.
///
/// ## Semantics
///
/// - A subscription matches a publish if the topic strings are exactly equal.
///   No wildcard matching is performed.
/// - Delivery happens on the publisher's task, before `publish()` returns.
/// - Sessions are clean: disconnecting drops every subscription of that
///   session.
/// - Connecting with a client ID that already has a live session takes that
///   session over; the older one is disconnected and loses its
///   subscriptions.
/// - A hub built with [`MemoryHub::with_credentials`] refuses sessions whose
///   username/password do not match.
///
/// # Example
///
/// ```
/// # use mom_mqtt::{MemoryHub, SyncClient};
/// let hub = MemoryHub::new();
///
/// let mut client = SyncClient::new();
/// client.init_with_hub(hub.clone(), "memory://", "").unwrap();
/// assert_eq!(hub.subscriber_count("demo/topic"), 0);
/// ```
pub struct MemoryHub {
    // ---
    state: Mutex<HubState>,
    credentials: Option<(String, String)>,
}

impl MemoryHub {
    /// Create a new, empty hub accepting every session.
    pub fn new() -> Arc<Self> {
        // ---
        Arc::new(Self::default())
    }

    /// Create a hub that only accepts the given credentials.
    pub fn with_credentials(username: impl Into<String>, password: impl Into<String>) -> Arc<Self> {
        // ---
        Arc::new(Self {
            state: Mutex::new(HubState::default()),
            credentials: Some((username.into(), password.into())),
        })
    }

    /// Number of live subscriptions on `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        // ---
        lock_ignore_poison(&self.state)
            .subscriptions
            .get(topic)
            .map_or(0, Vec::len)
    }

    fn authenticate(&self, options: &ConnectOptions) -> ConnectStatus {
        // ---
        let Some((username, password)) = &self.credentials else {
            return ConnectStatus::Success;
        };

        let offered_user = options.effective_username().unwrap_or_default();
        let offered_pass = options.effective_password().unwrap_or_default();

        if offered_user == username && offered_pass == password {
            ConnectStatus::Success
        } else {
            ConnectStatus::Failure
        }
    }

    /// Register `session` as the live session for its client ID.
    fn attach(&self, session: &Arc<Session>) {
        // ---
        let replaced = {
            let mut state = lock_ignore_poison(&self.state);
            session.connected.store(true, Ordering::Release);

            let previous = state
                .sessions
                .insert(session.client_id.clone(), Arc::clone(session))
                .filter(|previous| !Arc::ptr_eq(previous, session));

            if let Some(previous) = &previous {
                previous.connected.store(false, Ordering::Release);
                state.drop_subscriptions(previous);
            }
            previous
        };

        // Observers run without the hub lock held.
        if let Some(previous) = replaced {
            log_info!("{}: session taken over by a new connection", previous.client_id);
            previous.watch.notify(false);
        }
    }

    /// Remove `session` and everything it subscribed to. A session that was
    /// already taken over leaves its successor untouched.
    fn detach(&self, session: &Arc<Session>) {
        // ---
        let mut state = lock_ignore_poison(&self.state);
        session.connected.store(false, Ordering::Release);
        state.drop_subscriptions(session);

        if state
            .sessions
            .get(&session.client_id)
            .is_some_and(|live| Arc::ptr_eq(live, session))
        {
            state.sessions.remove(&session.client_id);
        }
    }

    fn subscribe(&self, session: &Arc<Session>, topic: &str, qos: QoS, messages: MessageSlot) {
        // ---
        let mut state = lock_ignore_poison(&self.state);
        let entries = state.subscriptions.entry(topic.to_owned()).or_default();

        // Re-subscribing updates the existing subscription in place.
        match entries.iter_mut().find(|s| Arc::ptr_eq(&s.session, session)) {
            Some(existing) => existing.qos = qos,
            None => entries.push(Subscriber {
                session: Arc::clone(session),
                qos,
                messages,
            }),
        }
    }

    fn unsubscribe(&self, session: &Arc<Session>, topic: &str) {
        // ---
        let mut state = lock_ignore_poison(&self.state);
        if let Some(entries) = state.subscriptions.get_mut(topic) {
            entries.retain(|s| !Arc::ptr_eq(&s.session, session));
            if entries.is_empty() {
                state.subscriptions.remove(topic);
            }
        }
    }

    fn publish(&self, _publisher: &str, topic: &str, payload: &[u8], _qos: QoS) {
        // ---
        let targets: Vec<(String, MessageSlot)> = {
            let state = lock_ignore_poison(&self.state);
            state
                .subscriptions
                .get(topic)
                .map(|entries| {
                    entries
                        .iter()
                        .map(|s| (s.session.client_id.clone(), s.messages.clone()))
                        .collect()
                })
                .unwrap_or_default()
        };

        log_debug!(
            "{_publisher}: publish to {topic} ({} subscribers, {_qos:?})",
            targets.len()
        );

        // Handlers run without the hub lock held.
        for (client_id, messages) in targets {
            messages.deliver(&client_id, topic, payload);
        }
    }
}

impl Default for MemoryHub {
    fn default() -> Self {
        // ---
        Self {
            state: Mutex::new(HubState::default()),
            credentials: None,
        }
    }
}

/// Process-global hub used for `memory://` URIs.
static GLOBAL_HUB: OnceLock<Arc<MemoryHub>> = OnceLock::new();

fn global_hub() -> Arc<MemoryHub> {
    GLOBAL_HUB.get_or_init(MemoryHub::new).clone()
}

/// In-memory engine.
///
/// Routes messages through a shared [`MemoryHub`].
struct MemoryEngine {
    // ---
    base: EngineBase,
    hub: Arc<MemoryHub>,
    messages: MessageSlot,
    session: Arc<Session>,
}

impl MemoryEngine {
    fn ensure_connected(&self) -> Result<()> {
        if self.session.is_connected() {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }
}

#[async_trait::async_trait]
impl Engine for MemoryEngine {
    // ---
    fn base(&self) -> &EngineBase {
        &self.base
    }

    /// Accept or refuse the session against the hub's credentials.
    ///
    /// The result is reported from a separate task, mirroring an engine's
    /// network thread.
    async fn connect(&self, options: ConnectOptions, on_result: ConnectResultFn) -> Result<()> {
        // ---
        if self.session.is_connected() {
            return Err(Error::InvalidState("already connected"));
        }

        let status = self.hub.authenticate(&options);
        if status.is_success() {
            self.hub.attach(&self.session);
            log_info!("{}: connected to memory hub", self.client_id());
        } else {
            log_error!("{}: memory hub refused credentials", self.client_id());
        }

        tokio::spawn(async move {
            on_result.on_connect_result(status);
        });

        Ok(())
    }

    async fn disconnect(&self, _timeout: Option<Duration>) -> Result<()> {
        // ---
        self.ensure_connected()?;

        log_debug!("{}: disconnecting from memory hub", self.client_id());
        self.hub.detach(&self.session);
        Ok(())
    }

    /// Register a subscription on the shared hub.
    ///
    /// Once this function returns successfully, any subsequent publish on the
    /// same topic is delivered to this engine's message slot.
    async fn subscribe(&self, topic: &str, qos: QoS) -> Result<()> {
        // ---
        self.ensure_connected()?;

        log_debug!("{}: subscribe to {topic} ({qos:?})", self.client_id());
        self.hub
            .subscribe(&self.session, topic, qos, self.messages.clone());
        Ok(())
    }

    async fn unsubscribe(&self, topic: &str) -> Result<()> {
        // ---
        self.ensure_connected()?;

        log_debug!("{}: unsubscribe from {topic}", self.client_id());
        self.hub.unsubscribe(&self.session, topic);
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Bytes, qos: QoS) -> Result<()> {
        // ---
        self.ensure_connected()?;

        self.hub.publish(self.client_id(), topic, &payload, qos);
        Ok(())
    }

    fn shutdown(&self) {
        // ---
        self.hub.detach(&self.session);
    }
}

impl Drop for MemoryEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Create a new in-memory engine using the process-global hub.
///
/// # Errors
///
/// Currently infallible.
pub fn create_engine(config: EngineConfig) -> Result<EnginePtr> {
    // ---
    create_engine_with_hub(config, global_hub())
}

/// Create a new in-memory engine bound to the provided hub.
///
/// # ⚠️  Testing Only - Subject to Change
///
/// Allows tests to isolate sessions from each other by giving each test its
/// own [`MemoryHub`].
///
/// # Errors
///
/// Currently infallible.
pub fn create_engine_with_hub(config: EngineConfig, hub: Arc<MemoryHub>) -> Result<EnginePtr> {
    // ---
    log_debug!("{}: create memory engine", config.client_id);

    let engine = MemoryEngine {
        base: EngineBase::from(&config),
        hub,
        session: Arc::new(Session {
            client_id: config.client_id.clone(),
            connected: AtomicBool::new(false),
            watch: config.watch,
        }),
        messages: config.messages,
    };

    Ok(Box::new(engine))
}
