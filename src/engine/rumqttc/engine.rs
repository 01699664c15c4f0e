//! MQTT engine implementation using `rumqttc`.
//!
//! This module provides an implementation of the `Engine` trait backed by a
//! real broker connection. It follows an **actor-based concurrency model** to
//! safely integrate with the underlying MQTT client.
//!
//! ## Concurrency model
//!
//! - A single background **actor task** owns the rumqttc `AsyncClient` and
//!   all session bookkeeping.
//! - Each session's `EventLoop` is polled by its own **poller task**, which
//!   forwards every event to the actor over an unbounded channel. The
//!   actor may therefore wait on rumqttc's bounded request queue while the
//!   poller keeps draining it.
//! - The actor is responsible for:
//!   - building the session from `ConnectOptions` on each connect,
//!   - publishing and (un)subscribing via `AsyncClient`,
//!   - matching acknowledgements to the requests that caused them,
//!   - reporting connect outcomes and delivering messages to handlers,
//!   - clean shutdown of the connection.
//! - Events are tagged with a session number; events from a torn-down
//!   session are discarded.
//!
//! Connect-result and message handlers run on the actor task.
//!
//! ## Connection behavior
//!
//! rumqttc only dials the broker when the `EventLoop` is polled, so the actor
//! creates the client and event loop when `connect()` is requested and starts
//! the poller from then on. The connect attempt ends with the first CONNACK,
//! the first connection error, or the `connect_timeout` deadline, whichever
//! comes first, and is reported exactly once. `connect_timeout` also bounds
//! rumqttc's own TCP dial and CONNACK wait.
//!
//! Once a session is established, broker disconnects are retried by polling
//! again after the retry interval; confirmed subscriptions are re-issued on
//! the next CONNACK. Both the loss and the restore are reported through the
//! engine's `SessionWatch`.
//!
//! ## Subscription confirmation
//!
//! `subscribe()` and `unsubscribe()` wait for SUBACK/UNSUBACK. rumqttc hands
//! out packet IDs only when it writes a request, announcing each through an
//! `Outgoing::Subscribe`/`Outgoing::Unsubscribe` event in request order. The
//! actor queues every sent change and binds it to the next such packet ID,
//! then completes it when the acknowledgement with that ID arrives. Any
//! number of changes may be in flight.
//!
//! ## Scope and limitations
//!
//! - One engine instance corresponds to a single broker connection.
//! - MQTT 3.1.1 only; the 3.1 and 5.0 selectors are rejected.
//! - Plain TCP only; no TLS or WebSocket transports.

use rumqttc::{
    //
    AsyncClient,
    ConnectReturnCode,
    ConnectionError,
    Event,
    EventLoop,
    MqttOptions,
    NetworkOptions,
    Outgoing,
    Packet,
    Publish,
};

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::{
    //
    log_debug,
    log_error,
    log_info,
    log_warn,
    ConnectOptions,
    ConnectResultFn,
    ConnectStatus,
    Engine,
    EngineBase,
    EngineConfig,
    EnginePtr,
    Error,
    MessageSlot,
    ProtocolVersion,
    QoS,
    Result,
    SessionWatch,
};

use crate::engine::uri::{self, Scheme};

const RECONNECT_DELAY: Duration = Duration::from_secs(2);
const COMMAND_CHANNEL_CAPACITY: usize = 64;
const REQUEST_CHANNEL_CAPACITY: usize = 10;

//
// Actor commands
//

enum Cmd {
    //
    Connect {
        options: ConnectOptions,
        on_result: ConnectResultFn,
        resp: oneshot::Sender<Result<()>>,
    },
    Disconnect {
        resp: oneshot::Sender<Result<()>>,
        done: oneshot::Sender<()>,
    },
    Subscribe {
        topic: String,
        qos: QoS,
        resp: oneshot::Sender<Result<()>>,
    },
    Unsubscribe {
        topic: String,
        resp: oneshot::Sender<Result<()>>,
    },
    Publish {
        topic: String,
        payload: Bytes,
        qos: QoS,
        resp: oneshot::Sender<Result<()>>,
    },
    Close,
}

enum ActorStep {
    //
    Continue,
    Stop,
}

impl Cmd {
    // ---

    /// Dispatches an actor command to the correct handler on the actor
    async fn handle(self, actor: &mut MqttActor) -> ActorStep {
        // ---

        match self {
            Cmd::Connect {
                options,
                on_result,
                resp,
            } => {
                let result = actor.handle_connect(options, on_result);
                let _ = resp.send(result);
                ActorStep::Continue
            }
            Cmd::Disconnect { resp, done } => {
                let result = actor.handle_disconnect(done).await;
                let _ = resp.send(result);
                ActorStep::Continue
            }
            Cmd::Subscribe { topic, qos, resp } => {
                actor
                    .handle_subscription_change(AckKind::Subscribe(qos), topic, resp)
                    .await;
                ActorStep::Continue
            }
            Cmd::Unsubscribe { topic, resp } => {
                actor
                    .handle_subscription_change(AckKind::Unsubscribe, topic, resp)
                    .await;
                ActorStep::Continue
            }
            Cmd::Publish {
                topic,
                payload,
                qos,
                resp,
            } => {
                let result = actor.handle_publish(&topic, payload, qos).await;
                let _ = resp.send(result);
                ActorStep::Continue
            }
            Cmd::Close => {
                log_debug!("{}: closing engine", actor.client_id);
                ActorStep::Stop
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum AckKind {
    Subscribe(QoS),
    Unsubscribe,
}

/// A subscription change awaiting SUBACK/UNSUBACK.
///
/// `resp` is `None` for the resubscribes the actor issues itself after a
/// reconnect.
struct PendingAck {
    kind: AckKind,
    topic: String,
    resp: Option<oneshot::Sender<Result<()>>>,
}

impl PendingAck {
    fn fail(self, reason: &str) {
        if let Some(resp) = self.resp {
            let _ = resp.send(Err(Error::Engine(format!(
                "{reason} before {} was acknowledged",
                self.topic
            ))));
        }
    }
}

/// The connect attempt currently in flight.
struct PendingConnect {
    on_result: ConnectResultFn,
    deadline: Option<Instant>,
}

/// An event-loop result tagged with the session that produced it.
struct SessionEvent {
    session: u64,
    event: std::result::Result<Event, ConnectionError>,
}

/// rumqttc-based implementation of the `Engine` trait.
///
/// Every call is forwarded to the actor task and answered over a oneshot
/// channel.
struct RumqttcEngine {
    // ---
    base: EngineBase,
    cmd_tx: mpsc::Sender<Cmd>,
}

impl RumqttcEngine {
    // ---

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<Result<T>>) -> Cmd) -> Result<T> {
        // ---
        let (tx, rx) = oneshot::channel();

        self.cmd_tx
            .send(make(tx))
            .await
            .map_err(|_| Error::Engine("engine task has stopped".into()))?;

        rx.await
            .map_err(|_| Error::Engine("engine task dropped the request".into()))?
    }
}

struct MqttActor {
    // ---
    client_id: String,
    host: String,
    port: u16,
    messages: MessageSlot,
    watch: SessionWatch,
    cmd_rx: mpsc::Receiver<Cmd>,

    // Every poller gets a clone of `events_tx`; the actor keeps one so the
    // receiver never closes.
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,

    // Present from connect() until the session is torn down.
    client: Option<AsyncClient>,
    poller: Option<JoinHandle<()>>,
    session: u64,

    connected: bool,
    reconnect: bool,

    pending_connect: Option<PendingConnect>,
    pending_disconnect: Option<oneshot::Sender<()>>,

    // Sent changes in request order, waiting for rumqttc to assign a packet
    // ID, and changes on the wire keyed by that ID.
    unassigned: VecDeque<PendingAck>,
    in_flight: HashMap<u16, PendingAck>,

    // Confirmed subscriptions, re-issued after a reconnect.
    topics: HashMap<String, QoS>,
}

impl MqttActor {
    // ---

    async fn run(mut self) {
        // ---

        loop {
            let deadline = self.pending_connect.as_ref().and_then(|p| p.deadline);

            tokio::select! {
                cmd = self.cmd_rx.recv() => {
                    match cmd {
                        Some(cmd) => {
                            if matches!(cmd.handle(&mut self).await, ActorStep::Stop) {
                                break;
                            }
                        }
                        None => break,
                    }
                }

                Some(SessionEvent { session, event }) = self.events_rx.recv() => {
                    if session == self.session && self.client.is_some() {
                        self.handle_event(event).await;
                    }
                }

                _ = wait_until(deadline), if deadline.is_some() => {
                    log_error!("{}: connect attempt timed out", self.client_id);
                    self.finish_connect(ConnectStatus::Failure);
                    self.teardown_session();
                }
            }
        }

        if self.pending_connect.take().is_some() {
            log_debug!("{}: engine closed with a connect attempt in flight", self.client_id);
        }
        self.teardown_session();
    }

    /// Builds a fresh rumqttc session from `options` and starts its poller.
    ///
    /// The outcome is reported later through `on_result`; an `Err` here means
    /// the attempt never started and `on_result` is dropped unused.
    fn handle_connect(&mut self, options: ConnectOptions, on_result: ConnectResultFn) -> Result<()> {
        // ---

        if self.pending_connect.is_some() {
            return Err(Error::InvalidState("connect already in progress"));
        }
        if self.connected {
            return Err(Error::InvalidState("already connected"));
        }

        match options.protocol {
            ProtocolVersion::Default | ProtocolVersion::V3_1_1 => {}
            other => {
                log_error!(
                    "{}: protocol version {:?} not supported by rumqttc engine",
                    self.client_id,
                    other
                );
                return Err(Error::UnsupportedProtocol(other.into()));
            }
        }

        // A reconnecting session from an earlier connect is replaced.
        self.teardown_session();

        let mut mqtt_options = MqttOptions::new(&self.client_id, &self.host, self.port);
        mqtt_options.set_keep_alive(options.keep_alive());
        mqtt_options.set_clean_session(true);

        if let Some(username) = options.effective_username() {
            let password = options.effective_password().unwrap_or_default();
            mqtt_options.set_credentials(username, password);
        }

        let (client, mut event_loop) = AsyncClient::new(mqtt_options, REQUEST_CHANNEL_CAPACITY);

        // rumqttc bounds its dial and CONNACK wait separately (5s unless told
        // otherwise).
        if let Some(limit) = options.connect_timeout() {
            let mut network = NetworkOptions::new();
            network.set_connection_timeout(limit.as_secs());
            event_loop.set_network_options(network);
        }

        self.session += 1;
        let retry_delay = options.retry_interval().unwrap_or(RECONNECT_DELAY);
        self.poller = Some(tokio::spawn(poll_session(
            event_loop,
            self.session,
            retry_delay,
            self.events_tx.clone(),
        )));

        self.client = Some(client);
        self.pending_connect = Some(PendingConnect {
            on_result,
            deadline: options.connect_timeout().map(|t| Instant::now() + t),
        });

        log_debug!(
            "{}: connecting to {}:{} (keep-alive {}s)",
            self.client_id,
            self.host,
            self.port,
            options.keep_alive_secs
        );

        Ok(())
    }

    /// Requests a graceful disconnect.
    ///
    /// `done` fires once the DISCONNECT packet has been written or the
    /// connection is gone.
    async fn handle_disconnect(&mut self, done: oneshot::Sender<()>) -> Result<()> {
        // ---

        if self.pending_connect.is_some() {
            log_info!("{}: connect attempt abandoned by disconnect", self.client_id);
            self.finish_connect(ConnectStatus::Failure);
            self.teardown_session();
            let _ = done.send(());
            return Ok(());
        }

        let Some(client) = &self.client else {
            return Err(Error::NotConnected);
        };

        if !self.connected {
            // Reconnecting; nothing to flush.
            log_debug!("{}: dropping reconnecting session", self.client_id);
            self.teardown_session();
            let _ = done.send(());
            return Ok(());
        }

        log_debug!("{}: disconnecting mqtt client", self.client_id);

        if let Err(_err) = client.disconnect().await {
            log_error!("{}: mqtt disconnect failed: {_err}", self.client_id);
            self.teardown_session();
            let _ = done.send(());
            return Err(Error::Engine("disconnect request rejected".into()));
        }

        self.connected = false;
        self.reconnect = false;
        self.topics.clear();
        self.fail_acks("disconnecting");
        self.pending_disconnect = Some(done);

        Ok(())
    }

    /// Sends a SUBSCRIBE or UNSUBSCRIBE and parks `resp` until the broker
    /// acknowledges it.
    async fn handle_subscription_change(
        &mut self,
        kind: AckKind,
        topic: String,
        resp: oneshot::Sender<Result<()>>,
    ) {
        // ---

        if self.client.is_none() || !self.connected {
            let _ = resp.send(Err(Error::NotConnected));
            return;
        }

        self.send_subscription_change(kind, topic, Some(resp)).await;
    }

    /// Hands a subscription change to rumqttc and queues it for its packet
    /// ID.
    async fn send_subscription_change(
        &mut self,
        kind: AckKind,
        topic: String,
        resp: Option<oneshot::Sender<Result<()>>>,
    ) {
        // ---
        let Some(client) = &self.client else {
            PendingAck { kind, topic, resp }.fail("session closed");
            return;
        };

        let sent = match kind {
            AckKind::Subscribe(qos) => client.subscribe(topic.as_str(), to_mqtt_qos(qos)).await,
            AckKind::Unsubscribe => client.unsubscribe(topic.as_str()).await,
        };

        if let Err(_err) = sent {
            log_error!(
                "{}: failed to send {kind:?} for topic {topic}: {_err}",
                self.client_id
            );
            if let Some(resp) = resp {
                let _ = resp.send(Err(Error::Engine(format!(
                    "failed to send request for {topic}"
                ))));
            }
            return;
        }

        // The matching Outgoing event is handled by this task only after
        // this returns, so the entry is always queued first.
        self.unassigned.push_back(PendingAck { kind, topic, resp });
    }

    /// Publishes `payload` on `topic`; completes once rumqttc has queued it.
    async fn handle_publish(&mut self, topic: &str, payload: Bytes, qos: QoS) -> Result<()> {
        // ---

        let Some(client) = self.client.as_ref().filter(|_| self.connected) else {
            return Err(Error::NotConnected);
        };

        client
            .publish(topic, to_mqtt_qos(qos), false, payload.to_vec())
            .await
            .map_err(|_err| {
                log_error!(
                    "{}: publish failed for topic {topic}: {_err}",
                    self.client_id
                );
                Error::Engine(format!("publish to {topic} rejected"))
            })
    }

    async fn handle_event(&mut self, event: std::result::Result<Event, ConnectionError>) {
        // ---

        match event {
            Ok(Event::Incoming(Packet::ConnAck(connack))) => {
                self.handle_connack(connack).await;
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                self.handle_incoming(publish);
            }
            Ok(Event::Incoming(Packet::SubAck(suback))) => {
                self.handle_suback(suback);
            }
            Ok(Event::Incoming(Packet::UnsubAck(unsuback))) => {
                self.handle_unsuback(unsuback.pkid);
            }
            Ok(Event::Outgoing(Outgoing::Subscribe(pkid) | Outgoing::Unsubscribe(pkid))) => {
                self.assign_packet_id(pkid);
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                log_info!("{}: disconnected from broker", self.client_id);
                self.teardown_session();
            }
            Ok(_event) => {
                // Other events (PingResp, PubAck, etc.) - ignore
                log_debug!("{}: received mqtt event (ignored):{:?}", self.client_id, _event);
            }
            Err(err) => {
                self.handle_connection_error(err);
            }
        }
    }

    /// Processes connection acknowledgment from the broker.
    ///
    /// Completes a pending connect attempt. After a reconnect, reports the
    /// restored session and re-issues every confirmed subscription.
    async fn handle_connack(&mut self, connack: rumqttc::ConnAck) {
        // ---

        if connack.code != ConnectReturnCode::Success {
            log_error!("{}: connection failed: {:?}", self.client_id, connack.code);
            self.finish_connect(ConnectStatus::Failure);
            self.teardown_session();
            return;
        }

        log_info!("{}: connected to broker", self.client_id);
        self.connected = true;

        if self.pending_connect.is_some() {
            self.finish_connect(ConnectStatus::Success);
        } else {
            self.watch.notify(true);
        }

        if !std::mem::take(&mut self.reconnect) {
            return;
        }

        let topics: Vec<(String, QoS)> = self.topics.iter().map(|(t, q)| (t.clone(), *q)).collect();
        for (topic, qos) in topics {
            log_debug!("{}: resubscribing to {topic}", self.client_id);
            self.send_subscription_change(AckKind::Subscribe(qos), topic, None)
                .await;
        }
    }

    /// Resolves a failed connect or disconnect, or marks an established
    /// session as lost. The poller retries on its own after the retry
    /// interval.
    fn handle_connection_error(&mut self, err: ConnectionError) {
        // ---

        if self.pending_connect.is_some() {
            log_error!("{}: connect failed: {err}", self.client_id);
            self.finish_connect(ConnectStatus::Failure);
            self.teardown_session();
            return;
        }

        if self.pending_disconnect.is_some() {
            log_debug!("{}: connection closed during disconnect: {err}", self.client_id);
            self.teardown_session();
            return;
        }

        if !self.connected {
            log_debug!("{}: reconnect attempt failed: {err}", self.client_id);
            return;
        }

        log_error!("{}: broker connection lost: {err}", self.client_id);
        self.connected = false;
        self.reconnect = true;

        // Requests rumqttc had not written yet are replayed on the next
        // session; only those already on the wire are lost.
        for (_pkid, pending) in self.in_flight.drain() {
            pending.fail("connection lost");
        }

        self.watch.notify(false);
    }

    /// Binds the oldest sent change to the packet ID rumqttc just wrote it
    /// with.
    fn assign_packet_id(&mut self, pkid: u16) {
        // ---
        match self.unassigned.pop_front() {
            Some(pending) => {
                self.in_flight.insert(pkid, pending);
            }
            None => {
                log_debug!("{}: untracked subscription change {pkid}", self.client_id);
            }
        }
    }

    /// Processes SUBACK confirmation from the broker.
    fn handle_suback(&mut self, suback: rumqttc::SubAck) {
        // ---

        let Some(PendingAck { kind, topic, resp }) = self.in_flight.remove(&suback.pkid) else {
            log_debug!("{}: unexpected SUBACK {} ignored", self.client_id, suback.pkid);
            return;
        };

        let success = suback
            .return_codes
            .iter()
            .all(|code| !matches!(code, rumqttc::SubscribeReasonCode::Failure));

        let result = if success {
            log_info!("{}: subscribed to topic {topic}", self.client_id);
            if let AckKind::Subscribe(qos) = kind {
                self.topics.insert(topic, qos);
            }
            Ok(())
        } else {
            log_error!(
                "{}: subscription failed for topic {topic}: {:?}",
                self.client_id,
                suback.return_codes
            );
            Err(Error::Engine(format!(
                "broker rejected subscription to {topic}"
            )))
        };

        if let Some(resp) = resp {
            let _ = resp.send(result);
        }
    }

    fn handle_unsuback(&mut self, pkid: u16) {
        // ---

        let Some(PendingAck { topic, resp, .. }) = self.in_flight.remove(&pkid) else {
            log_debug!("{}: unexpected UNSUBACK {pkid} ignored", self.client_id);
            return;
        };

        log_info!("{}: unsubscribed from topic {topic}", self.client_id);
        self.topics.remove(&topic);
        if let Some(resp) = resp {
            let _ = resp.send(Ok(()));
        }
    }

    /// Hands an inbound publish to the registered message handler.
    fn handle_incoming(&self, publish: Publish) {
        // ---

        self.messages
            .deliver(&self.client_id, &publish.topic, &publish.payload);
    }

    fn fail_acks(&mut self, reason: &str) {
        // ---
        for pending in self.unassigned.drain(..) {
            pending.fail(reason);
        }
        for (_pkid, pending) in self.in_flight.drain() {
            pending.fail(reason);
        }
    }

    /// Reports the outcome of the in-flight connect attempt, if any.
    fn finish_connect(&mut self, status: ConnectStatus) {
        // ---
        if let Some(PendingConnect { on_result, .. }) = self.pending_connect.take() {
            on_result.on_connect_result(status);
        }
    }

    /// Drops the rumqttc session and resolves everything waiting on it.
    fn teardown_session(&mut self) {
        // ---
        if let Some(poller) = self.poller.take() {
            poller.abort();
        }
        self.client = None;
        self.connected = false;
        self.reconnect = false;
        self.topics.clear();
        self.fail_acks("session closed");

        if let Some(done) = self.pending_disconnect.take() {
            let _ = done.send(());
        }
    }
} // MqttActor

/// Polls one session's event loop until the actor goes away or the session
/// is closed with a DISCONNECT.
///
/// rumqttc reconnects on the next poll after an error, so errors are
/// followed by `retry_delay` of back-off rather than ending the task.
async fn poll_session(
    mut event_loop: EventLoop,
    session: u64,
    retry_delay: Duration,
    events: mpsc::UnboundedSender<SessionEvent>,
) {
    // ---
    loop {
        let event = event_loop.poll().await;
        let failed = event.is_err();
        let closed = matches!(event, Ok(Event::Outgoing(Outgoing::Disconnect)));

        if events.send(SessionEvent { session, event }).is_err() || closed {
            break;
        }
        if failed {
            tokio::time::sleep(retry_delay).await;
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    // ---
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn to_mqtt_qos(qos: QoS) -> rumqttc::QoS {
    // ---
    match qos {
        QoS::AtMostOnce => rumqttc::QoS::AtMostOnce,
        QoS::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
        QoS::ExactlyOnce => rumqttc::QoS::ExactlyOnce,
    }
}

#[async_trait::async_trait]
impl Engine for RumqttcEngine {
    // ---

    fn base(&self) -> &EngineBase {
        &self.base
    }

    async fn connect(&self, options: ConnectOptions, on_result: ConnectResultFn) -> Result<()> {
        // ---
        self.request(|resp| Cmd::Connect {
            options,
            on_result,
            resp,
        })
        .await
    }

    async fn disconnect(&self, timeout: Option<Duration>) -> Result<()> {
        // ---
        let (done_tx, done_rx) = oneshot::channel();

        self.request(|resp| Cmd::Disconnect {
            resp,
            done: done_tx,
        })
        .await?;

        let Some(timeout) = timeout else {
            return Ok(());
        };

        match tokio::time::timeout(timeout, done_rx).await {
            // A dropped sender means the actor is gone, so is the connection.
            Ok(_) => Ok(()),
            Err(_elapsed) => {
                log_warn!("{}: disconnect not flushed within {timeout:?}", self.client_id());
                Err(Error::Timeout)
            }
        }
    }

    async fn subscribe(&self, topic: &str, qos: QoS) -> Result<()> {
        // ---
        let topic = topic.to_owned();
        self.request(|resp| Cmd::Subscribe { topic, qos, resp })
            .await
    }

    async fn unsubscribe(&self, topic: &str) -> Result<()> {
        // ---
        let topic = topic.to_owned();
        self.request(|resp| Cmd::Unsubscribe { topic, resp }).await
    }

    async fn publish(&self, topic: &str, payload: Bytes, qos: QoS) -> Result<()> {
        // ---
        let topic = topic.to_owned();
        self.request(|resp| Cmd::Publish {
            topic,
            payload,
            qos,
            resp,
        })
        .await
    }

    fn shutdown(&self) {
        // ---
        // A full channel still stops the actor once the sender is dropped.
        let _ = self.cmd_tx.try_send(Cmd::Close);
    }
}

/// Creates a rumqttc-based MQTT engine from the given configuration.
///
/// # Errors
///
/// Returns an error if:
/// - The server URI cannot be parsed or is not a TCP URI
/// - No tokio runtime is available to host the actor task
///
/// # Connection Behavior
///
/// No network activity happens here; the broker is dialed on `connect()`.
pub fn create_engine(config: EngineConfig) -> Result<EnginePtr> {
    // ---

    let server = uri::parse(&config.server_uri)?;
    if server.scheme != Scheme::Tcp {
        return Err(Error::InvalidUri(format!(
            "{}: rumqttc engine requires tcp:// or mqtt://",
            config.server_uri
        )));
    }

    let runtime = tokio::runtime::Handle::try_current()
        .map_err(|_| Error::Engine("rumqttc engine requires a tokio runtime".into()))?;

    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);

    let (events_tx, events_rx) = mpsc::unbounded_channel();

    let actor = MqttActor {
        client_id: config.client_id.clone(),
        host: server.host,
        port: server.port,
        messages: config.messages.clone(),
        watch: config.watch.clone(),
        cmd_rx,
        events_tx,
        events_rx,
        client: None,
        poller: None,
        session: 0,
        connected: false,
        reconnect: false,
        pending_connect: None,
        pending_disconnect: None,
        unassigned: VecDeque::new(),
        in_flight: HashMap::new(),
        topics: HashMap::new(),
    };

    log_debug!(
        "{}: create rumqttc engine for {}",
        config.client_id,
        config.server_uri
    );

    runtime.spawn(actor.run());

    Ok(Box::new(RumqttcEngine {
        base: EngineBase::from(&config),
        cmd_tx,
    }))
}
