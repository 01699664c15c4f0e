//! Thin, string-oriented MQTT client adapters
//!
//! This library wraps an MQTT engine behind one adapter type with two
//! connection modes: [`SyncClient`] waits for connect and disconnect to
//! complete, [`AsyncClient`] reports the connect outcome to a handler. Both
//! generate a UUID client ID when none is given and deliver inbound messages
//! as `(topic, payload)` text to a single registered handler.
//!
//! The engine is picked from the server URI scheme:
//!
//! | Scheme               | Engine                         | Feature             |
//! |----------------------|--------------------------------|---------------------|
//! | `tcp://`, `mqtt://`  | rumqttc network client         | `transport_rumqttc` |
//! | `memory://`          | in-process hub (tests, demos)  | always available    |
//!

// Import all sub modules once...
mod client;
mod domain;
mod engine;

mod client_id;
mod connect_options;
mod error;
mod macros;

pub(crate) use macros::{log_debug, log_error, log_info, log_warn};

// Re-export main types
pub use client::{AsyncClient, Blocking, ClientState, ConnectMode, Deferred, MqttClient, SyncClient};

pub use client_id::ClientId;
pub use connect_options::{ConnectOptions, ProtocolVersion};
pub use error::{Error, Result};

pub use engine::{create_engine_with_hub, create_memory_engine, create_rumqttc_engine, MemoryHub};

// --- public re-exports
pub use domain::{
    //
    ConnectResultFn,
    ConnectResultHandler,
    ConnectStatus,
    Engine,
    EngineBase,
    EngineConfig,
    EnginePtr,
    MessageHandler,
    MessageSlot,
    QoS,
    SessionWatch,
};
