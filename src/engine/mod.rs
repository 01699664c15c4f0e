//! Engine implementations.
//!
//! This module provides concrete implementations of the domain-level
//! `Engine` trait and picks one from the server URI scheme. Network engines
//! are hidden behind feature flags and exposed only through constructor
//! functions.
//!
//! Domain code must not depend on engine-specific types.

mod memory;
mod uri;

#[cfg(feature = "transport_rumqttc")]
mod rumqttc;

use crate::{EngineConfig, EnginePtr, Result};

pub use memory::{create_engine as create_memory_engine, create_engine_with_hub, MemoryHub};

#[cfg(feature = "transport_rumqttc")]
pub use self::rumqttc::create_engine as create_rumqttc_engine;

/// Null object used when the rumqttc engine is compiled out.
#[cfg(not(feature = "transport_rumqttc"))]
pub fn create_rumqttc_engine(_config: EngineConfig) -> Result<EnginePtr> {
    Err(crate::Error::FeatureDisabled("transport_rumqttc"))
}

/// Create the engine matching the scheme of `config.server_uri`.
///
/// - `tcp://` and `mqtt://` → rumqttc
/// - `memory://` → process-global in-memory hub
pub(crate) fn create_engine(config: EngineConfig) -> Result<EnginePtr> {
    // ---
    match uri::parse(&config.server_uri)?.scheme {
        uri::Scheme::Tcp => create_rumqttc_engine(config),
        uri::Scheme::Memory => create_memory_engine(config),
    }
}
