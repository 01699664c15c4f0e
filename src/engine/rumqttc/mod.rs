//! MQTT engine implementation based on rumqttc.
//!
//! This module adapts the rumqttc API to the domain-level `Engine` trait
//! without leaking rumqttc types upward.
//!
//! # Features
//!
//! - Actor-based concurrency model with single EventLoop ownership
//! - CONNACK-driven connect outcome with an optional deadline
//! - SUBACK/UNSUBACK confirmation before returning from (un)subscribe
//! - Resubscription after a broker-side disconnect
//!
//! # Usage
//!
//! Enabled by default through the `transport_rumqttc` feature:
//!
//! ```toml
//! [dependencies]
//! mom-mqtt = { version = "0.1", features = ["transport_rumqttc"] }
//! ```

mod engine;
pub use engine::create_engine;
