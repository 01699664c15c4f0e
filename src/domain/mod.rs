//! Domain layer public interface.
//!
//! This module defines domain-level abstractions that are independent of
//! engine implementations or client libraries.
//!
//! All domain consumers must import symbols via this module, not by
//! referencing individual files directly.

mod engine;

// --- Engine domain re-exports ---

pub use engine::{
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
