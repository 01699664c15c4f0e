// src/engine/memory/mod.rs

//! In-memory engine implementation.
//!
//! This module provides a pure in-process implementation of the domain-level
//! `Engine` trait. It is intended primarily for testing, local execution, and
//! as a reference for engine semantics.
//!
//! ## Reference Semantics
//!
//! - `connect()` reports its outcome exactly once, from another task.
//! - Once `subscribe()` returns successfully, publishes on the same topic are
//!   delivered to the subscriber's message handler.
//! - Message delivery is deterministic within a single process.
//!
//! ## Non-Goals
//!
//! This engine does not attempt to emulate the failure modes, persistence,
//! topic-filter matching or QoS handshakes of a real broker.

mod engine;

pub use engine::{create_engine, create_engine_with_hub, MemoryHub};
