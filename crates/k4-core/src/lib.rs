//! # k4-core
//!
//! Core crate for the K4 market data sinks, providing:
//!
//! - **Types** (`types`): event kinds, normalized events, record rendering
//! - **Configuration** (`config`): JSON config deserialization + validation
//! - **Error types** (`error`): domain-specific `K4Error` via thiserror
//! - **Queue** (`queue`): bounded record queue with scoped batch acquisition
//! - **Feeds** (`feed`): event-to-record conversion and per-kind admission
//! - **Throttling** (`throttle`): per-symbol interval and snapshot counters
//! - **Time utilities** (`time_util`): epoch seconds and BSON datetimes
//! - **Logging** (`logging`): tracing-based structured logging

pub mod config;
pub mod error;
pub mod feed;
pub mod logging;
pub mod queue;
pub mod throttle;
pub mod time_util;
pub mod types;

// Re-export types at crate root for convenience.
pub use types::*;
