//! syncdown Runtime - per-context timer runtime
//!
//! This crate composes the lower layers into a live context:
//! - Timer engine (start, pause, reset, reconfigure, deadline ticks)
//! - Timer context binding one engine to one replication channel
//! - Tokio driver for the frame loop and the notification listener
//! - Context configuration (defaults, JSON, environment)
//! - Tracing subscriber setup

pub mod engine;
pub mod context;
pub mod driver;
pub mod config;
pub mod telemetry;

pub use engine::*;
pub use context::*;
pub use driver::*;
pub use config::*;
pub use telemetry::*;
