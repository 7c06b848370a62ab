//! syncdown State - replication of the timer envelope between contexts
//!
//! This crate implements the Replication Channel:
//! - Shared storage abstraction (get/put plus change notification)
//! - In-memory shared store with per-context change streams
//! - Envelope publish (single write path)
//! - Remote change adoption with fail-closed decoding
//! - Startup bootstrap without write storms
//! - Subscriber callbacks on state replacement

pub mod store;
pub mod channel;

pub use store::*;
pub use channel::*;
