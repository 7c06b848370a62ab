//! syncdown Test Harness - chaos testing and replication validation
//!
//! This crate provides:
//! - Notification latency and frame chaos models
//! - Deterministic multi-context simulation
//! - Envelope fuzzing against live contexts
//! - End-to-end scenario suite

pub mod chaos;
pub mod simulator;
pub mod envelope_fuzzer;
pub mod integration;

pub use chaos::*;
pub use simulator::*;
pub use envelope_fuzzer::*;
pub use integration::*;
