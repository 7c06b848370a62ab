//! syncdown Core - Fundamental types and primitives
//!
//! This crate defines the core types shared by every syncdown context:
//! - Identifiers (ContextId)
//! - Wall-clock timestamps (WallTime)
//! - The replicated timer envelope and its JSON codec
//! - Clock-face formatting and minute coercion
//! - Error types

pub mod id;
pub mod time;
pub mod envelope;
pub mod format;
pub mod minutes;
pub mod error;

pub use id::*;
pub use time::*;
pub use envelope::*;
pub use format::*;
pub use minutes::*;
pub use error::*;
