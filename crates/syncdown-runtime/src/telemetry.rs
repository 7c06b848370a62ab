//! Tracing subscriber setup
//!
//! Libraries in this workspace only emit `tracing` events; whichever
//! binary or test composes contexts calls [`init_tracing`] once.

use tracing_subscriber::EnvFilter;

use syncdown_core::{SyncdownError, SyncdownResult};

/// Output format of the fmt subscriber
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    /// `SYNCDOWN_LOG_FORMAT=json` selects JSON, anything else pretty
    pub fn from_env() -> Self {
        match std::env::var("SYNCDOWN_LOG_FORMAT") {
            Ok(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// Install the global subscriber, filtered by `RUST_LOG` (default `info`)
pub fn init_tracing(format: LogFormat) -> SyncdownResult<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let result = match format {
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init(),
    };
    result.map_err(|e| SyncdownError::InvalidConfig(format!("tracing subscriber: {e}")))
}
