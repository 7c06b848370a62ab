//! Timer envelope - the atomic, fully-replacing unit of replicated state
//!
//! One envelope describes the whole timer session. Every write replaces the
//! previous envelope for every reader; envelopes are never merged.
//!
//! Wire format is a JSON object with camelCase keys:
//!
//! ```json
//! {"remainingSeconds":300,"configuredMinutes":5,"running":false,
//!  "deadline":null,"writtenAt":1700000000000}
//! ```
//!
//! A stopped envelope written by `pause` also carries `"paused":true`, so a
//! pause taken within the first half second is not mistaken for a reset.
//!
//! Readers tolerate unknown and missing keys and accept the key names used
//! by the previous generation of the app (`timeLeft`, `initialTime`,
//! `isRunning`, `targetTime`, `lastUpdate`, `townName`).

use serde::{Deserialize, Serialize};

use crate::{
    coerce_minutes, minutes_to_secs, SyncdownError, SyncdownResult, WallTime,
    DEFAULT_CONFIGURED_MINUTES,
};

/// Replicated timer state.
///
/// `deadline` is present exactly when the timer is running; `running()` is
/// derived from it so the two can never disagree. `paused` is only ever set
/// on a stopped envelope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimerEnvelope {
    remaining_secs: i64,
    configured_minutes: u32,
    deadline: Option<WallTime>,
    paused: bool,
    written_at: WallTime,
    label: Option<String>,
}

impl TimerEnvelope {
    /// Fresh session: default duration, stopped, full time remaining
    pub fn defaults(written_at: WallTime) -> Self {
        Self::idle(DEFAULT_CONFIGURED_MINUTES, written_at)
    }

    /// Stopped with the full configured duration remaining
    pub fn idle(configured_minutes: u32, written_at: WallTime) -> Self {
        let configured_minutes = coerce_minutes(Some(configured_minutes as i64));
        TimerEnvelope {
            remaining_secs: minutes_to_secs(configured_minutes),
            configured_minutes,
            deadline: None,
            paused: false,
            written_at,
            label: None,
        }
    }

    /// Stopped at an arbitrary remaining value
    pub fn stopped(configured_minutes: u32, remaining_secs: i64, written_at: WallTime) -> Self {
        TimerEnvelope {
            remaining_secs,
            configured_minutes: coerce_minutes(Some(configured_minutes as i64)),
            deadline: None,
            paused: false,
            written_at,
            label: None,
        }
    }

    /// Stopped by a pause at `remaining_secs`
    pub fn paused_at(configured_minutes: u32, remaining_secs: i64, written_at: WallTime) -> Self {
        TimerEnvelope {
            paused: true,
            ..Self::stopped(configured_minutes, remaining_secs, written_at)
        }
    }

    /// Running toward `deadline`; `remaining_secs` is the value derived at `written_at`
    pub fn running_until(
        configured_minutes: u32,
        remaining_secs: i64,
        deadline: WallTime,
        written_at: WallTime,
    ) -> Self {
        TimerEnvelope {
            remaining_secs,
            configured_minutes: coerce_minutes(Some(configured_minutes as i64)),
            deadline: Some(deadline),
            paused: false,
            written_at,
            label: None,
        }
    }

    /// Attach a display label
    pub fn with_label(mut self, label: Option<String>) -> Self {
        self.label = label;
        self
    }

    /// Remaining seconds as stored (derived at write time while running)
    pub fn remaining_secs(&self) -> i64 {
        self.remaining_secs
    }

    pub fn configured_minutes(&self) -> u32 {
        self.configured_minutes
    }

    pub fn running(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<WallTime> {
        self.deadline
    }

    /// Stopped by an explicit pause rather than a reset or reconfigure
    pub fn paused(&self) -> bool {
        self.paused
    }

    /// Advisory write timestamp, diagnostics only
    pub fn written_at(&self) -> WallTime {
        self.written_at
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Serialize to the shared-storage JSON form
    pub fn encode(&self) -> SyncdownResult<String> {
        let wire = WireEnvelope {
            remaining_seconds: Some(self.remaining_secs),
            configured_minutes: Some(self.configured_minutes as i64),
            running: self.running(),
            deadline: self.deadline.map(WallTime::as_millis),
            paused: self.paused,
            written_at: Some(self.written_at.as_millis()),
            label: self.label.clone(),
        };
        serde_json::to_string(&wire).map_err(|e| SyncdownError::EncodeFailed(e.to_string()))
    }

    /// Parse and normalize a shared-storage payload
    pub fn decode(raw: &str) -> SyncdownResult<Self> {
        let wire: WireEnvelope = serde_json::from_str(raw)
            .map_err(|e| SyncdownError::MalformedEnvelope(e.to_string()))?;
        Ok(wire.into_envelope())
    }
}

/// On-the-wire shape; every field optional so older or newer writers parse
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEnvelope {
    #[serde(default, alias = "timeLeft")]
    remaining_seconds: Option<i64>,
    #[serde(default, alias = "initialTime")]
    configured_minutes: Option<i64>,
    #[serde(default, alias = "isRunning")]
    running: bool,
    #[serde(default, alias = "targetTime")]
    deadline: Option<i64>,
    #[serde(default, skip_serializing_if = "is_false")]
    paused: bool,
    #[serde(default, alias = "lastUpdate")]
    written_at: Option<i64>,
    #[serde(default, alias = "townName", skip_serializing_if = "Option::is_none")]
    label: Option<String>,
}

impl WireEnvelope {
    fn into_envelope(self) -> TimerEnvelope {
        let configured_minutes = match self.configured_minutes {
            Some(m) => coerce_minutes(Some(m)),
            None => DEFAULT_CONFIGURED_MINUTES,
        };
        let remaining_secs = self
            .remaining_seconds
            .unwrap_or_else(|| minutes_to_secs(configured_minutes));
        // Zero or negative deadlines count as absent
        let deadline = if self.running {
            self.deadline.filter(|d| *d > 0).map(WallTime::from_millis)
        } else {
            None
        };
        // A running flag without a deadline cannot be resumed; read it as paused.
        let paused = deadline.is_none() && (self.paused || self.running);

        TimerEnvelope {
            remaining_secs,
            configured_minutes,
            deadline,
            paused,
            written_at: WallTime::from_millis(self.written_at.unwrap_or(0)),
            label: self.label,
        }
    }
}

fn is_false(flag: &bool) -> bool {
    !*flag
}
