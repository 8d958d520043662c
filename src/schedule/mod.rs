//! Day/night transition scheduling.
//!
//! ## Module Structure
//!
//! - this module: the schedule data model ([`Mode`], [`TransitionKey`], [`ScheduledTransition`])
//! - [`planner`]: pure planning of the lookahead window and the "what mode is it now" rule
//! - [`scheduler`]: [`TransitionScheduler`], which diffs plans against a Timer Backend,
//!   reconciles the active mode, and handles fired timers
//!
//! ## Lifecycle
//!
//! ```text
//! Disabled ──enable──▶ Planned ──fire(event)──▶ Planned
//!    ▲                    │  ▲                     │
//!    │                    │  └──fire(replan)───────┘
//!    └─────disable────────┘
//! ```
//!
//! Every fire runs to completion before the next one is processed; there is no
//! intermediate state.

pub mod planner;
pub mod scheduler;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::backend::ArmedEntry;

pub use planner::{Plan, ScheduleSettings, SkippedDate, mode_at, plan};
pub use scheduler::{ApplyReport, CycleReport, FireOutcome, ReconcileOutcome, TransitionScheduler};

/// Appearance mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Day,
    Night,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Day => "day",
            Mode::Night => "night",
        }
    }

    pub fn opposite(&self) -> Mode {
        match self {
            Mode::Day => Mode::Night,
            Mode::Night => Mode::Day,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" => Ok(Mode::Day),
            "night" => Ok(Mode::Night),
            other => Err(format!("invalid mode '{other}' (expected 'day' or 'night')")),
        }
    }
}

/// What a fired timer should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    /// Apply the transition's mode at a sunrise or sunset.
    EventTransition,
    /// Reconcile, then regenerate the lookahead window.
    DailyReplan,
}

/// The solar event or replan a key stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyKind {
    Sunrise,
    Sunset,
    Replan,
}

impl KeyKind {
    fn as_str(&self) -> &'static str {
        match self {
            KeyKind::Sunrise => "sunrise",
            KeyKind::Sunset => "sunset",
            KeyKind::Replan => "replan",
        }
    }
}

/// Stable identity of a scheduled transition: its kind plus the date it belongs to.
///
/// Rendered as `sunrise-2024-06-21`, `sunset-2024-06-21` or `replan-2024-06-22`.
/// The same logical event always maps to the same key, which is what lets
/// `apply` diff against the backend without rewriting unchanged entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransitionKey {
    pub kind: KeyKind,
    pub date: NaiveDate,
}

impl TransitionKey {
    pub fn new(kind: KeyKind, date: NaiveDate) -> Self {
        Self { kind, date }
    }

    /// Mode applied when this key fires, `None` for replans.
    pub fn mode(&self) -> Option<Mode> {
        match self.kind {
            KeyKind::Sunrise => Some(Mode::Day),
            KeyKind::Sunset => Some(Mode::Night),
            KeyKind::Replan => None,
        }
    }

    pub fn transition_kind(&self) -> TransitionKind {
        match self.kind {
            KeyKind::Replan => TransitionKind::DailyReplan,
            KeyKind::Sunrise | KeyKind::Sunset => TransitionKind::EventTransition,
        }
    }
}

impl fmt::Display for TransitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.kind.as_str(), self.date.format("%Y-%m-%d"))
    }
}

impl FromStr for TransitionKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, date) = s
            .split_once('-')
            .ok_or_else(|| format!("invalid transition key '{s}'"))?;
        let kind = match kind {
            "sunrise" => KeyKind::Sunrise,
            "sunset" => KeyKind::Sunset,
            "replan" => KeyKind::Replan,
            _ => return Err(format!("invalid transition kind in key '{s}'")),
        };
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map_err(|e| format!("invalid date in key '{s}': {e}"))?;
        Ok(Self { kind, date })
    }
}

/// One registration with the Timer Backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledTransition {
    pub key: TransitionKey,
    /// Instant the timer fires, expressed in the location's zone.
    pub fire_at: DateTime<Tz>,
    /// For events, the mode to apply. For replans, the mode expected to be
    /// active when the replan fires (informational).
    pub mode: Mode,
    pub kind: TransitionKind,
}

impl ScheduledTransition {
    /// A sunrise (→ Day) or sunset (→ Night) transition.
    pub fn event(key: TransitionKey, fire_at: DateTime<Tz>) -> Option<Self> {
        let mode = key.mode()?;
        Some(Self {
            key,
            fire_at,
            mode,
            kind: TransitionKind::EventTransition,
        })
    }

    /// The daily replan.
    pub fn replan(date: NaiveDate, fire_at: DateTime<Tz>, expected_mode: Mode) -> Self {
        Self {
            key: TransitionKey::new(KeyKind::Replan, date),
            fire_at,
            mode: expected_mode,
            kind: TransitionKind::DailyReplan,
        }
    }

    /// Rebuild a transition from what the backend reports when it delivers a fire.
    ///
    /// Replans fire shortly after local midnight, so their informational mode is Night.
    pub fn from_armed(entry: &ArmedEntry, tz: Tz) -> Result<Self, String> {
        let key: TransitionKey = entry.key.parse()?;
        let fire_at = entry.fire_at.with_timezone(&tz);
        Ok(match key.mode() {
            Some(mode) => Self {
                key,
                fire_at,
                mode,
                kind: TransitionKind::EventTransition,
            },
            None => Self::replan(key.date, fire_at, Mode::Night),
        })
    }

    pub fn fire_at_utc(&self) -> DateTime<Utc> {
        self.fire_at.with_timezone(&Utc)
    }

    pub fn key_string(&self) -> String {
        self.key.to_string()
    }
}

/// Whether transitions are currently armed for this installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleState {
    Disabled,
    Planned,
}

#[cfg(test)]
mod tests;
