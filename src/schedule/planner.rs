//! Pure planning of the lookahead window.
//!
//! Nothing here touches a backend or a sink: the same `(location, now, settings)`
//! always yields the same plan, including the replan jitter, which is drawn
//! from an RNG seeded by the replan date, the location, and an instance salt.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{KeyKind, Mode, ScheduledTransition, TransitionKey};
use crate::constants::*;
use crate::error::SolarError;
use crate::geo::{Location, solar_event};
use crate::time;

/// Tunables for planning and fire handling.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleSettings {
    /// Days after today whose sunrise/sunset are armed.
    pub lookahead_days: u32,
    /// Local wall-clock time of the daily replan.
    pub replan_time: NaiveTime,
    /// Upper bound of the random delay added to the replan instant.
    pub replan_jitter: Duration,
    /// Per-installation value mixed into the jitter seed.
    pub jitter_salt: u64,
    /// Event fires delivered later than this are reconciled instead of applied blindly.
    pub late_fire_grace: Duration,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            lookahead_days: DEFAULT_LOOKAHEAD_DAYS,
            replan_time: NaiveTime::from_hms_opt(0, 5, 0).unwrap_or(NaiveTime::MIN),
            replan_jitter: Duration::seconds(i64::from(DEFAULT_REPLAN_JITTER_SECS)),
            jitter_salt: 0,
            late_fire_grace: Duration::seconds(i64::from(DEFAULT_LATE_FIRE_GRACE_SECS)),
        }
    }
}

/// A date whose events were left out of the plan.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedDate {
    pub date: NaiveDate,
    pub reason: SolarError,
}

/// Result of planning: the ordered transitions plus the dates that had to be skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub transitions: Vec<ScheduledTransition>,
    pub skipped: Vec<SkippedDate>,
}

impl Plan {
    /// The first sunrise/sunset transition in the plan.
    pub fn next_event(&self) -> Option<&ScheduledTransition> {
        self.transitions
            .iter()
            .find(|t| t.kind == super::TransitionKind::EventTransition)
    }

    /// The replan transition.
    pub fn replan(&self) -> Option<&ScheduledTransition> {
        self.transitions
            .iter()
            .find(|t| t.kind == super::TransitionKind::DailyReplan)
    }
}

/// Plan every sunrise/sunset strictly after `now` from today through
/// `today + lookahead_days`, plus the next daily replan.
///
/// Dates where the sun never rises or never sets are skipped and reported in
/// [`Plan::skipped`]; planning continues for the rest of the window.
pub fn plan(location: &Location, now: DateTime<Utc>, settings: &ScheduleSettings) -> Plan {
    let tz = location.timezone();
    let today = now.with_timezone(&tz).date_naive();
    let last = today + Duration::days(i64::from(settings.lookahead_days));

    let mut transitions = Vec::new();
    let mut skipped = Vec::new();

    for date in time::dates_inclusive(today, last) {
        match solar_event(location, date) {
            Ok(event) => {
                let candidates = [
                    (KeyKind::Sunrise, event.sunrise_utc),
                    (KeyKind::Sunset, event.sunset_utc),
                ];
                for (kind, instant) in candidates {
                    let instant = time::truncate_to_second(instant);
                    if instant <= now {
                        continue;
                    }
                    let key = TransitionKey::new(kind, date);
                    if let Some(transition) = ScheduledTransition::event(key, instant.with_timezone(&tz)) {
                        transitions.push(transition);
                    }
                }
            }
            Err(reason) => skipped.push(SkippedDate { date, reason }),
        }
    }

    transitions.sort_by(|a, b| a.fire_at.cmp(&b.fire_at).then(a.key.cmp(&b.key)));

    if let Some((date, fire_at)) = next_replan(location, now, settings) {
        let expected = expected_mode_at(&transitions, fire_at, &skipped, date);
        let replan = ScheduledTransition::replan(date, fire_at.with_timezone(&tz), expected);
        let idx = transitions.partition_point(|t| t.fire_at <= replan.fire_at);
        transitions.insert(idx, replan);
    }

    Plan {
        transitions,
        skipped,
    }
}

/// First replan instant strictly after `now`, with the local date it belongs to.
pub fn next_replan(
    location: &Location,
    now: DateTime<Utc>,
    settings: &ScheduleSettings,
) -> Option<(NaiveDate, DateTime<Utc>)> {
    let tz = location.timezone();
    let today = now.with_timezone(&tz).date_naive();

    (0..=2)
        .map(|offset| today + Duration::days(offset))
        .filter_map(|date| {
            let base = time::local_instant(tz, date, settings.replan_time)?;
            let at = base.with_timezone(&Utc) + replan_jitter(location, date, settings);
            Some((date, time::truncate_to_second(at)))
        })
        .find(|(_, at)| *at > now)
}

/// Deterministic jitter in `[0, replan_jitter]`.
fn replan_jitter(location: &Location, date: NaiveDate, settings: &ScheduleSettings) -> Duration {
    let max = settings.replan_jitter.num_seconds();
    if max <= 0 {
        return Duration::zero();
    }

    let day = u64::from(date.num_days_from_ce().unsigned_abs());
    let seed = settings.jitter_salt
        ^ day.wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ location.latitude().to_bits().rotate_left(17)
        ^ location.longitude().to_bits().rotate_left(41);

    let mut rng = StdRng::seed_from_u64(seed);
    Duration::seconds(rng.gen_range(0..=max))
}

/// Mode implied by the last planned event at or before `at`.
fn expected_mode_at(
    events: &[ScheduledTransition],
    at: DateTime<Utc>,
    skipped: &[SkippedDate],
    date: NaiveDate,
) -> Mode {
    if let Some(previous) = events.iter().rev().find(|t| t.fire_at_utc() <= at) {
        return previous.mode;
    }
    if let Some(next) = events.first() {
        return next.mode.opposite();
    }
    skipped
        .iter()
        .find(|s| s.date == date)
        .map(|s| fallback_mode(&s.reason))
        .unwrap_or(Mode::Night)
}

/// The mode that should be in effect at `now`.
///
/// Day starts at sunrise (inclusive), Night starts at sunset (inclusive).
/// Events of yesterday and tomorrow are consulted so instants around local
/// midnight resolve correctly.
///
/// # Errors
/// Returns the calculation error for *today's* date; callers fall back to the
/// last known mode.
pub fn mode_at(location: &Location, now: DateTime<Utc>) -> Result<Mode, SolarError> {
    let tz: Tz = location.timezone();
    let today = now.with_timezone(&tz).date_naive();
    let today_event = solar_event(location, today)?;

    // Truncated like planned fire instants, so a fire and a reconcile at the
    // same second always agree
    let mut boundaries: Vec<(DateTime<Utc>, Mode)> = Vec::with_capacity(6);
    let mut push = |event: &crate::geo::SolarEvent| {
        boundaries.push((time::truncate_to_second(event.sunrise_utc), Mode::Day));
        boundaries.push((time::truncate_to_second(event.sunset_utc), Mode::Night));
    };
    push(&today_event);
    for date in [today - Duration::days(1), today + Duration::days(1)] {
        // Neighbouring days only refine the boundaries, their failures are not fatal
        if let Ok(event) = solar_event(location, date) {
            push(&event);
        }
    }
    boundaries.sort_by_key(|(instant, _)| *instant);

    Ok(boundaries
        .iter()
        .rev()
        .find(|(instant, _)| *instant <= now)
        .map(|(_, mode)| *mode)
        // Before every known boundary: the night preceding today's sunrise
        .unwrap_or(Mode::Night))
}

/// Mode to assume when a date has no sunrise/sunset and nothing better is known.
pub fn fallback_mode(error: &SolarError) -> Mode {
    match error {
        SolarError::PolarDay { .. } => Mode::Day,
        SolarError::PolarNight { .. } | SolarError::Validation(_) => Mode::Night,
    }
}
