//! End-to-end scheduling scenarios over the in-memory backend and sink.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

use sunshift::backend::{MemoryTimerBackend, RecordingSink, TimerBackend};
use sunshift::error::ApplyError;
use sunshift::geo::{Location, solar_event};
use sunshift::logger::Log;
use sunshift::schedule::{
    FireOutcome, Mode, ReconcileOutcome, ScheduleSettings, ScheduleState, ScheduledTransition,
    TransitionKind, TransitionScheduler, mode_at, plan,
};
use sunshift::time::truncate_to_second;

type MemoryScheduler = TransitionScheduler<MemoryTimerBackend, RecordingSink>;

fn toronto() -> Location {
    Location::from_names(43.65, -79.38, "America/Toronto").unwrap()
}

fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
}

fn scheduler(location: Location, settings: ScheduleSettings) -> MemoryScheduler {
    Log::set_enabled(false);
    TransitionScheduler::new(location, settings, MemoryTimerBackend::new(), RecordingSink::new())
}

/// Deliver every due entry the way a persistent timer does after wake-up.
fn deliver_due(scheduler: &mut MemoryScheduler, now: DateTime<Utc>) -> Vec<FireOutcome> {
    let tz: Tz = scheduler.location().timezone();
    let due = scheduler.backend().due(now);
    due.iter()
        .map(|entry| {
            let transition = ScheduledTransition::from_armed(entry, tz).unwrap();
            scheduler.on_fire(&transition, now)
        })
        .collect()
}

#[test]
fn dst_fall_back_has_one_sunrise_per_date() {
    let location = toronto();
    let settings = ScheduleSettings::default();

    // 01:30 local happens twice on 2024-11-03: once in EDT, once in EST
    for now in [utc(2024, 11, 3, 5, 30, 0), utc(2024, 11, 3, 6, 30, 0)] {
        let plan = plan(&location, now, &settings);

        let sunrises: Vec<_> = plan
            .transitions
            .iter()
            .filter(|t| t.key_string() == "sunrise-2024-11-03")
            .collect();
        assert_eq!(sunrises.len(), 1);
        assert_eq!(sunrises[0].mode, Mode::Day);
        // After the clock change, so local time is EST
        assert_eq!(sunrises[0].fire_at.hour(), 6);
        assert_eq!(sunrises[0].fire_at.minute(), 55);

        let mut keys: Vec<String> = plan.transitions.iter().map(|t| t.key_string()).collect();
        let total = keys.len();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), total, "duplicate keys in {keys:?}");

        let replan = plan.replan().unwrap();
        assert_eq!(replan.key_string(), "replan-2024-11-04");
        assert_eq!(replan.fire_at.hour(), 0);
    }
}

#[test]
fn missed_transitions_after_three_days_asleep() {
    let mut scheduler = scheduler(toronto(), ScheduleSettings::default());

    let enabled_at = utc(2024, 6, 21, 16, 0, 0);
    let report = scheduler.enable(enabled_at);
    assert!(matches!(report.reconcile, ReconcileOutcome::Applied(Mode::Day)));
    assert!(report.apply.is_ok());

    // Suspended until 22:00 local on the 24th, after that day's sunset
    let wake = utc(2024, 6, 25, 2, 0, 0);
    let outcomes = deliver_due(&mut scheduler, wake);
    assert!(outcomes.len() >= 7);

    // Nothing fired late is applied blindly
    assert!(
        outcomes
            .iter()
            .all(|o| matches!(o, FireOutcome::Reconciled(_) | FireOutcome::Replanned(_)))
    );
    assert_eq!(scheduler.sink().applied(), [Mode::Day, Mode::Night]);

    // The replan re-armed the window from the wake-up instant
    assert!(scheduler.backend().due(wake).is_empty());
    assert!(scheduler.backend().is_armed("sunrise-2024-06-25"));
    assert!(scheduler.backend().is_armed("replan-2024-06-25"));
    assert!(!scheduler.backend().is_armed("sunset-2024-06-21"));
}

#[test]
fn reconcile_on_resume_does_not_wait_for_timers() {
    let mut scheduler = scheduler(toronto(), ScheduleSettings::default());
    scheduler.enable(utc(2024, 6, 21, 16, 0, 0));
    let armed = scheduler.backend().len();

    // Three days later, after dark, before any overdue timer is delivered
    let resume = utc(2024, 6, 25, 2, 0, 0);
    let outcome = scheduler.reconcile_now(resume);
    assert!(matches!(outcome, ReconcileOutcome::Applied(Mode::Night)));
    assert_eq!(scheduler.sink().applied(), [Mode::Day, Mode::Night]);
    assert_eq!(scheduler.backend().len(), armed);

    let again = scheduler.reconcile_now(resume);
    assert!(matches!(again, ReconcileOutcome::NoOp(Mode::Night)));
}

#[test]
fn one_failed_arm_does_not_block_the_others() {
    let settings = ScheduleSettings {
        lookahead_days: 1,
        ..ScheduleSettings::default()
    };
    let mut scheduler = scheduler(toronto(), settings);
    scheduler.backend_mut().fail_arm_for("sunset-2024-06-21");

    // 04:00 local, before the day's sunrise
    let now = utc(2024, 6, 21, 8, 0, 0);
    let plan = scheduler.plan(now);
    assert_eq!(plan.transitions.len(), 5);

    let err = scheduler.apply(&plan.transitions).unwrap_err();
    assert_eq!(err.failed_keys(), ["sunset-2024-06-21"]);
    match err {
        ApplyError::Partial { armed, .. } => assert_eq!(armed.len(), 4),
        other => panic!("unexpected error: {other}"),
    }

    let backend = scheduler.backend();
    assert_eq!(backend.len(), 4);
    assert!(!backend.is_armed("sunset-2024-06-21"));
    for key in ["sunrise-2024-06-21", "sunrise-2024-06-22", "sunset-2024-06-22", "replan-2024-06-22"] {
        assert!(backend.is_armed(key), "{key} should be armed");
    }
}

#[test]
fn replanning_twice_writes_nothing_the_second_time() {
    let mut scheduler = scheduler(toronto(), ScheduleSettings::default());
    let now = utc(2024, 6, 21, 16, 0, 0);

    let first = scheduler.replan(now).unwrap();
    assert!(first.writes() > 0);
    let writes = scheduler.backend().writes();

    let second = scheduler.replan(now).unwrap();
    assert_eq!(second.writes(), 0);
    assert_eq!(second.unchanged.len(), first.armed.len());
    assert_eq!(scheduler.backend().writes(), writes);

    // Later the same day only the elapsed event drops out
    let evening = utc(2024, 6, 22, 2, 0, 0);
    let third = scheduler.replan(evening).unwrap();
    assert_eq!(third.disarmed, ["sunset-2024-06-21"]);
    assert!(third.armed.is_empty());
}

#[test]
fn boundary_instants_are_inclusive() {
    let location = toronto();
    let event = solar_event(&location, NaiveDate::from_ymd_opt(2024, 6, 21).unwrap()).unwrap();
    let sunrise = truncate_to_second(event.sunrise_utc);
    let sunset = truncate_to_second(event.sunset_utc);

    assert_eq!(mode_at(&location, sunrise - Duration::seconds(1)).unwrap(), Mode::Night);
    assert_eq!(mode_at(&location, sunrise).unwrap(), Mode::Day);
    assert_eq!(mode_at(&location, sunset - Duration::seconds(1)).unwrap(), Mode::Day);
    assert_eq!(mode_at(&location, sunset).unwrap(), Mode::Night);
}

#[test]
fn late_fire_grace_is_inclusive() {
    let settings = ScheduleSettings::default();
    let grace = settings.late_fire_grace;
    let mut scheduler = scheduler(toronto(), settings).with_state(ScheduleState::Planned);

    let plan = scheduler.plan(utc(2024, 6, 21, 16, 0, 0));
    let sunset = plan.next_event().unwrap().clone();
    assert_eq!(sunset.key_string(), "sunset-2024-06-21");

    let outcome = scheduler.on_fire(&sunset, sunset.fire_at_utc() + grace);
    assert!(matches!(outcome, FireOutcome::Applied(Mode::Night)));

    let outcome = scheduler.on_fire(&sunset, sunset.fire_at_utc() + grace + Duration::seconds(1));
    assert!(matches!(outcome, FireOutcome::Reconciled(_)));
}

#[test]
fn polar_night_plans_only_the_replan() {
    let location = Location::from_names(89.0, 0.0, "UTC").unwrap();
    let mut scheduler = scheduler(location, ScheduleSettings::default());
    let now = utc(2024, 12, 21, 12, 0, 0);

    let plan = scheduler.plan(now);
    assert_eq!(plan.skipped.len(), 8);
    assert_eq!(plan.transitions.len(), 1);
    assert_eq!(plan.transitions[0].kind, TransitionKind::DailyReplan);

    let report = scheduler.enable(now);
    assert!(matches!(
        report.reconcile,
        ReconcileOutcome::FallbackApplied { mode: Mode::Night, .. }
    ));
    assert_eq!(scheduler.backend().len(), 1);
    assert!(scheduler.backend().is_armed("replan-2024-12-22"));
}

#[test]
fn sink_failure_leaves_schedule_intact() {
    let mut scheduler = scheduler(toronto(), ScheduleSettings::default());
    let now = utc(2024, 6, 21, 16, 0, 0);
    scheduler.enable(now);
    let armed_before = scheduler.backend().list_armed().unwrap();
    let writes_before = scheduler.backend().writes();

    let mut failing = RecordingSink::showing(Some(Mode::Day));
    failing.set_failing(true);
    let mut scheduler = TransitionScheduler::new(
        *scheduler.location(),
        scheduler.settings().clone(),
        MemoryTimerBackend::with_entries(armed_before.clone()),
        failing,
    )
    .with_state(ScheduleState::Planned);

    let sunset = scheduler.plan(now).next_event().unwrap().clone();
    let outcome = scheduler.on_fire(&sunset, sunset.fire_at_utc());
    assert!(matches!(outcome, FireOutcome::SinkFailed { mode: Mode::Night, .. }));
    assert_eq!(scheduler.last_applied(), Some(Mode::Day));

    let mut armed_after = scheduler.backend().list_armed().unwrap();
    let mut armed_before = armed_before;
    armed_after.sort_by(|a, b| a.key.cmp(&b.key));
    armed_before.sort_by(|a, b| a.key.cmp(&b.key));
    assert_eq!(armed_after, armed_before);
    assert_eq!(scheduler.backend().writes(), 0);
    assert!(writes_before > 0);
}

#[test]
fn disabled_scheduler_ignores_stragglers() {
    let mut scheduler = scheduler(toronto(), ScheduleSettings::default());
    let now = utc(2024, 6, 21, 16, 0, 0);
    scheduler.enable(now);
    let sunset = scheduler.plan(now).next_event().unwrap().clone();

    let disarmed = scheduler.disable().unwrap();
    assert_eq!(disarmed.len(), 16);
    assert!(scheduler.backend().is_empty());
    assert_eq!(scheduler.state(), ScheduleState::Disabled);

    let outcome = scheduler.on_fire(&sunset, sunset.fire_at_utc());
    assert!(matches!(outcome, FireOutcome::Ignored));
    assert_eq!(scheduler.sink().applied(), [Mode::Day]);
}

#[test]
fn keys_use_the_local_date_far_from_utc() {
    let sydney = Location::from_names(-33.8688, 151.2093, "Australia/Sydney").unwrap();
    let mut scheduler = scheduler(sydney, ScheduleSettings::default());

    // Midday 2024-06-21 in Sydney
    let now = utc(2024, 6, 21, 2, 0, 0);
    scheduler.replan(now).unwrap();

    // Sunrise on the local 22nd happens on the 21st in UTC
    let sunrise = scheduler.backend().fire_at("sunrise-2024-06-22").unwrap();
    assert!(sunrise < utc(2024, 6, 22, 0, 0, 0));
    assert!(scheduler.backend().is_armed("sunset-2024-06-21"));
    assert!(!scheduler.backend().is_armed("sunrise-2024-06-21"));
}
