#[cfg(test)]
mod model_tests {
    use crate::schedule::*;
    use chrono::NaiveDate;

    #[test]
    fn test_transition_key_format_and_parse() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 21).unwrap();
        let key = TransitionKey::new(KeyKind::Sunrise, date);
        assert_eq!(key.to_string(), "sunrise-2024-06-21");
        assert_eq!("sunrise-2024-06-21".parse::<TransitionKey>().unwrap(), key);
        assert_eq!(
            "replan-2024-06-22".parse::<TransitionKey>().unwrap().transition_kind(),
            TransitionKind::DailyReplan
        );
    }

    #[test]
    fn test_transition_key_rejects_garbage() {
        assert!("sunrise".parse::<TransitionKey>().is_err());
        assert!("noon-2024-06-21".parse::<TransitionKey>().is_err());
        assert!("sunset-2024-13-01".parse::<TransitionKey>().is_err());
    }

    #[test]
    fn test_key_modes() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 21).unwrap();
        assert_eq!(TransitionKey::new(KeyKind::Sunrise, date).mode(), Some(Mode::Day));
        assert_eq!(TransitionKey::new(KeyKind::Sunset, date).mode(), Some(Mode::Night));
        assert_eq!(TransitionKey::new(KeyKind::Replan, date).mode(), None);
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!(" Night ".parse::<Mode>().unwrap(), Mode::Night);
        assert_eq!("day".parse::<Mode>().unwrap(), Mode::Day);
        assert!("dusk".parse::<Mode>().is_err());
        assert_eq!(Mode::Day.opposite(), Mode::Night);
    }
}

#[cfg(test)]
mod planner_tests {
    use crate::geo::{Location, compute_sun_times};
    use crate::schedule::planner::next_replan;
    use crate::schedule::*;
    use crate::time::truncate_to_second;
    use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};

    fn toronto() -> Location {
        Location::from_names(43.65, -79.38, "America/Toronto").unwrap()
    }

    fn settings() -> ScheduleSettings {
        ScheduleSettings {
            jitter_salt: 42,
            ..ScheduleSettings::default()
        }
    }

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    #[test]
    fn test_plan_covers_window_in_order() {
        // 12:00 EDT: today's sunrise already passed, today's sunset still ahead
        let now = utc(2024, 6, 21, 16, 0, 0);
        let plan = plan(&toronto(), now, &settings());

        assert!(plan.skipped.is_empty());
        assert_eq!(plan.transitions.len(), 16);
        assert!(plan.transitions.iter().all(|t| t.fire_at_utc() > now));
        assert!(
            plan.transitions
                .windows(2)
                .all(|w| w[0].fire_at <= w[1].fire_at)
        );

        let events: Vec<_> = plan
            .transitions
            .iter()
            .filter(|t| t.kind == TransitionKind::EventTransition)
            .collect();
        assert_eq!(events.first().unwrap().key_string(), "sunset-2024-06-21");
        assert_eq!(events.last().unwrap().key_string(), "sunset-2024-06-28");
        // Events alternate Night, Day, Night, ...
        assert!(events.windows(2).all(|w| w[0].mode != w[1].mode));
    }

    #[test]
    fn test_plan_has_exactly_one_replan_after_local_midnight() {
        let now = utc(2024, 6, 21, 16, 0, 0);
        let plan = plan(&toronto(), now, &settings());

        let replans: Vec<_> = plan
            .transitions
            .iter()
            .filter(|t| t.kind == TransitionKind::DailyReplan)
            .collect();
        assert_eq!(replans.len(), 1);

        let replan = replans[0];
        assert_eq!(replan.key_string(), "replan-2024-06-22");
        let earliest = utc(2024, 6, 22, 4, 5, 0);
        assert!(replan.fire_at_utc() >= earliest);
        assert!(replan.fire_at_utc() <= earliest + Duration::seconds(120));
        assert_eq!(replan.mode, Mode::Night);
    }

    #[test]
    fn test_plan_is_deterministic() {
        let now = utc(2024, 3, 10, 5, 0, 0);
        assert_eq!(
            plan(&toronto(), now, &settings()),
            plan(&toronto(), now, &settings())
        );
    }

    #[test]
    fn test_jitter_salt_spreads_replans() {
        let now = utc(2024, 6, 21, 16, 0, 0);
        let instants: std::collections::HashSet<_> = (0..16u64)
            .filter_map(|salt| {
                let settings = ScheduleSettings {
                    jitter_salt: salt,
                    ..ScheduleSettings::default()
                };
                next_replan(&toronto(), now, &settings).map(|(_, at)| at)
            })
            .collect();
        assert!(instants.len() > 1);
    }

    #[test]
    fn test_replan_today_when_still_ahead() {
        // 00:01 local, before today's 00:05 replan
        let now = utc(2024, 6, 21, 4, 1, 0);
        let no_jitter = ScheduleSettings {
            replan_jitter: Duration::zero(),
            ..ScheduleSettings::default()
        };
        let (date, at) = next_replan(&toronto(), now, &no_jitter).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 6, 21).unwrap());
        assert_eq!(at, utc(2024, 6, 21, 4, 5, 0));
    }

    #[test]
    fn test_replan_in_dst_gap_moves_forward() {
        let settings = ScheduleSettings {
            replan_time: NaiveTime::from_hms_opt(2, 30, 0).unwrap(),
            replan_jitter: Duration::zero(),
            ..ScheduleSettings::default()
        };
        // 2024-03-10 02:30 does not exist in Toronto; 03:00 EDT is 07:00Z
        let now = utc(2024, 3, 10, 5, 0, 0);
        let (date, at) = next_replan(&toronto(), now, &settings).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 3, 10).unwrap());
        assert_eq!(at, utc(2024, 3, 10, 7, 0, 0));
    }

    #[test]
    fn test_polar_dates_are_skipped_not_fatal() {
        // Tromsø enters polar night on Nov 28
        let tromso = Location::from_names(69.65, 18.96, "Europe/Oslo").unwrap();
        let now = utc(2024, 11, 25, 8, 0, 0);
        let plan = plan(&tromso, now, &settings());

        let events = plan
            .transitions
            .iter()
            .filter(|t| t.kind == TransitionKind::EventTransition)
            .count();
        assert_eq!(events, 6);
        assert_eq!(plan.skipped.len(), 5);
        assert_eq!(
            plan.skipped[0].date,
            NaiveDate::from_ymd_opt(2024, 11, 28).unwrap()
        );
        assert!(plan.skipped.iter().all(|s| s.reason.is_polar()));
        assert!(plan.replan().is_some());
    }

    #[test]
    fn test_mode_at_boundaries_are_inclusive() {
        let location = toronto();
        let event = compute_sun_times(43.65, -79.38, NaiveDate::from_ymd_opt(2024, 6, 21).unwrap()).unwrap();
        let sunrise = truncate_to_second(event.sunrise_utc);
        let sunset = truncate_to_second(event.sunset_utc);
        let second = Duration::seconds(1);

        assert_eq!(mode_at(&location, sunrise - second).unwrap(), Mode::Night);
        assert_eq!(mode_at(&location, sunrise).unwrap(), Mode::Day);
        assert_eq!(mode_at(&location, sunset - second).unwrap(), Mode::Day);
        assert_eq!(mode_at(&location, sunset).unwrap(), Mode::Night);
    }

    #[test]
    fn test_mode_at_around_local_midnight() {
        let location = toronto();
        // 23:59 and 00:30 EDT
        assert_eq!(mode_at(&location, utc(2024, 6, 22, 3, 59, 0)).unwrap(), Mode::Night);
        assert_eq!(mode_at(&location, utc(2024, 6, 21, 4, 30, 0)).unwrap(), Mode::Night);
    }

    #[test]
    fn test_mode_at_errors_only_for_polar_today() {
        let north = Location::from_names(89.0, 0.0, "UTC").unwrap();
        assert!(mode_at(&north, utc(2024, 12, 21, 12, 0, 0)).is_err());
        assert_eq!(
            planner::fallback_mode(&mode_at(&north, utc(2024, 6, 21, 12, 0, 0)).unwrap_err()),
            Mode::Day
        );
    }
}

#[cfg(test)]
mod scheduler_tests {
    use crate::backend::{ArmedEntry, MemoryTimerBackend, Sink, TimerBackend};
    use crate::error::{ApplyError, SinkError};
    use crate::geo::Location;
    use crate::logger::Log;
    use crate::schedule::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use mockall::mock;
    use mockall::predicate::eq;

    mock! {
        pub Appearance {}
        impl Sink for Appearance {
            fn apply_mode(&mut self, mode: Mode) -> Result<(), SinkError>;
            fn active_mode(&self) -> Option<Mode>;
        }
    }

    fn toronto() -> Location {
        Location::from_names(43.65, -79.38, "America/Toronto").unwrap()
    }

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn sink_showing(active: Option<Mode>) -> MockAppearance {
        Log::set_enabled(false);
        let mut sink = MockAppearance::new();
        sink.expect_active_mode().return_const(active);
        sink
    }

    fn scheduler(
        location: Location,
        sink: MockAppearance,
    ) -> TransitionScheduler<MemoryTimerBackend, MockAppearance> {
        TransitionScheduler::new(
            location,
            ScheduleSettings::default(),
            MemoryTimerBackend::new(),
            sink,
        )
        .with_state(ScheduleState::Planned)
    }

    #[test]
    fn test_reconcile_applies_once_then_noops() {
        let mut sink = sink_showing(None);
        sink.expect_apply_mode()
            .with(eq(Mode::Day))
            .times(1)
            .returning(|_| Ok(()));
        let mut scheduler = scheduler(toronto(), sink);

        let noon = utc(2024, 6, 21, 16, 0);
        assert!(matches!(scheduler.reconcile_now(noon), ReconcileOutcome::Applied(Mode::Day)));
        assert!(matches!(scheduler.reconcile_now(noon), ReconcileOutcome::NoOp(Mode::Day)));
        assert_eq!(scheduler.last_applied(), Some(Mode::Day));
    }

    #[test]
    fn test_reconcile_trusts_mode_reported_by_sink() {
        let mut sink = sink_showing(Some(Mode::Day));
        sink.expect_apply_mode().never();
        let mut scheduler = scheduler(toronto(), sink);

        let outcome = scheduler.reconcile_now(utc(2024, 6, 21, 16, 0));
        assert!(matches!(outcome, ReconcileOutcome::NoOp(Mode::Day)));
    }

    #[test]
    fn test_sink_failure_leaves_last_applied_untouched() {
        let mut sink = sink_showing(None);
        sink.expect_apply_mode()
            .times(2)
            .returning(|_| Err(SinkError::Other("display unavailable".to_string())));
        let mut scheduler = scheduler(toronto(), sink);

        let night = utc(2024, 6, 22, 3, 0);
        assert!(scheduler.reconcile_now(night).is_sink_failure());
        assert_eq!(scheduler.last_applied(), None);
        // Not recorded as applied, so the next reconcile tries again
        assert!(scheduler.reconcile_now(night).is_sink_failure());
    }

    #[test]
    fn test_polar_today_keeps_last_known_mode() {
        let north = Location::from_names(89.0, 0.0, "UTC").unwrap();
        let mut sink = sink_showing(Some(Mode::Day));
        sink.expect_apply_mode().never();
        let mut scheduler = scheduler(north, sink);

        match scheduler.reconcile_now(utc(2024, 12, 21, 12, 0)) {
            ReconcileOutcome::KeptLastKnown { mode, reason } => {
                assert_eq!(mode, Mode::Day);
                assert!(reason.is_polar());
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_polar_today_without_history_uses_fallback() {
        let north = Location::from_names(89.0, 0.0, "UTC").unwrap();
        let mut sink = sink_showing(None);
        sink.expect_apply_mode()
            .with(eq(Mode::Night))
            .times(1)
            .returning(|_| Ok(()));
        let mut scheduler = scheduler(north, sink);

        let outcome = scheduler.reconcile_now(utc(2024, 12, 21, 12, 0));
        assert!(matches!(
            outcome,
            ReconcileOutcome::FallbackApplied {
                mode: Mode::Night,
                ..
            }
        ));
    }

    #[test]
    fn test_event_fire_applies_without_deduplication() {
        let mut sink = sink_showing(Some(Mode::Night));
        sink.expect_apply_mode()
            .with(eq(Mode::Night))
            .times(1)
            .returning(|_| Ok(()));
        let mut scheduler = scheduler(toronto(), sink);

        let now = utc(2024, 6, 21, 16, 0);
        let sunset = scheduler
            .plan(now)
            .next_event()
            .cloned()
            .unwrap();
        assert_eq!(sunset.mode, Mode::Night);

        let outcome = scheduler.on_fire(&sunset, sunset.fire_at_utc());
        assert!(matches!(outcome, FireOutcome::Applied(Mode::Night)));
    }

    #[test]
    fn test_late_event_fire_reconciles_instead() {
        let mut sink = sink_showing(None);
        // A sunrise delivered at 22:00 must not switch to Day
        sink.expect_apply_mode()
            .with(eq(Mode::Night))
            .times(1)
            .returning(|_| Ok(()));
        let mut scheduler = scheduler(toronto(), sink);

        let entry = ArmedEntry {
            key: "sunrise-2024-06-21".to_string(),
            fire_at: utc(2024, 6, 21, 9, 36),
        };
        let stale = ScheduledTransition::from_armed(&entry, toronto().timezone()).unwrap();
        let outcome = scheduler.on_fire(&stale, utc(2024, 6, 22, 2, 0));
        assert!(matches!(
            outcome,
            FireOutcome::Reconciled(ReconcileOutcome::Applied(Mode::Night))
        ));
    }

    #[test]
    fn test_fire_while_disabled_is_ignored() {
        let mut sink = sink_showing(None);
        sink.expect_apply_mode().never();
        let mut scheduler = TransitionScheduler::new(
            toronto(),
            ScheduleSettings::default(),
            MemoryTimerBackend::new(),
            sink,
        );
        assert_eq!(scheduler.state(), ScheduleState::Disabled);

        let entry = ArmedEntry {
            key: "sunset-2024-06-21".to_string(),
            fire_at: utc(2024, 6, 22, 1, 3),
        };
        let transition = ScheduledTransition::from_armed(&entry, toronto().timezone()).unwrap();
        assert!(matches!(
            scheduler.on_fire(&transition, entry.fire_at),
            FireOutcome::Ignored
        ));
    }

    #[test]
    fn test_replan_fire_reconciles_and_rearms_despite_sink_failure() {
        let mut sink = sink_showing(None);
        sink.expect_apply_mode()
            .times(1)
            .returning(|_| Err(SinkError::Other("compositor gone".to_string())));
        let mut scheduler = scheduler(toronto(), sink);

        let replan = scheduler.plan(utc(2024, 6, 21, 16, 0)).replan().cloned().unwrap();
        let fired_at = replan.fire_at_utc();

        match scheduler.on_fire(&replan, fired_at) {
            FireOutcome::Replanned(cycle) => {
                assert!(cycle.reconcile.is_sink_failure());
                // A full window from 00:05: eight days of events plus tomorrow's replan
                let report = cycle.apply.unwrap();
                assert_eq!(report.armed.len(), 17);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(scheduler.backend().is_armed("replan-2024-06-23"));
        assert!(!scheduler.backend().is_armed("replan-2024-06-22"));
    }

    #[test]
    fn test_apply_diffs_against_armed_set() {
        let sink = sink_showing(Some(Mode::Day));
        let mut scheduler = scheduler(toronto(), sink);
        let now = utc(2024, 6, 21, 16, 0);
        let plan = scheduler.plan(now);

        let moved = plan.transitions[2].clone();
        let backend = scheduler.backend_mut();
        backend
            .arm("sunset-2024-06-20", utc(2024, 6, 21, 1, 0), TransitionKind::EventTransition)
            .unwrap();
        backend
            .arm("not-a-key", utc(2024, 6, 21, 1, 0), TransitionKind::EventTransition)
            .unwrap();
        backend
            .arm(&moved.key_string(), moved.fire_at_utc() - Duration::minutes(3), moved.kind)
            .unwrap();
        let first = &plan.transitions[0];
        backend
            .arm(&first.key_string(), first.fire_at_utc(), first.kind)
            .unwrap();

        let report = scheduler.apply(&plan.transitions).unwrap();
        assert_eq!(report.disarmed.len(), 2);
        assert!(report.disarmed.contains(&"not-a-key".to_string()));
        assert_eq!(report.unchanged, vec![first.key_string()]);
        assert!(report.armed.contains(&moved.key_string()));
        assert_eq!(report.armed.len(), 15);
        assert_eq!(
            scheduler.backend().fire_at(&moved.key_string()),
            Some(moved.fire_at_utc())
        );
    }

    #[test]
    fn test_enable_and_disable() {
        let mut sink = sink_showing(None);
        sink.expect_apply_mode().returning(|_| Ok(()));
        let mut scheduler = TransitionScheduler::new(
            toronto(),
            ScheduleSettings::default(),
            MemoryTimerBackend::new(),
            sink,
        );

        let cycle = scheduler.enable(utc(2024, 6, 21, 16, 0));
        assert!(cycle.apply.is_ok());
        assert!(matches!(cycle.reconcile, ReconcileOutcome::Applied(Mode::Day)));
        assert_eq!(scheduler.state(), ScheduleState::Planned);
        assert_eq!(scheduler.backend().len(), 16);

        scheduler.backend_mut().fail_disarm_for("sunset-2024-06-25");
        let err = scheduler.disable().unwrap_err();
        assert_eq!(err.failed_keys(), vec!["sunset-2024-06-25"]);
        assert_eq!(scheduler.state(), ScheduleState::Disabled);
        assert_eq!(scheduler.backend().len(), 1);
    }

    #[test]
    fn test_enable_with_unreachable_backend_stays_disabled() {
        let mut sink = sink_showing(None);
        sink.expect_apply_mode().returning(|_| Ok(()));
        let mut backend = MemoryTimerBackend::new();
        backend.set_unavailable(true);
        let mut scheduler =
            TransitionScheduler::new(toronto(), ScheduleSettings::default(), backend, sink);

        let cycle = scheduler.enable(utc(2024, 6, 21, 16, 0));
        assert!(matches!(cycle.apply, Err(ApplyError::Listing(_))));
        assert_eq!(scheduler.state(), ScheduleState::Disabled);
        // Reconcile does not depend on the backend
        assert!(matches!(cycle.reconcile, ReconcileOutcome::Applied(Mode::Day)));
    }
}
