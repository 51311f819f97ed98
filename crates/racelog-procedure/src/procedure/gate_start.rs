//! Gate start: the class flag goes up over golf, papa follows, and after the
//! start the gate stays open until the launch stops and golf comes down.
//!
//! ```text
//!   T-8min        T-4min     T-1min     T        T+launch      T+launch+golf
//!   |class/golf up|papa up   |papa down |gate open|golf stays up |golf down
//! ```

use chrono::Duration;
use parking_lot::RwLock;
use racelog_core::{
    Analyzer, Author, EventLog, Flag, GateLineOpeningTimeFinder, GateLineOpeningTimes,
    PathfinderFinder, RaceLogEvent, RaceStatus, RacingProcedureType, TimePoint, saturating_offset,
};
use std::sync::Arc;
use tracing::debug;

use super::{
    ProcedureBase, ProcedureError, RacingProcedure, minutes_before, reschedule_start,
    schedule_for_status,
};
use crate::config::GateStartConfiguration;
use crate::flags::{FlagPole, FlagPoleState};
use crate::prerequisite::{
    FulfillmentFunction, GateLaunchTimePrerequisite, NoMorePrerequisite, PathfinderPrerequisite,
    Prerequisite,
};
use crate::state_event::{StateEvent, StateEventName};

pub const CLASS_OVER_GOLF_UP_MINUTES: i64 = 8;
pub const PAPA_UP_MINUTES: i64 = 4;
pub const PAPA_DOWN_MINUTES: i64 = 1;

pub const DEFAULT_GATE_LAUNCH_STOP_MINUTES: i64 = 4;
pub const DEFAULT_GOLF_DOWN_MINUTES: i64 = 2;

struct GateStartCache {
    opening_times: GateLineOpeningTimes,
    opening_times_set: bool,
    pathfinder: Option<String>,
}

pub struct GateStartProcedure {
    base: ProcedureBase,
    config: GateStartConfiguration,
    opening_times: GateLineOpeningTimeFinder,
    pathfinder: PathfinderFinder,
    cache: RwLock<GateStartCache>,
}

impl GateStartProcedure {
    pub fn new(log: Arc<EventLog>, author: Author, config: GateStartConfiguration) -> Arc<Self> {
        let default_times = GateLineOpeningTimes::new(
            Duration::minutes(DEFAULT_GATE_LAUNCH_STOP_MINUTES),
            default_golf_down(&config),
        );
        let procedure = Arc::new_cyclic(|weak| {
            let base = ProcedureBase::new(Arc::clone(&log), author);
            base.follow_log(weak.clone());
            Self {
                base,
                opening_times: GateLineOpeningTimeFinder::new(Arc::clone(&log)),
                pathfinder: PathfinderFinder::new(log),
                config,
                cache: RwLock::new(GateStartCache {
                    opening_times: default_times,
                    opening_times_set: false,
                    pathfinder: None,
                }),
            }
        });
        procedure.update();
        procedure
    }

    pub fn configuration(&self) -> &GateStartConfiguration {
        &self.config
    }

    pub fn class_flag(&self) -> Flag {
        self.config.class_flag.unwrap_or(Flag::Class)
    }

    pub fn default_golf_down_time(&self) -> Duration {
        default_golf_down(&self.config)
    }

    pub fn gate_line_opening_times(&self) -> GateLineOpeningTimes {
        self.cache.read().opening_times
    }

    /// Whether the timing came from the log rather than the defaults.
    pub fn gate_line_opening_times_set(&self) -> bool {
        self.cache.read().opening_times_set
    }

    pub fn gate_launch_stop_time(&self) -> Duration {
        self.gate_line_opening_times().gate_launch_stop
    }

    pub fn golf_down_time(&self) -> Duration {
        self.gate_line_opening_times().golf_down
    }

    /// When the gate stops launching. Timing read from the log may be huge;
    /// such boundaries land on the last representable instant.
    pub fn gate_launch_stop_at(&self, start_time: TimePoint) -> TimePoint {
        saturating_offset(start_time, self.gate_launch_stop_time())
    }

    pub fn gate_shutdown_at(&self, start_time: TimePoint) -> TimePoint {
        saturating_offset(self.gate_launch_stop_at(start_time), self.golf_down_time())
    }

    pub fn pathfinder(&self) -> Option<String> {
        self.cache.read().pathfinder.clone()
    }

    pub fn set_gate_line_opening_times(
        &self,
        at: TimePoint,
        gate_launch_stop: Duration,
        golf_down: Duration,
    ) -> Result<(), ProcedureError> {
        if gate_launch_stop < Duration::zero() || golf_down < Duration::zero() {
            return Err(ProcedureError::NegativeGateTiming {
                launch_stop_ms: gate_launch_stop.num_milliseconds(),
                golf_down_ms: golf_down.num_milliseconds(),
            });
        }
        self.record_gate_line_opening_times(
            at,
            GateLineOpeningTimes::new(gate_launch_stop, golf_down),
        );
        Ok(())
    }

    fn record_gate_line_opening_times(&self, at: TimePoint, times: GateLineOpeningTimes) {
        self.base
            .append(|author, pass| RaceLogEvent::gate_line_opening_time(author, at, pass, times));
    }

    pub fn set_pathfinder(&self, at: TimePoint, sail_id: impl Into<String>) {
        let sail_id = sail_id.into();
        self.base
            .append(|author, pass| RaceLogEvent::pathfinder(author, at, pass, sail_id));
    }

    fn reschedule_gate_shutdown(&self, start_time: Option<TimePoint>) {
        self.base.unschedule(StateEventName::GateShutdown);
        if let Some(start_time) = start_time {
            self.base.schedule(vec![StateEvent::new(
                self.gate_shutdown_at(start_time),
                StateEventName::GateShutdown,
            )]);
        }
    }
}

fn default_golf_down(config: &GateStartConfiguration) -> Duration {
    if config.has_additional_golf_down_time {
        Duration::minutes(DEFAULT_GOLF_DOWN_MINUTES)
    } else {
        Duration::zero()
    }
}

impl RacingProcedure for GateStartProcedure {
    fn procedure_type(&self) -> RacingProcedureType {
        RacingProcedureType::GateStart
    }

    fn base(&self) -> &ProcedureBase {
        &self.base
    }

    fn is_startphase_active(&self, start_time: TimePoint, now: TimePoint) -> bool {
        now < start_time && start_time - now < Duration::minutes(CLASS_OVER_GOLF_UP_MINUTES)
    }

    fn check_prerequisites_for_start(
        self: Arc<Self>,
        now: TimePoint,
        start_time: TimePoint,
        function: FulfillmentFunction,
    ) -> Prerequisite {
        if start_time < now {
            if self.config.has_pathfinder && self.pathfinder().is_none() {
                return Prerequisite::Pathfinder(PathfinderPrerequisite::new(
                    self, now, start_time, function,
                ));
            }
            if !self.gate_line_opening_times_set() {
                let default_golf_down = self.default_golf_down_time();
                return Prerequisite::GateLaunchTime(GateLaunchTimePrerequisite::new(
                    self,
                    now,
                    start_time,
                    default_golf_down,
                    function,
                ));
            }
        }
        Prerequisite::NoMore(NoMorePrerequisite::new(now, start_time, function))
    }

    fn create_start_state_events(&self, start_time: TimePoint) -> Vec<StateEvent> {
        vec![
            StateEvent::new(
                minutes_before(start_time, CLASS_OVER_GOLF_UP_MINUTES),
                StateEventName::GateClassOverGolfUp,
            ),
            StateEvent::new(
                minutes_before(start_time, PAPA_UP_MINUTES),
                StateEventName::GatePapaUp,
            ),
            StateEvent::new(
                minutes_before(start_time, PAPA_DOWN_MINUTES),
                StateEventName::GatePapaDown,
            ),
            StateEvent::new(start_time, StateEventName::Start),
        ]
    }

    fn process_state_event(&self, event: &StateEvent) -> bool {
        match event.name {
            StateEventName::Start => {
                let (times, already_set) = {
                    let cache = self.cache.read();
                    (cache.opening_times, cache.opening_times_set)
                };
                if !already_set {
                    self.record_gate_line_opening_times(event.at, times);
                }
                self.reschedule_gate_shutdown(Some(event.at));
                self.base
                    .notify(|listener| listener.on_active_flags_changed(self.procedure_type()));
                true
            }
            StateEventName::GateClassOverGolfUp
            | StateEventName::GatePapaUp
            | StateEventName::GatePapaDown
            | StateEventName::GateShutdown => {
                self.base
                    .notify(|listener| listener.on_active_flags_changed(self.procedure_type()));
                true
            }
            _ => self.base.process_common(event),
        }
    }

    fn active_flags(&self, start_time: TimePoint, now: TimePoint) -> FlagPoleState {
        let class = self.class_flag();
        let class_over_golf = |up| FlagPole::with_lower(class, Flag::Golf, up);
        let papa = |up| FlagPole::new(Flag::Papa, up);

        let class_up_at = minutes_before(start_time, CLASS_OVER_GOLF_UP_MINUTES);
        let papa_up_at = minutes_before(start_time, PAPA_UP_MINUTES);
        let papa_down_at = minutes_before(start_time, PAPA_DOWN_MINUTES);
        let shutdown_at = self.gate_shutdown_at(start_time);

        if now < class_up_at {
            FlagPoleState::new(
                vec![class_over_golf(false), papa(false)],
                None,
                vec![class_over_golf(true), papa(false)],
                Some(class_up_at),
            )
        } else if now < papa_up_at {
            FlagPoleState::new(
                vec![class_over_golf(true), papa(false)],
                Some(class_up_at),
                vec![class_over_golf(true), papa(true)],
                Some(papa_up_at),
            )
        } else if now < papa_down_at {
            FlagPoleState::new(
                vec![class_over_golf(true), papa(true)],
                Some(papa_up_at),
                vec![class_over_golf(true), papa(false)],
                Some(papa_down_at),
            )
        } else if now < start_time {
            FlagPoleState::new(
                vec![class_over_golf(true), papa(false)],
                Some(papa_down_at),
                vec![FlagPole::new(class, false), FlagPole::new(Flag::Golf, true)],
                Some(start_time),
            )
        } else if now < shutdown_at {
            FlagPoleState::new(
                vec![FlagPole::new(Flag::Golf, true)],
                Some(start_time),
                vec![FlagPole::new(Flag::Golf, false)],
                Some(shutdown_at),
            )
        } else {
            FlagPoleState::settled(vec![FlagPole::new(Flag::Golf, false)], Some(shutdown_at))
        }
    }

    fn update(&self) {
        let found_times = self.opening_times.analyze();
        let found_pathfinder = self.pathfinder.analyze();

        let (times_changed, pathfinder_changed) = {
            let mut cache = self.cache.write();
            let times_changed = match found_times {
                Some(times) if times != cache.opening_times || !cache.opening_times_set => {
                    cache.opening_times = times;
                    cache.opening_times_set = true;
                    Some(times)
                }
                _ => None,
            };
            let pathfinder_changed = if cache.pathfinder != found_pathfinder {
                cache.pathfinder = found_pathfinder.clone();
                true
            } else {
                false
            };
            (times_changed, pathfinder_changed)
        };

        let race = self.base.log().race_id();
        if let Some(times) = times_changed {
            debug!(
                %race,
                launch_stop_ms = times.gate_launch_stop.num_milliseconds(),
                golf_down_ms = times.golf_down.num_milliseconds(),
                "gate line opening times changed"
            );
            self.base
                .notify(|listener| listener.on_gate_launch_time_changed(times));
        }
        if pathfinder_changed {
            debug!(%race, pathfinder = ?found_pathfinder, "pathfinder changed");
            self.base
                .notify(|listener| listener.on_pathfinder_changed(found_pathfinder.as_deref()));
        }

        self.base.update(self.procedure_type());
    }

    fn has_individual_recall(&self) -> bool {
        self.config.has_individual_recall
    }

    fn trigger_state_event_scheduling(&self, status: RaceStatus, start_time: Option<TimePoint>) {
        schedule_for_status(self, status, start_time);
        if status == RaceStatus::Running {
            self.reschedule_gate_shutdown(start_time);
        }
    }

    fn on_start_time_changed(&self, start_time: Option<TimePoint>) {
        reschedule_start(self, start_time);
        self.reschedule_gate_shutdown(start_time);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use parking_lot::Mutex;
    use racelog_core::RaceId;

    use crate::procedure::ProcedureListener;

    fn at(secs: i64) -> TimePoint {
        Utc.timestamp_opt(secs, 0).single().expect("valid timestamp")
    }

    fn procedure(config: GateStartConfiguration) -> (Arc<EventLog>, Arc<GateStartProcedure>) {
        let log = Arc::new(EventLog::new(RaceId::new("gate")));
        let procedure = GateStartProcedure::new(
            Arc::clone(&log),
            Author::new("committee", 3),
            config,
        );
        (log, procedure)
    }

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
    }

    impl ProcedureListener for Recorder {
        fn on_active_flags_changed(&self, _procedure: RacingProcedureType) {
            self.calls.lock().push("flags".to_string());
        }

        fn on_gate_launch_time_changed(&self, times: GateLineOpeningTimes) {
            self.calls
                .lock()
                .push(format!("gate:{}", times.gate_launch_stop.num_minutes()));
        }

        fn on_pathfinder_changed(&self, pathfinder: Option<&str>) {
            self.calls
                .lock()
                .push(format!("pathfinder:{}", pathfinder.unwrap_or("-")));
        }
    }

    #[test]
    fn defaults_follow_configuration() {
        let (_, with_golf) = procedure(GateStartConfiguration::default());
        assert_eq!(with_golf.golf_down_time(), Duration::minutes(2));
        assert_eq!(with_golf.gate_launch_stop_time(), Duration::minutes(4));
        assert!(!with_golf.gate_line_opening_times_set());

        let (_, without_golf) = procedure(GateStartConfiguration {
            has_additional_golf_down_time: false,
            ..GateStartConfiguration::default()
        });
        assert_eq!(without_golf.golf_down_time(), Duration::zero());
        assert_eq!(
            without_golf.gate_shutdown_at(at(1_000)),
            at(1_000) + Duration::minutes(4)
        );
    }

    #[test]
    fn start_phase_is_the_eight_minutes_before_start() {
        let (_, gate) = procedure(GateStartConfiguration::default());
        let start = at(10_000);
        assert!(!gate.is_startphase_active(start, start - Duration::minutes(8)));
        assert!(gate.is_startphase_active(start, start - Duration::minutes(8) + Duration::seconds(1)));
        assert!(gate.is_startphase_active(start, start - Duration::seconds(1)));
        assert!(!gate.is_startphase_active(start, start));
        assert!(!gate.is_startphase_active(start, start + Duration::minutes(1)));
    }

    #[test]
    fn update_notifies_only_on_change() {
        let (_, gate) = procedure(GateStartConfiguration::default());
        let recorder = Arc::new(Recorder::default());
        gate.add_listener(Arc::clone(&recorder) as Arc<dyn ProcedureListener>);

        gate.set_pathfinder(at(10), "GER 7");
        gate.set_gate_line_opening_times(at(20), Duration::minutes(6), Duration::minutes(1))
            .expect("timing is valid");
        gate.update();
        gate.update();

        assert_eq!(*recorder.calls.lock(), vec!["pathfinder:GER 7", "gate:6"]);
        assert_eq!(gate.pathfinder().as_deref(), Some("GER 7"));
        assert_eq!(gate.gate_shutdown_at(at(0)), at(7 * 60));
    }

    #[test]
    fn negative_timing_is_rejected() {
        let (log, gate) = procedure(GateStartConfiguration::default());
        let err = gate
            .set_gate_line_opening_times(at(0), Duration::minutes(-1), Duration::zero())
            .expect_err("negative timing must fail");
        assert!(matches!(err, ProcedureError::NegativeGateTiming { .. }));
        assert!(log.is_empty());
    }

    #[test]
    fn prerequisites_only_gate_late_starts() {
        let (_, gate) = procedure(GateStartConfiguration::default());
        let fired = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&fired);
        let early = Arc::clone(&gate).check_prerequisites_for_start(
            at(100),
            at(200),
            Box::new(move |now, start| *sink.lock() = Some((now, start))),
        );
        assert!(early.is_satisfied());
        if let Prerequisite::NoMore(done) = early {
            done.fulfill();
        }
        assert_eq!(*fired.lock(), Some((at(100), at(200))));
    }

    #[test]
    fn late_start_walks_pathfinder_then_gate_timing() {
        let (log, gate) = procedure(GateStartConfiguration::default());
        let fired = Arc::new(Mutex::new(false));
        let sink = Arc::clone(&fired);

        let first = Arc::clone(&gate).check_prerequisites_for_start(
            at(300),
            at(200),
            Box::new(move |_, _| *sink.lock() = true),
        );
        let pathfinder = match first {
            Prerequisite::Pathfinder(pathfinder) => pathfinder,
            other => panic!("expected pathfinder prerequisite, got {other:?}"),
        };
        let second = pathfinder.fulfill("USA 1");
        let launch = match second {
            Prerequisite::GateLaunchTime(launch) => launch,
            other => panic!("expected gate launch prerequisite, got {other:?}"),
        };
        assert_eq!(launch.default_golf_down(), Duration::minutes(2));
        let third = launch
            .fulfill(Duration::minutes(5), Duration::minutes(2))
            .expect("timing is valid");
        let done = match third {
            Prerequisite::NoMore(done) => done,
            other => panic!("expected no more prerequisites, got {other:?}"),
        };
        done.fulfill();

        assert!(*fired.lock());
        assert_eq!(log.len(), 2);
        assert_eq!(gate.gate_launch_stop_time(), Duration::minutes(5));
    }

    #[test]
    fn start_event_records_default_timing_once() {
        let (log, gate) = procedure(GateStartConfiguration::default());
        assert!(gate.process_state_event(&StateEvent::new(at(1_000), StateEventName::Start)));
        assert!(gate.gate_line_opening_times_set());
        assert_eq!(log.len(), 1);

        assert!(gate.process_state_event(&StateEvent::new(at(1_000), StateEventName::Start)));
        assert_eq!(log.len(), 1);
        assert!(!gate.process_state_event(&StateEvent::new(
            at(1_000),
            StateEventName::Rrs26ClassUp
        )));
    }

    #[test]
    fn detached_procedure_stops_following_the_log() {
        let (_, gate) = procedure(GateStartConfiguration::default());
        gate.detach();
        gate.set_pathfinder(at(10), "NZL 3");
        assert_eq!(gate.pathfinder(), None);
    }
}
