//! Start sequence of the Racing Rules of Sailing, rule 26: class flag at
//! five minutes, a start mode flag (papa, india, zulu or black) at four,
//! start mode down at one, class down at the start.

use chrono::Duration;
use parking_lot::RwLock;
use racelog_core::{
    Analyzer, Author, EventLog, FinishedTimeFinder, FinishingTimeFinder, Flag, LastFlagFinder,
    RaceLogEvent, RacingProcedureType, TimePoint,
};
use std::sync::Arc;
use tracing::debug;

use super::{ProcedureBase, RacingProcedure, minutes_before};
use crate::config::Rrs26Configuration;
use crate::flags::{FlagPole, FlagPoleState};
use crate::prerequisite::{FulfillmentFunction, NoMorePrerequisite, Prerequisite};
use crate::state_event::{StateEvent, StateEventName};

pub const CLASS_UP_MINUTES: i64 = 5;
pub const START_MODE_UP_MINUTES: i64 = 4;
pub const START_MODE_DOWN_MINUTES: i64 = 1;

struct Rrs26Cache {
    start_mode: Flag,
    start_mode_set: bool,
}

pub struct Rrs26Procedure {
    base: ProcedureBase,
    config: Rrs26Configuration,
    start_mode: LastFlagFinder,
    finishing: FinishingTimeFinder,
    finished: FinishedTimeFinder,
    cache: RwLock<Rrs26Cache>,
}

impl Rrs26Procedure {
    pub fn new(log: Arc<EventLog>, author: Author, config: Rrs26Configuration) -> Arc<Self> {
        let procedure = Arc::new_cyclic(|weak| {
            let base = ProcedureBase::new(Arc::clone(&log), author);
            base.follow_log(weak.clone());
            Self {
                base,
                start_mode: LastFlagFinder::new(
                    Arc::clone(&log),
                    config.start_mode_flags.clone(),
                ),
                finishing: FinishingTimeFinder::new(Arc::clone(&log)),
                finished: FinishedTimeFinder::new(log),
                cache: RwLock::new(Rrs26Cache {
                    start_mode: config.start_mode_flag,
                    start_mode_set: false,
                }),
                config,
            }
        });
        procedure.update();
        procedure
    }

    pub fn configuration(&self) -> &Rrs26Configuration {
        &self.config
    }

    pub fn class_flag(&self) -> Flag {
        self.config.class_flag.unwrap_or(Flag::Class)
    }

    /// The chosen start mode flag, or the configured default.
    pub fn start_mode_flag(&self) -> Flag {
        self.cache.read().start_mode
    }

    pub fn start_mode_flag_set(&self) -> bool {
        self.cache.read().start_mode_set
    }

    pub fn set_start_mode_flag(&self, at: TimePoint, flag: Flag) {
        self.base
            .append(|author, pass| RaceLogEvent::flag(author, at, pass, flag, Flag::None, true));
    }

    fn flags_after_start(&self, start_time: TimePoint, now: TimePoint) -> FlagPoleState {
        if self.base.is_individual_recall_displayed_at(now) {
            return FlagPoleState::new(
                vec![FlagPole::new(Flag::Xray, true)],
                self.base.individual_recall_displayed_at(),
                vec![FlagPole::new(Flag::Xray, false)],
                self.base.individual_recall_removal_time(),
            );
        }
        if let Some(finished) = self.finished.analyze().filter(|at| *at <= now) {
            return FlagPoleState::settled(vec![FlagPole::new(Flag::Blue, false)], Some(finished));
        }
        if let Some(finishing) = self.finishing.analyze().filter(|at| *at <= now) {
            return FlagPoleState::new(
                vec![FlagPole::new(Flag::Blue, true)],
                Some(finishing),
                vec![FlagPole::new(Flag::Blue, false)],
                None,
            );
        }
        let since = self
            .base
            .individual_recall_removal_time()
            .filter(|removed| *removed <= now)
            .unwrap_or(start_time);
        FlagPoleState::settled(Vec::new(), Some(since))
    }
}

impl RacingProcedure for Rrs26Procedure {
    fn procedure_type(&self) -> RacingProcedureType {
        RacingProcedureType::Rrs26
    }

    fn base(&self) -> &ProcedureBase {
        &self.base
    }

    fn is_startphase_active(&self, start_time: TimePoint, now: TimePoint) -> bool {
        now < start_time && start_time - now < Duration::minutes(CLASS_UP_MINUTES)
    }

    fn check_prerequisites_for_start(
        self: Arc<Self>,
        now: TimePoint,
        start_time: TimePoint,
        function: FulfillmentFunction,
    ) -> Prerequisite {
        Prerequisite::NoMore(NoMorePrerequisite::new(now, start_time, function))
    }

    fn create_start_state_events(&self, start_time: TimePoint) -> Vec<StateEvent> {
        vec![
            StateEvent::new(
                minutes_before(start_time, CLASS_UP_MINUTES),
                StateEventName::Rrs26ClassUp,
            ),
            StateEvent::new(
                minutes_before(start_time, START_MODE_UP_MINUTES),
                StateEventName::Rrs26StartModeUp,
            ),
            StateEvent::new(
                minutes_before(start_time, START_MODE_DOWN_MINUTES),
                StateEventName::Rrs26StartModeDown,
            ),
            StateEvent::new(start_time, StateEventName::Start),
        ]
    }

    fn process_state_event(&self, event: &StateEvent) -> bool {
        match event.name {
            StateEventName::Rrs26StartModeUp => {
                let (flag, already_set) = {
                    let cache = self.cache.read();
                    (cache.start_mode, cache.start_mode_set)
                };
                if !already_set {
                    self.set_start_mode_flag(event.at, flag);
                }
                self.base
                    .notify(|listener| listener.on_active_flags_changed(self.procedure_type()));
                true
            }
            StateEventName::Rrs26ClassUp
            | StateEventName::Rrs26StartModeDown
            | StateEventName::Start => {
                self.base
                    .notify(|listener| listener.on_active_flags_changed(self.procedure_type()));
                true
            }
            _ => self.base.process_common(event),
        }
    }

    fn active_flags(&self, start_time: TimePoint, now: TimePoint) -> FlagPoleState {
        let class = |up| FlagPole::new(self.class_flag(), up);
        let mode = self.start_mode_flag();
        let start_mode = |up| FlagPole::new(mode, up);

        let class_up_at = minutes_before(start_time, CLASS_UP_MINUTES);
        let mode_up_at = minutes_before(start_time, START_MODE_UP_MINUTES);
        let mode_down_at = minutes_before(start_time, START_MODE_DOWN_MINUTES);

        if now < class_up_at {
            FlagPoleState::new(
                vec![class(false), start_mode(false)],
                None,
                vec![class(true), start_mode(false)],
                Some(class_up_at),
            )
        } else if now < mode_up_at {
            FlagPoleState::new(
                vec![class(true), start_mode(false)],
                Some(class_up_at),
                vec![class(true), start_mode(true)],
                Some(mode_up_at),
            )
        } else if now < mode_down_at {
            FlagPoleState::new(
                vec![class(true), start_mode(true)],
                Some(mode_up_at),
                vec![class(true), start_mode(false)],
                Some(mode_down_at),
            )
        } else if now < start_time {
            FlagPoleState::new(
                vec![class(true), start_mode(false)],
                Some(mode_down_at),
                vec![class(false), start_mode(false)],
                Some(start_time),
            )
        } else {
            self.flags_after_start(start_time, now)
        }
    }

    fn update(&self) {
        let found = self.start_mode.analyze().map(|reading| reading.upper);
        let changed = {
            let mut cache = self.cache.write();
            match found {
                Some(flag) if flag != cache.start_mode || !cache.start_mode_set => {
                    cache.start_mode = flag;
                    cache.start_mode_set = true;
                    Some(flag)
                }
                _ => None,
            }
        };
        if let Some(flag) = changed {
            debug!(race = %self.base.log().race_id(), %flag, "start mode changed");
            self.base.notify(|listener| listener.on_start_mode_changed(flag));
        }

        self.base.update(self.procedure_type());
    }

    /// Black flag starts disqualify instead of recalling individually.
    fn has_individual_recall(&self) -> bool {
        if !self.config.has_individual_recall {
            return false;
        }
        let cache = self.cache.read();
        !(cache.start_mode_set && cache.start_mode == Flag::Black)
    }
}
