//! Racing procedures: the rule sets that turn a start time into a flag
//! timeline and a schedule of state events.

mod base;
pub mod gate_start;
pub mod rrs26;

use chrono::Duration;
use racelog_core::{
    AnalyzerError, Author, EventLog, Flag, GateLineOpeningTimes, ListenerId, RaceStatus,
    RacingProcedureType, StartPhase, TimePoint, saturating_offset,
};
use std::sync::Arc;
use thiserror::Error;

use crate::config::RegattaConfiguration;
use crate::flags::FlagPoleState;
use crate::prerequisite::{FulfillmentFunction, Prerequisite};
use crate::scheduler::StateEventScheduler;
use crate::state_event::StateEvent;

pub use base::{INDIVIDUAL_RECALL_TIMEOUT_MINUTES, ProcedureBase};
pub use gate_start::GateStartProcedure;
pub use rrs26::Rrs26Procedure;

#[derive(Debug, Error)]
pub enum ProcedureError {
    #[error(transparent)]
    Analyzer(#[from] AnalyzerError),

    #[error(
        "gate timing must not be negative (launch stop {launch_stop_ms}ms, golf down {golf_down_ms}ms)"
    )]
    NegativeGateTiming {
        launch_stop_ms: i64,
        golf_down_ms: i64,
    },

    #[error("{procedure} races have no individual recall")]
    IndividualRecallUnavailable { procedure: RacingProcedureType },
}

/// Observer of a racing procedure. Every method defaults to doing nothing.
///
/// Calls are synchronous and happen after the change is visible through the
/// procedure's getters.
pub trait ProcedureListener: Send + Sync {
    fn on_active_flags_changed(&self, _procedure: RacingProcedureType) {}
    fn on_gate_launch_time_changed(&self, _times: GateLineOpeningTimes) {}
    fn on_pathfinder_changed(&self, _pathfinder: Option<&str>) {}
    fn on_start_mode_changed(&self, _flag: Flag) {}
    fn on_individual_recall_displayed(&self, _at: TimePoint) {}
    fn on_individual_recall_removed(&self) {}
}

/// A per-race racing procedure.
///
/// Implementations cache values derived from the race log and refresh them
/// in [`update`](RacingProcedure::update), which runs on every append to the
/// log they were created for.
pub trait RacingProcedure: Send + Sync {
    fn procedure_type(&self) -> RacingProcedureType;

    /// Shared bookkeeping: log, author, listeners, scheduler, recall state.
    fn base(&self) -> &ProcedureBase;

    /// True iff `now` lies in the lead window before `start_time`.
    fn is_startphase_active(&self, start_time: TimePoint, now: TimePoint) -> bool;

    /// The first unmet condition for starting at `start_time`, or the
    /// terminal prerequisite that hands `(now, start_time)` to `function`.
    fn check_prerequisites_for_start(
        self: Arc<Self>,
        now: TimePoint,
        start_time: TimePoint,
        function: FulfillmentFunction,
    ) -> Prerequisite;

    fn create_start_state_events(&self, start_time: TimePoint) -> Vec<StateEvent>;

    /// Apply a due state event. Returns whether this procedure knows it.
    fn process_state_event(&self, event: &StateEvent) -> bool;

    fn active_flags(&self, start_time: TimePoint, now: TimePoint) -> FlagPoleState;

    /// Re-read the log and refresh cached values, notifying listeners of
    /// changes only.
    fn update(&self);

    fn has_individual_recall(&self) -> bool;

    /// Reschedule for the race's current status and start time.
    fn trigger_state_event_scheduling(&self, status: RaceStatus, start_time: Option<TimePoint>) {
        schedule_for_status(self, status, start_time);
    }

    /// Replace all pending events with this procedure's start events for
    /// `start_time`, whatever the race's status. Past events stay pending
    /// until the next `take_due`.
    fn on_start_time_changed(&self, start_time: Option<TimePoint>) {
        reschedule_start(self, start_time);
    }

    fn on_advance_pass(&self) {
        self.base().unschedule_all();
    }

    fn set_scheduler(&self, scheduler: Option<Arc<StateEventScheduler>>) {
        self.base().set_scheduler(scheduler);
    }

    fn add_listener(&self, listener: Arc<dyn ProcedureListener>) -> ListenerId {
        self.base().add_listener(listener)
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        self.base().remove_listener(id)
    }

    /// Stop following the log and drop all listeners.
    fn detach(&self) {
        self.base().detach();
    }

    fn is_individual_recall_displayed(&self) -> bool {
        self.base().individual_recall_displayed_at().is_some()
    }

    fn individual_recall_removal_time(&self) -> Option<TimePoint> {
        if !self.has_individual_recall() {
            return None;
        }
        self.base().individual_recall_removal_time()
    }

    fn display_individual_recall(&self, at: TimePoint) -> Result<(), ProcedureError> {
        if !self.has_individual_recall() {
            return Err(ProcedureError::IndividualRecallUnavailable {
                procedure: self.procedure_type(),
            });
        }
        self.base().display_individual_recall(at);
        Ok(())
    }

    fn remove_individual_recall(&self, at: TimePoint) {
        self.base().remove_individual_recall(at);
    }
}

fn schedule_for_status<P: RacingProcedure + ?Sized>(
    procedure: &P,
    status: RaceStatus,
    start_time: Option<TimePoint>,
) {
    match status {
        RaceStatus::Scheduled | RaceStatus::Startphase => {
            procedure.on_start_time_changed(start_time)
        }
        RaceStatus::Running => procedure.base().reschedule_recall_timeout(),
        RaceStatus::Unscheduled | RaceStatus::Prescheduled => {
            procedure.on_start_time_changed(None)
        }
        RaceStatus::Finishing | RaceStatus::Finished => {}
    }
}

fn reschedule_start<P: RacingProcedure + ?Sized>(procedure: &P, start_time: Option<TimePoint>) {
    let base = procedure.base();
    let procedure_type = procedure.procedure_type();
    base.notify(|listener| listener.on_active_flags_changed(procedure_type));
    base.unschedule_all();
    if let Some(start_time) = start_time {
        base.schedule(procedure.create_start_state_events(start_time));
        base.reschedule_recall_timeout();
    }
}

/// The instant `minutes` before `start_time`, pinned to the start of the
/// timeline.
pub(crate) fn minutes_before(start_time: TimePoint, minutes: i64) -> TimePoint {
    saturating_offset(start_time, -Duration::minutes(minutes))
}

/// Start phase predicate of a procedure, for the status analyzer.
pub struct ProcedurePhase(pub Arc<dyn RacingProcedure>);

impl StartPhase for ProcedurePhase {
    fn is_startphase_active(&self, start_time: TimePoint, now: TimePoint) -> bool {
        self.0.is_startphase_active(start_time, now)
    }
}

/// Build the procedure for `procedure_type`, following `log` and authoring
/// its own log entries as `author`.
pub fn create_procedure(
    procedure_type: RacingProcedureType,
    log: Arc<EventLog>,
    author: Author,
    config: &RegattaConfiguration,
) -> Arc<dyn RacingProcedure> {
    match procedure_type {
        RacingProcedureType::GateStart => {
            GateStartProcedure::new(log, author, config.gate_start.clone()) as Arc<dyn RacingProcedure>
        }
        RacingProcedureType::Rrs26 => {
            Rrs26Procedure::new(log, author, config.rrs26.clone()) as Arc<dyn RacingProcedure>
        }
    }
}
