//! One race's live state: the log, the racing procedure it selects, and the
//! derived start time and status, kept current as the log grows.

use parking_lot::{Mutex, ReentrantMutex, RwLock};
use racelog_core::{
    Analyzer, Author, Clock, EventLog, FinishedTimeFinder, FinishingTimeFinder, ListenerId,
    Listeners, PassId, RaceLogEvent, RaceLogResolver, RaceStatus, RaceStatusAnalyzer,
    RacingProcedureType, RacingProcedureTypeAnalyzer, ResolutionFailed, StartTimeFinder,
    StartTimeFinderResult, StatusReading, TimePoint,
};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::RegattaConfiguration;
use crate::flags::FlagPoleState;
use crate::procedure::{ProcedureError, ProcedurePhase, RacingProcedure, create_procedure};
use crate::scheduler::StateEventScheduler;

/// Observer of a [`RaceState`]. Every method defaults to doing nothing.
pub trait RaceStateListener: Send + Sync {
    fn on_status_changed(&self, _status: RaceStatus) {}
    fn on_start_time_changed(&self, _start: &StartTimeFinderResult) {}
    fn on_racing_procedure_changed(&self, _procedure: RacingProcedureType) {}
    fn on_advance_pass(&self, _pass: PassId) {}
    fn on_finishing_time_changed(&self, _at: Option<TimePoint>) {}
    fn on_finished_time_changed(&self, _at: Option<TimePoint>) {}
}

#[derive(Debug, Clone, PartialEq)]
struct Derived {
    pass: PassId,
    start: StartTimeFinderResult,
    status: StatusReading,
    finishing: Option<TimePoint>,
    finished: Option<TimePoint>,
}

pub struct RaceState {
    log: Arc<EventLog>,
    resolver: Arc<dyn RaceLogResolver>,
    clock: Arc<dyn Clock>,
    author: Author,
    config: RegattaConfiguration,
    scheduler: Arc<StateEventScheduler>,
    procedure_type: RacingProcedureTypeAnalyzer,
    start_time: StartTimeFinder,
    finishing: FinishingTimeFinder,
    finished: FinishedTimeFinder,
    procedure: RwLock<Arc<dyn RacingProcedure>>,
    derived: RwLock<Derived>,
    /// Held across a whole recompute. Reentrant because listeners notified
    /// during an update may append to the log, which updates again.
    updating: ReentrantMutex<()>,
    listeners: Listeners<dyn RaceStateListener>,
    log_listener: Mutex<Option<ListenerId>>,
}

impl RaceState {
    /// Build the state for `log` and bring it up to date.
    ///
    /// `resolver` must know every race the log's start time may depend on.
    /// Entries the race state or its procedure write are authored by
    /// `author`.
    pub fn new(
        log: Arc<EventLog>,
        resolver: Arc<dyn RaceLogResolver>,
        clock: Arc<dyn Clock>,
        author: Author,
        config: RegattaConfiguration,
    ) -> Result<Arc<Self>, ProcedureError> {
        let procedure_type =
            RacingProcedureTypeAnalyzer::new(Arc::clone(&log), config.default_procedure);
        let scheduler = Arc::new(StateEventScheduler::new());
        let procedure = create_procedure(
            procedure_type.analyze(),
            Arc::clone(&log),
            author.clone(),
            &config,
        );
        procedure.set_scheduler(Some(Arc::clone(&scheduler)));

        let now = clock.now();
        let state = Arc::new(Self {
            start_time: StartTimeFinder::new(Arc::clone(&resolver), Arc::clone(&log)),
            finishing: FinishingTimeFinder::new(Arc::clone(&log)),
            finished: FinishedTimeFinder::new(Arc::clone(&log)),
            procedure_type,
            procedure: RwLock::new(procedure),
            derived: RwLock::new(Derived {
                pass: log.current_pass(),
                start: StartTimeFinderResult::Failed {
                    failure: ResolutionFailed::NoStartTimeSet,
                    depends_on: Vec::new(),
                },
                status: StatusReading {
                    status: RaceStatus::Unscheduled,
                    evaluated_at: now,
                },
                finishing: None,
                finished: None,
            }),
            updating: ReentrantMutex::new(()),
            listeners: Listeners::new(),
            log_listener: Mutex::new(None),
            log,
            resolver,
            clock,
            author,
            config,
            scheduler,
        });

        let weak = Arc::downgrade(&state);
        let id = state.log.add_listener(move |_| {
            if let Some(state) = weak.upgrade()
                && let Err(err) = state.update()
            {
                warn!(race = %state.log.race_id(), error = %err, "race state update failed");
            }
        });
        *state.log_listener.lock() = Some(id);

        state.reschedule(true)?;
        Ok(state)
    }

    pub fn log(&self) -> &Arc<EventLog> {
        &self.log
    }

    pub fn author(&self) -> &Author {
        &self.author
    }

    pub fn configuration(&self) -> &RegattaConfiguration {
        &self.config
    }

    pub fn scheduler(&self) -> &Arc<StateEventScheduler> {
        &self.scheduler
    }

    pub fn procedure(&self) -> Arc<dyn RacingProcedure> {
        Arc::clone(&self.procedure.read())
    }

    pub fn status(&self) -> RaceStatus {
        self.derived.read().status.status
    }

    pub fn status_reading(&self) -> StatusReading {
        self.derived.read().status
    }

    pub fn start_time_result(&self) -> StartTimeFinderResult {
        self.derived.read().start.clone()
    }

    pub fn start_time(&self) -> Option<TimePoint> {
        self.derived.read().start.start_time()
    }

    pub fn finishing_time(&self) -> Option<TimePoint> {
        self.derived.read().finishing
    }

    pub fn finished_time(&self) -> Option<TimePoint> {
        self.derived.read().finished
    }

    pub fn current_pass(&self) -> PassId {
        self.derived.read().pass
    }

    /// Flags of the current procedure at `now`, or `None` without a start
    /// time.
    pub fn active_flags(&self, now: TimePoint) -> Option<FlagPoleState> {
        let start = self.start_time()?;
        Some(self.procedure().active_flags(start, now))
    }

    pub fn add_listener(&self, listener: Arc<dyn RaceStateListener>) -> ListenerId {
        self.listeners.add(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    pub fn set_start_time(&self, start_time: TimePoint) -> bool {
        self.append(|author, at, pass| RaceLogEvent::start_time(author, at, pass, start_time))
    }

    pub fn set_status(&self, status: RaceStatus) -> bool {
        self.append(|author, at, pass| RaceLogEvent::status_change(author, at, pass, status))
    }

    pub fn set_racing_procedure(&self, procedure: RacingProcedureType) -> bool {
        self.append(|author, at, pass| {
            RaceLogEvent::procedure_changed(author, at, pass, procedure)
        })
    }

    /// Abandon the current pass and start over in a fresh one.
    pub fn advance_pass(&self) -> PassId {
        self.log.advance_pass(self.author.clone(), self.clock.as_ref())
    }

    fn append(&self, build: impl FnOnce(Author, TimePoint, PassId) -> RaceLogEvent) -> bool {
        let event = build(self.author.clone(), self.clock.now(), self.log.current_pass());
        self.log.append(event)
    }

    /// Fire every state event due at `now` through the procedure, then
    /// refresh. Returns how many events fired.
    pub fn process_due(&self, now: TimePoint) -> Result<usize, ProcedureError> {
        let due = self.scheduler.take_due(now);
        let procedure = self.procedure();
        for event in &due {
            let handled = procedure.process_state_event(event);
            debug!(race = %self.log.race_id(), %event, handled, "state event fired");
        }
        self.update()?;
        Ok(due.len())
    }

    /// Recompute the derived state from the log and the clock.
    ///
    /// Runs on every append to this race's log. Changes in the logs of
    /// races this one depends on are only picked up by calling it directly.
    pub fn update(&self) -> Result<(), ProcedureError> {
        self.reschedule(false)
    }

    fn reschedule(&self, initial: bool) -> Result<(), ProcedureError> {
        let _updating = self.updating.lock();
        let switched = self.switch_procedure_if_needed();
        let procedure = self.procedure();

        let start = self.start_time.analyze()?;
        let status = RaceStatusAnalyzer::new(
            Arc::clone(&self.resolver),
            Arc::clone(&self.log),
            Arc::clone(&self.clock),
            Arc::new(ProcedurePhase(Arc::clone(&procedure))),
        )
        .analyze_with(&start);
        let next = Derived {
            pass: self.log.current_pass(),
            start,
            status,
            finishing: self.finishing.analyze(),
            finished: self.finished.analyze(),
        };

        let previous = {
            let mut derived = self.derived.write();
            std::mem::replace(&mut *derived, next.clone())
        };

        let pass_advanced = next.pass != previous.pass;
        let start_changed = next.start != previous.start;
        if pass_advanced {
            debug!(race = %self.log.race_id(), pass = next.pass, "pass advanced");
            procedure.on_advance_pass();
        }
        if initial || switched || pass_advanced {
            procedure.trigger_state_event_scheduling(next.status.status, next.start.start_time());
        } else if start_changed {
            procedure.on_start_time_changed(next.start.start_time());
        }

        if switched {
            let procedure_type = procedure.procedure_type();
            self.listeners
                .notify(|listener| listener.on_racing_procedure_changed(procedure_type));
        }
        if pass_advanced {
            self.listeners.notify(|listener| listener.on_advance_pass(next.pass));
        }
        if start_changed {
            debug!(race = %self.log.race_id(), start = ?next.start.start_time(), "start time changed");
            self.listeners
                .notify(|listener| listener.on_start_time_changed(&next.start));
        }
        if next.status.status != previous.status.status {
            debug!(
                race = %self.log.race_id(),
                from = %previous.status.status,
                to = %next.status.status,
                "race status changed"
            );
            self.listeners
                .notify(|listener| listener.on_status_changed(next.status.status));
        }
        if next.finishing != previous.finishing {
            self.listeners
                .notify(|listener| listener.on_finishing_time_changed(next.finishing));
        }
        if next.finished != previous.finished {
            self.listeners
                .notify(|listener| listener.on_finished_time_changed(next.finished));
        }
        Ok(())
    }

    /// Replace the procedure when the log asks for another type. Returns
    /// whether it was replaced.
    fn switch_procedure_if_needed(&self) -> bool {
        let wanted = self.procedure_type.analyze();
        if self.procedure.read().procedure_type() == wanted {
            return false;
        }

        let replacement = create_procedure(
            wanted,
            Arc::clone(&self.log),
            self.author.clone(),
            &self.config,
        );
        replacement.set_scheduler(Some(Arc::clone(&self.scheduler)));

        let old = {
            let mut current = self.procedure.write();
            if current.procedure_type() == wanted {
                replacement.detach();
                return false;
            }
            std::mem::replace(&mut *current, replacement)
        };
        debug!(
            race = %self.log.race_id(),
            from = %old.procedure_type(),
            to = %wanted,
            "racing procedure changed"
        );
        old.set_scheduler(None);
        old.detach();
        self.scheduler.unschedule_all();
        true
    }
}

impl Drop for RaceState {
    fn drop(&mut self) {
        if let Some(id) = self.log_listener.get_mut().take() {
            self.log.remove_listener(id);
        }
        let procedure = self.procedure.get_mut();
        procedure.set_scheduler(None);
        procedure.detach();
    }
}
