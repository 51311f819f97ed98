use chrono::Duration;
use parking_lot::{Mutex, RwLock};
use racelog_core::{
    Analyzer, Author, EventLog, Flag, LastFlagFinder, ListenerId, Listeners, PassId,
    RaceLogEvent, RacingProcedureType, TimePoint, saturating_offset,
};
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

use super::{ProcedureListener, RacingProcedure};
use crate::scheduler::StateEventScheduler;
use crate::state_event::{StateEvent, StateEventName};

/// How long an individual recall stays displayed before it is taken down.
pub const INDIVIDUAL_RECALL_TIMEOUT_MINUTES: i64 = 4;

/// State every racing procedure carries: the log it follows, the author of
/// its own entries, its listeners, the scheduler it feeds and the individual
/// recall flag.
pub struct ProcedureBase {
    log: Arc<EventLog>,
    author: Author,
    listeners: Listeners<dyn ProcedureListener>,
    scheduler: RwLock<Option<Arc<StateEventScheduler>>>,
    log_listener: Mutex<Option<ListenerId>>,
    recall_finder: LastFlagFinder,
    recall_displayed_at: RwLock<Option<TimePoint>>,
}

impl ProcedureBase {
    pub(crate) fn new(log: Arc<EventLog>, author: Author) -> Self {
        Self {
            recall_finder: LastFlagFinder::new(Arc::clone(&log), [Flag::Xray]),
            log,
            author,
            listeners: Listeners::new(),
            scheduler: RwLock::new(None),
            log_listener: Mutex::new(None),
            recall_displayed_at: RwLock::new(None),
        }
    }

    /// Run `procedure.update()` after every append to the log. Holds the
    /// procedure weakly so the log does not keep it alive.
    pub(crate) fn follow_log<P: RacingProcedure + 'static>(&self, procedure: Weak<P>) {
        let id = self.log.add_listener(move |_| {
            if let Some(procedure) = procedure.upgrade() {
                procedure.update();
            }
        });
        *self.log_listener.lock() = Some(id);
    }

    pub fn log(&self) -> &Arc<EventLog> {
        &self.log
    }

    pub fn author(&self) -> &Author {
        &self.author
    }

    /// Append an event authored by this procedure in the log's current pass.
    pub(crate) fn append(&self, build: impl FnOnce(Author, PassId) -> RaceLogEvent) -> bool {
        let event = build(self.author.clone(), self.log.current_pass());
        debug!(race = %self.log.race_id(), %event, "procedure appending event");
        self.log.append(event)
    }

    pub(crate) fn notify(&self, mut call: impl FnMut(&dyn ProcedureListener)) {
        self.listeners.notify(|listener| call(listener));
    }

    pub(crate) fn add_listener(&self, listener: Arc<dyn ProcedureListener>) -> ListenerId {
        self.listeners.add(listener)
    }

    pub(crate) fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    pub(crate) fn set_scheduler(&self, scheduler: Option<Arc<StateEventScheduler>>) {
        *self.scheduler.write() = scheduler;
    }

    pub(crate) fn schedule(&self, events: Vec<StateEvent>) {
        if let Some(scheduler) = self.scheduler.read().as_ref() {
            scheduler.schedule(events);
        }
    }

    pub(crate) fn unschedule(&self, name: StateEventName) {
        if let Some(scheduler) = self.scheduler.read().as_ref() {
            scheduler.unschedule(name);
        }
    }

    pub(crate) fn unschedule_all(&self) {
        if let Some(scheduler) = self.scheduler.read().as_ref() {
            scheduler.unschedule_all();
        }
    }

    pub(crate) fn detach(&self) {
        if let Some(id) = self.log_listener.lock().take() {
            self.log.remove_listener(id);
        }
        self.listeners.clear();
    }

    pub fn individual_recall_displayed_at(&self) -> Option<TimePoint> {
        *self.recall_displayed_at.read()
    }

    pub fn individual_recall_removal_time(&self) -> Option<TimePoint> {
        self.individual_recall_displayed_at()
            .map(|at| saturating_offset(at, Duration::minutes(INDIVIDUAL_RECALL_TIMEOUT_MINUTES)))
    }

    /// Whether the recall flag is up at `now`, given its timeout.
    pub fn is_individual_recall_displayed_at(&self, now: TimePoint) -> bool {
        match (
            self.individual_recall_displayed_at(),
            self.individual_recall_removal_time(),
        ) {
            (Some(shown), Some(removed)) => shown <= now && now < removed,
            _ => false,
        }
    }

    pub(crate) fn display_individual_recall(&self, at: TimePoint) {
        self.append(|author, pass| {
            RaceLogEvent::flag(author, at, pass, Flag::Xray, Flag::None, true)
        });
    }

    pub(crate) fn remove_individual_recall(&self, at: TimePoint) {
        self.append(|author, pass| {
            RaceLogEvent::flag(author, at, pass, Flag::Xray, Flag::None, false)
        });
    }

    pub(crate) fn reschedule_recall_timeout(&self) {
        self.unschedule(StateEventName::IndividualRecallTimeout);
        if let Some(removal) = self.individual_recall_removal_time() {
            self.schedule(vec![StateEvent::new(
                removal,
                StateEventName::IndividualRecallTimeout,
            )]);
        }
    }

    /// Handle the state events every procedure shares.
    pub(crate) fn process_common(&self, event: &StateEvent) -> bool {
        match event.name {
            StateEventName::IndividualRecallTimeout => {
                self.remove_individual_recall(event.at);
                true
            }
            _ => false,
        }
    }

    /// Refresh the recall cache from the log.
    pub(crate) fn update(&self, procedure_type: RacingProcedureType) {
        let displayed_at = self
            .recall_finder
            .analyze()
            .filter(|reading| reading.displayed)
            .map(|reading| reading.at);

        let changed = {
            let mut cached = self.recall_displayed_at.write();
            if *cached == displayed_at {
                false
            } else {
                *cached = displayed_at;
                true
            }
        };
        if !changed {
            return;
        }

        match displayed_at {
            Some(at) => {
                trace!(race = %self.log.race_id(), %at, "individual recall displayed");
                self.notify(|listener| listener.on_individual_recall_displayed(at));
                self.notify(|listener| listener.on_active_flags_changed(procedure_type));
                self.reschedule_recall_timeout();
            }
            None => {
                trace!(race = %self.log.race_id(), "individual recall removed");
                self.notify(|listener| listener.on_individual_recall_removed());
                self.notify(|listener| listener.on_active_flags_changed(procedure_type));
                self.unschedule(StateEventName::IndividualRecallTimeout);
            }
        }
    }
}
