//! Race status as a function of the start time, the explicit status claims,
//! the racing procedure's start phase and the clock.

use serde::Serialize;
use std::sync::Arc;

use crate::analyzer::{Analyzer, AnalyzerError, LogAnalyzer, StartPhase};
use crate::analyzers::start_time::{StartTimeFinder, StartTimeFinderResult};
use crate::clock::{Clock, TimePoint};
use crate::event::{EventKind, RaceStatus};
use crate::log::EventLog;
use crate::registry::RaceLogResolver;

/// A status together with the clock reading it was computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusReading {
    pub status: RaceStatus,
    pub evaluated_at: TimePoint,
}

/// Map the inputs of a status decision to a status.
///
/// An explicit `Finishing` or `Finished` claim always wins. Without a start
/// time the race is `Prescheduled`, or `Unscheduled` if that was claimed.
/// With one, the start phase predicate comes first, then the clock decides
/// between `Scheduled` and `Running`.
pub fn derive_status(
    explicit: Option<RaceStatus>,
    start_time: Option<TimePoint>,
    now: TimePoint,
    procedure: &dyn StartPhase,
) -> RaceStatus {
    if let Some(status) = explicit
        && status.overrides_time()
    {
        return status;
    }
    let Some(start_time) = start_time else {
        return match explicit {
            Some(RaceStatus::Unscheduled) => RaceStatus::Unscheduled,
            _ => RaceStatus::Prescheduled,
        };
    };
    if procedure.is_startphase_active(start_time, now) {
        RaceStatus::Startphase
    } else if now < start_time {
        RaceStatus::Scheduled
    } else {
        RaceStatus::Running
    }
}

pub struct RaceStatusAnalyzer {
    start_time: StartTimeFinder,
    statuses: LogAnalyzer,
    clock: Arc<dyn Clock>,
    procedure: Arc<dyn StartPhase>,
}

impl RaceStatusAnalyzer {
    pub fn new(
        resolver: Arc<dyn RaceLogResolver>,
        log: Arc<EventLog>,
        clock: Arc<dyn Clock>,
        procedure: Arc<dyn StartPhase>,
    ) -> Self {
        Self {
            start_time: StartTimeFinder::new(resolver, Arc::clone(&log)),
            statuses: LogAnalyzer::new(log),
            clock,
            procedure,
        }
    }

    /// Authoritative explicit status claim in the current pass.
    pub fn explicit_status(&self) -> Option<RaceStatus> {
        self.statuses.find(|event| match event.kind() {
            EventKind::StatusChange { next } => Some(*next),
            _ => None,
        })
    }

    /// Status for an already resolved start time, read at the clock's now.
    pub fn analyze_with(&self, start: &StartTimeFinderResult) -> StatusReading {
        let now = self.clock.now();
        StatusReading {
            status: derive_status(
                self.explicit_status(),
                start.start_time(),
                now,
                self.procedure.as_ref(),
            ),
            evaluated_at: now,
        }
    }
}

impl Analyzer for RaceStatusAnalyzer {
    type Output = Result<StatusReading, AnalyzerError>;

    fn analyze(&self) -> Self::Output {
        let start = self.start_time.analyze()?;
        Ok(self.analyze_with(&start))
    }
}
