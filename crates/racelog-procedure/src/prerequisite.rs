//! Conditions that must hold before a start is permitted.
//!
//! [`RacingProcedure::check_prerequisites_for_start`] returns the first unmet
//! condition. Fulfilling it records the missing fact in the log and checks
//! again, so a caller walks the chain until it reaches
//! [`Prerequisite::NoMore`], whose fulfillment runs the caller's function.

use chrono::Duration;
use racelog_core::TimePoint;
use std::fmt;
use std::sync::Arc;

use crate::procedure::{GateStartProcedure, ProcedureError, RacingProcedure};

/// Invoked with `(now, start_time)` once nothing blocks the start.
pub type FulfillmentFunction = Box<dyn FnOnce(TimePoint, TimePoint) + Send>;

pub enum Prerequisite {
    /// A gate start needs a pathfinder.
    Pathfinder(PathfinderPrerequisite),
    /// A gate start needs its launch and golf-down times.
    GateLaunchTime(GateLaunchTimePrerequisite),
    /// Nothing left to satisfy.
    NoMore(NoMorePrerequisite),
}

impl Prerequisite {
    pub fn name(&self) -> &'static str {
        match self {
            Prerequisite::Pathfinder(_) => "pathfinder",
            Prerequisite::GateLaunchTime(_) => "gate_launch_time",
            Prerequisite::NoMore(_) => "no_more",
        }
    }

    pub fn is_satisfied(&self) -> bool {
        matches!(self, Prerequisite::NoMore(_))
    }
}

impl fmt::Debug for Prerequisite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Prerequisite").field(&self.name()).finish()
    }
}

pub struct PathfinderPrerequisite {
    procedure: Arc<GateStartProcedure>,
    now: TimePoint,
    start_time: TimePoint,
    function: FulfillmentFunction,
}

impl PathfinderPrerequisite {
    pub(crate) fn new(
        procedure: Arc<GateStartProcedure>,
        now: TimePoint,
        start_time: TimePoint,
        function: FulfillmentFunction,
    ) -> Self {
        Self {
            procedure,
            now,
            start_time,
            function,
        }
    }

    /// Record `sail_id` as pathfinder and move on to the next check.
    pub fn fulfill(self, sail_id: impl Into<String>) -> Prerequisite {
        self.procedure.set_pathfinder(self.now, sail_id);
        RacingProcedure::check_prerequisites_for_start(
            self.procedure,
            self.now,
            self.start_time,
            self.function,
        )
    }
}

pub struct GateLaunchTimePrerequisite {
    procedure: Arc<GateStartProcedure>,
    now: TimePoint,
    start_time: TimePoint,
    default_golf_down: Duration,
    function: FulfillmentFunction,
}

impl GateLaunchTimePrerequisite {
    pub(crate) fn new(
        procedure: Arc<GateStartProcedure>,
        now: TimePoint,
        start_time: TimePoint,
        default_golf_down: Duration,
        function: FulfillmentFunction,
    ) -> Self {
        Self {
            procedure,
            now,
            start_time,
            default_golf_down,
            function,
        }
    }

    /// Golf-down time to offer when asking for the gate timing.
    pub fn default_golf_down(&self) -> Duration {
        self.default_golf_down
    }

    /// Record the gate timing and move on to the next check.
    pub fn fulfill(
        self,
        gate_launch_stop: Duration,
        golf_down: Duration,
    ) -> Result<Prerequisite, ProcedureError> {
        self.procedure
            .set_gate_line_opening_times(self.now, gate_launch_stop, golf_down)?;
        Ok(RacingProcedure::check_prerequisites_for_start(
            self.procedure,
            self.now,
            self.start_time,
            self.function,
        ))
    }
}

pub struct NoMorePrerequisite {
    now: TimePoint,
    start_time: TimePoint,
    function: FulfillmentFunction,
}

impl NoMorePrerequisite {
    pub(crate) fn new(now: TimePoint, start_time: TimePoint, function: FulfillmentFunction) -> Self {
        Self {
            now,
            start_time,
            function,
        }
    }

    pub fn fulfill(self) {
        (self.function)(self.now, self.start_time);
    }
}
