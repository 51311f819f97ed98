//! Scheduled, unlogged procedure transitions.

use racelog_core::TimePoint;
use serde::Serialize;
use std::fmt;

/// Names of the transitions a racing procedure schedules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StateEventName {
    Start,
    GateClassOverGolfUp,
    GatePapaUp,
    GatePapaDown,
    GateShutdown,
    Rrs26ClassUp,
    Rrs26StartModeUp,
    Rrs26StartModeDown,
    IndividualRecallTimeout,
}

impl StateEventName {
    pub fn as_str(&self) -> &'static str {
        match self {
            StateEventName::Start => "START",
            StateEventName::GateClassOverGolfUp => "GATE_CLASS_OVER_GOLF_UP",
            StateEventName::GatePapaUp => "GATE_PAPA_UP",
            StateEventName::GatePapaDown => "GATE_PAPA_DOWN",
            StateEventName::GateShutdown => "GATE_SHUTDOWN",
            StateEventName::Rrs26ClassUp => "RRS26_CLASS_UP",
            StateEventName::Rrs26StartModeUp => "RRS26_STARTMODE_UP",
            StateEventName::Rrs26StartModeDown => "RRS26_STARTMODE_DOWN",
            StateEventName::IndividualRecallTimeout => "INDIVIDUAL_RECALL_TIMEOUT",
        }
    }
}

impl fmt::Display for StateEventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named transition due at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StateEvent {
    pub at: TimePoint,
    pub name: StateEventName,
}

impl StateEvent {
    pub fn new(at: TimePoint, name: StateEventName) -> Self {
        Self { at, name }
    }
}

impl fmt::Display for StateEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.name, self.at.to_rfc3339())
    }
}
