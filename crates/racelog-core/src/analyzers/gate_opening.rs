use std::sync::Arc;

use crate::analyzer::{Analyzer, LogAnalyzer, PassScope};
use crate::event::{EventKind, GateLineOpeningTimes};
use crate::log::EventLog;

/// Authoritative gate launch and golf-down timing.
#[derive(Clone)]
pub struct GateLineOpeningTimeFinder {
    analyzer: LogAnalyzer,
}

impl GateLineOpeningTimeFinder {
    pub fn new(log: Arc<EventLog>) -> Self {
        Self::with_scope(log, PassScope::Current)
    }

    pub fn with_scope(log: Arc<EventLog>, scope: PassScope) -> Self {
        Self {
            analyzer: LogAnalyzer::with_scope(log, scope),
        }
    }
}

impl Analyzer for GateLineOpeningTimeFinder {
    type Output = Option<GateLineOpeningTimes>;

    fn analyze(&self) -> Option<GateLineOpeningTimes> {
        self.analyzer.find(|event| match event.kind() {
            EventKind::GateLineOpeningTime { times } => Some(*times),
            _ => None,
        })
    }
}
