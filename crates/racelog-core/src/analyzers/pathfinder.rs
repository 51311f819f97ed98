use std::sync::Arc;

use crate::analyzer::{Analyzer, LogAnalyzer, PassScope};
use crate::event::EventKind;
use crate::log::EventLog;

/// Sail id of the boat acting as pathfinder for a gate start.
#[derive(Clone)]
pub struct PathfinderFinder {
    analyzer: LogAnalyzer,
}

impl PathfinderFinder {
    pub fn new(log: Arc<EventLog>) -> Self {
        Self::with_scope(log, PassScope::Current)
    }

    pub fn with_scope(log: Arc<EventLog>, scope: PassScope) -> Self {
        Self {
            analyzer: LogAnalyzer::with_scope(log, scope),
        }
    }
}

impl Analyzer for PathfinderFinder {
    type Output = Option<String>;

    fn analyze(&self) -> Option<String> {
        self.analyzer.find(|event| match event.kind() {
            EventKind::Pathfinder { sail_id } => Some(sail_id.clone()),
            _ => None,
        })
    }
}
