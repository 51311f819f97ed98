use std::sync::Arc;

use crate::analyzer::{Analyzer, LogAnalyzer, PassScope};
use crate::event::{EventKind, RacingProcedureType};
use crate::log::EventLog;

/// The racing procedure in force: the authoritative explicit choice, or the
/// configured default when nobody chose one.
#[derive(Clone)]
pub struct RacingProcedureTypeAnalyzer {
    analyzer: LogAnalyzer,
    fallback: RacingProcedureType,
}

impl RacingProcedureTypeAnalyzer {
    pub fn new(log: Arc<EventLog>, fallback: RacingProcedureType) -> Self {
        Self {
            analyzer: LogAnalyzer::with_scope(log, PassScope::Current),
            fallback,
        }
    }

    pub fn with_scope(mut self, scope: PassScope) -> Self {
        self.analyzer = LogAnalyzer::with_scope(Arc::clone(self.analyzer.log()), scope);
        self
    }
}

impl Analyzer for RacingProcedureTypeAnalyzer {
    type Output = RacingProcedureType;

    fn analyze(&self) -> RacingProcedureType {
        self.analyzer
            .find(|event| match event.kind() {
                EventKind::RacingProcedureChanged { procedure } => Some(*procedure),
                _ => None,
            })
            .unwrap_or(self.fallback)
    }
}
