use std::sync::Arc;

use crate::analyzer::{Analyzer, LogAnalyzer, PassScope};
use crate::clock::TimePoint;
use crate::event::{EventKind, Flag};
use crate::log::EventLog;

/// A flag event as resolved by [`LastFlagFinder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagReading {
    pub upper: Flag,
    pub lower: Flag,
    pub displayed: bool,
    pub at: TimePoint,
}

/// Most recent authoritative flag event whose upper flag is one of a set of
/// candidates. With RRS26 the candidates are the possible start-mode flags.
#[derive(Clone)]
pub struct LastFlagFinder {
    analyzer: LogAnalyzer,
    candidates: Vec<Flag>,
}

impl LastFlagFinder {
    pub fn new(log: Arc<EventLog>, candidates: impl Into<Vec<Flag>>) -> Self {
        Self {
            analyzer: LogAnalyzer::with_scope(log, PassScope::Current),
            candidates: candidates.into(),
        }
    }
}

impl Analyzer for LastFlagFinder {
    type Output = Option<FlagReading>;

    fn analyze(&self) -> Option<FlagReading> {
        self.analyzer.find(|event| match event.kind() {
            EventKind::Flag {
                upper,
                lower,
                displayed,
            } if self.candidates.contains(upper) => Some(FlagReading {
                upper: *upper,
                lower: *lower,
                displayed: *displayed,
                at: event.logical_time(),
            }),
            _ => None,
        })
    }
}
