use std::sync::Arc;

use crate::analyzer::{Analyzer, LogAnalyzer, PassScope};
use crate::clock::TimePoint;
use crate::event::{EventKind, RaceLogEvent, RaceStatus};
use crate::log::EventLog;

fn status_time(event: &RaceLogEvent, wanted: RaceStatus) -> Option<TimePoint> {
    match event.kind() {
        EventKind::StatusChange { next } if *next == wanted => Some(event.logical_time()),
        _ => None,
    }
}

/// Logical time at which the race was declared finished.
#[derive(Clone)]
pub struct FinishedTimeFinder {
    analyzer: LogAnalyzer,
}

impl FinishedTimeFinder {
    pub fn new(log: Arc<EventLog>) -> Self {
        Self::with_scope(log, PassScope::Current)
    }

    pub fn with_scope(log: Arc<EventLog>, scope: PassScope) -> Self {
        Self {
            analyzer: LogAnalyzer::with_scope(log, scope),
        }
    }
}

impl Analyzer for FinishedTimeFinder {
    type Output = Option<TimePoint>;

    fn analyze(&self) -> Option<TimePoint> {
        self.analyzer
            .find(|event| status_time(event, RaceStatus::Finished))
    }
}

/// Logical time at which the first boat started finishing.
#[derive(Clone)]
pub struct FinishingTimeFinder {
    analyzer: LogAnalyzer,
}

impl FinishingTimeFinder {
    pub fn new(log: Arc<EventLog>) -> Self {
        Self::with_scope(log, PassScope::Current)
    }

    pub fn with_scope(log: Arc<EventLog>, scope: PassScope) -> Self {
        Self {
            analyzer: LogAnalyzer::with_scope(log, scope),
        }
    }
}

impl Analyzer for FinishingTimeFinder {
    type Output = Option<TimePoint>;

    fn analyze(&self) -> Option<TimePoint> {
        self.analyzer
            .find(|event| status_time(event, RaceStatus::Finishing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::author::Author;
    use crate::event::RaceId;
    use chrono::{TimeZone, Utc};

    fn at(secs: i64) -> TimePoint {
        Utc.timestamp_opt(secs, 0).single().expect("valid timestamp")
    }

    #[test]
    fn finds_finished_and_finishing_independently() {
        let log = Arc::new(EventLog::new(RaceId::new("r")));
        let officer = Author::new("officer", 2);
        log.append(RaceLogEvent::status_change(
            officer.clone(),
            at(100),
            0,
            RaceStatus::Finishing,
        ));
        assert_eq!(FinishingTimeFinder::new(Arc::clone(&log)).analyze(), Some(at(100)));
        assert_eq!(FinishedTimeFinder::new(Arc::clone(&log)).analyze(), None);

        log.append(RaceLogEvent::status_change(
            officer,
            at(200),
            0,
            RaceStatus::Finished,
        ));
        assert_eq!(FinishedTimeFinder::new(log).analyze(), Some(at(200)));
    }
}
