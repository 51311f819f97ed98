//! Shared machinery for deriving facts from a race log.
//!
//! Every finder resolves its answer the same way: among the unrevoked events
//! of the target pass that it selects, only the highest-ranked author's claims
//! count, and among those the most recent by logical time wins. That rule is
//! [`most_authoritative_recent`]; concrete analyzers only supply the selector.

use std::sync::Arc;

use crate::clock::TimePoint;
use crate::event::{PassId, RaceId, RaceLogEvent};
use crate::log::{EventLog, LogView};

/// Which pass an analyzer reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PassScope {
    /// Whatever pass is current when the analysis runs.
    #[default]
    Current,
    /// A historical (or future) pass.
    Fixed(PassId),
}

/// A derivation of one fact from a race log.
pub trait Analyzer {
    type Output;

    fn analyze(&self) -> Self::Output;
}

/// Errors that prevent an analysis from producing any answer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnalyzerError {
    #[error("race {0} is not known to the resolver")]
    UnknownRace(RaceId),

    #[error("start time of {race} is out of range after applying its offset")]
    OutOfRange { race: RaceId },
}

/// Whether the start phase is running for a given start time.
///
/// Racing procedures provide this; the status analyzer consumes it.
pub trait StartPhase: Send + Sync {
    fn is_startphase_active(&self, start_time: TimePoint, now: TimePoint) -> bool;
}

/// A log bound to a pass scope, with the generic resolution rule on top.
#[derive(Clone)]
pub struct LogAnalyzer {
    log: Arc<EventLog>,
    scope: PassScope,
}

impl LogAnalyzer {
    pub fn new(log: Arc<EventLog>) -> Self {
        Self {
            log,
            scope: PassScope::Current,
        }
    }

    pub fn with_scope(log: Arc<EventLog>, scope: PassScope) -> Self {
        Self { log, scope }
    }

    pub fn log(&self) -> &Arc<EventLog> {
        &self.log
    }

    pub fn scope(&self) -> PassScope {
        self.scope
    }

    /// Resolve the authoritative most recent value `select` extracts from
    /// the scoped, unrevoked view. The read lock is held for the traversal
    /// and released before returning.
    pub fn find<T>(&self, select: impl Fn(&RaceLogEvent) -> Option<T>) -> Option<T> {
        let snapshot = self.log.read();
        let pass = match self.scope {
            PassScope::Current => snapshot.current_pass(),
            PassScope::Fixed(pass) => pass,
        };
        let view = snapshot.unrevoked().in_pass(pass);
        most_authoritative_recent(&view, select)
    }
}

/// Authority-then-recency resolution over a view.
///
/// Walks newest first. An event only replaces the current answer when its
/// author ranks strictly higher, so among equally ranked claims the most
/// recent is kept, and any higher-ranked claim beats any number of more
/// recent lower-ranked ones.
pub fn most_authoritative_recent<T>(
    view: &LogView<'_>,
    select: impl Fn(&RaceLogEvent) -> Option<T>,
) -> Option<T> {
    let mut best: Option<(u32, T)> = None;
    for event in view.descending() {
        let rank = event.author().rank;
        if let Some((best_rank, _)) = &best
            && *best_rank >= rank
        {
            continue;
        }
        if let Some(value) = select(event) {
            best = Some((rank, value));
        }
    }
    best.map(|(_, value)| value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::author::Author;
    use crate::event::{EventKind, RaceStatus};
    use chrono::{TimeZone, Utc};

    fn at(secs: i64) -> TimePoint {
        Utc.timestamp_opt(secs, 0).single().expect("valid timestamp")
    }

    fn status(event: &RaceLogEvent) -> Option<RaceStatus> {
        match event.kind() {
            EventKind::StatusChange { next } => Some(*next),
            _ => None,
        }
    }

    #[test]
    fn empty_log_yields_nothing() {
        let analyzer = LogAnalyzer::new(Arc::new(EventLog::new(RaceId::new("r"))));
        assert_eq!(analyzer.find(status), None);
    }

    #[test]
    fn higher_rank_hides_newer_lower_rank_claims() {
        let log = Arc::new(EventLog::new(RaceId::new("r")));
        log.append(RaceLogEvent::status_change(
            Author::new("committee", 5),
            at(10),
            0,
            RaceStatus::Running,
        ));
        log.append(RaceLogEvent::status_change(
            Author::new("shore", 1),
            at(20),
            0,
            RaceStatus::Finished,
        ));
        // Irrelevant events from higher authors do not hide anything.
        log.append(RaceLogEvent::tag(Author::new("jury", 9), at(30), 0, "x", ""));

        let analyzer = LogAnalyzer::new(Arc::clone(&log));
        assert_eq!(analyzer.find(status), Some(RaceStatus::Running));
    }

    #[test]
    fn fixed_scope_reads_historical_pass() {
        let log = Arc::new(EventLog::new(RaceId::new("r")));
        let officer = Author::new("officer", 3);
        log.append(RaceLogEvent::status_change(
            officer.clone(),
            at(10),
            0,
            RaceStatus::Running,
        ));
        log.append(RaceLogEvent::pass_change(officer, at(20), 1));

        assert_eq!(LogAnalyzer::new(Arc::clone(&log)).find(status), None);
        assert_eq!(
            LogAnalyzer::with_scope(log, PassScope::Fixed(0)).find(status),
            Some(RaceStatus::Running)
        );
    }
}
