//! Start time resolution, including start times defined relative to another
//! race's start.

use chrono::Duration;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::analyzer::{Analyzer, AnalyzerError, LogAnalyzer, PassScope};
use crate::clock::TimePoint;
use crate::event::{EventKind, RaceId};
use crate::log::EventLog;
use crate::registry::RaceLogResolver;

/// Why a start time could not be determined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ResolutionFailed {
    /// No race along the dependency chain has a start time.
    NoStartTimeSet,
    /// The dependency chain returns to a race already on it. `chain` lists
    /// the races in resolution order, ending with the repeated one.
    CyclicDependency { chain: Vec<RaceId> },
}

/// Outcome of start time resolution. `depends_on` lists the races the answer
/// was derived from, nearest first; it is empty for a directly set start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StartTimeFinderResult {
    Resolved {
        start_time: TimePoint,
        depends_on: Vec<RaceId>,
    },
    Failed {
        failure: ResolutionFailed,
        depends_on: Vec<RaceId>,
    },
}

impl StartTimeFinderResult {
    pub fn start_time(&self) -> Option<TimePoint> {
        match self {
            StartTimeFinderResult::Resolved { start_time, .. } => Some(*start_time),
            StartTimeFinderResult::Failed { .. } => None,
        }
    }

    pub fn failure(&self) -> Option<&ResolutionFailed> {
        match self {
            StartTimeFinderResult::Resolved { .. } => None,
            StartTimeFinderResult::Failed { failure, .. } => Some(failure),
        }
    }

    pub fn depends_on(&self) -> &[RaceId] {
        match self {
            StartTimeFinderResult::Resolved { depends_on, .. }
            | StartTimeFinderResult::Failed { depends_on, .. } => depends_on,
        }
    }

    pub fn is_dependent(&self) -> bool {
        !self.depends_on().is_empty()
    }

    fn prefixed(self, race: RaceId) -> Self {
        match self {
            StartTimeFinderResult::Resolved {
                start_time,
                mut depends_on,
            } => {
                depends_on.insert(0, race);
                StartTimeFinderResult::Resolved {
                    start_time,
                    depends_on,
                }
            }
            StartTimeFinderResult::Failed {
                failure,
                mut depends_on,
            } => {
                depends_on.insert(0, race);
                StartTimeFinderResult::Failed {
                    failure,
                    depends_on,
                }
            }
        }
    }
}

enum StartClaim {
    Direct(TimePoint),
    Dependent { race: RaceId, offset: Duration },
}

/// Resolves a race's start time, following dependent start times through
/// the resolver.
#[derive(Clone)]
pub struct StartTimeFinder {
    resolver: Arc<dyn RaceLogResolver>,
    analyzer: LogAnalyzer,
}

impl StartTimeFinder {
    pub fn new(resolver: Arc<dyn RaceLogResolver>, log: Arc<EventLog>) -> Self {
        Self::with_scope(resolver, log, PassScope::Current)
    }

    pub fn with_scope(
        resolver: Arc<dyn RaceLogResolver>,
        log: Arc<EventLog>,
        scope: PassScope,
    ) -> Self {
        Self {
            resolver,
            analyzer: LogAnalyzer::with_scope(log, scope),
        }
    }

    pub fn race_id(&self) -> &RaceId {
        self.analyzer.log().race_id()
    }

    /// Resolve with `visited` being the races whose resolution led here.
    ///
    /// This log's read lock is released before any referenced race is
    /// consulted, so two races' locks are never held at once.
    pub fn analyze_with_chain(
        &self,
        visited: &[RaceId],
    ) -> Result<StartTimeFinderResult, AnalyzerError> {
        let claim = self.analyzer.find(|event| match event.kind() {
            EventKind::StartTime { start_time } => Some(StartClaim::Direct(*start_time)),
            EventKind::DependentStartTime { depends_on, offset } => Some(StartClaim::Dependent {
                race: depends_on.clone(),
                offset: *offset,
            }),
            _ => None,
        });

        let (race, offset) = match claim {
            None => {
                trace!(race = %self.race_id(), "no start time set");
                return Ok(StartTimeFinderResult::Failed {
                    failure: ResolutionFailed::NoStartTimeSet,
                    depends_on: Vec::new(),
                });
            }
            Some(StartClaim::Direct(start_time)) => {
                return Ok(StartTimeFinderResult::Resolved {
                    start_time,
                    depends_on: Vec::new(),
                });
            }
            Some(StartClaim::Dependent { race, offset }) => (race, offset),
        };

        let mut chain = visited.to_vec();
        chain.push(self.race_id().clone());
        if chain.contains(&race) {
            chain.push(race.clone());
            debug!(race = %self.race_id(), ?chain, "cyclic start time dependency");
            return Ok(StartTimeFinderResult::Failed {
                failure: ResolutionFailed::CyclicDependency { chain },
                depends_on: vec![race],
            });
        }

        let log = self
            .resolver
            .resolve(&race)
            .ok_or_else(|| AnalyzerError::UnknownRace(race.clone()))?;
        let upstream = StartTimeFinder::new(Arc::clone(&self.resolver), log)
            .analyze_with_chain(&chain)?
            .prefixed(race);

        match upstream {
            StartTimeFinderResult::Resolved {
                start_time,
                depends_on,
            } => {
                let start_time = start_time.checked_add_signed(offset).ok_or_else(|| {
                    AnalyzerError::OutOfRange {
                        race: self.race_id().clone(),
                    }
                })?;
                Ok(StartTimeFinderResult::Resolved {
                    start_time,
                    depends_on,
                })
            }
            failed => Ok(failed),
        }
    }
}

impl Analyzer for StartTimeFinder {
    type Output = Result<StartTimeFinderResult, AnalyzerError>;

    fn analyze(&self) -> Self::Output {
        self.analyze_with_chain(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::author::Author;
    use crate::event::RaceLogEvent;
    use crate::registry::RaceRegistry;
    use chrono::{TimeZone, Utc};

    fn at(secs: i64) -> TimePoint {
        Utc.timestamp_opt(secs, 0).single().expect("valid timestamp")
    }

    fn officer() -> Author {
        Author::new("officer", 2)
    }

    fn finder(registry: &Arc<RaceRegistry>, race: &str) -> StartTimeFinder {
        let log = registry.get_or_create(&RaceId::new(race));
        StartTimeFinder::new(Arc::clone(registry) as Arc<dyn RaceLogResolver>, log)
    }

    #[test]
    fn direct_start_time_resolves_without_dependencies() {
        let registry = Arc::new(RaceRegistry::new());
        registry
            .get_or_create(&RaceId::new("x"))
            .append(RaceLogEvent::start_time(officer(), at(10), 0, at(1_000)));

        let result = finder(&registry, "x").analyze().expect("resolution should run");
        assert_eq!(result.start_time(), Some(at(1_000)));
        assert!(!result.is_dependent());
    }

    #[test]
    fn dependent_start_time_adds_offset_through_chain() {
        let registry = Arc::new(RaceRegistry::new());
        registry
            .get_or_create(&RaceId::new("a"))
            .append(RaceLogEvent::start_time(officer(), at(10), 0, at(1_000)));
        registry.get_or_create(&RaceId::new("b")).append(
            RaceLogEvent::dependent_start_time(
                officer(),
                at(10),
                0,
                RaceId::new("a"),
                Duration::seconds(300),
            ),
        );
        registry.get_or_create(&RaceId::new("c")).append(
            RaceLogEvent::dependent_start_time(
                officer(),
                at(10),
                0,
                RaceId::new("b"),
                Duration::seconds(300),
            ),
        );

        let result = finder(&registry, "c").analyze().expect("resolution should run");
        assert_eq!(result.start_time(), Some(at(1_600)));
        assert_eq!(result.depends_on(), &[RaceId::new("b"), RaceId::new("a")]);
    }

    #[test]
    fn cycle_is_reported_not_recursed() {
        let registry = Arc::new(RaceRegistry::new());
        for (race, upstream) in [("x", "y"), ("y", "x")] {
            registry.get_or_create(&RaceId::new(race)).append(
                RaceLogEvent::dependent_start_time(
                    officer(),
                    at(10),
                    0,
                    RaceId::new(upstream),
                    Duration::seconds(60),
                ),
            );
        }

        let result = finder(&registry, "x").analyze().expect("resolution should run");
        assert_eq!(
            result.failure(),
            Some(&ResolutionFailed::CyclicDependency {
                chain: vec![RaceId::new("x"), RaceId::new("y"), RaceId::new("x")],
            })
        );
    }

    #[test]
    fn unknown_reference_is_an_error() {
        let registry = Arc::new(RaceRegistry::new());
        registry.get_or_create(&RaceId::new("x")).append(
            RaceLogEvent::dependent_start_time(
                officer(),
                at(10),
                0,
                RaceId::new("ghost"),
                Duration::zero(),
            ),
        );

        let err = finder(&registry, "x")
            .analyze()
            .expect_err("unknown race must not resolve");
        assert_eq!(err, AnalyzerError::UnknownRace(RaceId::new("ghost")));
    }
}
