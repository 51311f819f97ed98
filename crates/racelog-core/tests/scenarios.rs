//! End-to-end scenarios over a shared registry of race logs.

use chrono::{Duration, TimeZone, Utc};
use racelog_core::{
    Analyzer, Author, EventId, EventLog, FinishedTimeFinder, ManualClock, RaceId, RaceLogEvent,
    RaceLogResolver, RaceRegistry, RaceStatus, RaceStatusAnalyzer, ResolutionFailed, StartPhase,
    StartTimeFinder, TimePoint,
};
use std::sync::Arc;

fn at(secs: i64) -> TimePoint {
    Utc.timestamp_opt(secs, 0).single().expect("valid timestamp")
}

struct NoStartPhase;

impl StartPhase for NoStartPhase {
    fn is_startphase_active(&self, _start_time: TimePoint, _now: TimePoint) -> bool {
        false
    }
}

fn registry() -> Arc<RaceRegistry> {
    Arc::new(RaceRegistry::new())
}

fn resolver(registry: &Arc<RaceRegistry>) -> Arc<dyn RaceLogResolver> {
    Arc::clone(registry) as Arc<dyn RaceLogResolver>
}

#[test]
fn explicit_finished_overrides_running() {
    let registry = registry();
    let log = registry.get_or_create(&RaceId::new("r"));
    let author = Author::new("a", 2);
    log.append(RaceLogEvent::start_time(author.clone(), at(100), 0, at(100)));
    log.append(RaceLogEvent::status_change(
        author,
        at(200),
        0,
        RaceStatus::Finished,
    ));

    let clock = Arc::new(ManualClock::new(at(150)));
    let analyzer = RaceStatusAnalyzer::new(
        resolver(&registry),
        Arc::clone(&log),
        clock,
        Arc::new(NoStartPhase),
    );
    let reading = analyzer.analyze().expect("status should resolve");
    assert_eq!(reading.status, RaceStatus::Finished);
    assert_eq!(reading.evaluated_at, at(150));
    assert_eq!(FinishedTimeFinder::new(log).analyze(), Some(at(200)));
}

#[test]
fn higher_rank_start_time_wins_over_later_lower_rank() {
    let registry = registry();
    let log = registry.get_or_create(&RaceId::new("r"));
    log.append(RaceLogEvent::start_time(
        Author::new("shore", 1),
        at(50),
        0,
        at(50),
    ));
    log.append(RaceLogEvent::start_time(
        Author::new("committee", 5),
        at(40),
        0,
        at(40),
    ));

    let result = StartTimeFinder::new(resolver(&registry), log)
        .analyze()
        .expect("start time should resolve");
    assert_eq!(result.start_time(), Some(at(40)));
}

#[test]
fn dependency_on_race_without_start_reports_no_start_time() {
    let registry = registry();
    registry.get_or_create(&RaceId::new("y"));
    let x = registry.get_or_create(&RaceId::new("x"));
    x.append(RaceLogEvent::dependent_start_time(
        Author::new("committee", 3),
        at(10),
        0,
        RaceId::new("y"),
        Duration::seconds(600),
    ));

    let result = StartTimeFinder::new(resolver(&registry), x)
        .analyze()
        .expect("resolution should complete");
    assert_eq!(result.failure(), Some(&ResolutionFailed::NoStartTimeSet));
    assert_eq!(result.depends_on(), &[RaceId::new("y")]);
}

#[test]
fn revoke_of_never_added_event_changes_nothing() {
    let registry = registry();
    let log = registry.get_or_create(&RaceId::new("r"));
    let author = Author::new("committee", 3);
    log.append(RaceLogEvent::start_time(author.clone(), at(10), 0, at(500)));
    log.append(RaceLogEvent::revoke(author, at(20), 0, EventId::new(), None));

    assert_eq!(log.len(), 2);
    let result = StartTimeFinder::new(resolver(&registry), log)
        .analyze()
        .expect("start time should resolve");
    assert_eq!(result.start_time(), Some(at(500)));
}

#[test]
fn revoked_start_time_falls_back_to_earlier_claim() {
    let registry = registry();
    let log = registry.get_or_create(&RaceId::new("r"));
    let author = Author::new("committee", 3);
    log.append(RaceLogEvent::start_time(author.clone(), at(10), 0, at(500)));
    let correction = RaceLogEvent::start_time(author.clone(), at(20), 0, at(900));
    let correction_id = correction.id();
    log.append(correction);
    log.append(RaceLogEvent::revoke(author, at(30), 0, correction_id, None));

    let result = StartTimeFinder::new(resolver(&registry), log)
        .analyze()
        .expect("start time should resolve");
    assert_eq!(result.start_time(), Some(at(500)));
}

#[test]
fn concurrent_appends_are_all_visible_afterwards() {
    let log = Arc::new(EventLog::new(RaceId::new("r")));
    let writers: Vec<_> = (0..4)
        .map(|writer| {
            let log = Arc::clone(&log);
            std::thread::spawn(move || {
                for i in 0..50 {
                    log.append(RaceLogEvent::tag(
                        Author::new(format!("writer-{writer}"), writer),
                        at(i),
                        0,
                        "tick",
                        "",
                    ));
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().expect("writer thread should not panic");
    }

    let snapshot = log.read();
    assert_eq!(snapshot.len(), 200);
    let times: Vec<TimePoint> = snapshot.ascending().map(|e| e.logical_time()).collect();
    assert!(times.windows(2).all(|pair| pair[0] <= pair[1]));
}
