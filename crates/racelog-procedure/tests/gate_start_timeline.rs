//! The gate start flag timeline around a fixed start time.

use chrono::{Duration, TimeZone, Utc};
use racelog_core::{Author, EventLog, Flag, RaceId, TimePoint};
use racelog_procedure::{
    FlagPole, GateStartConfiguration, GateStartProcedure, RacingProcedure, StateEventName,
};
use std::sync::Arc;

fn start() -> TimePoint {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0)
        .single()
        .expect("valid start")
}

fn gate_start() -> Arc<GateStartProcedure> {
    let log = Arc::new(EventLog::new(RaceId::new("gate-timeline")));
    GateStartProcedure::new(log, Author::new("committee", 3), GateStartConfiguration::default())
}

#[test]
fn papa_is_up_between_four_and_one_minutes() {
    let gate = gate_start();
    let flags = gate.active_flags(start(), start() - Duration::minutes(2));
    insta::assert_json_snapshot!(flags, @r#"
    {
      "current": [
        {
          "upper": "CLASS",
          "lower": "GOLF",
          "displayed": true
        },
        {
          "upper": "PAPA",
          "lower": "NONE",
          "displayed": true
        }
      ],
      "current_since": "2024-06-01T11:56:00Z",
      "next": [
        {
          "upper": "CLASS",
          "lower": "GOLF",
          "displayed": true
        },
        {
          "upper": "PAPA",
          "lower": "NONE",
          "displayed": false
        }
      ],
      "next_change_at": "2024-06-01T11:59:00Z"
    }
    "#);
}

#[test]
fn golf_stays_up_until_gate_shutdown() {
    let gate = gate_start();
    let flags = gate.active_flags(start(), start() + Duration::minutes(3));
    insta::assert_json_snapshot!(flags, @r#"
    {
      "current": [
        {
          "upper": "GOLF",
          "lower": "NONE",
          "displayed": true
        }
      ],
      "current_since": "2024-06-01T12:00:00Z",
      "next": [
        {
          "upper": "GOLF",
          "lower": "NONE",
          "displayed": false
        }
      ],
      "next_change_at": "2024-06-01T12:06:00Z"
    }
    "#);
}

#[test]
fn timeline_settles_after_shutdown() {
    let gate = gate_start();
    let flags = gate.active_flags(start(), start() + Duration::minutes(10));
    insta::assert_json_snapshot!(flags, @r#"
    {
      "current": [
        {
          "upper": "GOLF",
          "lower": "NONE",
          "displayed": false
        }
      ],
      "current_since": "2024-06-01T12:06:00Z",
      "next": [],
      "next_change_at": null
    }
    "#);
}

#[test]
fn each_interval_hands_over_to_the_next() {
    let gate = gate_start();
    let mut now = start() - Duration::minutes(12);
    let mut transitions = Vec::new();
    while let Some(next_change) = gate.active_flags(start(), now).next_change_at {
        transitions.push(next_change);
        let entered = gate.active_flags(start(), next_change);
        assert_eq!(entered.current_since, Some(next_change));
        now = next_change;
    }
    assert_eq!(
        transitions,
        vec![
            start() - Duration::minutes(8),
            start() - Duration::minutes(4),
            start() - Duration::minutes(1),
            start(),
            start() + Duration::minutes(6),
        ]
    );
}

#[test]
fn recorded_gate_timing_moves_the_shutdown() {
    let gate = gate_start();
    gate.set_gate_line_opening_times(
        start() - Duration::minutes(20),
        Duration::minutes(7),
        Duration::minutes(3),
    )
    .expect("non-negative timing");

    assert!(gate.gate_line_opening_times_set());
    assert_eq!(gate.gate_shutdown_at(start()), start() + Duration::minutes(10));
    let flags = gate.active_flags(start(), start() + Duration::minutes(8));
    assert_eq!(flags.current, vec![FlagPole::new(Flag::Golf, true)]);
}

#[test]
fn start_events_cover_the_whole_sequence() {
    let gate = gate_start();
    let events = gate.create_start_state_events(start());
    let names: Vec<StateEventName> = events.iter().map(|event| event.name).collect();
    assert_eq!(
        names,
        vec![
            StateEventName::GateClassOverGolfUp,
            StateEventName::GatePapaUp,
            StateEventName::GatePapaDown,
            StateEventName::Start,
        ]
    );
    assert!(events.windows(2).all(|pair| pair[0].at < pair[1].at));
}
