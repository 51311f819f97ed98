//! # racelog-core
//!
//! Per-race event log and the analyzers that derive race facts from it.
//!
//! This crate provides:
//! - `RaceLogEvent` and its closed set of payloads (the facts)
//! - `EventLog` (append-only, revocable, pass-scoped store behind a lock)
//! - `LogAnalyzer` and the authority-then-recency resolution rule
//! - Concrete finders: start time (with cross-race dependencies), finish
//!   times, status, gate timing, pathfinder, procedure type, flags
//! - JSONL replay
//!
//! Racing procedures and scheduling live in `racelog-procedure`.
//!
//! ## Data flow
//!
//! ```text
//! writers --append--> EventLog --read()--> LogSnapshot --view--> analyzers
//! ```

pub mod analyzer;
pub mod analyzers;
pub mod author;
pub mod clock;
pub mod event;
pub mod jsonl;
pub mod listeners;
pub mod log;
pub mod registry;

pub use analyzer::{
    Analyzer, AnalyzerError, LogAnalyzer, PassScope, StartPhase, most_authoritative_recent,
};
pub use analyzers::{
    FinishedTimeFinder, FinishingTimeFinder, FlagReading, GateLineOpeningTimeFinder,
    LastFlagFinder, PathfinderFinder, RaceStatusAnalyzer, RacingProcedureTypeAnalyzer,
    ResolutionFailed, StartTimeFinder, StartTimeFinderResult, StatusReading, derive_status,
};
pub use author::Author;
pub use clock::{Clock, ManualClock, SystemClock, TimePoint, saturating_offset};
pub use event::{
    DEFAULT_PASS_ID, EventId, EventKind, Flag, GateLineOpeningTimes, PassId, RaceId,
    RaceLogEvent, RaceStatus, RacingProcedureType,
};
pub use jsonl::{
    JsonlError, append_event_to_path, read_events, read_events_from_path, replay_into,
    write_events, write_events_to_path, write_log_to_path,
};
pub use listeners::{ListenerId, Listeners};
pub use log::{EventLog, LogError, LogSnapshot, LogView};
pub use registry::{RaceLogResolver, RaceRegistry};
