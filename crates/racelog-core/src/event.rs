//! Race log events: the immutable facts the log is made of.
//!
//! Every event carries an id, its author, the wall-clock receipt time
//! (`created_at`, audit only), the logical time used for business ordering,
//! and the pass it belongs to. The payload is a closed set of variants
//! ([`EventKind`]); analyzers match on it exhaustively.
//!
//! Events serialize as one flat JSON object with a `kind` tag. That layout is
//! the replay contract: all derived state is recomputed from it.

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::author::Author;
use crate::clock::TimePoint;

/// Numbered attempt at running a race.
pub type PassId = u32;

/// Pass every log starts in.
pub const DEFAULT_PASS_ID: PassId = 0;

/// Opaque, never reused event identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifies the race a log belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RaceId(String);

impl RaceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle status of a race.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RaceStatus {
    Unscheduled,
    Prescheduled,
    Scheduled,
    Startphase,
    Running,
    Finishing,
    Finished,
}

impl RaceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RaceStatus::Unscheduled => "UNSCHEDULED",
            RaceStatus::Prescheduled => "PRESCHEDULED",
            RaceStatus::Scheduled => "SCHEDULED",
            RaceStatus::Startphase => "STARTPHASE",
            RaceStatus::Running => "RUNNING",
            RaceStatus::Finishing => "FINISHING",
            RaceStatus::Finished => "FINISHED",
        }
    }

    /// Explicit statuses that beat anything derived from the clock.
    pub fn overrides_time(&self) -> bool {
        matches!(self, RaceStatus::Finishing | RaceStatus::Finished)
    }
}

impl fmt::Display for RaceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signal flags shown by the race committee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Flag {
    None,
    Class,
    Golf,
    Papa,
    India,
    Zulu,
    Black,
    Uniform,
    Xray,
    Blue,
    Ap,
    FirstSubstitute,
}

impl Flag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Flag::None => "NONE",
            Flag::Class => "CLASS",
            Flag::Golf => "GOLF",
            Flag::Papa => "PAPA",
            Flag::India => "INDIA",
            Flag::Zulu => "ZULU",
            Flag::Black => "BLACK",
            Flag::Uniform => "UNIFORM",
            Flag::Xray => "XRAY",
            Flag::Blue => "BLUE",
            Flag::Ap => "AP",
            Flag::FirstSubstitute => "FIRST_SUBSTITUTE",
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rule set governing the pre-start signals of a race.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RacingProcedureType {
    #[default]
    Rrs26,
    GateStart,
}

impl RacingProcedureType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RacingProcedureType::Rrs26 => "rrs26",
            RacingProcedureType::GateStart => "gate_start",
        }
    }
}

impl fmt::Display for RacingProcedureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gate timing relative to the start: how long the gate launch runs, and how
/// long golf stays up after the launch stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GateLineOpeningTimes {
    #[serde(rename = "gate_launch_stop_ms", with = "duration_millis")]
    pub gate_launch_stop: Duration,
    #[serde(rename = "golf_down_ms", with = "duration_millis")]
    pub golf_down: Duration,
}

impl GateLineOpeningTimes {
    pub fn new(gate_launch_stop: Duration, golf_down: Duration) -> Self {
        Self {
            gate_launch_stop,
            golf_down,
        }
    }
}

/// Payload of a race log event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    StatusChange {
        next: RaceStatus,
    },
    StartTime {
        start_time: TimePoint,
    },
    DependentStartTime {
        depends_on: RaceId,
        #[serde(rename = "offset_ms", with = "duration_millis")]
        offset: Duration,
    },
    GateLineOpeningTime {
        times: GateLineOpeningTimes,
    },
    Pathfinder {
        sail_id: String,
    },
    Tag {
        tag: String,
        #[serde(default, skip_serializing_if = "String::is_empty")]
        comment: String,
    },
    Flag {
        upper: Flag,
        lower: Flag,
        displayed: bool,
    },
    RacingProcedureChanged {
        procedure: RacingProcedureType,
    },
    PassChange,
    Revoke {
        target: EventId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::StatusChange { .. } => "status_change",
            EventKind::StartTime { .. } => "start_time",
            EventKind::DependentStartTime { .. } => "dependent_start_time",
            EventKind::GateLineOpeningTime { .. } => "gate_line_opening_time",
            EventKind::Pathfinder { .. } => "pathfinder",
            EventKind::Tag { .. } => "tag",
            EventKind::Flag { .. } => "flag",
            EventKind::RacingProcedureChanged { .. } => "racing_procedure_changed",
            EventKind::PassChange => "pass_change",
            EventKind::Revoke { .. } => "revoke",
        }
    }

    /// Pass changes restart the race and cannot be taken back.
    pub fn is_revokable(&self) -> bool {
        !matches!(self, EventKind::PassChange)
    }
}

/// One immutable fact in a race log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceLogEvent {
    id: EventId,
    author: Author,
    created_at: TimePoint,
    logical_time: TimePoint,
    pass_id: PassId,
    #[serde(flatten)]
    kind: EventKind,
}

impl RaceLogEvent {
    /// Create a new event with a fresh id, received now.
    pub fn new(author: Author, logical_time: TimePoint, pass_id: PassId, kind: EventKind) -> Self {
        Self {
            id: EventId::new(),
            author,
            created_at: Utc::now(),
            logical_time,
            pass_id,
            kind,
        }
    }

    /// Rebuild an event exactly as it was persisted.
    pub fn restore(
        id: EventId,
        author: Author,
        created_at: TimePoint,
        logical_time: TimePoint,
        pass_id: PassId,
        kind: EventKind,
    ) -> Self {
        Self {
            id,
            author,
            created_at,
            logical_time,
            pass_id,
            kind,
        }
    }

    pub fn status_change(
        author: Author,
        logical_time: TimePoint,
        pass_id: PassId,
        next: RaceStatus,
    ) -> Self {
        Self::new(author, logical_time, pass_id, EventKind::StatusChange { next })
    }

    pub fn start_time(
        author: Author,
        logical_time: TimePoint,
        pass_id: PassId,
        start_time: TimePoint,
    ) -> Self {
        Self::new(author, logical_time, pass_id, EventKind::StartTime { start_time })
    }

    pub fn dependent_start_time(
        author: Author,
        logical_time: TimePoint,
        pass_id: PassId,
        depends_on: RaceId,
        offset: Duration,
    ) -> Self {
        Self::new(
            author,
            logical_time,
            pass_id,
            EventKind::DependentStartTime { depends_on, offset },
        )
    }

    pub fn gate_line_opening_time(
        author: Author,
        logical_time: TimePoint,
        pass_id: PassId,
        times: GateLineOpeningTimes,
    ) -> Self {
        Self::new(
            author,
            logical_time,
            pass_id,
            EventKind::GateLineOpeningTime { times },
        )
    }

    pub fn pathfinder(
        author: Author,
        logical_time: TimePoint,
        pass_id: PassId,
        sail_id: impl Into<String>,
    ) -> Self {
        Self::new(
            author,
            logical_time,
            pass_id,
            EventKind::Pathfinder {
                sail_id: sail_id.into(),
            },
        )
    }

    pub fn tag(
        author: Author,
        logical_time: TimePoint,
        pass_id: PassId,
        tag: impl Into<String>,
        comment: impl Into<String>,
    ) -> Self {
        Self::new(
            author,
            logical_time,
            pass_id,
            EventKind::Tag {
                tag: tag.into(),
                comment: comment.into(),
            },
        )
    }

    pub fn flag(
        author: Author,
        logical_time: TimePoint,
        pass_id: PassId,
        upper: Flag,
        lower: Flag,
        displayed: bool,
    ) -> Self {
        Self::new(
            author,
            logical_time,
            pass_id,
            EventKind::Flag {
                upper,
                lower,
                displayed,
            },
        )
    }

    pub fn procedure_changed(
        author: Author,
        logical_time: TimePoint,
        pass_id: PassId,
        procedure: RacingProcedureType,
    ) -> Self {
        Self::new(
            author,
            logical_time,
            pass_id,
            EventKind::RacingProcedureChanged { procedure },
        )
    }

    pub fn pass_change(author: Author, logical_time: TimePoint, pass_id: PassId) -> Self {
        Self::new(author, logical_time, pass_id, EventKind::PassChange)
    }

    pub fn revoke(
        author: Author,
        logical_time: TimePoint,
        pass_id: PassId,
        target: EventId,
        reason: Option<String>,
    ) -> Self {
        Self::new(
            author,
            logical_time,
            pass_id,
            EventKind::Revoke { target, reason },
        )
    }

    pub fn id(&self) -> EventId {
        self.id
    }

    pub fn author(&self) -> &Author {
        &self.author
    }

    pub fn created_at(&self) -> TimePoint {
        self.created_at
    }

    pub fn logical_time(&self) -> TimePoint {
        self.logical_time
    }

    pub fn pass_id(&self) -> PassId {
        self.pass_id
    }

    pub fn kind(&self) -> &EventKind {
        &self.kind
    }

    /// Target of a revoke event.
    pub fn revoked_target(&self) -> Option<EventId> {
        match &self.kind {
            EventKind::Revoke { target, .. } => Some(*target),
            _ => None,
        }
    }

    pub fn short_info(&self) -> String {
        format!(
            "{} by {} @ {} (pass {})",
            self.kind.name(),
            self.author.name,
            self.logical_time.to_rfc3339(),
            self.pass_id
        )
    }
}

impl fmt::Display for RaceLogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.short_info(), self.id)
    }
}

mod duration_millis {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(value.num_milliseconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis = i64::deserialize(deserializer)?;
        Duration::try_milliseconds(millis)
            .ok_or_else(|| serde::de::Error::custom(format!("duration out of range: {millis}ms")))
    }
}
