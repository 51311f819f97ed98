//! # racelog-procedure
//!
//! Racing procedures on top of `racelog-core`.
//!
//! This crate provides:
//! - `FlagPole` / `FlagPoleState` (what the committee boat shows, and when it
//!   changes next)
//! - `StateEvent` and the `StateEventScheduler` that releases them when due
//! - `Prerequisite` chains that gate a late start
//! - The `RacingProcedure` trait with `GateStartProcedure` and
//!   `Rrs26Procedure`
//! - `RaceState`, which ties a log, its procedure and the scheduler together
//! - `RegattaConfiguration`, loaded from TOML
//!
//! ## Data flow
//!
//! ```text
//! EventLog --append--> RacingProcedure::update --> cached facts, listeners
//!     \
//!      +----> RaceState::update --> start time, status --> scheduler
//!                                                           |
//!           RaceState::process_due(now) <--- due StateEvents +
//! ```

pub mod config;
pub mod flags;
pub mod prerequisite;
pub mod procedure;
pub mod race_state;
pub mod scheduler;
pub mod state_event;

pub use config::{ConfigError, GateStartConfiguration, RegattaConfiguration, Rrs26Configuration};
pub use flags::{FlagPole, FlagPoleState};
pub use prerequisite::{
    FulfillmentFunction, GateLaunchTimePrerequisite, NoMorePrerequisite, PathfinderPrerequisite,
    Prerequisite,
};
pub use procedure::{
    GateStartProcedure, INDIVIDUAL_RECALL_TIMEOUT_MINUTES, ProcedureError, ProcedureListener,
    ProcedurePhase, RacingProcedure, Rrs26Procedure, create_procedure,
};
pub use race_state::{RaceState, RaceStateListener};
pub use scheduler::StateEventScheduler;
pub use state_event::{StateEvent, StateEventName};
