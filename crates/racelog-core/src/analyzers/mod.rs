//! Concrete finders built on [`LogAnalyzer`](crate::analyzer::LogAnalyzer).

pub mod finish_times;
pub mod gate_opening;
pub mod last_flag;
pub mod pathfinder;
pub mod procedure_type;
pub mod race_status;
pub mod start_time;

pub use finish_times::{FinishedTimeFinder, FinishingTimeFinder};
pub use gate_opening::GateLineOpeningTimeFinder;
pub use last_flag::{FlagReading, LastFlagFinder};
pub use pathfinder::PathfinderFinder;
pub use procedure_type::RacingProcedureTypeAnalyzer;
pub use race_status::{RaceStatusAnalyzer, StatusReading, derive_status};
pub use start_time::{ResolutionFailed, StartTimeFinder, StartTimeFinderResult};
