pub mod flags;
pub mod schedule;
pub mod status;
