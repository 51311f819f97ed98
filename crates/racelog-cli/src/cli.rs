use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "racelog",
    about = "Racelog: replay race event logs and inspect the derived race state",
    version
)]
pub struct Cli {
    /// Log library activity at debug level
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Where the race logs come from and which race to look at.
#[derive(Args, Clone)]
pub struct RaceArgs {
    /// Path to a race log JSONL file; repeat for races referenced by
    /// dependent start times. The race id is the file stem.
    #[arg(long = "log", required = true)]
    pub logs: Vec<String>,

    /// Race to inspect (defaults to the first log)
    #[arg(long)]
    pub race: Option<String>,

    /// Regatta configuration TOML
    #[arg(long)]
    pub config: Option<String>,

    /// Evaluate at this RFC 3339 instant instead of the system clock
    #[arg(long)]
    pub now: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show start time, status and racing procedure of a race
    Status {
        #[command(flatten)]
        race: RaceArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the flags the racing procedure displays at an instant
    Flags {
        #[command(flatten)]
        race: RaceArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the state events pending for a race
    Schedule {
        #[command(flatten)]
        race: RaceArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
