use chrono::{DateTime, Utc};
use racelog_core::{
    Author, Clock, EventLog, ManualClock, RaceId, RaceLogResolver, RaceRegistry, TimePoint,
    read_events_from_path, replay_into,
};
use racelog_procedure::{RaceState, RegattaConfiguration};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::cli::RaceArgs;

/// Author of anything the CLI's race state writes while evaluating. The
/// state is never persisted.
const CLI_AUTHOR: &str = "racelog-cli";

pub fn parse_now_or_exit(now: Option<&str>) -> TimePoint {
    match now {
        None => Utc::now(),
        Some(text) => DateTime::parse_from_rfc3339(text)
            .map(|parsed| parsed.with_timezone(&Utc))
            .unwrap_or_else(|e| {
                eprintln!("error: invalid --now {text:?}: {e}");
                std::process::exit(1);
            }),
    }
}

pub fn load_config_or_exit(path: Option<&str>) -> RegattaConfiguration {
    match path {
        None => RegattaConfiguration::default(),
        Some(path) => RegattaConfiguration::load(path).unwrap_or_else(|e| {
            eprintln!("error: {e}");
            std::process::exit(1);
        }),
    }
}

fn race_id_for(path: &Path) -> RaceId {
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    RaceId::new(stem)
}

/// Replay every log into a registry and build the race state of the
/// selected race, evaluated at `now`.
pub fn load_race_or_exit(args: &RaceArgs, now: TimePoint) -> Arc<RaceState> {
    let registry = Arc::new(RaceRegistry::new());
    let mut first = None;

    for log_path in &args.logs {
        let path = Path::new(log_path);
        let events = read_events_from_path(path).unwrap_or_else(|e| {
            eprintln!("error: failed to read {}: {e}", path.display());
            std::process::exit(1);
        });
        let race = race_id_for(path);
        let log = Arc::new(EventLog::new(race.clone()));
        let loaded = replay_into(&log, events);
        debug!(%race, loaded, path = %path.display(), "replayed race log");
        if registry.register(log).is_some() {
            eprintln!("error: race {race} given more than once");
            std::process::exit(1);
        }
        first.get_or_insert(race);
    }

    let race = match (&args.race, first) {
        (Some(race), _) => RaceId::new(race.as_str()),
        (None, Some(first)) => first,
        (None, None) => {
            eprintln!("error: no race log given");
            std::process::exit(1);
        }
    };
    let Some(log) = registry.resolve(&race) else {
        eprintln!("error: no log for race {race}");
        std::process::exit(1);
    };

    let config = load_config_or_exit(args.config.as_deref());
    RaceState::new(
        log,
        registry as Arc<dyn RaceLogResolver>,
        Arc::new(ManualClock::new(now)) as Arc<dyn Clock>,
        Author::new(CLI_AUTHOR, 0),
        config,
    )
    .unwrap_or_else(|e| {
        eprintln!("error: {e}");
        std::process::exit(1);
    })
}

pub fn print_json_or_exit<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(e) => {
            eprintln!("error: failed to render JSON: {e}");
            std::process::exit(1);
        }
    }
}
