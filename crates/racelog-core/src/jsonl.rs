//! Race logs on disk: one JSON event per line, oldest first.
//!
//! While a race is sailed, lines are only ever appended. A log is rewritten as
//! a whole only when it is saved from memory. Derived state is never written.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::event::{EventId, RaceLogEvent};
use crate::log::EventLog;

#[derive(Debug, Error)]
pub enum JsonlError {
    #[error("{}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("line {line}: {source}")]
    Read {
        line: usize,
        #[source]
        source: io::Error,
    },

    #[error("line {line}: not a race log event: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("line {line}: event {id} was already read on line {first_line}")]
    DuplicateEvent {
        line: usize,
        id: EventId,
        first_line: usize,
    },

    #[error("event {id} cannot be encoded: {source}")]
    Encode {
        id: EventId,
        #[source]
        source: serde_json::Error,
    },

    #[error("writing event {id}: {source}")]
    Write {
        id: EventId,
        #[source]
        source: io::Error,
    },
}

/// Parse a race log. Blank lines and `#` comments are skipped.
///
/// An event id may appear once per log; a repeated id is reported with both
/// line numbers.
pub fn read_events(reader: impl BufRead) -> Result<Vec<RaceLogEvent>, JsonlError> {
    let mut events = Vec::new();
    let mut first_seen: HashMap<EventId, usize> = HashMap::new();

    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let text = line.map_err(|source| JsonlError::Read {
            line: line_no,
            source,
        })?;
        let text = text.trim();
        if text.is_empty() || text.starts_with('#') {
            continue;
        }

        let event: RaceLogEvent =
            serde_json::from_str(text).map_err(|source| JsonlError::Parse {
                line: line_no,
                source,
            })?;
        match first_seen.entry(event.id()) {
            Entry::Occupied(first) => {
                return Err(JsonlError::DuplicateEvent {
                    line: line_no,
                    id: event.id(),
                    first_line: *first.get(),
                });
            }
            Entry::Vacant(slot) => {
                slot.insert(line_no);
            }
        }
        events.push(event);
    }
    Ok(events)
}

pub fn write_events<'a>(
    writer: &mut impl Write,
    events: impl IntoIterator<Item = &'a RaceLogEvent>,
) -> Result<(), JsonlError> {
    for event in events {
        write_line(writer, event)?;
    }
    Ok(())
}

fn write_line(writer: &mut impl Write, event: &RaceLogEvent) -> Result<(), JsonlError> {
    let mut line = serde_json::to_vec(event).map_err(|source| JsonlError::Encode {
        id: event.id(),
        source,
    })?;
    line.push(b'\n');
    writer.write_all(&line).map_err(|source| JsonlError::Write {
        id: event.id(),
        source,
    })
}

pub fn read_events_from_path(path: impl AsRef<Path>) -> Result<Vec<RaceLogEvent>, JsonlError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| JsonlError::File {
        path: path.to_path_buf(),
        source,
    })?;
    read_events(BufReader::new(file))
}

/// Add one event to the end of a log file, creating the file if needed.
pub fn append_event_to_path(
    path: impl AsRef<Path>,
    event: &RaceLogEvent,
) -> Result<(), JsonlError> {
    let path = path.as_ref();
    let file_error = |source| JsonlError::File {
        path: path.to_path_buf(),
        source,
    };
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(file_error)?;
    write_line(&mut file, event)?;
    file.sync_data().map_err(file_error)
}

/// Save a log's events, oldest first.
pub fn write_log_to_path(path: impl AsRef<Path>, log: &EventLog) -> Result<(), JsonlError> {
    let events: Vec<RaceLogEvent> = log.read().ascending().cloned().collect();
    write_events_to_path(path, &events)
}

/// Replace the file at `path` with `events`.
///
/// The events go to a `.partial` sibling first, which is renamed over `path`
/// once synced. Readers never see a half-written log.
pub fn write_events_to_path(
    path: impl AsRef<Path>,
    events: &[RaceLogEvent],
) -> Result<(), JsonlError> {
    let path = path.as_ref();
    let partial = partial_path(path);

    let outcome = write_synced(&partial, events).and_then(|()| {
        fs::rename(&partial, path).map_err(|source| JsonlError::File {
            path: path.to_path_buf(),
            source,
        })
    });
    if outcome.is_err() {
        let _ = fs::remove_file(&partial);
    } else {
        debug!(path = %path.display(), events = events.len(), "saved race log");
    }
    outcome
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}

fn write_synced(path: &Path, events: &[RaceLogEvent]) -> Result<(), JsonlError> {
    let file_error = |source| JsonlError::File {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = BufWriter::new(File::create(path).map_err(file_error)?);
    write_events(&mut writer, events)?;
    let file = writer
        .into_inner()
        .map_err(|error| file_error(error.into_error()))?;
    file.sync_all().map_err(file_error)
}

/// Load persisted events into `log` without notifying its listeners.
///
/// Events the log already holds are skipped. Returns how many were added.
pub fn replay_into(log: &EventLog, events: impl IntoIterator<Item = RaceLogEvent>) -> usize {
    let added = events
        .into_iter()
        .map(|event| log.load(event))
        .filter(|added| *added)
        .count();
    debug!(race = %log.race_id(), added, "replayed events");
    added
}
