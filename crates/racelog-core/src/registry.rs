//! Lookup of race logs by race id, for cross-race start time resolution.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::event::RaceId;
use crate::log::EventLog;

/// Resolves a race reference to that race's log.
pub trait RaceLogResolver: Send + Sync {
    fn resolve(&self, race: &RaceId) -> Option<Arc<EventLog>>;
}

/// In-memory resolver holding every known race's log.
#[derive(Default)]
pub struct RaceRegistry {
    logs: RwLock<BTreeMap<RaceId, Arc<EventLog>>>,
}

impl RaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a log under its own race id, replacing any earlier one.
    pub fn register(&self, log: Arc<EventLog>) -> Option<Arc<EventLog>> {
        let race = log.race_id().clone();
        debug!(%race, "registering race log");
        self.logs.write().insert(race, log)
    }

    pub fn get_or_create(&self, race: &RaceId) -> Arc<EventLog> {
        if let Some(log) = self.logs.read().get(race) {
            return Arc::clone(log);
        }
        let mut logs = self.logs.write();
        Arc::clone(
            logs.entry(race.clone())
                .or_insert_with(|| Arc::new(EventLog::new(race.clone()))),
        )
    }

    pub fn races(&self) -> Vec<RaceId> {
        self.logs.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.logs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.logs.read().is_empty()
    }
}

impl RaceLogResolver for RaceRegistry {
    fn resolve(&self, race: &RaceId) -> Option<Arc<EventLog>> {
        self.logs.read().get(race).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_create_returns_the_same_log() {
        let registry = RaceRegistry::new();
        let race = RaceId::new("r-1");
        let first = registry.get_or_create(&race);
        let second = registry.get_or_create(&race);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.races(), vec![race.clone()]);
        assert!(registry.resolve(&race).is_some());
        assert!(registry.resolve(&RaceId::new("missing")).is_none());
    }
}
