//! The race log: an append-only, lockable event store for one race.
//!
//! Writers go through [`EventLog::append`], which holds the write lock only
//! for the insertion itself. Readers acquire a [`LogSnapshot`] with
//! [`EventLog::read`]; every traversal API lives on the snapshot, so there is
//! no way to walk the log without holding the read lock, and the lock is
//! released when the snapshot drops (including during unwinding).
//!
//! Ordering is by logical time, ties broken by insertion sequence.

use parking_lot::{RwLock, RwLockReadGuard};
use std::cell::OnceCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::author::Author;
use crate::clock::Clock;
use crate::event::{DEFAULT_PASS_ID, EventId, EventKind, PassId, RaceId, RaceLogEvent};
use crate::listeners::{ListenerId, Listeners};

/// Errors raised by the log's convenience mutations.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("event {target} cannot be revoked: {reason}")]
    NotRevokable { target: EventId, reason: String },

    #[error("{revoker} may not revoke event {target} authored by higher-ranked {author}")]
    InsufficientAuthority {
        target: EventId,
        revoker: String,
        author: String,
    },
}

type EventListener = dyn Fn(&RaceLogEvent) + Send + Sync;

struct Entry {
    seq: u64,
    event: Arc<RaceLogEvent>,
}

struct LogState {
    entries: Vec<Entry>,
    by_id: HashMap<EventId, Arc<RaceLogEvent>>,
    next_seq: u64,
    current_pass: PassId,
}

/// Append-only event store for one race.
pub struct EventLog {
    race_id: RaceId,
    state: RwLock<LogState>,
    listeners: Listeners<EventListener>,
}

impl EventLog {
    pub fn new(race_id: RaceId) -> Self {
        Self {
            race_id,
            state: RwLock::new(LogState {
                entries: Vec::new(),
                by_id: HashMap::new(),
                next_seq: 0,
                current_pass: DEFAULT_PASS_ID,
            }),
            listeners: Listeners::new(),
        }
    }

    pub fn race_id(&self) -> &RaceId {
        &self.race_id
    }

    /// Append an event and notify listeners.
    ///
    /// Content is never validated; the only refusal is an event whose id is
    /// already in the log, which returns `false`. Listeners run after the
    /// write lock is released.
    pub fn append(&self, event: RaceLogEvent) -> bool {
        let event = Arc::new(event);
        if !self.insert(Arc::clone(&event)) {
            return false;
        }
        self.listeners.notify(|listener| listener(event.as_ref()));
        true
    }

    /// Append without notifying listeners, for replay from persistence.
    pub fn load(&self, event: RaceLogEvent) -> bool {
        self.insert(Arc::new(event))
    }

    /// Append every event of `other` that this log does not hold yet.
    ///
    /// Returns the number of events added.
    pub fn merge(&self, other: &EventLog) -> usize {
        let incoming: Vec<Arc<RaceLogEvent>> = {
            let snapshot = other.read();
            snapshot
                .state
                .entries
                .iter()
                .map(|entry| Arc::clone(&entry.event))
                .collect()
        };
        let mut added = 0;
        for event in incoming {
            if self.insert(Arc::clone(&event)) {
                self.listeners.notify(|listener| listener(event.as_ref()));
                added += 1;
            }
        }
        added
    }

    fn insert(&self, event: Arc<RaceLogEvent>) -> bool {
        let mut state = self.state.write();
        if state.by_id.contains_key(&event.id()) {
            debug!(race = %self.race_id, event = %event, "event already in log, not added");
            return false;
        }

        let seq = state.next_seq;
        state.next_seq += 1;
        let position = state
            .entries
            .partition_point(|entry| entry.event.logical_time() <= event.logical_time());
        state.entries.insert(
            position,
            Entry {
                seq,
                event: Arc::clone(&event),
            },
        );
        state.by_id.insert(event.id(), Arc::clone(&event));

        if event.pass_id() > state.current_pass {
            debug!(
                race = %self.race_id,
                from = state.current_pass,
                to = event.pass_id(),
                "advancing current pass"
            );
            state.current_pass = event.pass_id();
        }

        if let Some(target) = event.revoked_target() {
            match state.by_id.get(&target) {
                None => warn!(
                    race = %self.race_id,
                    revoke = %event.id(),
                    %target,
                    "revoke refers to an event not in the log"
                ),
                Some(revoked) if revoked.logical_time() > event.logical_time() => warn!(
                    race = %self.race_id,
                    revoke = %event.id(),
                    %target,
                    "revoke precedes its target and has no effect"
                ),
                Some(_) => {}
            }
        }

        debug!(race = %self.race_id, event = %event, seq, "event added");
        true
    }

    /// Acquire a read snapshot. The read lock is held until it drops.
    pub fn read(&self) -> LogSnapshot<'_> {
        LogSnapshot {
            race_id: &self.race_id,
            state: self.state.read(),
            revoked: OnceCell::new(),
        }
    }

    pub fn current_pass(&self) -> PassId {
        self.state.read().current_pass
    }

    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().entries.is_empty()
    }

    /// Register an observer of appended events.
    pub fn add_listener(
        &self,
        listener: impl Fn(&RaceLogEvent) + Send + Sync + 'static,
    ) -> ListenerId {
        self.listeners.add(Arc::new(listener))
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    /// Start a new pass, e.g. after a general recall.
    ///
    /// Returns the new pass id.
    pub fn advance_pass(&self, author: Author, clock: &dyn Clock) -> PassId {
        let next = self.current_pass() + 1;
        self.append(RaceLogEvent::pass_change(author, clock.now(), next));
        next
    }

    /// Record a revocation of `target` in the current pass.
    ///
    /// Refuses to create the revoke when the target is known and either not
    /// revokable or authored by someone outranking `author`. An unknown
    /// target is recorded anyway; it may arrive later.
    pub fn revoke(
        &self,
        author: Author,
        target: EventId,
        reason: Option<String>,
        clock: &dyn Clock,
    ) -> Result<EventId, LogError> {
        let pass = {
            let snapshot = self.read();
            if let Some(revoked) = snapshot.event_by_id(target) {
                if !revoked.kind().is_revokable() {
                    return Err(LogError::NotRevokable {
                        target,
                        reason: format!("{} events are not revokable", revoked.kind().name()),
                    });
                }
                if revoked.author().outranks(&author) {
                    return Err(LogError::InsufficientAuthority {
                        target,
                        revoker: author.to_string(),
                        author: revoked.author().to_string(),
                    });
                }
            }
            snapshot.current_pass()
        };

        let event = RaceLogEvent::revoke(author, clock.now(), pass, target, reason);
        let id = event.id();
        self.append(event);
        Ok(id)
    }
}

/// Consistent, read-locked view of a log.
pub struct LogSnapshot<'a> {
    race_id: &'a RaceId,
    state: RwLockReadGuard<'a, LogState>,
    revoked: OnceCell<HashSet<EventId>>,
}

impl<'a> LogSnapshot<'a> {
    pub fn race_id(&self) -> &RaceId {
        self.race_id
    }

    pub fn current_pass(&self) -> PassId {
        self.state.current_pass
    }

    pub fn len(&self) -> usize {
        self.state.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.entries.is_empty()
    }

    pub fn event_by_id(&self, id: EventId) -> Option<&RaceLogEvent> {
        self.state.by_id.get(&id).map(|event| event.as_ref())
    }

    /// All events, oldest first.
    pub fn ascending(&self) -> impl DoubleEndedIterator<Item = &RaceLogEvent> + '_ {
        self.state.entries.iter().map(|entry| entry.event.as_ref())
    }

    /// All events, newest first.
    pub fn descending(&self) -> impl Iterator<Item = &RaceLogEvent> + '_ {
        self.ascending().rev()
    }

    /// Unfiltered view, the base for composed filters.
    pub fn all(&self) -> LogView<'_> {
        LogView {
            entries: &self.state.entries,
            filters: Vec::new(),
        }
    }

    /// View without revoke events and without events they revoke.
    pub fn unrevoked(&self) -> LogView<'_> {
        let revoked = self.revoked_ids();
        self.all().filter(move |event| {
            !matches!(event.kind(), EventKind::Revoke { .. }) && !revoked.contains(&event.id())
        })
    }

    /// Unrevoked view restricted to the current pass.
    pub fn current(&self) -> LogView<'_> {
        let pass = self.current_pass();
        self.unrevoked().in_pass(pass)
    }

    pub fn is_revoked(&self, id: EventId) -> bool {
        self.revoked_ids().contains(&id)
    }

    /// Ids hidden by an effective revoke, as of this snapshot.
    ///
    /// A revoke is effective unless it is itself revoked by an effective
    /// revoke. Revokes of unknown targets, or of targets logically later than
    /// the revoke, have no effect.
    pub fn revoked_ids(&self) -> &HashSet<EventId> {
        self.revoked
            .get_or_init(|| effective_revocations(&self.state))
    }
}

fn effective_revocations(state: &LogState) -> HashSet<EventId> {
    let mut revokers: HashMap<EventId, Vec<EventId>> = HashMap::new();
    for entry in &state.entries {
        let Some(target) = entry.event.revoked_target() else {
            continue;
        };
        if let Some(revoked) = state.by_id.get(&target)
            && revoked.logical_time() <= entry.event.logical_time()
        {
            revokers.entry(target).or_default().push(entry.event.id());
        }
    }

    let mut memo = HashMap::new();
    let mut visiting = HashSet::new();
    revokers
        .keys()
        .copied()
        .filter(|target| is_revoked(*target, &revokers, &mut memo, &mut visiting))
        .collect()
}

fn is_revoked(
    id: EventId,
    revokers: &HashMap<EventId, Vec<EventId>>,
    memo: &mut HashMap<EventId, bool>,
    visiting: &mut HashSet<EventId>,
) -> bool {
    if let Some(known) = memo.get(&id) {
        return *known;
    }
    // Only revokes sharing one logical time can form a cycle; none of them wins.
    if !visiting.insert(id) {
        return false;
    }
    let revoked = revokers.get(&id).is_some_and(|by| {
        by.iter()
            .any(|revoke| !is_revoked(*revoke, revokers, memo, visiting))
    });
    visiting.remove(&id);
    memo.insert(id, revoked);
    revoked
}

/// Filtered traversal over a snapshot. Filters compose without copying the
/// underlying events.
#[derive(Clone)]
pub struct LogView<'a> {
    entries: &'a [Entry],
    filters: Vec<Rc<dyn Fn(&RaceLogEvent) -> bool + 'a>>,
}

impl<'a> LogView<'a> {
    pub fn filter(mut self, predicate: impl Fn(&RaceLogEvent) -> bool + 'a) -> Self {
        self.filters.push(Rc::new(predicate));
        self
    }

    pub fn in_pass(self, pass: PassId) -> Self {
        self.filter(move |event| event.pass_id() == pass)
    }

    pub fn authored_by(self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.filter(move |event| event.author().name == name)
    }

    fn accepts(&self, event: &RaceLogEvent) -> bool {
        self.filters.iter().all(|predicate| predicate(event))
    }

    pub fn ascending(&self) -> impl DoubleEndedIterator<Item = &'a RaceLogEvent> + '_ {
        self.entries
            .iter()
            .map(|entry| entry.event.as_ref())
            .filter(move |event| self.accepts(event))
    }

    pub fn descending(&self) -> impl Iterator<Item = &'a RaceLogEvent> + '_ {
        self.ascending().rev()
    }

    pub fn is_empty(&self) -> bool {
        self.ascending().next().is_none()
    }

    pub fn count(&self) -> usize {
        self.ascending().count()
    }

    /// Insertion sequence of the events in view, oldest first.
    pub fn sequence_numbers(&self) -> Vec<u64> {
        self.entries
            .iter()
            .filter(|entry| self.accepts(&entry.event))
            .map(|entry| entry.seq)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ManualClock, TimePoint};
    use crate::event::RaceStatus;
    use chrono::{TimeZone, Utc};
    use parking_lot::Mutex;

    fn at(secs: i64) -> TimePoint {
        Utc.timestamp_opt(secs, 0).single().expect("valid timestamp")
    }

    fn officer() -> Author {
        Author::new("officer", 5)
    }

    fn log() -> EventLog {
        EventLog::new(RaceId::new("race-1"))
    }

    #[test]
    fn empty_log_traverses_to_nothing() {
        let log = log();
        let snapshot = log.read();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.ascending().count(), 0);
        assert!(snapshot.unrevoked().is_empty());
        assert_eq!(snapshot.current_pass(), DEFAULT_PASS_ID);
    }

    #[test]
    fn events_are_ordered_by_logical_time_then_insertion() {
        let log = log();
        let late = RaceLogEvent::tag(officer(), at(300), 0, "late", "");
        let first_tie = RaceLogEvent::tag(officer(), at(100), 0, "first", "");
        let second_tie = RaceLogEvent::tag(officer(), at(100), 0, "second", "");
        let (late_id, first_id, second_id) = (late.id(), first_tie.id(), second_tie.id());
        assert!(log.append(late));
        assert!(log.append(first_tie));
        assert!(log.append(second_tie));

        let snapshot = log.read();
        let ascending: Vec<EventId> = snapshot.ascending().map(|e| e.id()).collect();
        assert_eq!(ascending, vec![first_id, second_id, late_id]);
        let descending: Vec<EventId> = snapshot.descending().map(|e| e.id()).collect();
        assert_eq!(descending, vec![late_id, second_id, first_id]);
        assert_eq!(snapshot.all().sequence_numbers(), vec![1, 2, 0]);
    }

    #[test]
    fn duplicate_ids_are_not_added_twice() {
        let log = log();
        let event = RaceLogEvent::tag(officer(), at(1), 0, "t", "");
        assert!(log.append(event.clone()));
        assert!(!log.append(event));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn current_pass_follows_highest_pass_seen() {
        let log = log();
        log.append(RaceLogEvent::tag(officer(), at(1), 2, "t", ""));
        log.append(RaceLogEvent::tag(officer(), at(2), 1, "t", ""));
        assert_eq!(log.current_pass(), 2);

        let clock = ManualClock::new(at(10));
        assert_eq!(log.advance_pass(officer(), &clock), 3);
        assert_eq!(log.current_pass(), 3);
    }

    #[test]
    fn revoked_events_leave_the_unrevoked_view_but_stay_in_the_log() {
        let log = log();
        let start = RaceLogEvent::start_time(officer(), at(10), 0, at(100));
        let start_id = start.id();
        log.append(start);
        log.append(RaceLogEvent::revoke(officer(), at(20), 0, start_id, None));

        let snapshot = log.read();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.event_by_id(start_id).is_some());
        assert!(snapshot.is_revoked(start_id));
        assert!(snapshot.unrevoked().is_empty());
    }

    #[test]
    fn revoking_a_revoke_restores_the_target() {
        let log = log();
        let start = RaceLogEvent::start_time(officer(), at(10), 0, at(100));
        let start_id = start.id();
        let revoke = RaceLogEvent::revoke(officer(), at(20), 0, start_id, None);
        let revoke_id = revoke.id();
        log.append(start);
        log.append(revoke);
        log.append(RaceLogEvent::revoke(officer(), at(30), 0, revoke_id, None));

        let snapshot = log.read();
        assert!(!snapshot.is_revoked(start_id));
        assert!(snapshot.is_revoked(revoke_id));
        let visible: Vec<EventId> = snapshot.unrevoked().ascending().map(|e| e.id()).collect();
        assert_eq!(visible, vec![start_id]);
    }

    #[test]
    fn revoke_of_unknown_or_later_event_has_no_effect() {
        let log = log();
        log.append(RaceLogEvent::revoke(officer(), at(5), 0, EventId::new(), None));
        let later = RaceLogEvent::status_change(officer(), at(50), 0, RaceStatus::Finished);
        let later_id = later.id();
        log.append(RaceLogEvent::revoke(officer(), at(40), 0, later_id, None));
        log.append(later);

        let snapshot = log.read();
        assert!(!snapshot.is_revoked(later_id));
        assert_eq!(snapshot.unrevoked().count(), 1);
    }

    #[test]
    fn revoke_api_checks_authority_and_revokability() {
        let log = log();
        let clock = ManualClock::new(at(100));
        let start = RaceLogEvent::start_time(officer(), at(10), 0, at(100));
        let start_id = start.id();
        log.append(start);

        let err = log
            .revoke(Author::new("shore", 1), start_id, None, &clock)
            .expect_err("lower rank must not revoke");
        assert!(matches!(err, LogError::InsufficientAuthority { target, .. } if target == start_id));

        let pass_change = RaceLogEvent::pass_change(officer(), at(20), 1);
        let pass_change_id = pass_change.id();
        log.append(pass_change);
        let err = log
            .revoke(officer(), pass_change_id, None, &clock)
            .expect_err("pass changes are final");
        assert!(matches!(err, LogError::NotRevokable { .. }));

        let revoke_id = log
            .revoke(officer(), start_id, Some("wrong start".to_string()), &clock)
            .expect("revoke should be recorded");
        let snapshot = log.read();
        assert_eq!(
            snapshot
                .event_by_id(revoke_id)
                .expect("revoke is in the log")
                .pass_id(),
            1
        );
        assert!(snapshot.is_revoked(start_id));
    }

    #[test]
    fn views_compose_pass_and_author_filters() {
        let log = log();
        log.append(RaceLogEvent::tag(officer(), at(1), 0, "a", ""));
        log.append(RaceLogEvent::tag(Author::new("shore", 1), at(2), 0, "b", ""));
        log.append(RaceLogEvent::tag(officer(), at(3), 1, "c", ""));

        let snapshot = log.read();
        assert_eq!(snapshot.current().count(), 1);
        assert_eq!(snapshot.unrevoked().in_pass(0).count(), 2);
        assert_eq!(
            snapshot
                .unrevoked()
                .in_pass(0)
                .authored_by("officer")
                .count(),
            1
        );
    }

    #[test]
    fn listeners_see_appends_but_not_loads() {
        let log = log();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let id = log.add_listener(move |event| sink.lock().push(event.id()));

        let appended = RaceLogEvent::tag(officer(), at(1), 0, "a", "");
        let appended_id = appended.id();
        log.append(appended);
        log.load(RaceLogEvent::tag(officer(), at(2), 0, "b", ""));
        assert_eq!(*seen.lock(), vec![appended_id]);

        assert!(log.remove_listener(id));
        log.append(RaceLogEvent::tag(officer(), at(3), 0, "c", ""));
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn merge_adds_only_missing_events() {
        let left = log();
        let right = EventLog::new(RaceId::new("race-1-replica"));
        let shared = RaceLogEvent::tag(officer(), at(1), 0, "shared", "");
        left.append(shared.clone());
        right.append(shared);
        right.append(RaceLogEvent::tag(officer(), at(2), 0, "only-right", ""));

        assert_eq!(left.merge(&right), 1);
        assert_eq!(left.len(), 2);
        assert_eq!(left.merge(&right), 0);
    }

    #[test]
    fn listener_may_read_the_log_it_observes() {
        let log = Arc::new(log());
        let observed = Arc::new(Mutex::new(0usize));
        let weak = Arc::downgrade(&log);
        let sink = Arc::clone(&observed);
        log.add_listener(move |_| {
            if let Some(log) = weak.upgrade() {
                *sink.lock() = log.read().len();
            }
        });
        log.append(RaceLogEvent::tag(officer(), at(1), 0, "a", ""));
        assert_eq!(*observed.lock(), 1);
    }
}
