//! Registration lists for synchronous change callbacks.

use parking_lot::Mutex;
use std::sync::Arc;

/// Handle returned on registration, used to deregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Callbacks owned by the component that emits the changes.
///
/// Listeners are invoked in registration order. The list is copied out
/// before invocation, so a callback may register or remove listeners (or
/// trigger further notifications) without deadlocking.
pub struct Listeners<L: ?Sized> {
    inner: Mutex<ListenerList<L>>,
}

struct ListenerList<L: ?Sized> {
    next_id: u64,
    entries: Vec<(ListenerId, Arc<L>)>,
}

impl<L: ?Sized> Listeners<L> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(ListenerList {
                next_id: 0,
                entries: Vec::new(),
            }),
        }
    }

    pub fn add(&self, listener: Arc<L>) -> ListenerId {
        let mut inner = self.inner.lock();
        let id = ListenerId(inner.next_id);
        inner.next_id += 1;
        inner.entries.push((id, listener));
        id
    }

    /// Returns whether a listener was registered under `id`.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.entries.len();
        inner.entries.retain(|(entry_id, _)| *entry_id != id);
        inner.entries.len() != before
    }

    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    pub fn notify(&self, mut call: impl FnMut(&L)) {
        let registered: Vec<Arc<L>> = self
            .inner
            .lock()
            .entries
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in registered {
            call(&listener);
        }
    }
}

impl<L: ?Sized> Default for Listeners<L> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    type Callback = dyn Fn(&mut Vec<u32>) + Send + Sync;

    #[test]
    fn notifies_in_registration_order_and_honors_removal() {
        let listeners: Listeners<Callback> = Listeners::new();
        listeners.add(Arc::new(|seen: &mut Vec<u32>| seen.push(1)));
        let second = listeners.add(Arc::new(|seen: &mut Vec<u32>| seen.push(2)));
        listeners.add(Arc::new(|seen: &mut Vec<u32>| seen.push(3)));

        let seen = Mutex::new(Vec::new());
        listeners.notify(|listener| listener(&mut seen.lock()));
        assert_eq!(*seen.lock(), vec![1, 2, 3]);

        assert!(listeners.remove(second));
        assert!(!listeners.remove(second));
        seen.lock().clear();
        listeners.notify(|listener| listener(&mut seen.lock()));
        assert_eq!(*seen.lock(), vec![1, 3]);
    }
}
