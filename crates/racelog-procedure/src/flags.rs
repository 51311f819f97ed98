//! Flag pole configurations derived from the procedure timeline.

use racelog_core::{Flag, TimePoint};
use serde::Serialize;

/// One pole: an upper flag, optionally with a lower one, up or down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FlagPole {
    pub upper: Flag,
    pub lower: Flag,
    pub displayed: bool,
}

impl FlagPole {
    pub fn new(upper: Flag, displayed: bool) -> Self {
        Self {
            upper,
            lower: Flag::None,
            displayed,
        }
    }

    pub fn with_lower(upper: Flag, lower: Flag, displayed: bool) -> Self {
        Self {
            upper,
            lower,
            displayed,
        }
    }
}

/// The flags for the interval containing some instant: what is shown now,
/// since when, what will be shown next and when that happens.
///
/// `next_change_at` is `None` when no change is scheduled; `next` may still
/// name the flags an operator will show next (blue comes down whenever the
/// last boat finishes). Both are empty once the timeline is over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlagPoleState {
    pub current: Vec<FlagPole>,
    pub current_since: Option<TimePoint>,
    pub next: Vec<FlagPole>,
    pub next_change_at: Option<TimePoint>,
}

impl FlagPoleState {
    pub fn new(
        current: Vec<FlagPole>,
        current_since: Option<TimePoint>,
        next: Vec<FlagPole>,
        next_change_at: Option<TimePoint>,
    ) -> Self {
        Self {
            current,
            current_since,
            next,
            next_change_at,
        }
    }

    /// A terminal state with no upcoming change.
    pub fn settled(current: Vec<FlagPole>, current_since: Option<TimePoint>) -> Self {
        Self::new(current, current_since, Vec::new(), None)
    }

    pub fn has_next_change(&self) -> bool {
        self.next_change_at.is_some()
    }

    /// Poles whose display state differs between now and the next change.
    pub fn changing_poles(&self) -> Vec<FlagPole> {
        self.next
            .iter()
            .filter(|next| !self.current.contains(next))
            .copied()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn changing_poles_lists_only_differences() {
        let state = FlagPoleState::new(
            vec![FlagPole::new(Flag::Class, true), FlagPole::new(Flag::Papa, false)],
            None,
            vec![FlagPole::new(Flag::Class, true), FlagPole::new(Flag::Papa, true)],
            None,
        );
        assert_eq!(state.changing_poles(), vec![FlagPole::new(Flag::Papa, true)]);
        assert!(!FlagPoleState::settled(Vec::new(), None).has_next_change());
    }
}
