//! Event authors and the authority order used to resolve conflicting claims.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// The submitter of a race log event.
///
/// Authors are totally ordered by authority: a higher `rank` outranks a
/// lower one. Authors sharing a rank are ordered by name so that the order
/// stays total, but they count as the same authority level when claims are
/// partitioned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    pub rank: u32,
}

impl Author {
    pub fn new(name: impl Into<String>, rank: u32) -> Self {
        Self {
            name: name.into(),
            rank,
        }
    }

    /// Whether this author's claims hide `other`'s claims.
    pub fn outranks(&self, other: &Author) -> bool {
        self.rank > other.rank
    }
}

impl Ord for Author {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank
            .cmp(&other.rank)
            .then_with(|| self.name.cmp(&other.name))
    }
}

impl PartialOrd for Author {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (rank {})", self.name, self.rank)
    }
}
