//! Retention cap for raw activity sessions.

use serde::{Deserialize, Serialize};

use crate::session::ActivitySession;

/// How many raw sessions to keep per (user, activity type).
///
/// `None` keeps everything. `Some(0)` turns activity tracking off entirely.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    pub max_records_per_user: Option<u32>,
}

impl RetentionPolicy {
    pub const fn new(max_records_per_user: Option<u32>) -> Self {
        Self {
            max_records_per_user,
        }
    }

    pub const fn is_enabled(self) -> bool {
        !matches!(self.max_records_per_user, Some(0))
    }

    /// Number of records above the cap for a key holding `count` sessions.
    pub fn excess(self, count: usize) -> usize {
        self.max_records_per_user
            .map_or(0, |cap| count.saturating_sub(cap as usize))
    }

    /// Picks the sessions to delete so that at most `max_records_per_user`
    /// remain, oldest start first.
    ///
    /// Open sessions are never picked, so a key whose oldest records are still
    /// open can stay above the cap until they close.
    pub fn discards(self, sessions: &[ActivitySession]) -> Vec<i64> {
        let excess = self.excess(sessions.len());
        if excess == 0 {
            return Vec::new();
        }
        let mut closed: Vec<&ActivitySession> =
            sessions.iter().filter(|session| !session.is_open()).collect();
        closed.sort_by_key(|session| (session.start_time, session.id));
        closed
            .into_iter()
            .filter_map(|session| session.id)
            .take(excess)
            .collect()
    }
}
