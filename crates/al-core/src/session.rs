//! Activity session state machine.
//!
//! A session is OPEN from `begin` until it is closed; once closed it never
//! reopens. Duration is measured from `start_time` to `last_active_time`, so
//! idle time between the last recorded action and the close does not count.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::activity::ActivityType;
use crate::types::{UserId, ValidationError};

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Open,
    Closed,
}

/// One observed span of activity for a learner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivitySession {
    /// Storage identity; `None` until first persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub user: UserId,
    pub activity_type: ActivityType,
    pub start_time: DateTime<Utc>,
    pub last_active_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// Set exactly once, when the closed session is finalized.
    pub total_seconds: Option<i64>,
}

impl ActivitySession {
    /// Creates a new OPEN session whose last activity is its start.
    pub const fn open(
        user: UserId,
        activity_type: ActivityType,
        start_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: None,
            user,
            activity_type,
            start_time,
            last_active_time: start_time,
            end_time: None,
            total_seconds: None,
        }
    }

    pub const fn state(&self) -> SessionState {
        if self.end_time.is_some() {
            SessionState::Closed
        } else {
            SessionState::Open
        }
    }

    pub const fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    /// Records activity at `at`.
    pub fn touch(&mut self, at: DateTime<Utc>) -> Result<(), ValidationError> {
        self.ensure_open_at(at)?;
        self.last_active_time = at;
        Ok(())
    }

    /// Marks the session as ended at `at`.
    ///
    /// The duration is not computed here; see [`finalize`](Self::finalize).
    pub fn close(&mut self, at: DateTime<Utc>) -> Result<(), ValidationError> {
        self.ensure_open_at(at)?;
        self.end_time = Some(at);
        Ok(())
    }

    /// Computes `total_seconds` for a closed session that has none yet.
    ///
    /// Returns the new duration when this call finalized the session, and
    /// `None` when there was nothing to do (still open, or already finalized).
    /// A `Some` result means the session still has to be folded into its
    /// summary.
    pub fn finalize(&mut self) -> Result<Option<i64>, ValidationError> {
        if self.end_time.is_none() || self.total_seconds.is_some() {
            return Ok(None);
        }
        let seconds = (self.last_active_time - self.start_time).num_seconds();
        if seconds < 0 {
            return Err(ValidationError::NegativeDuration { seconds });
        }
        self.total_seconds = Some(seconds);
        Ok(Some(seconds))
    }

    /// Checks the record-level invariants before the session is persisted.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.last_active_time < self.start_time {
            return Err(ValidationError::LastActiveBeforeStart {
                start: self.start_time,
                last_active: self.last_active_time,
            });
        }
        if let Some(end_time) = self.end_time {
            if end_time < self.start_time {
                return Err(ValidationError::BeforeStart {
                    start: self.start_time,
                    at: end_time,
                });
            }
        }
        if let Some(seconds) = self.total_seconds {
            if seconds < 0 {
                return Err(ValidationError::NegativeDuration { seconds });
            }
            if self.end_time.is_none() {
                return Err(ValidationError::NotClosed);
            }
        }
        Ok(())
    }

    /// Returns `(end_time, total_seconds)` for a finalized session.
    pub fn closed_duration(&self) -> Result<(DateTime<Utc>, i64), ValidationError> {
        match (self.end_time, self.total_seconds) {
            (Some(end_time), Some(seconds)) if seconds >= 0 => Ok((end_time, seconds)),
            (Some(_), Some(seconds)) => Err(ValidationError::NegativeDuration { seconds }),
            _ => Err(ValidationError::NotClosed),
        }
    }

    fn ensure_open_at(&self, at: DateTime<Utc>) -> Result<(), ValidationError> {
        if !self.is_open() {
            return Err(ValidationError::Closed);
        }
        if at < self.start_time {
            return Err(ValidationError::BeforeStart {
                start: self.start_time,
                at,
            });
        }
        Ok(())
    }
}

/// Picks "the" open session among candidates for one key.
///
/// Only one should exist. If several do, the most recently active wins, and
/// the highest id breaks any remaining tie.
pub fn select_open(sessions: &[ActivitySession]) -> Option<&ActivitySession> {
    sessions
        .iter()
        .filter(|session| session.is_open())
        .max_by_key(|session| (session.last_active_time, session.id))
}
