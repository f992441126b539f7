//! Per-period activity summaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::activity::ActivityType;
use crate::calendar::Period;
use crate::session::ActivitySession;
use crate::types::{DeviceId, UserId, ValidationError};

/// Session count and total seconds for one device/user/activity/period.
///
/// Summaries are the only activity records meant to leave the device; the
/// replication layer treats them as opaque rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivitySummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub device: DeviceId,
    pub user: UserId,
    pub activity_type: ActivityType,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub count: i64,
    pub total_seconds: i64,
}

impl ActivitySummary {
    /// Creates an empty summary for `period`.
    pub const fn empty(
        device: DeviceId,
        user: UserId,
        activity_type: ActivityType,
        period: Period,
    ) -> Self {
        Self {
            id: None,
            device,
            user,
            activity_type,
            period_start: period.start,
            period_end: period.end,
            count: 0,
            total_seconds: 0,
        }
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.period_start <= t && t <= self.period_end
    }

    /// Folds a finalized session into this summary.
    pub fn accumulate(&mut self, session: &ActivitySession) -> Result<(), ValidationError> {
        let (_, seconds) = session.closed_duration()?;
        self.count += 1;
        self.total_seconds += seconds;
        Ok(())
    }
}
