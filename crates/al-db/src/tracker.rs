//! Transactional activity tracking.
//!
//! [`Tracker`] is the entry point for event producers. Each call runs in one
//! `BEGIN IMMEDIATE` transaction covering the whole sequence of
//! heal → transition → persist → fold → retention, so a failure anywhere rolls
//! the entire call back.

use al_core::{
    ActivitySession, ActivitySummary, ActivityType, DeviceContext, PeriodSpec, RetentionPolicy,
    UserId, select_open,
};
use chrono::{DateTime, SubsecRound, Utc};
use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::{
    Database, DbError, count_sessions, delete_sessions, open_sessions, persist_session,
    persist_summary, sessions_for_key, summaries_containing,
};

/// Tracking configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackerSettings {
    pub retention: RetentionPolicy,
    pub summary_period: PeriodSpec,
}

/// Activity tracker backed by a [`Database`].
pub struct Tracker {
    db: Database,
    settings: TrackerSettings,
}

impl Tracker {
    pub const fn new(db: Database, settings: TrackerSettings) -> Self {
        Self { db, settings }
    }

    pub const fn database(&self) -> &Database {
        &self.db
    }

    pub const fn settings(&self) -> &TrackerSettings {
        &self.settings
    }

    /// Tracking is off when the retention cap is exactly zero.
    pub const fn is_enabled(&self) -> bool {
        self.settings.retention.is_enabled()
    }

    /// Begins an activity for `user`.
    ///
    /// `activity` is a tag (`login`, `coachreport`) or its integer code.
    /// Returns `None` when tracking is disabled.
    pub fn begin(
        &mut self,
        device: &DeviceContext,
        user: &str,
        activity: &str,
        at: Option<DateTime<Utc>>,
    ) -> Result<Option<ActivitySession>, DbError> {
        if !self.is_enabled() {
            return Ok(None);
        }
        let (user, activity) = resolve(user, activity)?;
        self.begin_activity(device, &user, activity, at.unwrap_or_else(Utc::now))
    }

    /// Records that `user` is still active.
    pub fn update(
        &mut self,
        device: &DeviceContext,
        user: &str,
        activity: &str,
        at: Option<DateTime<Utc>>,
    ) -> Result<Option<ActivitySession>, DbError> {
        if !self.is_enabled() {
            return Ok(None);
        }
        let (user, activity) = resolve(user, activity)?;
        self.update_activity(device, &user, activity, at.unwrap_or_else(Utc::now))
    }

    /// Ends the activity for `user`, folding it into the period summary.
    pub fn end(
        &mut self,
        device: &DeviceContext,
        user: &str,
        activity: &str,
        at: Option<DateTime<Utc>>,
    ) -> Result<Option<ActivitySession>, DbError> {
        if !self.is_enabled() {
            return Ok(None);
        }
        let (user, activity) = resolve(user, activity)?;
        self.end_activity(device, &user, activity, at.unwrap_or_else(Utc::now))
    }

    /// Marks `user` as active because of unrelated learning progress.
    ///
    /// Progress must be recorded even when activity tracking fails, so errors
    /// are logged and dropped here.
    pub fn record_progress(
        &mut self,
        device: &DeviceContext,
        user: &str,
        at: Option<DateTime<Utc>>,
    ) {
        if let Err(err) = self.update(device, user, ActivityType::Login.as_str(), at) {
            tracing::error!(user, error = %err, "failed to update login activity during progress");
        }
    }

    pub fn begin_activity(
        &mut self,
        device: &DeviceContext,
        user: &UserId,
        activity: ActivityType,
        at: DateTime<Utc>,
    ) -> Result<Option<ActivitySession>, DbError> {
        if !self.is_enabled() {
            return Ok(None);
        }
        let settings = self.settings;
        let at = at.trunc_subsecs(0);
        self.in_transaction(|tx| begin_in(tx, device, settings, user, activity, at))
            .map(Some)
    }

    pub fn update_activity(
        &mut self,
        device: &DeviceContext,
        user: &UserId,
        activity: ActivityType,
        at: DateTime<Utc>,
    ) -> Result<Option<ActivitySession>, DbError> {
        if !self.is_enabled() {
            return Ok(None);
        }
        let settings = self.settings;
        let at = at.trunc_subsecs(0);
        self.in_transaction(|tx| update_in(tx, device, settings, user, activity, at))
            .map(Some)
    }

    pub fn end_activity(
        &mut self,
        device: &DeviceContext,
        user: &UserId,
        activity: ActivityType,
        at: DateTime<Utc>,
    ) -> Result<Option<ActivitySession>, DbError> {
        if !self.is_enabled() {
            return Ok(None);
        }
        let settings = self.settings;
        let at = at.trunc_subsecs(0);
        self.in_transaction(|tx| end_in(tx, device, settings, user, activity, at))
            .map(Some)
    }

    /// Validates and persists a session.
    ///
    /// A session that is closed but not yet finalized gets its duration
    /// computed and folded into its summary. Saving an already-finalized
    /// session again only rewrites the row.
    pub fn save_session(
        &mut self,
        device: &DeviceContext,
        session: &mut ActivitySession,
    ) -> Result<(), DbError> {
        let settings = self.settings;
        self.in_transaction(|tx| save_session_in(tx, device, settings, session))
    }

    /// Trims the oldest closed sessions for a key down to the retention cap.
    ///
    /// Returns the number of deleted sessions.
    pub fn enforce_retention(
        &mut self,
        user: &UserId,
        activity: ActivityType,
    ) -> Result<usize, DbError> {
        let retention = self.settings.retention;
        self.in_transaction(|tx| enforce_in(tx, retention, user, activity))
    }

    fn in_transaction<T>(
        &mut self,
        f: impl FnOnce(&Transaction<'_>) -> Result<T, DbError>,
    ) -> Result<T, DbError> {
        let tx = self
            .db
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }
}

fn resolve(user: &str, activity: &str) -> Result<(UserId, ActivityType), DbError> {
    Ok((UserId::new(user)?, activity.parse()?))
}

fn begin_in(
    conn: &Connection,
    device: &DeviceContext,
    settings: TrackerSettings,
    user: &UserId,
    activity: ActivityType,
    at: DateTime<Utc>,
) -> Result<ActivitySession, DbError> {
    heal_open_in(conn, device, settings, user, activity, None, at)?;

    let mut session = ActivitySession::open(user.clone(), activity, at);
    save_in(conn, device, settings, &mut session)?;
    tracing::debug!(%user, %activity, %at, "began activity");
    Ok(session)
}

/// Closes every open session for the key except `keep`.
///
/// A still-open session means its end was never recorded, so it is closed
/// where the learner was last seen.
fn heal_open_in(
    conn: &Connection,
    device: &DeviceContext,
    settings: TrackerSettings,
    user: &UserId,
    activity: ActivityType,
    keep: Option<i64>,
    at: DateTime<Utc>,
) -> Result<(), DbError> {
    let mut stale = open_sessions(conn, user, activity)?;
    stale.retain(|session| keep.is_none() || session.id != keep);
    if !stale.is_empty() {
        tracing::warn!(
            %user,
            %activity,
            %at,
            stale = stale.len(),
            "had to end open activity"
        );
    }
    for session in &mut stale {
        let closed_at = session.last_active_time;
        session.close(closed_at)?;
        save_in(conn, device, settings, session)?;
    }
    Ok(())
}

fn update_in(
    conn: &Connection,
    device: &DeviceContext,
    settings: TrackerSettings,
    user: &UserId,
    activity: ActivityType,
    at: DateTime<Utc>,
) -> Result<ActivitySession, DbError> {
    let mut session = if let Some(session) = current_open(conn, user, activity)? {
        session
    } else {
        tracing::warn!(%user, %activity, %at, "no open activity on update; beginning one");
        begin_in(conn, device, settings, user, activity, at)?
    };
    session.touch(at)?;
    save_in(conn, device, settings, &mut session)?;
    tracing::debug!(%user, %activity, %at, "updated activity");
    Ok(session)
}

fn end_in(
    conn: &Connection,
    device: &DeviceContext,
    settings: TrackerSettings,
    user: &UserId,
    activity: ActivityType,
    at: DateTime<Utc>,
) -> Result<ActivitySession, DbError> {
    let mut session = if let Some(session) = current_open(conn, user, activity)? {
        session
    } else {
        tracing::warn!(%user, %activity, %at, "no open activity on end; beginning one");
        begin_in(conn, device, settings, user, activity, at)?
    };
    session.close(at)?;
    save_in(conn, device, settings, &mut session)?;
    tracing::debug!(
        %user,
        %activity,
        %at,
        total_seconds = ?session.total_seconds,
        "ended activity"
    );
    Ok(session)
}

fn current_open(
    conn: &Connection,
    user: &UserId,
    activity: ActivityType,
) -> Result<Option<ActivitySession>, DbError> {
    let sessions = open_sessions(conn, user, activity)?;
    if sessions.len() > 1 {
        tracing::warn!(
            %user,
            %activity,
            open = sessions.len(),
            "multiple open activities; using the most recently active"
        );
    }
    Ok(select_open(&sessions).cloned())
}

/// Saves a caller-built session.
///
/// Timestamps are cut to whole seconds as on the facade path, and an open
/// session displaces any other open session for its key.
fn save_session_in(
    conn: &Connection,
    device: &DeviceContext,
    settings: TrackerSettings,
    session: &mut ActivitySession,
) -> Result<(), DbError> {
    session.start_time = session.start_time.trunc_subsecs(0);
    session.last_active_time = session.last_active_time.trunc_subsecs(0);
    session.end_time = session.end_time.map(|end| end.trunc_subsecs(0));
    if session.is_open() {
        heal_open_in(
            conn,
            device,
            settings,
            &session.user,
            session.activity_type,
            session.id,
            session.start_time,
        )?;
    }
    save_in(conn, device, settings, session)
}

/// Validate, finalize, persist, then fold and trim as needed.
fn save_in(
    conn: &Connection,
    device: &DeviceContext,
    settings: TrackerSettings,
    session: &mut ActivitySession,
) -> Result<(), DbError> {
    session.validate()?;
    let inserted = session.id.is_none();
    let finalized = session.finalize()?;
    persist_session(conn, session)?;

    if let Some(seconds) = finalized {
        tracing::debug!(
            user = %session.user,
            activity = %session.activity_type,
            seconds,
            "computed activity duration"
        );
        fold_in(conn, device, settings.summary_period, session)?;
    }
    if inserted || finalized.is_some() {
        enforce_in(conn, settings.retention, &session.user, session.activity_type)?;
    }
    Ok(())
}

/// Adds a finalized session to the summary whose period contains its end.
fn fold_in(
    conn: &Connection,
    device: &DeviceContext,
    period: PeriodSpec,
    session: &ActivitySession,
) -> Result<ActivitySummary, DbError> {
    let (end_time, _) = session.closed_duration()?;
    let mut matching =
        summaries_containing(conn, &device.id, &session.user, session.activity_type, end_time)?;
    if matching.len() > 1 {
        let message = format!(
            "{} summaries for device {}, user {}, activity {} contain {end_time}",
            matching.len(),
            device.id,
            session.user,
            session.activity_type,
        );
        tracing::error!(%message, "refusing to fold activity");
        return Err(DbError::InvariantViolation { message });
    }

    let mut summary = match matching.pop() {
        Some(summary) => summary,
        None => ActivitySummary::empty(
            device.id.clone(),
            session.user.clone(),
            session.activity_type,
            period.period_containing(end_time)?,
        ),
    };
    summary.accumulate(session)?;
    persist_summary(conn, &mut summary)?;
    tracing::debug!(
        device = %device.name,
        user = %summary.user,
        activity = %summary.activity_type,
        period_start = %summary.period_start,
        period_end = %summary.period_end,
        count = summary.count,
        total_seconds = summary.total_seconds,
        "added activity to summary"
    );
    Ok(summary)
}

fn enforce_in(
    conn: &Connection,
    retention: RetentionPolicy,
    user: &UserId,
    activity: ActivityType,
) -> Result<usize, DbError> {
    if retention.excess(count_sessions(conn, user, activity)?) == 0 {
        return Ok(0);
    }
    let sessions = sessions_for_key(conn, user, activity)?;
    let deleted = delete_sessions(conn, &retention.discards(&sessions))?;
    if deleted > 0 {
        tracing::debug!(%user, %activity, deleted, "trimmed activity history");
    }
    Ok(deleted)
}
