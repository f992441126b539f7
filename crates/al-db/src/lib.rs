//! Storage layer for learner activity tracking.
//!
//! Provides persistence for activity sessions and their periodic summaries
//! using `rusqlite`, plus the transactional [`Tracker`] that drives the
//! session state machine.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! Give each concurrent caller its own `Database` opened on the same file. Every
//! tracker operation runs in a `BEGIN IMMEDIATE` transaction, so writers are
//! serialized by SQLite's write lock and wait up to [`BUSY_TIMEOUT`] for it.
//!
//! # Schema
//!
//! ## Timestamp Format
//!
//! Timestamps are stored as TEXT in ISO 8601 format (e.g., `2024-01-15T10:30:00.000Z`).
//! All values are written with the same precision and a `Z` suffix, so
//! lexicographic ordering matches chronological ordering and range filters can
//! run in SQL.
//!
//! ## Activity Types
//!
//! `activity_type` columns hold the integer code of [`ActivityType`]. Rows with
//! unknown codes fail to load rather than being skipped.

use std::path::Path;
use std::time::Duration;

use al_core::{
    ActivitySession, ActivitySummary, ActivityType, ConfigurationError, DeviceId,
    UnrecognizedActivityType, UserId, ValidationError, select_open,
};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, params, params_from_iter};
use thiserror::Error;

mod tracker;

pub use tracker::{Tracker, TrackerSettings};

/// How long a connection waits for another writer before giving up.
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A session or summary failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The summary period could not be computed.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    /// An activity tag or stored code is outside the known vocabulary.
    #[error(transparent)]
    UnrecognizedActivityType(#[from] UnrecognizedActivityType),
    /// Failed to parse a stored timestamp.
    #[error("invalid timestamp in {table} row {row_id}: {timestamp}")]
    TimestampParse {
        table: &'static str,
        row_id: i64,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
    /// Stored records contradict an invariant the tracker relies on.
    #[error("activity invariant violated: {message}")]
    InvariantViolation { message: String },
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

/// Open and total session counts for one activity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenSessionCount {
    pub activity_type: ActivityType,
    pub open: i64,
    pub total: i64,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch(
            "
            -- Raw sessions: end_time NULL means the session is still open.
            -- activity_type: integer code (1 = login, 2 = coachreport)
            CREATE TABLE IF NOT EXISTS activity_sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                activity_type INTEGER NOT NULL,
                start_time TEXT NOT NULL,
                last_active_time TEXT NOT NULL,
                end_time TEXT,
                total_seconds INTEGER
            );

            CREATE INDEX IF NOT EXISTS idx_activity_sessions_key
                ON activity_sessions(user_id, activity_type, end_time);
            CREATE INDEX IF NOT EXISTS idx_activity_sessions_start
                ON activity_sessions(user_id, activity_type, start_time);

            -- Per-period rollups, replicated across devices by an external layer.
            CREATE TABLE IF NOT EXISTS activity_summaries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                device_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                activity_type INTEGER NOT NULL,
                period_start TEXT NOT NULL,
                period_end TEXT NOT NULL,
                count INTEGER NOT NULL DEFAULT 0,
                total_seconds INTEGER NOT NULL DEFAULT 0,
                UNIQUE (device_id, user_id, activity_type, period_start, period_end)
            );

            CREATE INDEX IF NOT EXISTS idx_activity_summaries_user
                ON activity_summaries(user_id, activity_type);
            ",
        )?;
        Ok(())
    }

    /// Lists sessions ordered by user, activity type and start time.
    ///
    /// When `user` is given, only that learner's sessions are returned.
    pub fn list_sessions(&self, user: Option<&UserId>) -> Result<Vec<ActivitySession>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT id, user_id, activity_type, start_time, last_active_time, end_time, total_seconds
            FROM activity_sessions
            WHERE ?1 IS NULL OR user_id = ?1
            ORDER BY user_id ASC, activity_type ASC, start_time ASC, id ASC
            ",
        )?;
        let rows = stmt.query_map(params![user.map(UserId::as_str)], SessionRow::from_row)?;
        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(row?.into_session()?);
        }
        Ok(sessions)
    }

    /// Lists summaries ordered by user, activity type and period.
    pub fn list_summaries(&self, user: Option<&UserId>) -> Result<Vec<ActivitySummary>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT id, device_id, user_id, activity_type, period_start, period_end, count, total_seconds
            FROM activity_summaries
            WHERE ?1 IS NULL OR user_id = ?1
            ORDER BY user_id ASC, activity_type ASC, period_start ASC, device_id ASC
            ",
        )?;
        let rows = stmt.query_map(params![user.map(UserId::as_str)], SummaryRow::from_row)?;
        let mut summaries = Vec::new();
        for row in rows {
            summaries.push(row?.into_summary()?);
        }
        Ok(summaries)
    }

    /// Returns the current open session for a key, if any.
    pub fn open_session(
        &self,
        user: &UserId,
        activity_type: ActivityType,
    ) -> Result<Option<ActivitySession>, DbError> {
        let sessions = open_sessions(&self.conn, user, activity_type)?;
        Ok(select_open(&sessions).cloned())
    }

    /// Counts open and total sessions per activity type across all users.
    pub fn session_counts(&self) -> Result<Vec<OpenSessionCount>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT activity_type,
                   SUM(CASE WHEN end_time IS NULL THEN 1 ELSE 0 END) AS open,
                   COUNT(*) AS total
            FROM activity_sessions
            GROUP BY activity_type
            ORDER BY activity_type ASC
            ",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?, row.get::<_, i64>(2)?))
        })?;
        let mut counts = Vec::new();
        for row in rows {
            let (code, open, total) = row?;
            counts.push(OpenSessionCount {
                activity_type: ActivityType::try_from(code)?,
                open,
                total,
            });
        }
        Ok(counts)
    }
}

struct SessionRow {
    id: i64,
    user_id: String,
    activity_type: i64,
    start_time: String,
    last_active_time: String,
    end_time: Option<String>,
    total_seconds: Option<i64>,
}

impl SessionRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            activity_type: row.get(2)?,
            start_time: row.get(3)?,
            last_active_time: row.get(4)?,
            end_time: row.get(5)?,
            total_seconds: row.get(6)?,
        })
    }

    fn into_session(self) -> Result<ActivitySession, DbError> {
        let parse = |timestamp: &str| parse_timestamp(timestamp, "activity_sessions", self.id);
        Ok(ActivitySession {
            id: Some(self.id),
            user: UserId::new(self.user_id.as_str())?,
            activity_type: ActivityType::try_from(self.activity_type)?,
            start_time: parse(&self.start_time)?,
            last_active_time: parse(&self.last_active_time)?,
            end_time: self.end_time.as_deref().map(parse).transpose()?,
            total_seconds: self.total_seconds,
        })
    }
}

struct SummaryRow {
    id: i64,
    device_id: String,
    user_id: String,
    activity_type: i64,
    period_start: String,
    period_end: String,
    count: i64,
    total_seconds: i64,
}

impl SummaryRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            device_id: row.get(1)?,
            user_id: row.get(2)?,
            activity_type: row.get(3)?,
            period_start: row.get(4)?,
            period_end: row.get(5)?,
            count: row.get(6)?,
            total_seconds: row.get(7)?,
        })
    }

    fn into_summary(self) -> Result<ActivitySummary, DbError> {
        let parse = |timestamp: &str| parse_timestamp(timestamp, "activity_summaries", self.id);
        Ok(ActivitySummary {
            id: Some(self.id),
            device: DeviceId::new(self.device_id.as_str())?,
            user: UserId::new(self.user_id.as_str())?,
            activity_type: ActivityType::try_from(self.activity_type)?,
            period_start: parse(&self.period_start)?,
            period_end: parse(&self.period_end)?,
            count: self.count,
            total_seconds: self.total_seconds,
        })
    }
}

/// Open sessions for a key, most recently active first.
fn open_sessions(
    conn: &Connection,
    user: &UserId,
    activity_type: ActivityType,
) -> Result<Vec<ActivitySession>, DbError> {
    let mut stmt = conn.prepare(
        "
        SELECT id, user_id, activity_type, start_time, last_active_time, end_time, total_seconds
        FROM activity_sessions
        WHERE user_id = ? AND activity_type = ? AND end_time IS NULL
        ORDER BY last_active_time DESC, id DESC
        ",
    )?;
    let rows = stmt.query_map(
        params![user.as_str(), activity_type.code()],
        SessionRow::from_row,
    )?;
    let mut sessions = Vec::new();
    for row in rows {
        sessions.push(row?.into_session()?);
    }
    Ok(sessions)
}

/// All sessions for a key, oldest start first.
fn sessions_for_key(
    conn: &Connection,
    user: &UserId,
    activity_type: ActivityType,
) -> Result<Vec<ActivitySession>, DbError> {
    let mut stmt = conn.prepare(
        "
        SELECT id, user_id, activity_type, start_time, last_active_time, end_time, total_seconds
        FROM activity_sessions
        WHERE user_id = ? AND activity_type = ?
        ORDER BY start_time ASC, id ASC
        ",
    )?;
    let rows = stmt.query_map(
        params![user.as_str(), activity_type.code()],
        SessionRow::from_row,
    )?;
    let mut sessions = Vec::new();
    for row in rows {
        sessions.push(row?.into_session()?);
    }
    Ok(sessions)
}

fn count_sessions(
    conn: &Connection,
    user: &UserId,
    activity_type: ActivityType,
) -> Result<usize, DbError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM activity_sessions WHERE user_id = ? AND activity_type = ?",
        params![user.as_str(), activity_type.code()],
        |row| row.get(0),
    )?;
    Ok(usize::try_from(count).unwrap_or_default())
}

/// Inserts a new session or updates an existing one, assigning `id` on insert.
fn persist_session(conn: &Connection, session: &mut ActivitySession) -> Result<(), DbError> {
    let start_time = format_timestamp(session.start_time);
    let last_active_time = format_timestamp(session.last_active_time);
    let end_time = session.end_time.map(format_timestamp);
    match session.id {
        Some(id) => {
            conn.execute(
                "
                UPDATE activity_sessions
                SET start_time = ?, last_active_time = ?, end_time = ?, total_seconds = ?
                WHERE id = ?
                ",
                params![
                    start_time,
                    last_active_time,
                    end_time,
                    session.total_seconds,
                    id
                ],
            )?;
        }
        None => {
            conn.execute(
                "
                INSERT INTO activity_sessions
                (user_id, activity_type, start_time, last_active_time, end_time, total_seconds)
                VALUES (?, ?, ?, ?, ?, ?)
                ",
                params![
                    session.user.as_str(),
                    session.activity_type.code(),
                    start_time,
                    last_active_time,
                    end_time,
                    session.total_seconds,
                ],
            )?;
            session.id = Some(conn.last_insert_rowid());
        }
    }
    Ok(())
}

/// Deletes sessions by ID in one statement. Missing IDs are ignored.
fn delete_sessions(conn: &Connection, ids: &[i64]) -> Result<usize, DbError> {
    if ids.is_empty() {
        return Ok(0);
    }
    let placeholders = vec!["?"; ids.len()].join(", ");
    let sql = format!("DELETE FROM activity_sessions WHERE id IN ({placeholders})");
    Ok(conn.execute(&sql, params_from_iter(ids))?)
}

/// Summaries for a device/user/activity whose bounds contain `t`.
fn summaries_containing(
    conn: &Connection,
    device: &DeviceId,
    user: &UserId,
    activity_type: ActivityType,
    t: DateTime<Utc>,
) -> Result<Vec<ActivitySummary>, DbError> {
    let mut stmt = conn.prepare(
        "
        SELECT id, device_id, user_id, activity_type, period_start, period_end, count, total_seconds
        FROM activity_summaries
        WHERE device_id = ? AND user_id = ? AND activity_type = ?
          AND period_start <= ? AND period_end >= ?
        ORDER BY period_start ASC, id ASC
        ",
    )?;
    let t = format_timestamp(t);
    let rows = stmt.query_map(
        params![
            device.as_str(),
            user.as_str(),
            activity_type.code(),
            t,
            t
        ],
        SummaryRow::from_row,
    )?;
    let mut summaries = Vec::new();
    for row in rows {
        summaries.push(row?.into_summary()?);
    }
    Ok(summaries)
}

/// Inserts a new summary or writes back accumulated totals.
fn persist_summary(conn: &Connection, summary: &mut ActivitySummary) -> Result<(), DbError> {
    match summary.id {
        Some(id) => {
            conn.execute(
                "UPDATE activity_summaries SET count = ?, total_seconds = ? WHERE id = ?",
                params![summary.count, summary.total_seconds, id],
            )?;
        }
        None => {
            conn.execute(
                "
                INSERT INTO activity_summaries
                (device_id, user_id, activity_type, period_start, period_end, count, total_seconds)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ",
                params![
                    summary.device.as_str(),
                    summary.user.as_str(),
                    summary.activity_type.code(),
                    format_timestamp(summary.period_start),
                    format_timestamp(summary.period_end),
                    summary.count,
                    summary.total_seconds,
                ],
            )?;
            summary.id = Some(conn.last_insert_rowid());
        }
    }
    Ok(())
}

fn parse_timestamp(
    timestamp: &str,
    table: &'static str,
    row_id: i64,
) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            table,
            row_id,
            timestamp: timestamp.to_string(),
            source,
        })
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}
