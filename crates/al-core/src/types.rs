//! Core type definitions with validation.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types and session transitions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// `last_active_time` precedes `start_time`.
    #[error("last active time {last_active} precedes start time {start}")]
    LastActiveBeforeStart {
        start: DateTime<Utc>,
        last_active: DateTime<Utc>,
    },

    /// An update or close was requested before the session started.
    #[error("activity time {at} precedes session start {start}")]
    BeforeStart {
        start: DateTime<Utc>,
        at: DateTime<Utc>,
    },

    /// The computed session duration was negative.
    #[error("total activity time must be non-negative, got {seconds}s")]
    NegativeDuration { seconds: i64 },

    /// The session is already closed and cannot transition again.
    #[error("session is already closed")]
    Closed,

    /// The session must be closed before it can be summarized.
    #[error("session must be closed before it can be summarized")]
    NotClosed,
}

/// Generates a validated string ID newtype with common trait implementations.
macro_rules! define_string_id {
    (
        $(#[$meta:meta])*
        $name:ident, $field_name:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new ID after validation.
            pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
                let id = id.into();
                if id.trim().is_empty() {
                    return Err(ValidationError::Empty { field: $field_name });
                }
                Ok(Self(id))
            }

            /// Returns the ID as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_string_id!(
    /// A validated learner identifier.
    ///
    /// An empty user is the "no user given" case and is rejected here, before
    /// any session lookup happens.
    UserId, "user"
);

define_string_id!(
    /// A validated device identifier.
    ///
    /// Summaries are keyed per device so that an external replication layer can
    /// merge them without conflicts.
    DeviceId, "device"
);

/// The device on whose behalf activity is recorded.
///
/// Passed explicitly to every tracker call that may fold a session into a
/// summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceContext {
    pub id: DeviceId,
    pub name: String,
}

impl DeviceContext {
    pub fn new(id: DeviceId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}
