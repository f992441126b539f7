//! Activity types tracked per learner.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Categories of tracked activity.
///
/// The integer codes are part of the stored record format and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActivityType {
    Login = 1,
    CoachReport = 2,
}

impl ActivityType {
    /// All known activity types, in code order.
    pub const ALL: [Self; 2] = [Self::Login, Self::CoachReport];

    /// Integer code used for storage.
    #[must_use]
    pub const fn code(self) -> i64 {
        self as i64
    }

    /// Tag used by event producers.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::CoachReport => "coachreport",
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<i64> for ActivityType {
    type Error = UnrecognizedActivityType;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Self::Login),
            2 => Ok(Self::CoachReport),
            _ => Err(UnrecognizedActivityType(code.to_string())),
        }
    }
}

/// Parses either a tag (`login`, `coachreport`) or its integer code (`1`, `2`).
impl FromStr for ActivityType {
    type Err = UnrecognizedActivityType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "login" => Ok(Self::Login),
            "coachreport" => Ok(Self::CoachReport),
            _ => s
                .parse::<i64>()
                .map_err(|_| UnrecognizedActivityType(s.to_string()))
                .and_then(Self::try_from),
        }
    }
}

impl Serialize for ActivityType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ActivityType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Error for activity tags outside the known vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnrecognizedActivityType(pub String);

impl fmt::Display for UnrecognizedActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unrecognized activity type: {}", self.0)
    }
}

impl std::error::Error for UnrecognizedActivityType {}
