//! Calendar-aligned period buckets for activity summaries.
//!
//! Days start at midnight UTC. Months and years are grouped from the start of
//! the calendar year, so a `(2, Month)` spec yields Jan–Feb, Mar–Apr, and so on.
//! Bucket ends are the last whole second of the bucket; timestamps are expected
//! at second resolution.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Days, Duration, Months, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Quantities allowed for month and year groupings.
const GROUP_QUANTITIES: [u8; 5] = [1, 2, 3, 4, 6];

/// Invalid summary period configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("unrecognized summary period unit: {0}")]
    UnknownUnit(String),

    #[error("weekly summary periods are not supported")]
    WeekUnsupported,

    #[error("{unit} periods do not support a quantity of {quantity}")]
    InvalidQuantity { unit: PeriodUnit, quantity: u8 },

    #[error("period for {0} is outside the supported calendar range")]
    OutOfRange(DateTime<Utc>),
}

/// Calendar unit of a summary period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeriodUnit {
    Day,
    Week,
    Month,
    Year,
}

impl PeriodUnit {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
        }
    }
}

impl fmt::Display for PeriodUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PeriodUnit {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "day" | "days" => Ok(Self::Day),
            "week" | "weeks" => Ok(Self::Week),
            "month" | "months" => Ok(Self::Month),
            "year" | "years" => Ok(Self::Year),
            _ => Err(ConfigurationError::UnknownUnit(s.to_string())),
        }
    }
}

impl Serialize for PeriodUnit {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for PeriodUnit {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A validated summary period, e.g. one month or two years.
///
/// Construction rejects weeks, multi-day periods and month/year quantities
/// outside `{1, 2, 3, 4, 6}`, so a `PeriodSpec` in hand is always usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPeriodSpec")]
pub struct PeriodSpec {
    quantity: u8,
    unit: PeriodUnit,
}

#[derive(Deserialize)]
struct RawPeriodSpec {
    quantity: u8,
    unit: PeriodUnit,
}

impl TryFrom<RawPeriodSpec> for PeriodSpec {
    type Error = ConfigurationError;

    fn try_from(raw: RawPeriodSpec) -> Result<Self, Self::Error> {
        Self::new(raw.quantity, raw.unit)
    }
}

impl PeriodSpec {
    pub fn new(quantity: u8, unit: PeriodUnit) -> Result<Self, ConfigurationError> {
        let allowed = match unit {
            PeriodUnit::Week => return Err(ConfigurationError::WeekUnsupported),
            PeriodUnit::Day => quantity == 1,
            PeriodUnit::Month | PeriodUnit::Year => GROUP_QUANTITIES.contains(&quantity),
        };
        if !allowed {
            return Err(ConfigurationError::InvalidQuantity { unit, quantity });
        }
        Ok(Self { quantity, unit })
    }

    #[must_use]
    pub const fn quantity(self) -> u8 {
        self.quantity
    }

    #[must_use]
    pub const fn unit(self) -> PeriodUnit {
        self.unit
    }

    /// Returns the bucket containing `t`.
    pub fn period_containing(self, t: DateTime<Utc>) -> Result<Period, ConfigurationError> {
        Ok(Period {
            start: start_of_period(t, self)?,
            end: end_of_period(t, self)?,
        })
    }
}

impl Default for PeriodSpec {
    fn default() -> Self {
        Self {
            quantity: 1,
            unit: PeriodUnit::Month,
        }
    }
}

impl fmt::Display for PeriodSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.quantity, self.unit)?;
        if self.quantity > 1 {
            f.write_str("s")?;
        }
        Ok(())
    }
}

/// Inclusive bounds of one summary bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Period {
    #[must_use]
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t <= self.end
    }
}

/// Returns the first instant of the bucket containing `t`.
pub fn start_of_period(
    t: DateTime<Utc>,
    spec: PeriodSpec,
) -> Result<DateTime<Utc>, ConfigurationError> {
    let date = t.date_naive();
    let start = match spec.unit {
        PeriodUnit::Day => Some(date),
        PeriodUnit::Week => return Err(ConfigurationError::WeekUnsupported),
        PeriodUnit::Month => {
            let quantity = u32::from(spec.quantity);
            let month = date.month0() / quantity * quantity + 1;
            NaiveDate::from_ymd_opt(date.year(), month, 1)
        }
        PeriodUnit::Year => {
            let quantity = i32::from(spec.quantity);
            let year = date.year() - (date.year() - 1).rem_euclid(quantity);
            NaiveDate::from_ymd_opt(year, 1, 1)
        }
    };
    start
        .map(|day| day.and_time(NaiveTime::MIN).and_utc())
        .ok_or(ConfigurationError::OutOfRange(t))
}

/// Returns the last whole second of the bucket containing `t`.
pub fn end_of_period(
    t: DateTime<Utc>,
    spec: PeriodSpec,
) -> Result<DateTime<Utc>, ConfigurationError> {
    let start = start_of_period(t, spec)?;
    let quantity = u32::from(spec.quantity);
    let next = match spec.unit {
        PeriodUnit::Day => start.checked_add_days(Days::new(u64::from(quantity))),
        PeriodUnit::Week => return Err(ConfigurationError::WeekUnsupported),
        PeriodUnit::Month => start.checked_add_months(Months::new(quantity)),
        PeriodUnit::Year => start.checked_add_months(Months::new(quantity * 12)),
    };
    next.map(|next| next - Duration::seconds(1))
        .ok_or(ConfigurationError::OutOfRange(t))
}
