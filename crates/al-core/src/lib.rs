//! Core domain logic for learner activity tracking.
//!
//! This crate contains the fundamental types and logic for:
//! - Calendar: bucketing timestamps into day/month/year summary periods
//! - Sessions: the open/close state machine and duration computation
//! - Summaries: accumulating closed sessions per period
//! - Retention: choosing which raw sessions to discard beyond a cap

pub mod activity;
pub mod calendar;
pub mod retention;
pub mod session;
pub mod summary;
pub mod types;

pub use activity::{ActivityType, UnrecognizedActivityType};
pub use calendar::{
    ConfigurationError, Period, PeriodSpec, PeriodUnit, end_of_period, start_of_period,
};
pub use retention::RetentionPolicy;
pub use session::{ActivitySession, SessionState, select_open};
pub use summary::ActivitySummary;
pub use types::{DeviceContext, DeviceId, UserId, ValidationError};
