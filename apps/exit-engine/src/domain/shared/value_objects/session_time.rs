//! Wall-clock session time value object.

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Format used for tick and exit times.
pub const SESSION_TIME_FORMAT: &str = "%H:%M:%S";

/// Error parsing a session time string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid session time '{input}': expected HH:MM:SS")]
pub struct SessionTimeError {
    /// The rejected input.
    pub input: String,
}

/// Local wall-clock time of day, second precision.
///
/// Only used for end-of-day comparisons and exit stamps; it carries no date
/// and no timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionTime(NaiveTime);

impl SessionTime {
    /// Create from hour, minute and second.
    #[must_use]
    pub fn from_hms(hour: u32, minute: u32, second: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, second).map(Self)
    }

    /// Parse an `HH:MM:SS` string.
    ///
    /// # Errors
    ///
    /// Returns error if the string is not a valid `HH:MM:SS` time.
    pub fn parse(s: &str) -> Result<Self, SessionTimeError> {
        NaiveTime::parse_from_str(s.trim(), SESSION_TIME_FORMAT)
            .map(Self)
            .map_err(|_| SessionTimeError {
                input: s.to_string(),
            })
    }

    /// Current local wall-clock time, truncated to whole seconds.
    #[must_use]
    pub fn now_local() -> Self {
        let now = chrono::Local::now().time();
        Self(now.with_nanosecond(0).unwrap_or(now))
    }

    /// Get the inner `NaiveTime`.
    #[must_use]
    pub const fn as_naive(&self) -> NaiveTime {
        self.0
    }
}

impl fmt::Display for SessionTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(SESSION_TIME_FORMAT))
    }
}

impl FromStr for SessionTime {
    type Err = SessionTimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for SessionTime {
    type Error = SessionTimeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SessionTime> for String {
    fn from(value: SessionTime) -> Self {
        value.to_string()
    }
}

impl From<NaiveTime> for SessionTime {
    fn from(value: NaiveTime) -> Self {
        Self(value)
    }
}
