//! Wall-clock derived record versions.
//!
//! A `Version` is the record's last-modified timestamp in whole seconds since
//! the Unix epoch (UTC). It is not a logical clock: two edits made within the
//! same second compare equal.

use crate::Error;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Monotonic, second-granularity record version.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// The version before any sync has happened.
    pub const ZERO: Version = Version(0);

    /// Creates a version from epoch seconds.
    #[must_use]
    pub const fn from_secs(secs: i64) -> Self {
        Self(secs)
    }

    /// Derives a version from a UTC timestamp, truncating sub-second precision.
    #[must_use]
    pub fn from_datetime(at: &DateTime<Utc>) -> Self {
        Self(at.timestamp())
    }

    /// The version corresponding to the current wall-clock second.
    #[must_use]
    pub fn now() -> Self {
        Self::from_datetime(&Utc::now())
    }

    /// Returns the epoch seconds.
    #[must_use]
    pub const fn as_secs(&self) -> i64 {
        self.0
    }

    /// Converts back into a UTC timestamp.
    pub fn to_datetime(&self) -> Result<DateTime<Utc>, Error> {
        Utc.timestamp_opt(self.0, 0)
            .single()
            .ok_or(Error::InvalidTimestamp(self.0))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl From<DateTime<Utc>> for Version {
    fn from(at: DateTime<Utc>) -> Self {
        Self::from_datetime(&at)
    }
}
