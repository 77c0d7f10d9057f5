//! Institute-local time
//!
//! Program dates (start, end) are calendar dates at the institute, while
//! every timestamp is stored in UTC. "Today" therefore has to be computed
//! in the institute's timezone, not the server's.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;

use crate::error::CoreError;

/// Default timezone of the institute (Caltech campus, Pasadena)
pub const DEFAULT_INSTITUTE_TIMEZONE: Tz = chrono_tz::America::Los_Angeles;

/// Converts UTC instants into institute-local calendar dates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstituteClock(Tz);

impl InstituteClock {
    pub fn new(tz: Tz) -> Self {
        Self(tz)
    }

    /// Parses an IANA timezone name such as `America/Los_Angeles`
    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        Tz::from_str(name)
            .map(Self)
            .map_err(|_| CoreError::configuration(format!("Invalid timezone: {}", name)))
    }

    /// Returns the timezone
    pub fn timezone(&self) -> Tz {
        self.0
    }

    /// Institute-local calendar date of the given instant
    pub fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.0).date_naive()
    }

    /// Institute-local calendar date right now
    pub fn today(&self) -> NaiveDate {
        self.local_date(Utc::now())
    }
}

impl Default for InstituteClock {
    fn default() -> Self {
        Self(DEFAULT_INSTITUTE_TIMEZONE)
    }
}

impl Serialize for InstituteClock {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.0.name())
    }
}

impl<'de> Deserialize<'de> for InstituteClock {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Tz::from_str(&s)
            .map(InstituteClock)
            .map_err(|_| serde::de::Error::custom(format!("Invalid timezone: {}", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_local_date_lags_utc_in_the_evening() {
        let clock = InstituteClock::default();
        // 03:00 UTC on March 10 is still March 9 in Pasadena
        let at = Utc.with_ymd_and_hms(2025, 3, 10, 3, 0, 0).unwrap();
        assert_eq!(clock.local_date(at), NaiveDate::from_ymd_opt(2025, 3, 9).unwrap());
    }

    #[test]
    fn test_from_name_rejects_garbage() {
        assert!(InstituteClock::from_name("Mars/Olympus_Mons").is_err());
        assert!(InstituteClock::from_name("UTC").is_ok());
    }
}
