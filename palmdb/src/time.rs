//! Timestamps counted in seconds since 1904-01-01T00:00:00Z.


use std::fmt;

use chrono::{DateTime, Utc};


/// Seconds between the Palm epoch (1904-01-01) and the Unix epoch (1970-01-01).
const PALM_TO_UNIX_SECONDS: i64 = 2_082_844_800;


#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct PalmTime(u32);
impl PalmTime {
    /// The zero timestamp, used for "never" (e.g. a database that was never backed up).
    pub const NEVER: Self = Self(0);

    pub const fn from_raw(seconds: u32) -> Self { Self(seconds) }
    pub const fn as_raw(&self) -> u32 { self.0 }

    pub fn now() -> Self {
        Self::from_datetime(&Utc::now())
            .unwrap_or(Self::NEVER)
    }

    /// Converts a point in time, failing if it is outside the representable range
    /// (1904 to 2040).
    pub fn from_datetime(datetime: &DateTime<Utc>) -> Option<Self> {
        let seconds = datetime.timestamp().checked_add(PALM_TO_UNIX_SECONDS)?;
        u32::try_from(seconds).ok().map(Self)
    }

    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(i64::from(self.0) - PALM_TO_UNIX_SECONDS, 0)
    }
}
impl fmt::Display for PalmTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::NEVER {
            return write!(f, "never");
        }
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.to_rfc3339()),
            None => write!(f, "{} seconds", self.0),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::PalmTime;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_epochs() {
        let unix_epoch = Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap();
        let palm = PalmTime::from_datetime(&unix_epoch).unwrap();
        assert_eq!(palm.as_raw(), 2_082_844_800);

        let palm_epoch = Utc.with_ymd_and_hms(1904, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(PalmTime::NEVER.to_datetime(), Some(palm_epoch));
    }

    #[test]
    fn test_round_trip() {
        let moment = Utc.with_ymd_and_hms(2003, 5, 17, 12, 34, 56).unwrap();
        let palm = PalmTime::from_datetime(&moment).unwrap();
        assert_eq!(palm.to_datetime(), Some(moment));
    }

    #[test]
    fn test_out_of_range() {
        let too_early = Utc.with_ymd_and_hms(1900, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(PalmTime::from_datetime(&too_early), None);

        let too_late = Utc.with_ymd_and_hms(2041, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(PalmTime::from_datetime(&too_late), None);
    }
}
