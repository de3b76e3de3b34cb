//! Date, time and interval values.
//!
//! Times carry one of three zone states that stay distinct on the wire:
//! no zone, UTC, or an explicit hour/minute offset. Interpreting the zone is
//! left to the caller; conversions to `chrono` types are provided for
//! convenience.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

/// Zone state attached to a [`PofTime`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ZoneState {
    /// No zone information.
    #[default]
    Unzoned,
    /// Coordinated Universal Time.
    Utc,
    /// Explicit offset from UTC. Both parts carry the sign of the offset.
    Offset {
        /// Hour part of the offset.
        hours: i32,
        /// Minute part of the offset.
        minutes: i32,
    },
}

impl ZoneState {
    /// Wire marker for no zone.
    pub(crate) const UNZONED: i32 = 0;
    /// Wire marker for UTC.
    pub(crate) const UTC: i32 = 1;
    /// Wire marker for an explicit offset.
    pub(crate) const OFFSET: i32 = 2;

    /// Builds an offset zone from a signed number of seconds east of UTC.
    pub fn from_offset_seconds(seconds: i32) -> Self {
        Self::Offset {
            hours: seconds / 3600,
            minutes: (seconds % 3600) / 60,
        }
    }

    /// Returns the zone as a fixed offset. `None` for [`ZoneState::Unzoned`].
    pub fn to_fixed_offset(&self) -> Option<FixedOffset> {
        match *self {
            Self::Unzoned => None,
            Self::Utc => FixedOffset::east_opt(0),
            Self::Offset { hours, minutes } => {
                FixedOffset::east_opt(hours.checked_mul(3600)?.checked_add(minutes.checked_mul(60)?)?)
            }
        }
    }
}

/// A time of day with nanosecond precision and a zone state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PofTime {
    /// Local time of day.
    pub time: NaiveTime,
    /// Zone the time is expressed in.
    pub zone: ZoneState,
}

impl PofTime {
    /// Creates a time without zone information.
    pub fn unzoned(time: NaiveTime) -> Self {
        Self {
            time,
            zone: ZoneState::Unzoned,
        }
    }

    /// Creates a UTC time.
    pub fn utc(time: NaiveTime) -> Self {
        Self {
            time,
            zone: ZoneState::Utc,
        }
    }

    /// Creates a time with an explicit offset.
    pub fn with_offset(time: NaiveTime, hours: i32, minutes: i32) -> Self {
        Self {
            time,
            zone: ZoneState::Offset { hours, minutes },
        }
    }
}

impl From<NaiveTime> for PofTime {
    fn from(time: NaiveTime) -> Self {
        Self::unzoned(time)
    }
}

/// A date and a time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PofDateTime {
    /// Calendar date.
    pub date: NaiveDate,
    /// Time of day with its zone state.
    pub time: PofTime,
}

impl PofDateTime {
    /// Returns the local date and time, ignoring the zone.
    pub fn naive(&self) -> NaiveDateTime {
        self.date.and_time(self.time.time)
    }

    /// Resolves the value to an instant. `None` when the value has no zone.
    pub fn to_fixed(&self) -> Option<DateTime<FixedOffset>> {
        let offset = self.time.zone.to_fixed_offset()?;
        offset.from_local_datetime(&self.naive()).single()
    }
}

impl From<NaiveDateTime> for PofDateTime {
    fn from(value: NaiveDateTime) -> Self {
        Self {
            date: value.date(),
            time: PofTime::unzoned(value.time()),
        }
    }
}

impl From<DateTime<Utc>> for PofDateTime {
    fn from(value: DateTime<Utc>) -> Self {
        let naive = value.naive_utc();
        Self {
            date: naive.date(),
            time: PofTime::utc(naive.time()),
        }
    }
}

impl From<DateTime<FixedOffset>> for PofDateTime {
    fn from(value: DateTime<FixedOffset>) -> Self {
        let naive = value.naive_local();
        Self {
            date: naive.date(),
            time: PofTime {
                time: naive.time(),
                zone: ZoneState::from_offset_seconds(value.offset().local_minus_utc()),
            },
        }
    }
}

/// An interval of years and months.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct YearMonthInterval {
    /// Years.
    pub years: i32,
    /// Months.
    pub months: i32,
}

/// An interval of hours, minutes, seconds and nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TimeInterval {
    /// Hours.
    pub hours: i32,
    /// Minutes.
    pub minutes: i32,
    /// Seconds.
    pub seconds: i32,
    /// Nanoseconds.
    pub nanos: i32,
}

impl TimeInterval {
    /// Returns the interval as a duration.
    pub fn to_duration(&self) -> Duration {
        Duration::hours(i64::from(self.hours))
            + Duration::minutes(i64::from(self.minutes))
            + Duration::seconds(i64::from(self.seconds))
            + Duration::nanoseconds(i64::from(self.nanos))
    }
}

/// An interval of days, hours, minutes, seconds and nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DayTimeInterval {
    /// Days.
    pub days: i32,
    /// Hours.
    pub hours: i32,
    /// Minutes.
    pub minutes: i32,
    /// Seconds.
    pub seconds: i32,
    /// Nanoseconds.
    pub nanos: i32,
}

impl DayTimeInterval {
    /// Returns the interval as a duration.
    pub fn to_duration(&self) -> Duration {
        Duration::days(i64::from(self.days))
            + TimeInterval {
                hours: self.hours,
                minutes: self.minutes,
                seconds: self.seconds,
                nanos: self.nanos,
            }
            .to_duration()
    }
}
