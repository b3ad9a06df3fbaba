use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, Offset, Utc};

/// Time zone used to turn audit instants into calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CalendarZone {
    /// The host's local time zone.
    #[default]
    Local,
    /// A fixed offset from UTC.
    Fixed(FixedOffset),
}

impl CalendarZone {
    /// Builds a fixed zone from an offset in minutes east of UTC.
    #[must_use]
    pub fn from_offset_minutes(minutes: i32) -> Option<Self> {
        FixedOffset::east_opt(minutes.checked_mul(60)?).map(Self::Fixed)
    }

    /// Returns a zone pinned to UTC.
    #[must_use]
    pub fn utc() -> Self {
        Self::Fixed(Utc.fix())
    }

    /// Returns the calendar date of `instant` in this zone.
    #[must_use]
    pub fn date_of(&self, instant: &DateTime<Utc>) -> NaiveDate {
        self.local_datetime(instant).date()
    }

    /// Returns the wall-clock time of `instant` in this zone.
    #[must_use]
    pub fn local_datetime(&self, instant: &DateTime<Utc>) -> NaiveDateTime {
        match self {
            Self::Local => instant.with_timezone(&Local).naive_local(),
            Self::Fixed(offset) => instant.with_timezone(offset).naive_local(),
        }
    }
}
