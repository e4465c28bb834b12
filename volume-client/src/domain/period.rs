use std::{fmt, str::FromStr};

use time::{Duration, OffsetDateTime, Time};

/// Calendar unit used to bucket readings.
///
/// The string form of each variant is the field name accepted by PostgreSQL's
/// `date_trunc`, so it can be bound straight into the grouped queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeriodToken {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid period: '{0}'")]
pub struct UnknownPeriod(pub String);

impl PeriodToken {
    pub const ALL: [PeriodToken; 7] = [
        Self::Second,
        Self::Minute,
        Self::Hour,
        Self::Day,
        Self::Week,
        Self::Month,
        Self::Year,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Second => "second",
            Self::Minute => "minute",
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
        }
    }

    /// Truncate `ts` to the start of its bucket, in `ts`'s own offset.
    ///
    /// Weeks start on Monday (ISO), matching `date_trunc('week', ...)`.
    pub fn truncate(&self, ts: OffsetDateTime) -> OffsetDateTime {
        let midnight = ts.replace_time(Time::MIDNIGHT);
        let (hour, minute, second) = (ts.hour() as i64, ts.minute() as i64, ts.second() as i64);

        match self {
            Self::Second => midnight + Duration::seconds(hour * 3600 + minute * 60 + second),
            Self::Minute => midnight + Duration::minutes(hour * 60 + minute),
            Self::Hour => midnight + Duration::hours(hour),
            Self::Day => midnight,
            Self::Week => midnight - Duration::days(ts.weekday().number_days_from_monday() as i64),
            Self::Month => midnight - Duration::days(ts.day() as i64 - 1),
            Self::Year => midnight - Duration::days(ts.ordinal() as i64 - 1),
        }
    }

    /// Half-open window `[start, end)` of the bucket containing `ts`.
    pub fn window_containing(&self, ts: OffsetDateTime) -> (OffsetDateTime, OffsetDateTime) {
        let start = self.truncate(ts);
        let end = match self {
            Self::Second => start + Duration::SECOND,
            Self::Minute => start + Duration::MINUTE,
            Self::Hour => start + Duration::HOUR,
            Self::Day => start + Duration::DAY,
            Self::Week => start + Duration::WEEK,
            Self::Month => {
                start + Duration::days(start.month().length(start.year()) as i64)
            }
            Self::Year => start + Duration::days(time::util::days_in_year(start.year()) as i64),
        };
        (start, end)
    }
}

impl FromStr for PeriodToken {
    type Err = UnknownPeriod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownPeriod(s.to_string()))
    }
}

impl fmt::Display for PeriodToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
