//! Calendar boundaries at which the periodic counters expire.

use chrono::{DateTime, Datelike, Days, LocalResult, NaiveDate, NaiveTime, TimeZone};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Period {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Period {
    pub const ALL: [Period; 4] = [
        Period::Daily,
        Period::Weekly,
        Period::Monthly,
        Period::Yearly,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }
}

/// Start of the period following the one containing `now`, in `now`'s
/// time zone.
///
/// - daily: the next midnight
/// - weekly: the midnight ending the coming Sunday (on a Sunday, the
///   midnight ending today), so weeks run Monday through Sunday
/// - monthly: midnight on the 1st of next month
/// - yearly: midnight on January 1st of next year
pub fn period_boundary<Tz: TimeZone>(now: &DateTime<Tz>, period: Period) -> DateTime<Tz> {
    let today = now.date_naive();
    let day = match period {
        Period::Daily => next_day(today),
        Period::Weekly => {
            let until_sunday = (7 - today.weekday().num_days_from_sunday()) % 7;
            next_day(
                today
                    .checked_add_days(Days::new(u64::from(until_sunday)))
                    .unwrap_or(NaiveDate::MAX),
            )
        }
        Period::Monthly => {
            let (year, month) = if today.month() == 12 {
                (today.year() + 1, 1)
            } else {
                (today.year(), today.month() + 1)
            };
            NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MAX)
        }
        Period::Yearly => NaiveDate::from_ymd_opt(today.year() + 1, 1, 1).unwrap_or(NaiveDate::MAX),
    };
    local_midnight(&now.timezone(), day)
}

fn next_day(day: NaiveDate) -> NaiveDate {
    day.succ_opt().unwrap_or(NaiveDate::MAX)
}

/// First valid local instant of `day`. Midnight itself may be skipped by a
/// DST transition.
fn local_midnight<Tz: TimeZone>(tz: &Tz, day: NaiveDate) -> DateTime<Tz> {
    for hour in 0..4 {
        let Some(time) = NaiveTime::from_hms_opt(hour, 0, 0) else {
            continue;
        };
        match tz.from_local_datetime(&day.and_time(time)) {
            LocalResult::Single(instant) => return instant,
            LocalResult::Ambiguous(earliest, _) => return earliest,
            LocalResult::None => continue,
        }
    }
    tz.from_utc_datetime(&day.and_time(NaiveTime::default()))
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, Weekday};

    use super::*;

    fn at(offset_hours: i32, y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<FixedOffset> {
        let tz = FixedOffset::east_opt(offset_hours * 3600).unwrap();
        tz.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn boundaries_for_a_friday_morning() {
        let now = at(0, 2024, 3, 15, 10, 0);
        assert_eq!(period_boundary(&now, Period::Daily), at(0, 2024, 3, 16, 0, 0));
        assert_eq!(period_boundary(&now, Period::Weekly), at(0, 2024, 3, 18, 0, 0));
        assert_eq!(period_boundary(&now, Period::Monthly), at(0, 2024, 4, 1, 0, 0));
        assert_eq!(period_boundary(&now, Period::Yearly), at(0, 2025, 1, 1, 0, 0));
    }

    #[test]
    fn sunday_expires_at_end_of_same_day() {
        let now = at(0, 2024, 3, 17, 10, 0);
        assert_eq!(now.weekday(), Weekday::Sun);
        assert_eq!(period_boundary(&now, Period::Weekly), at(0, 2024, 3, 18, 0, 0));
    }

    #[test]
    fn monday_midnight_rolls_to_following_week() {
        let now = at(0, 2024, 3, 18, 0, 0);
        assert_eq!(period_boundary(&now, Period::Weekly), at(0, 2024, 3, 25, 0, 0));
        assert_eq!(period_boundary(&now, Period::Daily), at(0, 2024, 3, 19, 0, 0));
    }

    #[test]
    fn december_rolls_into_next_year() {
        let now = at(0, 2024, 12, 31, 23, 59);
        assert_eq!(period_boundary(&now, Period::Daily), at(0, 2025, 1, 1, 0, 0));
        assert_eq!(period_boundary(&now, Period::Monthly), at(0, 2025, 1, 1, 0, 0));
        assert_eq!(period_boundary(&now, Period::Yearly), at(0, 2025, 1, 1, 0, 0));
    }

    #[test]
    fn leap_day_month_boundary() {
        let now = at(0, 2024, 2, 29, 12, 0);
        assert_eq!(period_boundary(&now, Period::Monthly), at(0, 2024, 3, 1, 0, 0));
    }

    #[test]
    fn boundaries_follow_the_local_offset() {
        let now = at(8, 2024, 3, 15, 23, 30);
        let daily = period_boundary(&now, Period::Daily);
        assert_eq!(daily, at(8, 2024, 3, 16, 0, 0));
        assert_eq!(daily.timestamp(), at(0, 2024, 3, 15, 16, 0).timestamp());
    }

    /// UTC-3 until 2018-11-04 00:00 local, then UTC-2: the clock jumps from
    /// 23:59:59 straight to 01:00, so that midnight never happens.
    #[derive(Debug, Clone, Copy)]
    struct SkippedMidnight;

    const DST_START_LOCAL: (i32, u32, u32) = (2018, 11, 4);

    fn standard() -> FixedOffset {
        FixedOffset::west_opt(3 * 3600).unwrap()
    }

    fn summer() -> FixedOffset {
        FixedOffset::west_opt(2 * 3600).unwrap()
    }

    fn dst_start() -> chrono::NaiveDateTime {
        let (y, m, d) = DST_START_LOCAL;
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    impl TimeZone for SkippedMidnight {
        type Offset = FixedOffset;

        fn from_offset(_: &FixedOffset) -> Self {
            SkippedMidnight
        }

        fn offset_from_local_date(&self, local: &NaiveDate) -> LocalResult<FixedOffset> {
            self.offset_from_local_datetime(&local.and_time(NaiveTime::default()))
        }

        fn offset_from_local_datetime(
            &self,
            local: &chrono::NaiveDateTime,
        ) -> LocalResult<FixedOffset> {
            let gap_end = dst_start() + chrono::Duration::hours(1);
            if *local < dst_start() {
                LocalResult::Single(standard())
            } else if *local < gap_end {
                LocalResult::None
            } else {
                LocalResult::Single(summer())
            }
        }

        fn offset_from_utc_date(&self, utc: &NaiveDate) -> FixedOffset {
            self.offset_from_utc_datetime(&utc.and_time(NaiveTime::default()))
        }

        fn offset_from_utc_datetime(&self, utc: &chrono::NaiveDateTime) -> FixedOffset {
            // Local midnight at UTC-3 is 03:00 UTC.
            if *utc < dst_start() + chrono::Duration::hours(3) {
                standard()
            } else {
                summer()
            }
        }
    }

    #[test]
    fn skipped_midnight_resolves_to_first_valid_hour() {
        let now = SkippedMidnight.with_ymd_and_hms(2018, 11, 3, 12, 0, 0).unwrap();

        let daily = period_boundary(&now, Period::Daily);
        let expected = NaiveDate::from_ymd_opt(2018, 11, 4)
            .unwrap()
            .and_hms_opt(1, 0, 0)
            .unwrap();
        assert_eq!(daily.naive_local(), expected);
        assert_eq!(daily.offset(), &summer());
        // 01:00 at UTC-2 is 03:00 UTC.
        assert_eq!(daily.naive_utc(), expected + chrono::Duration::hours(2));
    }

    #[test]
    fn weekly_boundary_after_dst_change() {
        let now = SkippedMidnight.with_ymd_and_hms(2018, 11, 3, 12, 0, 0).unwrap();
        assert_eq!(now.weekday(), Weekday::Sat);

        let weekly = period_boundary(&now, Period::Weekly);
        let expected = NaiveDate::from_ymd_opt(2018, 11, 5)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(weekly.naive_local(), expected);
        assert_eq!(weekly.offset(), &summer());
    }

    #[test]
    fn period_names_match_counter_keys() {
        let names: Vec<_> = Period::ALL.iter().map(|p| p.as_str()).collect();
        assert_eq!(names, ["daily", "weekly", "monthly", "yearly"]);
    }
}
