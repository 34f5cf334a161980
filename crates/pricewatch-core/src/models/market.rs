//! Trading session status for the markets alerts are usually set on

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// NYSE / Nasdaq regular session, minutes after local midnight
const US_SESSION: (u32, u32) = (9 * 60 + 30, 16 * 60);

/// IDX regular session, minutes after local midnight (WIB)
const IHSG_SESSION: (u32, u32) = (9 * 60, 16 * 60);

/// Jakarta is UTC+7 all year
const WIB_OFFSET_HOURS: i64 = 7;

/// Which markets are in their regular session.
///
/// Weekends and session hours only; exchange holidays are not known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketStatus {
    /// Instant the status was computed for
    pub as_of: DateTime<Utc>,
    /// US equities (NYSE / Nasdaq)
    pub us_market_open: bool,
    /// Indonesia Stock Exchange
    pub ihsg_market_open: bool,
    /// Crypto trades around the clock
    pub crypto_market_open: bool,
}

impl MarketStatus {
    /// Status of each market at `now`
    pub fn at(now: DateTime<Utc>) -> Self {
        let eastern = now.naive_utc() + Duration::hours(us_eastern_offset_hours(now));
        let jakarta = now.naive_utc() + Duration::hours(WIB_OFFSET_HOURS);

        Self {
            as_of: now,
            us_market_open: in_session(eastern, US_SESSION),
            ihsg_market_open: in_session(jakarta, IHSG_SESSION),
            crypto_market_open: true,
        }
    }
}

fn in_session(local: NaiveDateTime, (open, close): (u32, u32)) -> bool {
    if matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
        return false;
    }
    let minute = local.hour() * 60 + local.minute();
    (open..close).contains(&minute)
}

// EDT from the second Sunday of March 02:00 EST to the first Sunday of
// November 02:00 EDT, otherwise EST
fn us_eastern_offset_hours(now: DateTime<Utc>) -> i64 {
    let year = now.year();
    let dst = nth_sunday(year, 3, 2)
        .zip(nth_sunday(year, 11, 1))
        .and_then(|(start, end)| Some((start.and_hms_opt(7, 0, 0)?, end.and_hms_opt(6, 0, 0)?)))
        .map(|(start, end)| {
            let start = Utc.from_utc_datetime(&start);
            let end = Utc.from_utc_datetime(&end);
            now >= start && now < end
        })
        .unwrap_or(false);

    if dst {
        -4
    } else {
        -5
    }
}

fn nth_sunday(year: i32, month: u32, n: u32) -> Option<NaiveDate> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let to_sunday = (7 - first.weekday().num_days_from_sunday()) % 7;
    first.checked_add_signed(Duration::days(i64::from(to_sunday + 7 * (n - 1))))
}
