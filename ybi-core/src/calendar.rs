//! US equity market calendar and session arithmetic.
//!
//! Pure and deterministic: weekends plus the NYSE/NASDAQ holiday table for
//! the supported span. Session wall-clock times live in US/Eastern and are
//! converted to UTC instants once per day via `SessionClock`.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::America::New_York;
use chrono_tz::Tz;

/// NYSE/NASDAQ full-closure holidays, 2024–2026.
const MARKET_HOLIDAYS: &[(i32, u32, u32)] = &[
    // 2024
    (2024, 1, 1),
    (2024, 1, 15),
    (2024, 2, 19),
    (2024, 3, 29),
    (2024, 5, 27),
    (2024, 6, 19),
    (2024, 7, 4),
    (2024, 9, 2),
    (2024, 11, 28),
    (2024, 12, 25),
    // 2025
    (2025, 1, 1),
    (2025, 1, 20),
    (2025, 2, 17),
    (2025, 4, 18),
    (2025, 5, 26),
    (2025, 6, 19),
    (2025, 7, 4),
    (2025, 9, 1),
    (2025, 11, 27),
    (2025, 12, 25),
    // 2026
    (2026, 1, 1),
    (2026, 1, 19),
    (2026, 2, 16),
    (2026, 4, 3),
    (2026, 5, 25),
    (2026, 6, 19),
    (2026, 7, 3),
    (2026, 9, 7),
    (2026, 11, 26),
    (2026, 12, 25),
];

pub fn is_market_holiday(d: NaiveDate) -> bool {
    MARKET_HOLIDAYS
        .iter()
        .any(|&(y, m, day)| d.year() == y && d.month() == m && d.day() == day)
}

pub fn is_weekend(d: NaiveDate) -> bool {
    matches!(d.weekday(), Weekday::Sat | Weekday::Sun)
}

/// A weekday that is not a full-closure holiday.
pub fn is_trading_day(d: NaiveDate) -> bool {
    !is_weekend(d) && !is_market_holiday(d)
}

/// All trading days in `[start, end]`, ascending.
pub fn trading_days(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut days = Vec::new();
    let mut current = start;
    while current <= end {
        if is_trading_day(current) {
            days.push(current);
        }
        current += Duration::days(1);
    }
    days
}

/// Previous trading day with data, per a probe into the data layer.
///
/// Calendar arithmetic alone is not enough: a session can be open yet have
/// no grouped-daily data for a thin provider, so each candidate is
/// confirmed via `probe` before being returned. Gives up after 10 calendar
/// days.
pub fn prev_trading_day_with_data<F>(d: NaiveDate, mut probe: F) -> Option<NaiveDate>
where
    F: FnMut(NaiveDate) -> bool,
{
    let mut candidate = d - Duration::days(1);
    for _ in 0..10 {
        if is_trading_day(candidate) && probe(candidate) {
            return Some(candidate);
        }
        candidate -= Duration::days(1);
    }
    None
}

/// Session wall-clock boundaries for one run, held in US/Eastern.
#[derive(Debug, Clone)]
pub struct SessionClock {
    tz: Tz,
    pub premarket_start: NaiveTime,
    pub premarket_end: NaiveTime,
    pub rth_open: NaiveTime,
    pub entry_window_start: NaiveTime,
    pub entry_window_end: NaiveTime,
    pub force_flat: NaiveTime,
    pub rth_close: NaiveTime,
}

impl SessionClock {
    pub fn new(
        entry_window_start: NaiveTime,
        entry_window_end: NaiveTime,
        force_flat: NaiveTime,
    ) -> Self {
        Self {
            tz: New_York,
            premarket_start: NaiveTime::from_hms_opt(4, 0, 0).unwrap(),
            premarket_end: NaiveTime::from_hms_opt(9, 29, 0).unwrap(),
            rth_open: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            entry_window_start,
            entry_window_end,
            force_flat,
            rth_close: NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
        }
    }

    /// Convert an Eastern wall-clock time on `date` to a UTC instant.
    ///
    /// Eastern has no DST gap during the trading session, so the single
    /// mapping always exists.
    pub fn instant(&self, date: NaiveDate, t: NaiveTime) -> DateTime<Utc> {
        self.tz
            .from_local_datetime(&date.and_time(t))
            .single()
            .expect("session times do not fall in a DST transition")
            .with_timezone(&Utc)
    }

    pub fn premarket_start_instant(&self, date: NaiveDate) -> DateTime<Utc> {
        self.instant(date, self.premarket_start)
    }

    pub fn premarket_end_instant(&self, date: NaiveDate) -> DateTime<Utc> {
        self.instant(date, self.premarket_end)
    }

    pub fn rth_open_instant(&self, date: NaiveDate) -> DateTime<Utc> {
        self.instant(date, self.rth_open)
    }

    pub fn entry_window(&self, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        (
            self.instant(date, self.entry_window_start),
            self.instant(date, self.entry_window_end),
        )
    }

    pub fn force_flat_instant(&self, date: NaiveDate) -> DateTime<Utc> {
        self.instant(date, self.force_flat)
    }

    pub fn rth_close_instant(&self, date: NaiveDate) -> DateTime<Utc> {
        self.instant(date, self.rth_close)
    }

    /// Format a UTC instant as Eastern wall-clock, for artifacts and logs.
    pub fn eastern_string(&self, ts: DateTime<Utc>) -> String {
        ts.with_timezone(&self.tz).to_rfc3339()
    }
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::new(
            NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn weekends_are_not_trading_days() {
        assert!(!is_trading_day(d(2025, 3, 1))); // Saturday
        assert!(!is_trading_day(d(2025, 3, 2))); // Sunday
        assert!(is_trading_day(d(2025, 3, 3))); // Monday
    }

    #[test]
    fn holidays_are_not_trading_days() {
        assert!(!is_trading_day(d(2025, 7, 4)));
        assert!(!is_trading_day(d(2025, 11, 27)));
        assert!(is_trading_day(d(2025, 7, 7)));
    }

    #[test]
    fn trading_days_skips_weekend_and_holiday() {
        // Thu 2025-01-16 .. Tue 2025-01-21, with MLK Day on Mon 01-20
        let days = trading_days(d(2025, 1, 16), d(2025, 1, 21));
        assert_eq!(days, vec![d(2025, 1, 16), d(2025, 1, 17), d(2025, 1, 21)]);
    }

    #[test]
    fn prev_trading_day_respects_probe() {
        // Friday 2025-02-28 has no data; probe should land on Thursday.
        let prev = prev_trading_day_with_data(d(2025, 3, 3), |c| c != d(2025, 2, 28));
        assert_eq!(prev, Some(d(2025, 2, 27)));
    }

    #[test]
    fn prev_trading_day_gives_up() {
        let prev = prev_trading_day_with_data(d(2025, 3, 3), |_| false);
        assert_eq!(prev, None);
    }

    #[test]
    fn session_instants_in_march_est() {
        // 2025-03-03 is EST (UTC-5): 09:30 ET == 14:30 UTC.
        let clock = SessionClock::default();
        let open = clock.rth_open_instant(d(2025, 3, 3));
        assert_eq!(open, Utc.with_ymd_and_hms(2025, 3, 3, 14, 30, 0).unwrap());
    }

    #[test]
    fn session_instants_in_july_edt() {
        // 2025-07-07 is EDT (UTC-4): 09:30 ET == 13:30 UTC.
        let clock = SessionClock::default();
        let open = clock.rth_open_instant(d(2025, 7, 7));
        assert_eq!(open, Utc.with_ymd_and_hms(2025, 7, 7, 13, 30, 0).unwrap());
    }
}
