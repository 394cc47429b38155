//! 交易时段与时钟
//!
//! 所有对当前时间的读取都通过 [`Clock`]，便于在测试中固定时间。
//! 交易日为周一至周五，不处理节假日。

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;

/// 时间源
pub trait Clock: Send + Sync {
    /// 交易所本地时区下的当前时间
    fn now(&self) -> DateTime<Tz>;
}

/// 系统时钟
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    tz: Tz,
}

impl SystemClock {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.tz)
    }
}

/// 交易日历
#[derive(Debug, Clone, Copy)]
pub struct MarketCalendar {
    open: NaiveTime,
    close: NaiveTime,
}

impl MarketCalendar {
    pub fn new(open: NaiveTime, close: NaiveTime) -> Self {
        Self { open, close }
    }

    /// 是否交易日（周一至周五）
    pub fn is_trading_day(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
    }

    /// `now` 是否处于交易时段内，开盘和收盘时刻都算在内
    pub fn is_open(&self, now: &DateTime<Tz>) -> bool {
        let time = now.time();
        self.is_trading_day(now.date_naive()) && time >= self.open && time <= self.close
    }

    /// `now` 所属的交易日：收盘后和周末归到下一个交易日
    pub fn session_date(&self, now: &DateTime<Tz>) -> NaiveDate {
        let mut date = now.date_naive();
        if now.time() > self.close {
            date += Duration::days(1);
        }
        while !self.is_trading_day(date) {
            date += Duration::days(1);
        }
        date
    }
}

/// 每日重置触发器
///
/// 每个交易日在固定的本地时间触发一次，该时间必须落在休市时段内
#[derive(Debug, Clone)]
pub struct DailyReset {
    at: NaiveTime,
    last: NaiveDate,
}

impl DailyReset {
    /// 以启动时间初始化：若今天的触发时间已过，视为今天已经重置过
    pub fn new(at: NaiveTime, now: &DateTime<Tz>) -> Self {
        let today = now.date_naive();
        let last = if now.time() >= at {
            today
        } else {
            today - Duration::days(1)
        };
        Self { at, last }
    }

    /// 检查是否到了重置时间；到了则记录并返回 `true`，同一天只返回一次
    pub fn poll(&mut self, calendar: &MarketCalendar, now: &DateTime<Tz>) -> bool {
        let today = now.date_naive();
        if today <= self.last || now.time() < self.at || !calendar.is_trading_day(today) {
            return false;
        }
        self.last = today;
        true
    }
}

#[cfg(test)]
pub use self::test_clock::FixedClock;

#[cfg(test)]
mod test_clock {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Mutex;

    /// 可手动拨动的测试时钟
    pub struct FixedClock {
        now: Mutex<DateTime<Tz>>,
    }

    impl FixedClock {
        pub fn at(tz: Tz, y: i32, m: u32, d: u32, hh: u32, mm: u32) -> Self {
            let now = tz.with_ymd_and_hms(y, m, d, hh, mm, 0).unwrap();
            Self { now: Mutex::new(now) }
        }

        pub fn set(&self, now: DateTime<Tz>) {
            *self.now.lock().unwrap() = now;
        }

        pub fn advance(&self, by: Duration) {
            let mut now = self.now.lock().unwrap();
            *now = *now + by;
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Tz> {
            *self.now.lock().unwrap()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Africa::Cairo;

    fn calendar() -> MarketCalendar {
        MarketCalendar::new(
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
        )
    }

    fn cairo(y: i32, m: u32, d: u32, hh: u32, mm: u32) -> DateTime<Tz> {
        Cairo.with_ymd_and_hms(y, m, d, hh, mm, 0).unwrap()
    }

    /// 2026-10-17 是周六，2026-10-20 是周二
    #[test]
    fn test_is_open() {
        let cal = calendar();
        assert!(!cal.is_open(&cairo(2026, 10, 17, 10, 0)));
        assert!(!cal.is_open(&cairo(2026, 10, 18, 12, 0)));
        assert!(cal.is_open(&cairo(2026, 10, 20, 10, 0)));
        assert!(!cal.is_open(&cairo(2026, 10, 20, 8, 59)));
        assert!(!cal.is_open(&cairo(2026, 10, 20, 19, 30)));
        assert!(cal.is_open(&cairo(2026, 10, 20, 9, 0)));
        assert!(cal.is_open(&cairo(2026, 10, 20, 18, 0)));
    }

    #[test]
    fn test_fixed_clock() {
        let clock = FixedClock::at(Cairo, 2026, 10, 20, 10, 0);
        assert_eq!(clock.now().date_naive(), NaiveDate::from_ymd_opt(2026, 10, 20).unwrap());
        clock.advance(Duration::hours(15));
        assert_eq!(clock.now().date_naive(), NaiveDate::from_ymd_opt(2026, 10, 21).unwrap());
        assert!(calendar().is_open(&cairo(2026, 10, 21, 10, 0)));
        clock.set(cairo(2026, 10, 17, 10, 0));
        assert!(!calendar().is_open(&clock.now()));
    }

    #[test]
    fn test_daily_reset_fires_once_per_trading_day() {
        let cal = calendar();
        let at = NaiveTime::from_hms_opt(1, 0, 0).unwrap();

        // 周二上午启动，当天的重置已过
        let mut reset = DailyReset::new(at, &cairo(2026, 10, 20, 10, 0));
        assert!(!reset.poll(&cal, &cairo(2026, 10, 20, 12, 0)));
        assert!(!reset.poll(&cal, &cairo(2026, 10, 21, 0, 59)));
        assert!(reset.poll(&cal, &cairo(2026, 10, 21, 1, 0)));
        assert!(!reset.poll(&cal, &cairo(2026, 10, 21, 1, 10)));
        assert!(!reset.poll(&cal, &cairo(2026, 10, 21, 23, 59)));

        // 周末不触发，周一触发
        let mut reset = DailyReset::new(at, &cairo(2026, 10, 23, 10, 0));
        assert!(!reset.poll(&cal, &cairo(2026, 10, 24, 1, 0)));
        assert!(!reset.poll(&cal, &cairo(2026, 10, 25, 1, 0)));
        assert!(reset.poll(&cal, &cairo(2026, 10, 26, 1, 5)));
    }

    #[test]
    fn test_session_date() {
        let cal = calendar();
        let date = |d| NaiveDate::from_ymd_opt(2026, 10, d).unwrap();
        // 周一交易时段内和收盘时刻都属于当天
        assert_eq!(cal.session_date(&cairo(2026, 10, 19, 10, 0)), date(19));
        assert_eq!(cal.session_date(&cairo(2026, 10, 19, 18, 0)), date(19));
        // 收盘后归到下一个交易日
        assert_eq!(cal.session_date(&cairo(2026, 10, 19, 20, 0)), date(20));
        assert_eq!(cal.session_date(&cairo(2026, 10, 20, 1, 0)), date(20));
        // 周五收盘后和周末归到下周一
        assert_eq!(cal.session_date(&cairo(2026, 10, 23, 20, 0)), date(26));
        assert_eq!(cal.session_date(&cairo(2026, 10, 24, 10, 0)), date(26));
    }

    #[test]
    fn test_daily_reset_before_trigger_time() {
        let cal = calendar();
        let at = NaiveTime::from_hms_opt(1, 0, 0).unwrap();
        let mut reset = DailyReset::new(at, &cairo(2026, 10, 20, 0, 30));
        assert!(!reset.poll(&cal, &cairo(2026, 10, 20, 0, 45)));
        assert!(reset.poll(&cal, &cairo(2026, 10, 20, 1, 0)));
    }
}
