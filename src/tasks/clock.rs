use std::time::Duration;

use chrono::{Local, NaiveDateTime, Timelike};

const HOUR: Duration = Duration::from_secs(3600);

/// Source of local wall-clock time
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// The system's local time
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Time left until the next top of the hour, and that hour (0-23)
pub fn until_next_hour(now: NaiveDateTime) -> (Duration, u8) {
    let into_hour = Duration::from_secs(u64::from(now.minute() * 60 + now.second()))
        + Duration::from_nanos(u64::from(now.nanosecond() % 1_000_000_000));
    let next_hour = ((now.hour() + 1) % 24) as u8;
    (HOUR.saturating_sub(into_hour), next_hour)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_until_next_hour() {
        assert_eq!(until_next_hour(at(12, 59, 51)), (Duration::from_secs(9), 13));
        assert_eq!(until_next_hour(at(13, 0, 0)), (HOUR, 14));
        assert_eq!(until_next_hour(at(23, 30, 0)), (Duration::from_secs(1800), 0));
    }

    #[test]
    fn test_sub_second_precision() {
        let now = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_milli_opt(7, 59, 59, 250)
            .unwrap();
        assert_eq!(until_next_hour(now), (Duration::from_millis(750), 8));
    }
}
