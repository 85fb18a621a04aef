use std::time::SystemTime;
use time::{Date, Month, Weekday};

/// Seconds since the Unix epoch, or 0 if the system clock reports a time before the epoch.
#[must_use]
pub fn current_time_secs() -> i64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|duration| duration.as_secs() as i64)
        .unwrap_or_default()
}

/// Number of days in the given month (1-12) of the given year within its century.
///
/// February has 29 days in every 4th year, matching what RTC chips do.
#[must_use]
pub fn days_in_month(month: u8, year: u8) -> u8 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if year % 4 == 0 {
                29
            } else {
                28
            }
        }
        _ => {
            log::error!("Invalid month: {month}, defaulting to 31 days in month");
            31
        }
    }
}

/// Weekday of the given date. Day and month both start at 1.
#[must_use]
pub fn day_of_week(day: u8, month: u8, year: u16) -> Weekday {
    let month = Month::try_from(month).unwrap_or_else(|err| {
        log::error!("Invalid month: {month} ({err}), defaulting to January");
        Month::January
    });

    match Date::from_calendar_date(year.into(), month, day) {
        Ok(date) => date.weekday(),
        Err(err) => {
            log::error!("Invalid date (day={day}, month={month}, year={year}): {err}");
            Weekday::Sunday
        }
    }
}
