//! Business-day arithmetic.

use jiff::civil::{Date, Weekday};

/// Count weekdays strictly after `start`, up to and including `end`.
///
/// Returns 0 when `end` is on or before `start`. A Friday start reaches
/// 3 on the following Wednesday.
pub fn business_days_between(start: Date, end: Date) -> i64 {
    if end <= start {
        return 0;
    }

    let mut count = 0;
    let mut day = start;
    while day < end {
        let Some(next) = day.tomorrow().ok() else {
            break;
        };
        day = next;
        if is_business_day(day) {
            count += 1;
        }
    }
    count
}

pub fn is_business_day(date: Date) -> bool {
    !matches!(date.weekday(), Weekday::Saturday | Weekday::Sunday)
}
