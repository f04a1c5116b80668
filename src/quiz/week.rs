use chrono::{Datelike, Duration, NaiveDate};

/// Monday and Sunday of the week containing `day`.
pub fn week_window(day: NaiveDate) -> (NaiveDate, NaiveDate) {
    let monday = day - Duration::days(day.weekday().num_days_from_monday() as i64);
    (monday, monday + Duration::days(6))
}

/// First and last day of the calendar month containing `day`.
pub fn month_window(day: NaiveDate) -> (NaiveDate, NaiveDate) {
    let first = day.with_day(1).unwrap_or(day);
    let next_month_first = if first.month() == 12 {
        NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)
    };
    let last = next_month_first
        .and_then(|d| d.pred_opt())
        .unwrap_or(day);
    (first, last)
}

/// Seven flags, Monday first, set for the days found in `completed_dates`.
pub fn week_completion(day: NaiveDate, completed_dates: &[NaiveDate]) -> [bool; 7] {
    let (monday, _) = week_window(day);
    let mut days = [false; 7];
    for date in completed_dates {
        let offset = (*date - monday).num_days();
        if (0..7).contains(&offset) {
            days[offset as usize] = true;
        }
    }
    days
}
