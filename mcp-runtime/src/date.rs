use chrono::{Days, NaiveDate, Utc};

pub const DEFAULT_LOOKBACK_DAYS: u32 = 28;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateRange {
    pub start_date: String,
    pub end_date: String,
}

pub fn today_utc() -> NaiveDate {
    Utc::now().date_naive()
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn days_before(today: NaiveDate, days: u32) -> NaiveDate {
    today
        .checked_sub_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MIN)
}

/// Start date precedence: explicit `start_date`, then `days` back from
/// `today`, then the default lookback. `end_date` defaults to `today`.
pub fn resolve_date_range(
    start_date: Option<&str>,
    end_date: Option<&str>,
    days: Option<u32>,
    today: NaiveDate,
) -> DateRange {
    let start_date = match (start_date, days) {
        (Some(start), _) => start.to_string(),
        (None, Some(days)) if days > 0 => format_date(days_before(today, days)),
        _ => format_date(days_before(today, DEFAULT_LOOKBACK_DAYS)),
    };
    DateRange {
        start_date,
        end_date: end_date.map_or_else(|| format_date(today), str::to_string),
    }
}
