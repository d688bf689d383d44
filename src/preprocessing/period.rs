//! Границы отчётного периода

use chrono::{Datelike, Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};

/// Тип отчётного периода
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Week,
    #[default]
    Month,
    Quarter,
    #[serde(rename = "halfyear")]
    HalfYear,
    Year,
    MonthToDate,
    #[serde(rename = "last_30_days")]
    Last30Days,
}

impl Period {
    pub fn as_str(self) -> &'static str {
        match self {
            Period::Week => "week",
            Period::Month => "month",
            Period::Quarter => "quarter",
            Period::HalfYear => "halfyear",
            Period::Year => "year",
            Period::MonthToDate => "month_to_date",
            Period::Last30Days => "last_30_days",
        }
    }

    /// Первый день периода, содержащего `reference`
    pub fn start(self, reference: NaiveDate) -> NaiveDate {
        match self {
            Period::Week => {
                let offset = reference.weekday().num_days_from_monday() as i64;
                reference - Duration::days(offset)
            }
            Period::Month | Period::MonthToDate => {
                first_of_month(reference.year(), reference.month())
            }
            Period::Last30Days => reference - Duration::days(30),
            Period::Quarter => {
                let first_month = (reference.month0() / 3) * 3 + 1;
                first_of_month(reference.year(), first_month)
            }
            Period::HalfYear => {
                let first_month = if reference.month() <= 6 { 1 } else { 7 };
                first_of_month(reference.year(), first_month)
            }
            Period::Year => first_of_month(reference.year(), 1),
        }
    }

    /// Последний день периода (включительно)
    pub fn end(self, reference: NaiveDate) -> NaiveDate {
        let start = self.start(reference);
        match self {
            Period::MonthToDate | Period::Last30Days => reference,
            Period::Week => start + Duration::days(6),
            Period::Month => last_day_after(start, 1),
            Period::Quarter => last_day_after(start, 3),
            Period::HalfYear => last_day_after(start, 6),
            Period::Year => last_day_after(start, 12),
        }
    }

    pub fn bounds(self, reference: NaiveDate) -> PeriodBounds {
        PeriodBounds {
            start: self.start(reference),
            end: self.end(reference),
        }
    }
}

/// Включительные границы периода
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PeriodBounds {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl PeriodBounds {
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    /// Ключ периода в виде `yyyy-mm-dd_yyyy-mm-dd`
    pub fn key(&self) -> String {
        format!("{}_{}", self.start, self.end)
    }
}

/// Сдвиг даты на `months` месяцев с прижатием к концу месяца
pub fn add_months(date: NaiveDate, months: u32) -> NaiveDate {
    date.checked_add_months(Months::new(months)).unwrap_or(NaiveDate::MAX)
}

fn first_of_month(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN)
}

fn last_day_after(start: NaiveDate, months: u32) -> NaiveDate {
    add_months(start, months) - Duration::days(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn span(start: NaiveDate, end: NaiveDate) -> PeriodBounds {
        PeriodBounds { start, end }
    }

    #[test]
    fn calendar_periods() {
        let today = d(2025, 5, 14); // среда
        assert_eq!(Period::Week.bounds(today), span(d(2025, 5, 12), d(2025, 5, 18)));
        assert_eq!(Period::Month.bounds(today), span(d(2025, 5, 1), d(2025, 5, 31)));
        assert_eq!(Period::Quarter.bounds(today), span(d(2025, 4, 1), d(2025, 6, 30)));
        assert_eq!(Period::HalfYear.bounds(today), span(d(2025, 1, 1), d(2025, 6, 30)));
        assert_eq!(Period::Year.bounds(today), span(d(2025, 1, 1), d(2025, 12, 31)));
    }

    #[test]
    fn rolling_periods_end_today() {
        let today = d(2025, 3, 10);
        assert_eq!(Period::MonthToDate.bounds(today), span(d(2025, 3, 1), today));
        assert_eq!(Period::Last30Days.bounds(today), span(d(2025, 2, 8), today));
    }

    #[test]
    fn february_and_month_clamping() {
        assert_eq!(Period::Month.end(d(2024, 2, 10)), d(2024, 2, 29));
        assert_eq!(add_months(d(2025, 1, 31), 1), d(2025, 2, 28));
    }

    #[test]
    fn serde_names() {
        let parsed: Period = serde_json::from_str("\"halfyear\"").unwrap();
        assert_eq!(parsed, Period::HalfYear);
        let parsed: Period = serde_json::from_str("\"last_30_days\"").unwrap();
        assert_eq!(parsed, Period::Last30Days);
        assert_eq!(serde_json::to_string(&Period::MonthToDate).unwrap(), "\"month_to_date\"");
    }
}
