//! Производственный календарь и проверка рабочих дней сотрудника

use std::collections::HashMap;

use chrono::{Datelike, NaiveDate};

use crate::error::CalendarError;
use crate::types::{Norm, ProductionCalendarDay, User, Vacation};

/// Итератор по дням включительного диапазона; пустой, если `start > end`
pub fn date_range(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start.iter_days().take_while(move |day| *day <= end)
}

/// Общий для всех сотрудников производственный календарь (дата → день)
#[derive(Debug, Clone, Default)]
pub struct ProductionCalendar {
    days: HashMap<NaiveDate, ProductionCalendarDay>,
}

impl ProductionCalendar {
    pub fn new(days: impl IntoIterator<Item = ProductionCalendarDay>) -> Self {
        Self {
            days: days.into_iter().map(|day| (day.date, day)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// День календаря. Отсутствие записи - ошибка, а не рабочий день по умолчанию
    pub fn get(&self, date: NaiveDate) -> Result<&ProductionCalendarDay, CalendarError> {
        self.days.get(&date).ok_or(CalendarError::MissingDay(date))
    }

    /// Даты диапазона, для которых в календаре нет записи
    pub fn missing_days(&self, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        date_range(start, end)
            .filter(|day| !self.days.contains_key(day))
            .collect()
    }

    /// Засчитывается ли день как рабочий для сотрудника с нормой `norm`
    ///
    /// День засчитывается, если:
    /// - день недели входит в рабочие дни нормы;
    /// - календарь отмечает его рабочим и не праздничным, либо это праздник
    ///   и норма допускает работу в праздники;
    /// - день не попадает ни в один отпуск.
    pub fn is_working_day(
        &self,
        norm: &Norm,
        vacations: &[Vacation],
        date: NaiveDate,
    ) -> Result<bool, CalendarError> {
        let day = self.get(date)?;

        if !norm.works_on_weekday(date.weekday().number_from_monday()) {
            return Ok(false);
        }

        let calendar_allows =
            (day.is_workday && !day.is_holiday) || (day.is_holiday && norm.works_on_holidays);
        if !calendar_allows {
            return Ok(false);
        }

        Ok(!vacations.iter().any(|v| v.contains(date)))
    }

    /// Количество рабочих дней сотрудника в диапазоне `[start, end]`
    pub fn working_days(
        &self,
        user: &User,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<u32, CalendarError> {
        let Some(norm) = user.norm() else {
            return Ok(0);
        };

        let mut count = 0;
        for day in date_range(start, end) {
            if self.is_working_day(norm, &user.vacations, day)? {
                count += 1;
            }
        }
        Ok(count)
    }
}
