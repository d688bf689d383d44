//! Мощность, спрос и процент загрузки

use chrono::NaiveDate;

use super::distribution::HoursClassifier;
use crate::error::CalendarError;
use crate::preprocessing::calendar::{date_range, ProductionCalendar};
use crate::types::{LoadStatus, TimeEntry, User};

/// Нижняя граница «нормы», %
pub const UNDERLOAD_THRESHOLD: f64 = 70.0;
/// Верхняя граница «нормы», %
pub const OVERLOAD_THRESHOLD: f64 = 110.0;

/// Доступные часы сотрудника в диапазоне `[start, end]`
///
/// Начало диапазона не раньше даты создания сотрудника. Каждый засчитанный
/// день даёт сумму дневных квот нормы, предпраздничный день на час меньше.
pub fn capacity(
    user: &User,
    start: NaiveDate,
    end: NaiveDate,
    calendar: &ProductionCalendar,
) -> Result<f64, CalendarError> {
    if !user.is_active {
        return Ok(0.0);
    }
    let Some(norm) = user.norm() else {
        return Ok(0.0);
    };

    let effective_start = start.max(user.created_at);
    let daily = norm.daily_hours();

    let mut total = 0.0;
    for day in date_range(effective_start, end) {
        if !calendar.is_working_day(norm, &user.vacations, day)? {
            continue;
        }
        let hours = if calendar.get(day)?.is_preholiday_short_day {
            (daily - 1.0).max(0.0)
        } else {
            daily
        };
        total += hours;
    }

    Ok(total)
}

/// Часы сотрудника по проектам, которые входят в спрос.
/// Статус записи определяется через проект, как при распределении часов
pub fn demand(
    user: &User,
    start: NaiveDate,
    end: NaiveDate,
    entries: &[TimeEntry],
    classifier: &HoursClassifier,
) -> f64 {
    entries
        .iter()
        .filter(|e| e.user_id == user.id && e.date >= start && e.date <= end)
        .filter(|e| classifier.status_of(e).is_some_and(|s| s.counts_toward_demand()))
        .fold(0.0, |acc, e| acc + e.hours)
}

/// Процент загрузки; 0 при нулевой мощности
pub fn load_pct(demand: f64, capacity: f64) -> f64 {
    if capacity <= 0.0 {
        0.0
    } else {
        demand / capacity * 100.0
    }
}

pub fn status_by_load(pct: f64) -> LoadStatus {
    if pct < UNDERLOAD_THRESHOLD {
        LoadStatus::Underloaded
    } else if pct > OVERLOAD_THRESHOLD {
        LoadStatus::Overloaded
    } else {
        LoadStatus::Normal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::calendar::tests::{d, office_norm, plain_calendar, user_with_norm};
    use crate::types::{ProductionCalendarDay, Project, ProjectStatus};

    fn entry(id: i64, date: NaiveDate, hours: f64, status: ProjectStatus) -> TimeEntry {
        TimeEntry { id, user_id: 1, project_id: 1, date, hours, project_status: Some(status) }
    }

    #[test]
    fn full_week_capacity_is_200() {
        let calendar = plain_calendar(d(2025, 1, 6), d(2025, 1, 12));
        let user = user_with_norm(1, office_norm());
        assert_eq!(capacity(&user, d(2025, 1, 6), d(2025, 1, 12), &calendar), Ok(200.0));
    }

    #[test]
    fn idle_week_is_underloaded() {
        let calendar = plain_calendar(d(2025, 1, 6), d(2025, 1, 12));
        let user = user_with_norm(1, office_norm());
        let cap = capacity(&user, d(2025, 1, 6), d(2025, 1, 12), &calendar).unwrap();
        let dem = demand(&user, d(2025, 1, 6), d(2025, 1, 12), &[], &HoursClassifier::new(&[]));
        assert_eq!(dem, 0.0);
        assert!(dem.is_sign_positive());
        let pct = load_pct(dem, cap);
        assert_eq!(pct, 0.0);
        assert_eq!(status_by_load(pct), LoadStatus::Underloaded);
    }

    #[test]
    fn logged_220_hours_is_boundary_normal() {
        let calendar = plain_calendar(d(2025, 1, 6), d(2025, 1, 12));
        let user = user_with_norm(1, office_norm());
        let entries: Vec<_> = (0..5)
            .map(|i| entry(i, d(2025, 1, 6 + i as u32), 44.0, ProjectStatus::Active))
            .collect();

        let cap = capacity(&user, d(2025, 1, 6), d(2025, 1, 12), &calendar).unwrap();
        let classifier = HoursClassifier::new(&[]);
        let dem = demand(&user, d(2025, 1, 6), d(2025, 1, 12), &entries, &classifier);
        assert_eq!(dem, 220.0);
        let pct = load_pct(dem, cap);
        assert!((pct - 110.0).abs() < 1e-9);
        assert_eq!(status_by_load(pct), LoadStatus::Normal);
    }

    #[test]
    fn status_boundaries() {
        assert_eq!(status_by_load(69.99), LoadStatus::Underloaded);
        assert_eq!(status_by_load(70.0), LoadStatus::Normal);
        assert_eq!(status_by_load(110.0), LoadStatus::Normal);
        assert_eq!(status_by_load(110.01), LoadStatus::Overloaded);
        assert_eq!(load_pct(50.0, 0.0), 0.0);
        assert_eq!(load_pct(50.0, 200.0), 25.0);
    }

    #[test]
    fn demand_excludes_internal_and_on_hold() {
        let user = user_with_norm(1, office_norm());
        let entries = vec![
            entry(1, d(2025, 1, 6), 3.0, ProjectStatus::Active),
            entry(2, d(2025, 1, 6), 2.0, ProjectStatus::Presale),
            entry(3, d(2025, 1, 7), 1.0, ProjectStatus::PresaleArchive),
            entry(4, d(2025, 1, 7), 1.5, ProjectStatus::Archive),
            entry(5, d(2025, 1, 8), 4.0, ProjectStatus::Internal),
            entry(6, d(2025, 1, 8), 4.0, ProjectStatus::OnHold),
            entry(7, d(2025, 1, 20), 8.0, ProjectStatus::Active),
        ];
        let classifier = HoursClassifier::new(&[]);
        assert_eq!(demand(&user, d(2025, 1, 6), d(2025, 1, 12), &entries, &classifier), 7.5);
    }

    #[test]
    fn demand_takes_status_from_the_project() {
        let user = user_with_norm(1, office_norm());
        let project = |id, status| Project {
            id,
            name: None,
            status,
            project_type: None,
            start_date: None,
            end_date: None,
            plans: Vec::new(),
            member_ids: vec![1],
        };
        let projects = vec![project(10, ProjectStatus::Active), project(11, ProjectStatus::OnHold)];
        let entries = vec![
            TimeEntry {
                id: 1,
                user_id: 1,
                project_id: 10,
                date: d(2025, 1, 6),
                hours: 8.0,
                project_status: None,
            },
            // статус проекта важнее устаревшего статуса записи
            TimeEntry {
                id: 2,
                user_id: 1,
                project_id: 11,
                date: d(2025, 1, 7),
                hours: 5.0,
                project_status: Some(ProjectStatus::Active),
            },
        ];

        let classifier = HoursClassifier::new(&projects);
        assert_eq!(demand(&user, d(2025, 1, 6), d(2025, 1, 12), &entries, &classifier), 8.0);
        assert_eq!(
            demand(&user, d(2025, 1, 6), d(2025, 1, 12), &entries[..1], &HoursClassifier::new(&[])),
            0.0
        );
    }

    #[test]
    fn short_day_and_creation_date() {
        let mut days: Vec<ProductionCalendarDay> = date_range(d(2025, 1, 6), d(2025, 1, 10))
            .map(|date| ProductionCalendarDay {
                date,
                is_workday: true,
                is_holiday: false,
                is_preholiday_short_day: false,
                holiday_name: None,
            })
            .collect();
        days[4].is_preholiday_short_day = true;
        let calendar = ProductionCalendar::new(days);

        let mut user = user_with_norm(1, office_norm());
        assert_eq!(capacity(&user, d(2025, 1, 6), d(2025, 1, 10), &calendar), Ok(199.0));

        user.created_at = d(2025, 1, 9);
        assert_eq!(capacity(&user, d(2025, 1, 6), d(2025, 1, 10), &calendar), Ok(79.0));

        user.is_active = false;
        assert_eq!(capacity(&user, d(2025, 1, 6), d(2025, 1, 10), &calendar), Ok(0.0));
    }

    #[test]
    fn calendar_gap_surfaces_as_error() {
        let calendar = plain_calendar(d(2025, 1, 6), d(2025, 1, 9));
        let user = user_with_norm(1, office_norm());
        assert_eq!(
            capacity(&user, d(2025, 1, 6), d(2025, 1, 10), &calendar),
            Err(CalendarError::MissingDay(d(2025, 1, 10)))
        );
    }
}
