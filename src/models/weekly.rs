//! Понедельный ряд загрузки: факт до сегодняшнего дня, прогноз после

use chrono::{Datelike, Duration, NaiveDate};
use tracing::warn;

use super::capacity::{capacity, load_pct};
use super::distribution::HoursClassifier;
use super::forecasting::LoggedHours;
use crate::error::CalendarError;
use crate::preprocessing::calendar::ProductionCalendar;
use crate::preprocessing::period::add_months;
use crate::types::{Project, ProjectStatus, TimeEntry, User, UserId, WeeklyLoadData};

/// Понедельник недели, содержащей `date`
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// Окно ряда: от понедельника недели `period_start` до воскресенья недели
/// `period_start + horizon_months`
pub fn weekly_window(period_start: NaiveDate, horizon_months: u32) -> (NaiveDate, NaiveDate) {
    let last = add_months(period_start, horizon_months);
    (week_start(period_start), week_start(last) + Duration::days(6))
}

/// Часы недели по трём корзинам графика
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct WeekHours {
    commercial: f64,
    presale: f64,
    internal: f64,
}

impl WeekHours {
    fn total(&self) -> f64 {
        self.commercial + self.presale + self.internal
    }

    /// Пропорционально ужимает корзины до `limit`
    fn cap(self, limit: f64) -> Self {
        let total = self.total();
        if total <= limit || total <= 0.0 {
            return self;
        }
        let ratio = limit.max(0.0) / total;
        Self {
            commercial: self.commercial * ratio,
            presale: self.presale * ratio,
            internal: self.internal * ratio,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct UserWeek {
    capacity: f64,
    hours: WeekHours,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Результат агрегации: ряд и сотрудники, исключённые из-за пробелов в календаре
#[derive(Debug, Clone, Default)]
pub struct WeeklySeries {
    pub weeks: Vec<WeeklyLoadData>,
    pub calendar_gaps: Vec<(UserId, CalendarError)>,
}

pub struct WeeklyAggregator<'a> {
    calendar: &'a ProductionCalendar,
    projects: &'a [Project],
    entries: &'a [TimeEntry],
    logged: &'a LoggedHours,
    classifier: HoursClassifier,
    today: NaiveDate,
}

impl<'a> WeeklyAggregator<'a> {
    pub fn new(
        calendar: &'a ProductionCalendar,
        projects: &'a [Project],
        entries: &'a [TimeEntry],
        logged: &'a LoggedHours,
        today: NaiveDate,
    ) -> Self {
        Self {
            calendar,
            projects,
            entries,
            logged,
            classifier: HoursClassifier::new(projects),
            today,
        }
    }

    /// Строит ряд по всем активным сотрудникам. Сотрудник, для которого
    /// в календаре не хватает дней, не входит ни в одну неделю и попадает
    /// в `calendar_gaps`
    pub fn aggregate(
        &self,
        users: &[User],
        period_start: NaiveDate,
        horizon_months: u32,
    ) -> WeeklySeries {
        let (first, last) = weekly_window(period_start, horizon_months);
        let starts: Vec<NaiveDate> = first
            .iter_weeks()
            .take_while(|start| *start <= last)
            .collect();

        let mut totals = vec![UserWeek::default(); starts.len()];
        let mut calendar_gaps = Vec::new();

        for user in users.iter().filter(|u| u.is_active) {
            match self.user_weeks(user, &starts) {
                Ok(weeks) => {
                    for (total, week) in totals.iter_mut().zip(weeks) {
                        total.capacity += week.capacity;
                        total.hours.commercial += week.hours.commercial;
                        total.hours.presale += week.hours.presale;
                        total.hours.internal += week.hours.internal;
                    }
                }
                Err(err) => {
                    warn!(user_id = user.id, error = %err, "User excluded from weekly series");
                    calendar_gaps.push((user.id, err));
                }
            }
        }

        let weeks = starts
            .iter()
            .zip(totals)
            .enumerate()
            .map(|(index, (start, total))| {
                let end = *start + Duration::days(6);
                let demand = total.hours.total();
                WeeklyLoadData {
                    week: format!(
                        "W{} ({}-{})",
                        index + 1,
                        start.format("%d.%m"),
                        end.format("%d.%m")
                    ),
                    week_start: *start,
                    week_end: end,
                    commercial: round2(total.hours.commercial),
                    presale: round2(total.hours.presale),
                    internal: round2(total.hours.internal),
                    capacity: round2(total.capacity),
                    demand: round2(demand),
                    load_pct: round2(load_pct(demand, total.capacity)),
                    is_forecast: *start > self.today,
                }
            })
            .collect();

        WeeklySeries { weeks, calendar_gaps }
    }

    fn user_weeks(
        &self,
        user: &User,
        starts: &[NaiveDate],
    ) -> Result<Vec<UserWeek>, CalendarError> {
        starts
            .iter()
            .map(|start| {
                let end = *start + Duration::days(6);
                let week_capacity = capacity(user, *start, end, self.calendar)?;
                let hours = if *start > self.today {
                    self.forecast_week(user, *start, end)?.cap(week_capacity)
                } else {
                    self.actual_week(user, *start, end)
                };
                Ok(UserWeek { capacity: week_capacity, hours })
            })
            .collect()
    }

    /// Факт недели; статусы кроме active / presale / internal в график не идут
    fn actual_week(&self, user: &User, start: NaiveDate, end: NaiveDate) -> WeekHours {
        let mut hours = WeekHours::default();
        for entry in self
            .entries
            .iter()
            .filter(|e| e.user_id == user.id && e.date >= start && e.date <= end)
        {
            match self.classifier.status_of(entry) {
                Some(ProjectStatus::Active) => hours.commercial += entry.hours,
                Some(ProjectStatus::Presale) => hours.presale += entry.hours,
                Some(ProjectStatus::Internal) => hours.internal += entry.hours,
                _ => {}
            }
        }
        hours
    }

    /// Прогноз недели до ограничения мощностью
    fn forecast_week(
        &self,
        user: &User,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<WeekHours, CalendarError> {
        let mut hours = WeekHours::default();
        if !user.is_active {
            return Ok(hours);
        }
        let Some(norm) = user.norm() else {
            return Ok(hours);
        };

        let plans: Vec<_> = user.effective_plans().collect();
        if plans.is_empty() {
            let days = self.calendar.working_days(user, start, end)? as f64;
            hours.commercial = norm.hours_commercial * days;
            hours.presale = norm.hours_presale * days;
            hours.internal = norm.hours_internal * days;
            return Ok(hours);
        }

        for plan in plans {
            let Some(project) = plan
                .project_id
                .and_then(|id| self.projects.iter().find(|p| p.id == id))
            else {
                continue;
            };
            let (Some(project_start), Some(project_end)) = (project.start_date, project.end_date)
            else {
                continue;
            };
            if project_end < start || project_start > end {
                continue;
            }

            let overlap_days =
                self.calendar
                    .working_days(user, project_start.max(start), project_end.min(end))?;
            if overlap_days == 0 {
                continue;
            }
            let project_days = self
                .calendar
                .working_days(user, project_start.max(self.today), project_end)?;
            if project_days == 0 {
                continue;
            }

            let logged = self.logged.on_project(user.id, project.id);
            let remaining = (plan.internal_hours - logged).max(0.0);
            let allocated = remaining / project_days as f64 * overlap_days as f64;

            let planned = plan.contracted_hours + plan.internal_hours;
            let contracted_share = if planned > 0.0 {
                plan.contracted_hours / planned
            } else {
                0.0
            };
            match project.status {
                ProjectStatus::Active => {
                    hours.commercial += allocated * contracted_share;
                    hours.internal += allocated * (1.0 - contracted_share);
                }
                ProjectStatus::Presale => {
                    hours.presale += allocated * contracted_share;
                    hours.internal += allocated * (1.0 - contracted_share);
                }
                ProjectStatus::Internal => hours.internal += allocated,
                _ => {}
            }
        }

        Ok(hours)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::calendar::tests::{d, office_norm, plain_calendar, user_with_norm};
    use crate::types::{LoggedTotal, Plan};

    fn project(id: i64, status: ProjectStatus, start: NaiveDate, end: NaiveDate) -> Project {
        Project {
            id,
            name: Some("Проект".into()),
            status,
            project_type: None,
            start_date: Some(start),
            end_date: Some(end),
            plans: Vec::new(),
            member_ids: vec![1],
        }
    }

    #[test]
    fn window_is_aligned_to_weeks() {
        // 2025-01-01 среда
        let (first, last) = weekly_window(d(2025, 1, 1), 1);
        assert_eq!(first, d(2024, 12, 30));
        assert_eq!(last, d(2025, 2, 2));
    }

    #[test]
    fn actual_weeks_then_norm_forecast() {
        let calendar = plain_calendar(d(2024, 12, 1), d(2025, 3, 31));
        let user = user_with_norm(1, office_norm());
        let entries = vec![
            TimeEntry {
                id: 1,
                user_id: 1,
                project_id: 5,
                date: d(2025, 1, 7),
                hours: 30.0,
                project_status: Some(ProjectStatus::Active),
            },
            TimeEntry {
                id: 2,
                user_id: 1,
                project_id: 6,
                date: d(2025, 1, 8),
                hours: 5.0,
                project_status: Some(ProjectStatus::OnHold),
            },
        ];

        let logged = LoggedHours::from_entries(&entries);
        let aggregator = WeeklyAggregator::new(&calendar, &[], &entries, &logged, d(2025, 1, 10));
        let series = aggregator.aggregate(std::slice::from_ref(&user), d(2025, 1, 6), 1);
        assert!(series.calendar_gaps.is_empty());

        let first = &series.weeks[0];
        assert_eq!(first.week, "W1 (06.01-12.01)");
        assert!(!first.is_forecast);
        assert_eq!(first.commercial, 30.0);
        assert_eq!(first.demand, 30.0);
        assert_eq!(first.capacity, 200.0);
        assert_eq!(first.load_pct, 15.0);

        let second = &series.weeks[1];
        assert!(second.is_forecast);
        assert_eq!(second.commercial, 160.0);
        assert_eq!(second.presale, 20.0);
        assert_eq!(second.internal, 20.0);
        assert_eq!(second.load_pct, 100.0);
    }

    #[test]
    fn forecast_never_exceeds_capacity() {
        let calendar = plain_calendar(d(2024, 12, 1), d(2025, 3, 31));
        let mut user = user_with_norm(1, office_norm());
        user.plans.push(Plan {
            id: 1,
            user_id: Some(1),
            project_id: Some(9),
            contracted_hours: 300.0,
            internal_hours: 900.0,
            is_active: true,
            project_start_date: None,
            project_end_date: None,
        });
        let projects = vec![project(9, ProjectStatus::Active, d(2025, 1, 13), d(2025, 1, 24))];

        let logged = LoggedHours::default();
        let aggregator = WeeklyAggregator::new(&calendar, &projects, &[], &logged, d(2025, 1, 10));
        let series = aggregator.aggregate(std::slice::from_ref(&user), d(2025, 1, 6), 1);

        for week in series.weeks.iter().filter(|w| w.is_forecast) {
            assert!(week.demand <= week.capacity + 1e-6, "{week:?}");
        }
        // 900 / 10 дней * 5 = 450 ч в неделю, ужато до 200 в пропорции 1:3
        let capped = &series.weeks[1];
        assert_eq!(capped.demand, 200.0);
        assert_eq!(capped.commercial, 50.0);
        assert_eq!(capped.internal, 150.0);
    }

    #[test]
    fn calendar_gap_excludes_user() {
        let calendar = plain_calendar(d(2025, 1, 6), d(2025, 1, 20));
        let user = user_with_norm(1, office_norm());
        let logged = LoggedHours::default();
        let aggregator = WeeklyAggregator::new(&calendar, &[], &[], &logged, d(2025, 1, 10));
        let series = aggregator.aggregate(std::slice::from_ref(&user), d(2025, 1, 6), 1);
        assert_eq!(series.calendar_gaps.len(), 1);
        assert_eq!(series.calendar_gaps[0].0, 1);
        assert!(series.weeks.iter().all(|w| w.capacity == 0.0));
    }

    #[test]
    fn forecast_weeks_use_all_time_logged_hours() {
        let calendar = plain_calendar(d(2024, 12, 1), d(2025, 3, 31));
        let mut user = user_with_norm(1, office_norm());
        user.plans.push(Plan {
            id: 1,
            user_id: Some(1),
            project_id: Some(9),
            contracted_hours: 0.0,
            internal_hours: 100.0,
            is_active: true,
            project_start_date: None,
            project_end_date: None,
        });
        let projects = vec![project(9, ProjectStatus::Active, d(2025, 1, 13), d(2025, 1, 24))];

        // 60 ч списано до начала периода, в записях периода их нет
        let logged = LoggedHours::new(&[LoggedTotal { user_id: 1, project_id: 9, hours: 60.0 }]);
        let with_logged = WeeklyAggregator::new(&calendar, &projects, &[], &logged, d(2025, 1, 10))
            .aggregate(std::slice::from_ref(&user), d(2025, 1, 6), 1);
        let nothing = LoggedHours::default();
        let without = WeeklyAggregator::new(&calendar, &projects, &[], &nothing, d(2025, 1, 10))
            .aggregate(std::slice::from_ref(&user), d(2025, 1, 6), 1);

        assert_eq!(with_logged.weeks[1].internal, 20.0);
        assert_eq!(without.weeks[1].internal, 50.0);
    }
}
