//! Прогноз нагрузки сотрудника по остаткам планов и норме

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::error::CalendarError;
use crate::preprocessing::calendar::ProductionCalendar;
use crate::preprocessing::period::add_months;
use crate::types::{LoggedTotal, Plan, Project, ProjectId, TimeEntry, User, UserId};

/// Рабочих дней в месяце для распределения внутренних часов нормы
pub const WORKING_DAYS_PER_MONTH: f64 = 20.0;

/// Часы, списанные сотрудниками на проекты за всё время.
/// Остаток плана считается от них, а не от записей выбранного периода
#[derive(Debug, Clone, Default)]
pub struct LoggedHours {
    by_user_project: HashMap<(UserId, ProjectId), f64>,
}

impl LoggedHours {
    pub fn new(totals: &[LoggedTotal]) -> Self {
        let mut by_user_project = HashMap::new();
        for total in totals {
            *by_user_project
                .entry((total.user_id, total.project_id))
                .or_insert(0.0) += total.hours;
        }
        Self { by_user_project }
    }

    pub fn from_entries(entries: &[TimeEntry]) -> Self {
        let mut by_user_project = HashMap::new();
        for entry in entries {
            *by_user_project
                .entry((entry.user_id, entry.project_id))
                .or_insert(0.0) += entry.hours;
        }
        Self { by_user_project }
    }

    pub fn on_project(&self, user_id: UserId, project_id: ProjectId) -> f64 {
        self.by_user_project
            .get(&(user_id, project_id))
            .copied()
            .unwrap_or(0.0)
    }

    /// Все часы проекта по всем сотрудникам
    pub fn project_total(&self, project_id: ProjectId) -> f64 {
        self.by_user_project
            .iter()
            .filter(|((_, project), _)| *project == project_id)
            .fold(0.0, |acc, (_, hours)| acc + hours)
    }
}

/// Модель прогнозирования часов
pub struct ForecastingModel<'a> {
    calendar: &'a ProductionCalendar,
    projects: &'a [Project],
    logged: &'a LoggedHours,
    horizon_months: u32,
    today: NaiveDate,
}

impl<'a> ForecastingModel<'a> {
    pub fn new(
        calendar: &'a ProductionCalendar,
        projects: &'a [Project],
        logged: &'a LoggedHours,
        horizon_months: u32,
        today: NaiveDate,
    ) -> Self {
        Self {
            calendar,
            projects,
            logged,
            horizon_months,
            today,
        }
    }

    pub fn horizon_end(&self, end: NaiveDate) -> NaiveDate {
        add_months(end, self.horizon_months)
    }

    /// Активный проект плана с обеими датами
    fn dated_active_project(&self, plan: &Plan) -> Option<(&'a Project, NaiveDate, NaiveDate)> {
        let project_id = plan.project_id?;
        let project = self.projects.iter().find(|p| p.id == project_id)?;
        if !project.is_active() {
            return None;
        }
        Some((project, project.start_date?, project.end_date?))
    }

    /// Прогноз часов сотрудника на горизонте `end + horizon_months`
    ///
    /// Складывается из остатков по планам активных проектов, равномерно
    /// разложенных до конца проекта, и внутренних часов нормы. С мощностью
    /// не сравнивается.
    pub fn predict(
        &self,
        user: &User,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<f64, CalendarError> {
        if !user.is_active {
            return Ok(0.0);
        }
        let Some(norm) = user.norm() else {
            return Ok(0.0);
        };

        let horizon_end = self.horizon_end(end);
        let forecast_start = self.today.max(start);
        let mut total = 0.0;

        for plan in user.effective_plans() {
            let Some((project, _, project_end)) = self.dated_active_project(plan) else {
                continue;
            };

            let logged = self.logged.on_project(user.id, project.id);
            let remaining = (plan.internal_hours - logged).max(0.0);
            if remaining <= 0.0 {
                continue;
            }

            let project_days = self.calendar.working_days(user, self.today, project_end)?;
            if project_days == 0 {
                continue;
            }
            let daily_rate = remaining / project_days as f64;

            let overlap_end = project_end.min(horizon_end);
            if forecast_start > overlap_end {
                continue;
            }
            let overlap_days = self.calendar.working_days(user, forecast_start, overlap_end)?;
            total += daily_rate * overlap_days as f64;
        }

        if norm.hours_internal > 0.0 {
            let internal_days = self.calendar.working_days(user, forecast_start, horizon_end)?;
            total += norm.hours_internal / WORKING_DAYS_PER_MONTH * internal_days as f64;
        }

        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::calendar::tests::{d, office_norm, plain_calendar, user_with_norm};
    use crate::types::ProjectStatus;

    fn project(id: ProjectId, status: ProjectStatus, start: NaiveDate, end: NaiveDate) -> Project {
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

    fn plan(project_id: ProjectId, internal_hours: f64) -> Plan {
        Plan {
            id: project_id,
            user_id: Some(1),
            project_id: Some(project_id),
            contracted_hours: 0.0,
            internal_hours,
            is_active: true,
            project_start_date: None,
            project_end_date: None,
        }
    }

    #[test]
    fn internal_quota_only() {
        // Понедельник 2025-01-06, горизонт до 2025-02-12
        let calendar = plain_calendar(d(2025, 1, 1), d(2025, 3, 31));
        let mut norm = office_norm();
        norm.hours_internal = 4.0;
        let user = user_with_norm(1, norm);

        let logged = LoggedHours::default();
        let model = ForecastingModel::new(&calendar, &[], &logged, 1, d(2025, 2, 10));
        // с 10.02 по 12.02 три рабочих дня: 4 / 20 * 3
        let value = model.predict(&user, d(2025, 1, 6), d(2025, 1, 12)).unwrap();
        assert!((value - 0.6).abs() < 1e-9);
    }

    #[test]
    fn remaining_plan_hours_are_prorated() {
        let calendar = plain_calendar(d(2025, 1, 1), d(2025, 3, 31));
        let mut norm = office_norm();
        norm.hours_internal = 0.0;
        let mut user = user_with_norm(1, norm);
        user.plans.push(plan(7, 50.0));

        let projects = vec![project(7, ProjectStatus::Active, d(2025, 1, 1), d(2025, 1, 17))];
        let entries = vec![TimeEntry {
            id: 1,
            user_id: 1,
            project_id: 7,
            date: d(2025, 1, 3),
            hours: 10.0,
            project_status: Some(ProjectStatus::Active),
        }];

        // сегодня пн 06.01: до конца проекта 10 рабочих дней, остаток 40 ч
        let logged = LoggedHours::from_entries(&entries);
        let model = ForecastingModel::new(&calendar, &projects, &logged, 1, d(2025, 1, 6));
        let value = model.predict(&user, d(2025, 1, 6), d(2025, 1, 12)).unwrap();
        assert!((value - 40.0).abs() < 1e-9);
    }

    #[test]
    fn non_active_or_undated_projects_are_skipped() {
        let calendar = plain_calendar(d(2025, 1, 1), d(2025, 3, 31));
        let mut norm = office_norm();
        norm.hours_internal = 0.0;
        let mut user = user_with_norm(1, norm);
        user.plans.push(plan(7, 50.0));
        user.plans.push(plan(8, 50.0));

        let mut undated = project(8, ProjectStatus::Active, d(2025, 1, 1), d(2025, 1, 17));
        undated.end_date = None;
        let projects = vec![
            project(7, ProjectStatus::Presale, d(2025, 1, 1), d(2025, 1, 17)),
            undated,
        ];

        let logged = LoggedHours::default();
        let model = ForecastingModel::new(&calendar, &projects, &logged, 1, d(2025, 1, 6));
        assert_eq!(model.predict(&user, d(2025, 1, 6), d(2025, 1, 12)), Ok(0.0));
    }

    #[test]
    fn finished_project_contributes_nothing() {
        let calendar = plain_calendar(d(2025, 1, 1), d(2025, 3, 31));
        let mut norm = office_norm();
        norm.hours_internal = 0.0;
        let mut user = user_with_norm(1, norm);
        user.plans.push(plan(7, 50.0));
        let projects = vec![project(7, ProjectStatus::Active, d(2025, 1, 1), d(2025, 1, 3))];

        let logged = LoggedHours::default();
        let model = ForecastingModel::new(&calendar, &projects, &logged, 1, d(2025, 1, 6));
        assert_eq!(model.predict(&user, d(2025, 1, 6), d(2025, 1, 12)), Ok(0.0));
    }

    #[test]
    fn hours_logged_before_the_period_reduce_the_remainder() {
        let calendar = plain_calendar(d(2024, 11, 1), d(2025, 3, 31));
        let mut norm = office_norm();
        norm.hours_internal = 0.0;
        let mut user = user_with_norm(1, norm);
        user.plans.push(plan(7, 100.0));
        let projects = vec![project(7, ProjectStatus::Active, d(2024, 11, 1), d(2025, 2, 28))];

        // запись декабря не попадает в январский период, но остаток уменьшает
        let december = LoggedHours::new(&[LoggedTotal { user_id: 1, project_id: 7, hours: 80.0 }]);
        let nothing = LoggedHours::default();
        let today = d(2025, 1, 15);

        let with_logged = ForecastingModel::new(&calendar, &projects, &december, 1, today)
            .predict(&user, d(2025, 1, 1), d(2025, 1, 31))
            .unwrap();
        let without = ForecastingModel::new(&calendar, &projects, &nothing, 1, today)
            .predict(&user, d(2025, 1, 1), d(2025, 1, 31))
            .unwrap();

        assert!(with_logged > 0.0);
        assert!(with_logged < without);
        assert!((with_logged / without - 0.2).abs() < 1e-9);
    }

    #[test]
    fn logged_hours_lookup() {
        let logged = LoggedHours::new(&[
            LoggedTotal { user_id: 1, project_id: 7, hours: 30.0 },
            LoggedTotal { user_id: 2, project_id: 7, hours: 12.5 },
            LoggedTotal { user_id: 1, project_id: 8, hours: 4.0 },
        ]);
        assert_eq!(logged.on_project(1, 7), 30.0);
        assert_eq!(logged.on_project(3, 7), 0.0);
        assert_eq!(logged.project_total(7), 42.5);
        assert_eq!(logged.project_total(9), 0.0);
    }
}
