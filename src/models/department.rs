//! Метрики дашборда: сотрудники, отделы, KPI и ряды графиков

use chrono::NaiveDate;
use tracing::{debug, warn};

use super::capacity::{capacity, demand, load_pct, status_by_load};
use super::distribution::{BucketHours, HoursClassifier};
use super::forecasting::{ForecastingModel, LoggedHours};
use super::quality::QualityScorer;
use super::weekly::WeeklyAggregator;
use crate::error::CalendarError;
use crate::preprocessing::calendar::ProductionCalendar;
use crate::preprocessing::period::PeriodBounds;
use crate::types::{
    CommercialSharePoint, ComposedPoint, DashboardKpis, DashboardMetrics, DataQualityMetrics,
    DataWarning, Department, DeptAggregate, Plan, Project, TimeEntry, User, UserId, UserMetrics,
};

/// Входные данные расчёта
pub struct MetricsInput<'a> {
    pub users: &'a [User],
    pub projects: &'a [Project],
    pub departments: &'a [Department],
    pub entries: &'a [TimeEntry],
    /// Часы по проектам за всё время, для остатков планов
    pub logged: &'a LoggedHours,
    pub plans: &'a [Plan],
    pub calendar: &'a ProductionCalendar,
    pub bounds: PeriodBounds,
    pub horizon_months: u32,
    pub today: NaiveDate,
}

fn warning(user_id: UserId, err: &CalendarError) -> DataWarning {
    DataWarning {
        user_id,
        missing_date: err.date(),
        message: format!("Метрики сотрудника {user_id} не рассчитаны: {err}"),
    }
}

/// Калькулятор метрик дашборда
pub struct MetricsCalculator<'a> {
    input: MetricsInput<'a>,
    classifier: HoursClassifier,
}

impl<'a> MetricsCalculator<'a> {
    pub fn new(input: MetricsInput<'a>) -> Self {
        let classifier = HoursClassifier::new(input.projects);
        Self { input, classifier }
    }

    /// Метрики одного сотрудника за период
    pub fn user_metrics(&self, user: &User) -> Result<UserMetrics, CalendarError> {
        let calendar = self.input.calendar;
        let bounds = self.input.bounds;
        let forecaster = ForecastingModel::new(
            calendar,
            self.input.projects,
            self.input.logged,
            self.input.horizon_months,
            self.input.today,
        );

        let capacity_hours = capacity(user, bounds.start, bounds.end, calendar)?;
        let demand_hours = demand(
            user,
            bounds.start,
            bounds.end,
            self.input.entries,
            &self.classifier,
        );
        let forecast_hours = forecaster.predict(user, bounds.start, bounds.end)?;
        let working_days = calendar.working_days(user, bounds.start, bounds.end)?;
        let load = load_pct(demand_hours, capacity_hours);

        Ok(UserMetrics {
            user_id: user.id,
            capacity_hours,
            demand_hours,
            forecast_hours,
            load_pct: load,
            status: status_by_load(load),
            working_days,
            hours_distribution: self.classifier.distribution(
                self.input.entries,
                bounds.start,
                bounds.end,
                Some(std::slice::from_ref(&user.id)),
            ),
        })
    }

    /// Полный расчёт. Сотрудник с пробелом в календаре исключается из всех
    /// сумм и попадает в `warnings`
    pub fn compute(&self) -> DashboardMetrics {
        let bounds = self.input.bounds;
        let mut warnings = Vec::new();
        let mut user_metrics = Vec::new();

        for user in self.input.users {
            match self.user_metrics(user) {
                Ok(metrics) => user_metrics.push(metrics),
                Err(err) => {
                    warn!(user_id = user.id, error = %err, "User metrics skipped");
                    warnings.push(warning(user.id, &err));
                }
            }
        }

        let dept_agg: Vec<DeptAggregate> = self
            .input
            .departments
            .iter()
            .map(|department| self.department_aggregate(department, &user_metrics))
            .collect();

        let kpis = self.kpis(&dept_agg);

        let series = WeeklyAggregator::new(
            self.input.calendar,
            self.input.projects,
            self.input.entries,
            self.input.logged,
            self.input.today,
        )
        .aggregate(self.input.users, bounds.start, self.input.horizon_months);
        for (user_id, err) in &series.calendar_gaps {
            let gap = warning(*user_id, err);
            if !warnings.contains(&gap) {
                warnings.push(gap);
            }
        }

        let pie_data = self
            .classifier
            .distribution(self.input.entries, bounds.start, bounds.end, None);

        let composed_data = dept_agg
            .iter()
            .map(|agg| ComposedPoint {
                dept: agg.department_name.clone(),
                capacity: agg.capacity.round(),
                demand: agg.demand.round(),
            })
            .collect();

        let scatter_data = self
            .input
            .departments
            .iter()
            .map(|department| self.commercial_share(department, &user_metrics))
            .collect();

        debug!(
            users = user_metrics.len(),
            departments = dept_agg.len(),
            weeks = series.weeks.len(),
            warnings = warnings.len(),
            "Metrics computed"
        );

        DashboardMetrics {
            period_start: bounds.start,
            period_end: bounds.end,
            dept_agg,
            user_metrics,
            kpis,
            area_series: series.weeks,
            pie_data,
            composed_data,
            scatter_data,
            warnings,
        }
    }

    fn members(&self, department: &Department) -> Vec<&'a User> {
        self.input
            .users
            .iter()
            .filter(|u| department.user_ids.contains(&u.id))
            .collect()
    }

    fn department_aggregate(
        &self,
        department: &Department,
        user_metrics: &[UserMetrics],
    ) -> DeptAggregate {
        let bounds = self.input.bounds;
        let computed: Vec<&UserMetrics> = user_metrics
            .iter()
            .filter(|m| department.user_ids.contains(&m.user_id))
            .collect();
        let computed_ids: Vec<UserId> = computed.iter().map(|m| m.user_id).collect();

        let capacity = computed.iter().fold(0.0, |acc, m| acc + m.capacity_hours);
        let demand = computed.iter().fold(0.0, |acc, m| acc + m.demand_hours);
        let forecast = computed.iter().fold(0.0, |acc, m| acc + m.forecast_hours);
        let load = load_pct(demand, capacity);

        let members: Vec<&User> = self
            .members(department)
            .into_iter()
            .filter(|u| computed_ids.contains(&u.id))
            .collect();
        let scorer = QualityScorer::new(
            self.input.calendar,
            self.input.projects,
            self.input.entries,
            self.input.plans,
            bounds,
            self.input.today,
        );
        let (data_quality, data_quality_metrics) = scorer.score(&members).unwrap_or_else(|err| {
            warn!(department_id = department.id, error = %err, "Department quality not scored");
            (0.0, DataQualityMetrics::default())
        });

        DeptAggregate {
            department_id: department.id,
            department_name: department.name.clone(),
            capacity,
            demand,
            forecast,
            load_pct: load,
            status: status_by_load(load),
            data_quality,
            data_quality_metrics,
            hours_distribution: self.classifier.distribution(
                self.input.entries,
                bounds.start,
                bounds.end,
                Some(computed_ids.as_slice()),
            ),
            period_start: bounds.start,
            period_end: bounds.end,
        }
    }

    /// Доля коммерческих часов отдела против его загрузки.
    /// Учитываются только активные сотрудники с нормой
    fn commercial_share(
        &self,
        department: &Department,
        user_metrics: &[UserMetrics],
    ) -> CommercialSharePoint {
        let bounds = self.input.bounds;
        let active: Vec<&User> = self
            .members(department)
            .into_iter()
            .filter(|u| u.is_active)
            .collect();
        let active_ids: Vec<UserId> = active.iter().map(|u| u.id).collect();

        let hours: BucketHours = self.classifier.bucket_hours(
            self.input.entries,
            bounds.start,
            bounds.end,
            Some(active_ids.as_slice()),
        );
        let total_hours = hours.total();

        let (capacity, demand) = active
            .iter()
            .filter(|u| u.norm().is_some())
            .filter_map(|u| user_metrics.iter().find(|m| m.user_id == u.id))
            .fold((0.0, 0.0), |(c, d), m| (c + m.capacity_hours, d + m.demand_hours));

        CommercialSharePoint {
            dept: department.name.clone(),
            commercial_share: if total_hours > 0.0 {
                hours.commercial / total_hours * 100.0
            } else {
                0.0
            },
            load: load_pct(demand, capacity),
            total_hours,
            commercial_hours: hours.commercial,
        }
    }

    fn kpis(&self, dept_agg: &[DeptAggregate]) -> DashboardKpis {
        if dept_agg.is_empty() {
            return DashboardKpis::default();
        }
        let count = dept_agg.len() as f64;
        DashboardKpis {
            avg_load: dept_agg.iter().map(|d| d.load_pct).sum::<f64>() / count,
            active_users: self.input.users.iter().filter(|u| u.is_active).count(),
            active_projects: self.input.projects.iter().filter(|p| p.is_active()).count(),
            data_quality: dept_agg.iter().map(|d| d.data_quality).sum::<f64>() / count,
        }
    }
}

/// Расчёт метрик одним вызовом
pub fn compute_metrics(input: MetricsInput<'_>) -> DashboardMetrics {
    MetricsCalculator::new(input).compute()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::calendar::tests::{d, office_norm, plain_calendar, user_with_norm};
    use crate::types::ProjectStatus;

    fn entry(id: i64, user_id: UserId, project_id: i64, date: NaiveDate, hours: f64) -> TimeEntry {
        TimeEntry {
            id,
            user_id,
            project_id,
            date,
            hours,
            project_status: Some(ProjectStatus::Active),
        }
    }

    fn projects() -> Vec<Project> {
        vec![Project {
            id: 10,
            name: Some("Портал".into()),
            status: ProjectStatus::Active,
            project_type: None,
            start_date: Some(d(2024, 12, 1)),
            end_date: Some(d(2025, 6, 30)),
            plans: Vec::new(),
            member_ids: vec![1, 2],
        }]
    }

    fn departments() -> Vec<Department> {
        vec![
            Department { id: 1, name: "Разработка".into(), lead_tg_id: None, user_ids: vec![1, 2] },
            Department { id: 2, name: "Пустой".into(), lead_tg_id: None, user_ids: vec![] },
        ]
    }

    fn input<'a>(
        users: &'a [User],
        projects: &'a [Project],
        departments: &'a [Department],
        entries: &'a [TimeEntry],
        logged: &'a LoggedHours,
        calendar: &'a ProductionCalendar,
    ) -> MetricsInput<'a> {
        MetricsInput {
            users,
            projects,
            departments,
            entries,
            logged,
            plans: &[],
            calendar,
            bounds: PeriodBounds { start: d(2025, 1, 6), end: d(2025, 1, 12) },
            horizon_months: 1,
            today: d(2025, 1, 10),
        }
    }

    #[test]
    fn department_sums_member_figures() {
        let calendar = plain_calendar(d(2024, 12, 1), d(2025, 8, 31));
        let users = vec![user_with_norm(1, office_norm()), user_with_norm(2, office_norm())];
        let entries = vec![
            entry(1, 1, 10, d(2025, 1, 6), 100.0),
            entry(2, 2, 10, d(2025, 1, 7), 140.0),
        ];
        let projects = projects();
        let departments = departments();

        let logged = LoggedHours::from_entries(&entries);
        let metrics = compute_metrics(input(
            &users,
            &projects,
            &departments,
            &entries,
            &logged,
            &calendar,
        ));
        assert!(metrics.warnings.is_empty());
        assert_eq!(metrics.user_metrics.len(), 2);

        let dept = metrics.department(1).unwrap();
        assert_eq!(dept.capacity, 400.0);
        assert_eq!(dept.demand, 240.0);
        assert_eq!(dept.load_pct, 60.0);
        assert_eq!(dept.hours_distribution.len(), 1);

        let empty = metrics.department(2).unwrap();
        assert_eq!(empty.capacity, 0.0);
        assert!(empty.capacity.is_sign_positive());
        assert!(empty.demand.is_sign_positive());
        assert_eq!(empty.data_quality, 0.0);

        assert_eq!(metrics.kpis.active_users, 2);
        assert_eq!(metrics.kpis.active_projects, 1);
        assert_eq!(metrics.kpis.avg_load, 30.0);

        assert_eq!(metrics.composed_data[0].capacity, 400.0);
        assert_eq!(metrics.scatter_data[0].commercial_share, 100.0);
        assert_eq!(metrics.scatter_data[0].load, 60.0);
        assert_eq!(metrics.pie_data[0].hours, 240.0);
    }

    #[test]
    fn calendar_gap_becomes_warning() {
        // календарь обрывается посреди периода
        let calendar = plain_calendar(d(2025, 1, 6), d(2025, 1, 9));
        let users = vec![user_with_norm(1, office_norm())];
        let projects = projects();
        let departments = departments();

        let logged = LoggedHours::default();
        let metrics =
            compute_metrics(input(&users, &projects, &departments, &[], &logged, &calendar));
        assert!(metrics.user_metrics.is_empty());
        assert!(!metrics.warnings.is_empty());
        assert_eq!(metrics.warnings[0].user_id, 1);
        assert_eq!(metrics.warnings[0].missing_date, d(2025, 1, 10));
        assert_eq!(metrics.department(1).unwrap().capacity, 0.0);
    }

    #[test]
    fn no_departments_gives_zero_kpis() {
        let calendar = plain_calendar(d(2024, 12, 1), d(2025, 8, 31));
        let users = vec![user_with_norm(1, office_norm())];
        let logged = LoggedHours::default();
        let metrics = compute_metrics(input(&users, &[], &[], &[], &logged, &calendar));
        assert_eq!(metrics.kpis, DashboardKpis::default());
        assert_eq!(metrics.user_metrics.len(), 1);
    }
}
