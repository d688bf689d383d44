//! Оценка качества данных отдела

use std::collections::HashSet;

use chrono::NaiveDate;
use ndarray::{arr1, Array1};

use crate::error::CalendarError;
use crate::preprocessing::calendar::ProductionCalendar;
use crate::preprocessing::period::PeriodBounds;
use crate::types::{DataQualityMetrics, Plan, Project, TimeEntry, User};

/// Веса метрик: нормы, полнота списаний, покрытие планами, данные проектов, свежесть
pub const QUALITY_WEIGHTS: [f64; 5] = [0.30, 0.25, 0.20, 0.15, 0.10];

impl DataQualityMetrics {
    fn to_array(&self) -> Array1<f64> {
        arr1(&[
            self.norm_coverage,
            self.time_entry_completeness,
            self.plan_coverage,
            self.project_data_completeness,
            self.recent_activity,
        ])
    }

    /// Взвешенная сумма метрик
    pub fn composite(&self) -> f64 {
        self.to_array().dot(&arr1(&QUALITY_WEIGHTS))
    }
}

pub struct QualityScorer<'a> {
    calendar: &'a ProductionCalendar,
    projects: &'a [Project],
    entries: &'a [TimeEntry],
    plans: &'a [Plan],
    bounds: PeriodBounds,
    today: NaiveDate,
}

impl<'a> QualityScorer<'a> {
    pub fn new(
        calendar: &'a ProductionCalendar,
        projects: &'a [Project],
        entries: &'a [TimeEntry],
        plans: &'a [Plan],
        bounds: PeriodBounds,
        today: NaiveDate,
    ) -> Self {
        Self {
            calendar,
            projects,
            entries,
            plans,
            bounds,
            today,
        }
    }

    /// Оценка отдела по его сотрудникам; без активных сотрудников всё по нулям
    pub fn score(&self, members: &[&User]) -> Result<(f64, DataQualityMetrics), CalendarError> {
        let active: Vec<&User> = members.iter().copied().filter(|u| u.is_active).collect();
        if active.is_empty() {
            return Ok((0.0, DataQualityMetrics::default()));
        }

        let metrics = DataQualityMetrics {
            norm_coverage: self.norm_coverage(&active),
            time_entry_completeness: self.time_entry_completeness(&active)?,
            plan_coverage: self.plan_coverage(&active),
            project_data_completeness: self.project_data_completeness(),
            recent_activity: self.recent_activity(),
        };
        Ok((metrics.composite(), metrics))
    }

    fn norm_coverage(&self, users: &[&User]) -> f64 {
        let covered = users
            .iter()
            .filter(|u| u.norm().is_some_and(|n| n.daily_hours() > 0.0))
            .count();
        covered as f64 / users.len() as f64
    }

    fn time_entry_completeness(&self, users: &[&User]) -> Result<f64, CalendarError> {
        let mut expected = 0u32;
        let mut logged = 0u32;

        for user in users.iter().filter(|u| u.norm().is_some()) {
            let working = self
                .calendar
                .working_days(user, self.bounds.start, self.bounds.end)?;
            expected += working;

            let days: HashSet<NaiveDate> = self
                .entries
                .iter()
                .filter(|e| e.user_id == user.id)
                .filter(|e| e.date >= self.bounds.start && e.date <= self.bounds.end)
                .map(|e| e.date)
                .collect();
            logged += (days.len() as u32).min(working);
        }

        Ok(if expected > 0 { logged as f64 / expected as f64 } else { 0.0 })
    }

    fn plan_coverage(&self, users: &[&User]) -> f64 {
        let active_projects: Vec<&Project> =
            self.projects.iter().filter(|p| p.is_active()).collect();
        if active_projects.is_empty() {
            return 0.0;
        }

        let planned_projects = active_projects
            .iter()
            .filter(|p| {
                self.plans
                    .iter()
                    .any(|plan| plan.is_active && plan.project_id == Some(p.id))
            })
            .count();
        let planned_users = users
            .iter()
            .filter(|u| self.plans.iter().any(|plan| plan.is_active && plan.user_id == Some(u.id)))
            .count();

        let project_share = planned_projects as f64 / active_projects.len() as f64;
        let user_share = planned_users as f64 / users.len() as f64;
        (project_share + user_share) / 2.0
    }

    fn project_data_completeness(&self) -> f64 {
        let scores: Vec<f64> = self
            .projects
            .iter()
            .filter(|p| p.is_active())
            .map(|p| {
                let filled = [
                    p.name.as_deref().is_some_and(|n| !n.trim().is_empty()),
                    p.start_date.is_some(),
                    p.end_date.is_some(),
                    p.project_type.is_some(),
                ];
                filled.iter().filter(|f| **f).count() as f64 / filled.len() as f64
            })
            .collect();

        if scores.is_empty() {
            0.0
        } else {
            Array1::from(scores).mean().unwrap_or(0.0)
        }
    }

    /// Доля календарных дней от начала периода до сегодня (включительно), в которые что-то списано
    fn recent_activity(&self) -> f64 {
        if self.today < self.bounds.start {
            return 0.0;
        }
        let elapsed = (self.today - self.bounds.start).num_days() + 1;

        let active_days: HashSet<NaiveDate> = self
            .entries
            .iter()
            .filter(|e| e.date >= self.bounds.start && e.date <= self.today)
            .map(|e| e.date)
            .collect();

        (active_days.len() as f64 / elapsed as f64).min(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::calendar::tests::{d, office_norm, plain_calendar, user_with_norm};
    use crate::types::{ProjectStatus, ProjectType};

    fn bounds() -> PeriodBounds {
        PeriodBounds { start: d(2025, 1, 6), end: d(2025, 1, 12) }
    }

    #[test]
    fn department_without_active_users_scores_zero() {
        let calendar = plain_calendar(d(2025, 1, 6), d(2025, 1, 12));
        let scorer = QualityScorer::new(&calendar, &[], &[], &[], bounds(), d(2025, 1, 10));

        assert_eq!(scorer.score(&[]), Ok((0.0, DataQualityMetrics::default())));

        let mut inactive = user_with_norm(1, office_norm());
        inactive.is_active = false;
        let (score, metrics) = scorer.score(&[&inactive]).unwrap();
        assert_eq!(score, 0.0);
        assert_eq!(metrics.norm_coverage, 0.0);
        assert_eq!(metrics.time_entry_completeness, 0.0);
        assert_eq!(metrics.plan_coverage, 0.0);
        assert_eq!(metrics.project_data_completeness, 0.0);
        assert_eq!(metrics.recent_activity, 0.0);
    }

    #[test]
    fn perfect_department_scores_one() {
        let calendar = plain_calendar(d(2025, 1, 6), d(2025, 1, 12));
        let user = user_with_norm(1, office_norm());
        let projects = vec![Project {
            id: 3,
            name: Some("Портал".into()),
            status: ProjectStatus::Active,
            project_type: Some(ProjectType::Commercial),
            start_date: Some(d(2025, 1, 1)),
            end_date: Some(d(2025, 3, 1)),
            plans: Vec::new(),
            member_ids: vec![1],
        }];
        let plans = vec![Plan {
            id: 1,
            user_id: Some(1),
            project_id: Some(3),
            contracted_hours: 10.0,
            internal_hours: 10.0,
            is_active: true,
            project_start_date: None,
            project_end_date: None,
        }];
        // сегодня пятница, записи за каждый день с понедельника
        let entries: Vec<TimeEntry> = (0..5)
            .map(|i| TimeEntry {
                id: i,
                user_id: 1,
                project_id: 3,
                date: d(2025, 1, 6 + i as u32),
                hours: 8.0,
                project_status: Some(ProjectStatus::Active),
            })
            .collect();

        let scorer =
            QualityScorer::new(&calendar, &projects, &entries, &plans, bounds(), d(2025, 1, 10));
        let (score, metrics) = scorer.score(&[&user]).unwrap();
        assert_eq!(metrics.norm_coverage, 1.0);
        assert_eq!(metrics.time_entry_completeness, 1.0);
        assert_eq!(metrics.plan_coverage, 1.0);
        assert_eq!(metrics.project_data_completeness, 1.0);
        assert_eq!(metrics.recent_activity, 1.0);
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn weights_are_applied() {
        let metrics = DataQualityMetrics {
            norm_coverage: 1.0,
            time_entry_completeness: 0.0,
            plan_coverage: 0.5,
            project_data_completeness: 0.0,
            recent_activity: 1.0,
        };
        assert!((metrics.composite() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn recent_activity_counts_days_inclusively() {
        let calendar = plain_calendar(d(2025, 1, 6), d(2025, 1, 12));
        let user = user_with_norm(1, office_norm());
        let entries = vec![TimeEntry {
            id: 1,
            user_id: 1,
            project_id: 3,
            date: d(2025, 1, 6),
            hours: 8.0,
            project_status: None,
        }];
        let scorer = QualityScorer::new(&calendar, &[], &entries, &[], bounds(), d(2025, 1, 9));
        let (_, metrics) = scorer.score(&[&user]).unwrap();
        assert_eq!(metrics.recent_activity, 0.25);
        assert_eq!(metrics.time_entry_completeness, 0.2);
    }
}
