//! Фильтры дашборда и ограничения доступа руководителя

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use super::period::{Period, PeriodBounds};
use crate::types::{
    Department, DepartmentId, LoggedTotal, Plan, Project, ProjectId, ProjectStatus, TimeEntry, User,
    UserId,
};

fn default_horizon() -> u32 {
    1
}

/// Фильтры запроса. Пустой список выбранных означает «все»
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Filters {
    #[serde(default)]
    pub period: Period,
    #[serde(default = "default_horizon", alias = "horizonMonths")]
    pub horizon_months: u32,
    #[serde(default, alias = "selectedDepartments")]
    pub selected_departments: Vec<DepartmentId>,
    #[serde(default, alias = "excludedDepartments")]
    pub excluded_departments: Vec<DepartmentId>,
    #[serde(default, alias = "selectedProjects")]
    pub selected_projects: Vec<ProjectId>,
    #[serde(default, alias = "excludedProjects")]
    pub excluded_projects: Vec<ProjectId>,
    #[serde(default, alias = "excludedProjectStatuses")]
    pub excluded_project_statuses: Vec<ProjectStatus>,
}

impl Default for Filters {
    fn default() -> Self {
        Self {
            period: Period::default(),
            horizon_months: default_horizon(),
            selected_departments: Vec::new(),
            excluded_departments: Vec::new(),
            selected_projects: Vec::new(),
            excluded_projects: Vec::new(),
            excluded_project_statuses: Vec::new(),
        }
    }
}

impl Filters {
    fn project_allowed(&self, project_id: ProjectId) -> bool {
        (self.selected_projects.is_empty() || self.selected_projects.contains(&project_id))
            && !self.excluded_projects.contains(&project_id)
    }

    fn status_allowed(&self, status: Option<ProjectStatus>) -> bool {
        match status {
            Some(status) => !self.excluded_project_statuses.contains(&status),
            None => true,
        }
    }
}

/// Ограничения видимости для руководителя без полного доступа
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserRestrictions {
    #[serde(default, alias = "userId")]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub full_access: bool,
    #[serde(default)]
    pub lead_departments: Vec<DepartmentId>,
    #[serde(default)]
    pub lead_projects: Vec<ProjectId>,
}

impl UserRestrictions {
    pub fn department_scope(&self) -> Option<&[DepartmentId]> {
        (!self.full_access && !self.lead_departments.is_empty())
            .then_some(self.lead_departments.as_slice())
    }

    pub fn project_scope(&self) -> Option<&[ProjectId]> {
        (!self.full_access && !self.lead_projects.is_empty())
            .then_some(self.lead_projects.as_slice())
    }
}

/// Применение фильтров и ограничений к загруженным сущностям
pub struct FilterSet<'a> {
    pub filters: &'a Filters,
    pub restrictions: Option<&'a UserRestrictions>,
}

impl<'a> FilterSet<'a> {
    pub fn new(filters: &'a Filters, restrictions: Option<&'a UserRestrictions>) -> Self {
        Self { filters, restrictions }
    }

    fn department_scope(&self) -> Option<&[DepartmentId]> {
        self.restrictions.and_then(|r| r.department_scope())
    }

    fn project_scope(&self) -> Option<&[ProjectId]> {
        self.restrictions.and_then(|r| r.project_scope())
    }

    fn project_in_scope(&self, project_id: ProjectId) -> bool {
        self.project_scope().map_or(true, |scope| scope.contains(&project_id))
    }

    /// Сотрудники выбранных отделов. При исключении отделов сотрудник остаётся,
    /// если у него есть хотя бы один неисключённый отдел
    pub fn users(&self, users: &[User], departments: &[Department]) -> Vec<User> {
        let memberships = |user_id: UserId| -> Vec<DepartmentId> {
            departments
                .iter()
                .filter(|d| d.user_ids.contains(&user_id))
                .map(|d| d.id)
                .collect()
        };

        users
            .iter()
            .filter(|user| {
                let depts = memberships(user.id);
                if let Some(scope) = self.department_scope() {
                    if !depts.iter().any(|d| scope.contains(d)) {
                        return false;
                    }
                }
                if !self.filters.selected_departments.is_empty()
                    && !depts.iter().any(|d| self.filters.selected_departments.contains(d))
                {
                    return false;
                }
                if !self.filters.excluded_departments.is_empty()
                    && !depts.iter().any(|d| !self.filters.excluded_departments.contains(d))
                {
                    return false;
                }
                true
            })
            .cloned()
            .collect()
    }

    /// Проекты, в которых участвует хотя бы один из отобранных сотрудников
    pub fn projects(&self, projects: &[Project], user_ids: &[UserId]) -> Vec<Project> {
        projects
            .iter()
            .filter(|p| self.project_in_scope(p.id))
            .filter(|p| user_ids.is_empty() || p.member_ids.iter().any(|m| user_ids.contains(m)))
            .filter(|p| self.filters.project_allowed(p.id))
            .filter(|p| self.filters.status_allowed(Some(p.status)))
            .cloned()
            .collect()
    }

    pub fn departments(&self, departments: &[Department]) -> Vec<Department> {
        departments
            .iter()
            .filter(|d| self.department_scope().map_or(true, |scope| scope.contains(&d.id)))
            .filter(|d| {
                self.filters.selected_departments.is_empty()
                    || self.filters.selected_departments.contains(&d.id)
            })
            .filter(|d| !self.filters.excluded_departments.contains(&d.id))
            .cloned()
            .collect()
    }

    /// Записи времени периода `bounds`, отсортированные по дате
    pub fn time_entries(
        &self,
        entries: &[TimeEntry],
        bounds: PeriodBounds,
        user_ids: &[UserId],
    ) -> Vec<TimeEntry> {
        let users: HashSet<UserId> = user_ids.iter().copied().collect();
        let mut selected: Vec<TimeEntry> = entries
            .iter()
            .filter(|e| e.date >= bounds.start && e.date <= bounds.end)
            .filter(|e| users.is_empty() || users.contains(&e.user_id))
            .filter(|e| self.project_in_scope(e.project_id))
            .filter(|e| self.filters.project_allowed(e.project_id))
            .filter(|e| self.filters.status_allowed(e.project_status))
            .cloned()
            .collect();
        selected.sort_by_key(|e| e.date);
        selected
    }

    /// Суммы часов сотрудников по проектам за всё время, без границ периода
    /// и фильтра статусов
    pub fn logged_totals(&self, entries: &[TimeEntry], user_ids: &[UserId]) -> Vec<LoggedTotal> {
        let users: HashSet<UserId> = user_ids.iter().copied().collect();
        let mut totals: BTreeMap<(UserId, ProjectId), f64> = BTreeMap::new();
        for entry in entries
            .iter()
            .filter(|e| users.is_empty() || users.contains(&e.user_id))
            .filter(|e| self.project_in_scope(e.project_id))
        {
            *totals.entry((entry.user_id, entry.project_id)).or_insert(0.0) += entry.hours;
        }
        totals
            .into_iter()
            .map(|((user_id, project_id), hours)| LoggedTotal { user_id, project_id, hours })
            .collect()
    }

    /// Активные планы отобранных сотрудников
    pub fn plans(&self, plans: &[Plan], user_ids: &[UserId]) -> Vec<Plan> {
        plans
            .iter()
            .filter(|p| p.is_active)
            .filter(|p| match p.user_id {
                Some(id) => user_ids.is_empty() || user_ids.contains(&id),
                None => user_ids.is_empty(),
            })
            .filter(|p| p.project_id.map_or(true, |id| self.project_in_scope(id)))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn user(id: UserId) -> User {
        User {
            id,
            name: format!("u{id}"),
            created_at: d(2024, 1, 1),
            is_active: true,
            norms: Vec::new(),
            vacations: Vec::new(),
            plans: Vec::new(),
        }
    }

    fn dept(id: DepartmentId, user_ids: Vec<UserId>) -> Department {
        Department { id, name: format!("d{id}"), lead_tg_id: None, user_ids }
    }

    fn project(id: ProjectId, status: ProjectStatus, members: Vec<UserId>) -> Project {
        Project {
            id,
            name: Some(format!("p{id}")),
            status,
            project_type: None,
            start_date: None,
            end_date: None,
            plans: Vec::new(),
            member_ids: members,
        }
    }

    #[test]
    fn camel_case_aliases_are_accepted() {
        let filters: Filters = serde_json::from_str(
            concat!(
                r#"{"period":"quarter","horizonMonths":3,"selectedDepartments":[1],"#,
                r#""excludedProjectStatuses":["archive"]}"#,
            ),
        )
        .unwrap();
        assert_eq!(filters.period, Period::Quarter);
        assert_eq!(filters.horizon_months, 3);
        assert_eq!(filters.selected_departments, vec![1]);
        assert_eq!(filters.excluded_project_statuses, vec![ProjectStatus::Archive]);
    }

    #[test]
    fn excluded_department_keeps_users_with_another_department() {
        let users = vec![user(1), user(2)];
        let departments = vec![dept(10, vec![1, 2]), dept(20, vec![2])];
        let filters = Filters { excluded_departments: vec![10], ..Filters::default() };

        let kept = FilterSet::new(&filters, None).users(&users, &departments);
        assert_eq!(kept.iter().map(|u| u.id).collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn lead_restrictions_limit_scope() {
        let users = vec![user(1), user(2)];
        let departments = vec![dept(10, vec![1]), dept(20, vec![2])];
        let restrictions = UserRestrictions {
            user_id: Some(7),
            full_access: false,
            lead_departments: vec![20],
            lead_projects: vec![100],
        };
        let filters = Filters::default();
        let set = FilterSet::new(&filters, Some(&restrictions));

        let kept = set.users(&users, &departments);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, 2);
        assert_eq!(set.departments(&departments).len(), 1);

        let projects = vec![
            project(100, ProjectStatus::Active, vec![2]),
            project(200, ProjectStatus::Active, vec![2]),
        ];
        let kept = set.projects(&projects, &[2]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, 100);
    }

    #[test]
    fn full_access_ignores_lead_lists() {
        let restrictions = UserRestrictions {
            full_access: true,
            lead_departments: vec![20],
            ..UserRestrictions::default()
        };
        assert!(restrictions.department_scope().is_none());
    }

    #[test]
    fn time_entries_respect_period_and_statuses() {
        let entry = |id, date, status| TimeEntry {
            id,
            user_id: 1,
            project_id: 5,
            date,
            hours: 1.0,
            project_status: Some(status),
        };
        let entries = vec![
            entry(1, d(2025, 1, 9), ProjectStatus::Active),
            entry(2, d(2025, 1, 2), ProjectStatus::Active),
            entry(3, d(2025, 1, 3), ProjectStatus::Archive),
            entry(4, d(2025, 2, 1), ProjectStatus::Active),
        ];
        let filters = Filters {
            excluded_project_statuses: vec![ProjectStatus::Archive],
            ..Filters::default()
        };
        let bounds = PeriodBounds { start: d(2025, 1, 1), end: d(2025, 1, 31) };
        let kept = FilterSet::new(&filters, None).time_entries(&entries, bounds, &[1]);
        assert_eq!(kept.iter().map(|e| e.id).collect::<Vec<_>>(), vec![2, 1]);
    }

    #[test]
    fn logged_totals_ignore_period() {
        let entry = |id, user_id, project_id, date, hours| TimeEntry {
            id,
            user_id,
            project_id,
            date,
            hours,
            project_status: Some(ProjectStatus::Archive),
        };
        let entries = vec![
            entry(1, 1, 5, d(2023, 6, 1), 30.0),
            entry(2, 1, 5, d(2025, 1, 9), 8.0),
            entry(3, 1, 6, d(2024, 12, 10), 4.0),
            entry(4, 2, 5, d(2025, 1, 9), 2.0),
        ];
        let filters = Filters {
            excluded_project_statuses: vec![ProjectStatus::Archive],
            ..Filters::default()
        };

        let totals = FilterSet::new(&filters, None).logged_totals(&entries, &[1]);
        assert_eq!(
            totals,
            vec![
                LoggedTotal { user_id: 1, project_id: 5, hours: 38.0 },
                LoggedTotal { user_id: 1, project_id: 6, hours: 4.0 },
            ]
        );
    }
}
