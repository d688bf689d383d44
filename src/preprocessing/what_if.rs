//! Сценарии «что если»: гипотетические сотрудники и проекты
//!
//! Гипотетические сущности добавляются к реальным спискам до запуска расчётов,
//! дальше они ничем не отличаются от настоящих.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::types::{
    Department, DepartmentId, Norm, Plan, Project, ProjectId, ProjectStatus, ProjectType, User,
    UserId, Vacation,
};

/// Идентификаторы гипотетических сущностей отрицательные и не пересекаются с реальными
const HYPOTHETICAL_ID_BASE: i64 = -1_000_000;

fn default_true() -> bool {
    true
}

fn default_status() -> ProjectStatus {
    ProjectStatus::Active
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HypotheticalNorm {
    #[serde(default)]
    pub working_days: Option<Vec<u32>>,
    #[serde(default)]
    pub hours_commercial: Option<f64>,
    #[serde(default)]
    pub hours_presale: Option<f64>,
    #[serde(default)]
    pub hours_internal: Option<f64>,
    #[serde(default)]
    pub works_on_holidays: bool,
    #[serde(default)]
    pub valid_from: Option<NaiveDate>,
}

impl HypotheticalNorm {
    /// Норма с умолчаниями: пятидневка, 32 / 4 / 4 часа
    fn into_norm(self, today: NaiveDate) -> Norm {
        Norm {
            working_days: self.working_days.unwrap_or_else(|| vec![1, 2, 3, 4, 5]),
            hours_commercial: self.hours_commercial.unwrap_or(32.0),
            hours_presale: self.hours_presale.unwrap_or(4.0),
            hours_internal: self.hours_internal.unwrap_or(4.0),
            works_on_holidays: self.works_on_holidays,
            valid_from: self.valid_from.unwrap_or(today),
            valid_to: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HypotheticalUser {
    pub name: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub created_at: Option<NaiveDate>,
    #[serde(default)]
    pub norm: HypotheticalNorm,
    #[serde(default)]
    pub vacations: Vec<Vacation>,
    #[serde(default)]
    pub plans: Vec<Plan>,
    #[serde(default)]
    pub department_id: Option<DepartmentId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HypotheticalProject {
    /// Идентификатор, на который ссылаются планы гипотетических сотрудников.
    /// Без него проекту выдаётся отрицательный id
    #[serde(default)]
    pub id: Option<ProjectId>,
    pub name: String,
    #[serde(default = "default_status")]
    pub status: ProjectStatus,
    #[serde(default)]
    pub project_type: Option<ProjectType>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub member_ids: Vec<UserId>,
    #[serde(default)]
    pub plans: Vec<Plan>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WhatIfScenario {
    pub name: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub users: Vec<HypotheticalUser>,
    #[serde(default)]
    pub projects: Vec<HypotheticalProject>,
}

/// Набор сценариев пользователя; в расчёт идут только активные
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WhatIfOverlay {
    #[serde(default)]
    pub scenarios: Vec<WhatIfScenario>,
}

/// Сущности после наложения сценариев
#[derive(Debug, Clone, Default)]
pub struct MergedEntities {
    pub users: Vec<User>,
    pub projects: Vec<Project>,
    pub departments: Vec<Department>,
    pub plans: Vec<Plan>,
}

impl WhatIfOverlay {
    pub fn active_users(&self) -> impl Iterator<Item = &HypotheticalUser> {
        self.scenarios.iter().filter(|s| s.is_active).flat_map(|s| s.users.iter())
    }

    pub fn active_projects(&self) -> impl Iterator<Item = &HypotheticalProject> {
        self.scenarios.iter().filter(|s| s.is_active).flat_map(|s| s.projects.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.active_users().next().is_none() && self.active_projects().next().is_none()
    }

    /// Добавляет гипотетических сотрудников (и их планы) и проекты к реальным данным.
    /// Сотрудник с `department_id` попадает в состав отдела, если такой отдел загружен.
    /// Планы гипотетических сотрудников прикрепляются к проектам, на которые ссылаются
    pub fn apply(&self, mut merged: MergedEntities, today: NaiveDate) -> MergedEntities {
        let mut added_plans: Vec<Plan> = Vec::new();

        for (index, hypothetical) in self.active_users().enumerate() {
            let id = HYPOTHETICAL_ID_BASE - index as i64;
            let plans: Vec<Plan> = hypothetical
                .plans
                .iter()
                .cloned()
                .map(|mut plan| {
                    plan.user_id = Some(id);
                    plan
                })
                .collect();

            if let Some(department_id) = hypothetical.department_id {
                match merged.departments.iter_mut().find(|d| d.id == department_id) {
                    Some(department) => {
                        department.user_ids.push(id);
                        debug!(
                            department_id,
                            user = %hypothetical.name,
                            "Hypothetical user added to department"
                        );
                    }
                    None => {
                        warn!(
                            department_id,
                            user = %hypothetical.name,
                            "Hypothetical user department not found"
                        );
                    }
                }
            }

            added_plans.extend(plans.iter().cloned());
            merged.users.push(User {
                id,
                name: hypothetical.name.clone(),
                created_at: hypothetical.created_at.unwrap_or(today),
                is_active: hypothetical.is_active,
                norms: vec![hypothetical.norm.clone().into_norm(today)],
                vacations: hypothetical
                    .vacations
                    .iter()
                    .cloned()
                    .map(|mut v| {
                        v.user_id = id;
                        v
                    })
                    .collect(),
                plans,
            });
        }

        for (index, hypothetical) in self.active_projects().enumerate() {
            let id = hypothetical.id.unwrap_or(HYPOTHETICAL_ID_BASE - index as i64);
            let plans = hypothetical
                .plans
                .iter()
                .cloned()
                .map(|mut plan| {
                    plan.project_id = Some(id);
                    plan
                })
                .collect();
            merged.projects.push(Project {
                id,
                name: Some(hypothetical.name.clone()),
                status: hypothetical.status,
                project_type: hypothetical.project_type,
                start_date: hypothetical.start_date,
                end_date: hypothetical.end_date,
                plans,
                member_ids: hypothetical.member_ids.clone(),
            });
        }

        for plan in &added_plans {
            let Some(project_id) = plan.project_id else {
                continue;
            };
            match merged.projects.iter_mut().find(|p| p.id == project_id) {
                Some(project) => {
                    project.plans.push(plan.clone());
                    let user_id = plan.user_id.filter(|id| !project.member_ids.contains(id));
                    if let Some(user_id) = user_id {
                        project.member_ids.push(user_id);
                    }
                }
                None => {
                    debug!(project_id, "Hypothetical plan targets a project outside the selection")
                }
            }
        }
        merged.plans.extend(added_plans);

        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn overlay() -> WhatIfOverlay {
        serde_json::from_value(serde_json::json!({
            "scenarios": [
                {
                    "name": "найм",
                    "users": [{ "name": "Новый разработчик", "department_id": 10 }],
                    "projects": [{
                        "name": "Пилот",
                        "start_date": "2025-02-01",
                        "end_date": "2025-04-30"
                    }]
                },
                {
                    "name": "черновик",
                    "is_active": false,
                    "users": [{ "name": "Не учитывается" }]
                }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn only_active_scenarios_are_merged() {
        let merged = overlay().apply(
            MergedEntities {
                departments: vec![Department {
                    id: 10,
                    name: "Разработка".into(),
                    lead_tg_id: None,
                    user_ids: vec![1],
                }],
                ..MergedEntities::default()
            },
            d(2025, 1, 15),
        );

        assert_eq!(merged.users.len(), 1);
        let user = &merged.users[0];
        assert!(user.id < 0);
        assert!(user.is_active);
        assert_eq!(user.created_at, d(2025, 1, 15));
        let norm = user.norm().unwrap();
        assert_eq!(norm.daily_hours(), 40.0);
        assert_eq!(norm.working_days, vec![1, 2, 3, 4, 5]);

        assert_eq!(merged.departments[0].user_ids, vec![1, user.id]);
        assert_eq!(merged.projects.len(), 1);
        assert_eq!(merged.projects[0].status, ProjectStatus::Active);
    }

    #[test]
    fn hypothetical_plans_are_attached_to_projects() {
        let overlay: WhatIfOverlay = serde_json::from_value(serde_json::json!({
            "scenarios": [{
                "name": "пилот",
                "users": [{
                    "name": "Аналитик",
                    "plans": [
                        { "id": 1, "project_id": 77, "internal_hours": 120.0, "is_active": true },
                        { "id": 2, "project_id": 5, "internal_hours": 40.0, "is_active": true }
                    ]
                }],
                "projects": [{
                    "id": 77,
                    "name": "Пилот",
                    "start_date": "2025-02-01",
                    "end_date": "2025-04-30"
                }]
            }]
        }))
        .unwrap();

        let real = Project {
            id: 5,
            name: Some("Портал".into()),
            status: ProjectStatus::Active,
            project_type: None,
            start_date: Some(d(2025, 1, 1)),
            end_date: Some(d(2025, 6, 30)),
            plans: Vec::new(),
            member_ids: vec![1],
        };
        let real = MergedEntities { projects: vec![real], ..MergedEntities::default() };
        let merged = overlay.apply(real, d(2025, 1, 15));
        let user_id = merged.users[0].id;

        let pilot = merged.projects.iter().find(|p| p.id == 77).unwrap();
        assert_eq!(pilot.plans.len(), 1);
        assert_eq!(pilot.plans[0].user_id, Some(user_id));
        assert_eq!(pilot.plans[0].internal_hours, 120.0);
        assert_eq!(pilot.member_ids, vec![user_id]);

        let portal = merged.projects.iter().find(|p| p.id == 5).unwrap();
        assert_eq!(portal.plans.len(), 1);
        assert_eq!(portal.member_ids, vec![1, user_id]);
        assert_eq!(merged.plans.len(), 2);
    }

    #[test]
    fn overlays_compare_by_content() {
        let mut changed = overlay();
        changed.scenarios[0].users[0].plans.push(Plan {
            id: 1,
            user_id: None,
            project_id: Some(3),
            contracted_hours: 0.0,
            internal_hours: 10.0,
            is_active: true,
            project_start_date: None,
            project_end_date: None,
        });
        changed.scenarios[0].users[0].vacations.push(Vacation {
            user_id: 0,
            start_date: d(2025, 3, 1),
            end_date: d(2025, 3, 7),
            vacation_type: crate::types::VacationType::Paid,
        });

        assert_eq!(overlay(), overlay());
        assert_ne!(overlay(), changed);
    }

    #[test]
    fn empty_overlay() {
        assert!(WhatIfOverlay::default().is_empty());
        assert!(!overlay().is_empty());
    }
}
