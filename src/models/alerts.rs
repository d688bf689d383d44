//! Генератор алертов по рассчитанным метрикам
//!
//! Правила не хранят состояния: одинаковые входные данные дают одинаковый
//! набор идентификаторов. Решённость алерта здесь не выставляется, она
//! накладывается при чтении из хранилища решённых алертов.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use sha2::{Digest, Sha256};

use super::forecasting::LoggedHours;
use crate::preprocessing::calendar::date_range;
use crate::preprocessing::period::{add_months, PeriodBounds};
use crate::types::{
    Alert, AlertCategory, AlertSeverity, AlertSource, AlertStats, DashboardMetrics, Department,
    EntityType, Project, TimeEntry, User, Vacation,
};

/// Пороги правил
pub mod thresholds {
    pub const CRITICAL_OVERLOAD_PCT: f64 = 110.0;
    pub const OVERLOAD_PCT: f64 = 100.0;
    pub const UNDERLOAD_PCT: f64 = 70.0;

    pub const CRITICAL_DATA_QUALITY: f64 = 0.6;
    pub const WARNING_DATA_QUALITY: f64 = 0.8;

    pub const BURN_RATE_LOW: f64 = 0.7;
    pub const BURN_RATE_DAYS: i64 = 7;
    pub const DELTA_WARNING: f64 = 0.2;
    pub const DELTA_CRITICAL: f64 = 0.4;

    pub const NORM_COMPLIANCE_WARNING: f64 = 60.0;
    pub const NORM_COMPLIANCE_CRITICAL: f64 = 40.0;
    pub const EXPECTED_HOURS_PER_DAY: f64 = 8.0;

    pub const MAX_CONSECUTIVE_EMPTY_DAYS: u32 = 3;
    pub const CRITICAL_CONSECUTIVE_EMPTY_DAYS: u32 = 5;

    pub const FORECAST_OVERLOAD: f64 = 100.0;
    pub const ZERO_HOUR_ENTRIES: usize = 10;
}

use thresholds::*;

/// Стабильный идентификатор алерта: префикс правила и SHA-256 от частей ключа.
/// Каждая часть предваряется своей длиной, поэтому разделители в именах не дают коллизий
pub fn alert_id(
    rule: &str,
    entity_type: EntityType,
    entity_id: &str,
    period: Option<&str>,
) -> String {
    let mut hasher = Sha256::new();
    for part in [rule, entity_type.as_str(), entity_id, period.unwrap_or("")] {
        hasher.update((part.len() as u64).to_be_bytes());
        hasher.update(part.as_bytes());
    }
    let digest = hex::encode(hasher.finalize());
    format!("{rule}-{}", &digest[..32])
}

/// Удаляет дубликаты по id, первое вхождение остаётся
pub fn deduplicate(alerts: Vec<Alert>) -> Vec<Alert> {
    let mut seen = HashSet::new();
    alerts.into_iter().filter(|a| seen.insert(a.id.clone())).collect()
}

/// Проставляет `resolved` / `resolved_at` по множеству решённых id
pub fn with_resolution(
    alerts: Vec<Alert>,
    resolved: &HashMap<String, DateTime<Utc>>,
) -> Vec<Alert> {
    alerts
        .into_iter()
        .map(|mut alert| {
            let resolved_at = resolved.get(&alert.id).copied();
            alert.resolved = resolved_at.is_some();
            alert.resolved_at = resolved_at;
            alert
        })
        .collect()
}

pub fn alert_stats(alerts: &[Alert]) -> AlertStats {
    let mut by_category = BTreeMap::new();
    let mut by_source = BTreeMap::new();
    for alert in alerts {
        *by_category.entry(alert.category.as_str().to_string()).or_insert(0) += 1;
        *by_source.entry(alert.source.as_str().to_string()).or_insert(0) += 1;
    }
    let count = |severity| alerts.iter().filter(|a| a.severity == severity).count();
    AlertStats {
        total: alerts.len(),
        critical: count(AlertSeverity::Critical),
        warning: count(AlertSeverity::Warning),
        info: count(AlertSeverity::Info),
        by_category,
        by_source,
    }
}

/// Рабочие дни пн-пт без отпусков
fn weekday_days(start: NaiveDate, end: NaiveDate, vacations: &[Vacation]) -> u32 {
    date_range(start, end)
        .filter(|day| day.weekday().number_from_monday() <= 5)
        .filter(|day| !vacations.iter().any(|v| v.contains(*day)))
        .count() as u32
}

/// Самая длинная серия дней подряд без записей
fn longest_empty_streak(entries: &[&TimeEntry], start: NaiveDate, end: NaiveDate) -> u32 {
    let logged: HashSet<NaiveDate> = entries.iter().map(|e| e.date).collect();
    let mut longest = 0;
    let mut current = 0;
    for day in date_range(start, end) {
        if logged.contains(&day) {
            current = 0;
        } else {
            current += 1;
            longest = longest.max(current);
        }
    }
    longest
}

struct Entity {
    kind: EntityType,
    id: String,
    name: String,
    source: AlertSource,
}

impl Entity {
    fn user(user: &User) -> Self {
        Self {
            kind: EntityType::User,
            id: user.id.to_string(),
            name: user.name.clone(),
            source: AlertSource::Person,
        }
    }

    fn department(department: &Department) -> Self {
        Self {
            kind: EntityType::Department,
            id: department.id.to_string(),
            name: department.name.clone(),
            source: AlertSource::System,
        }
    }

    fn project(project: &Project) -> Self {
        Self {
            kind: EntityType::Project,
            id: project.id.to_string(),
            name: project.display_name().to_string(),
            source: AlertSource::Project,
        }
    }

    fn system() -> Self {
        Self {
            kind: EntityType::System,
            id: "system".to_string(),
            name: "Система".to_string(),
            source: AlertSource::System,
        }
    }
}

/// Плановые и фактические показатели проекта
struct ProjectFigures {
    planned: f64,
    actual: f64,
    delta: f64,
    burn_rate: f64,
    remaining_days: Option<i64>,
    remaining_hours: f64,
}

/// Входные данные генератора
pub struct AlertContext<'a> {
    pub users: &'a [User],
    pub departments: &'a [Department],
    pub projects: &'a [Project],
    pub entries: &'a [TimeEntry],
    /// Часы по проектам за всё время
    pub logged: &'a LoggedHours,
    pub metrics: &'a DashboardMetrics,
    pub bounds: PeriodBounds,
    pub horizon_months: u32,
    pub now: DateTime<Utc>,
}

pub struct AlertGenerator<'a> {
    ctx: AlertContext<'a>,
    period_label: String,
    period_key: String,
}

impl<'a> AlertGenerator<'a> {
    pub fn new(ctx: AlertContext<'a>) -> Self {
        let period_label = format!("{} - {}", ctx.bounds.start, ctx.bounds.end);
        let period_key = ctx.bounds.start.to_string();
        Self { ctx, period_label, period_key }
    }

    fn today(&self) -> NaiveDate {
        self.ctx.now.date_naive()
    }

    /// Все правила по очереди: отделы, сотрудники, проекты, система
    pub fn generate(&self) -> Vec<Alert> {
        let mut alerts = Vec::new();
        alerts.extend(self.department_alerts());
        alerts.extend(self.user_alerts());
        alerts.extend(self.project_alerts());
        alerts.extend(self.system_alerts());
        deduplicate(alerts)
    }

    #[allow(clippy::too_many_arguments)]
    fn alert(
        &self,
        rule: &str,
        scoped: bool,
        severity: AlertSeverity,
        category: AlertCategory,
        entity: Entity,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Alert {
        let id_period = scoped.then_some(self.period_key.as_str());
        Alert {
            id: alert_id(rule, entity.kind, &entity.id, id_period),
            severity,
            category,
            title: title.into(),
            description: description.into(),
            entity_type: entity.kind,
            entity_id: entity.id,
            entity_name: entity.name,
            period: scoped.then(|| self.period_label.clone()),
            metric_value: None,
            threshold: None,
            created_at: self.ctx.now,
            resolved: false,
            resolved_at: None,
            source: entity.source,
        }
    }

    fn department_alerts(&self) -> Vec<Alert> {
        let mut alerts = Vec::new();
        for department in self.ctx.departments {
            let Some(agg) = self.ctx.metrics.department(department.id) else {
                continue;
            };

            let load = agg.load_pct;
            if load >= CRITICAL_OVERLOAD_PCT {
                alerts.push(Alert {
                    metric_value: Some(load),
                    threshold: Some(CRITICAL_OVERLOAD_PCT),
                    ..self.alert(
                        "dept-overload",
                        true,
                        AlertSeverity::Critical,
                        AlertCategory::Load,
                        Entity::department(department),
                        "Критическая перегрузка отдела",
                        format!("Отдел \"{}\" перегружен на {}%", department.name, load.round()),
                    )
                });
            } else if load >= OVERLOAD_PCT {
                alerts.push(Alert {
                    metric_value: Some(load),
                    threshold: Some(OVERLOAD_PCT),
                    ..self.alert(
                        "dept-warning-overload",
                        true,
                        AlertSeverity::Warning,
                        AlertCategory::Load,
                        Entity::department(department),
                        "Перегрузка отдела",
                        format!("Отдел \"{}\" загружен на {}%", department.name, load.round()),
                    )
                });
            }

            let quality = agg.data_quality;
            let quality_alert = if quality < CRITICAL_DATA_QUALITY {
                Some((
                    AlertSeverity::Critical,
                    CRITICAL_DATA_QUALITY,
                    "Критически низкое качество данных отдела",
                ))
            } else if quality < WARNING_DATA_QUALITY {
                Some((
                    AlertSeverity::Warning,
                    WARNING_DATA_QUALITY,
                    "Низкое качество данных отдела",
                ))
            } else {
                None
            };
            if let Some((severity, threshold, title)) = quality_alert {
                alerts.push(Alert {
                    metric_value: Some(quality),
                    threshold: Some(threshold),
                    ..self.alert(
                        "dept-data-quality",
                        true,
                        severity,
                        AlertCategory::DataQuality,
                        Entity::department(department),
                        title,
                        format!(
                            "Качество данных отдела \"{}\" всего {}%",
                            department.name,
                            (quality * 100.0).round()
                        ),
                    )
                });
            }
        }
        alerts
    }

    fn user_alerts(&self) -> Vec<Alert> {
        let mut alerts = Vec::new();
        let bounds = self.ctx.bounds;

        for user in self.ctx.users.iter().filter(|u| u.is_active) {
            let period_entries: Vec<&TimeEntry> = self
                .ctx
                .entries
                .iter()
                .filter(|e| e.user_id == user.id)
                .filter(|e| e.date >= bounds.start && e.date <= bounds.end)
                .collect();

            if let Some(metrics) = self.ctx.metrics.user(user.id) {
                let load = metrics.load_pct;
                if load >= CRITICAL_OVERLOAD_PCT {
                    alerts.push(Alert {
                        metric_value: Some(load),
                        threshold: Some(CRITICAL_OVERLOAD_PCT),
                        ..self.alert(
                            "user-overload",
                            true,
                            AlertSeverity::Critical,
                            AlertCategory::Load,
                            Entity::user(user),
                            "Критическая перегрузка сотрудника",
                            format!(
                                "Сотрудник \"{}\" перегружен на {}% при пороге {}%",
                                user.name,
                                load.round(),
                                CRITICAL_OVERLOAD_PCT
                            ),
                        )
                    });
                } else if load >= OVERLOAD_PCT {
                    alerts.push(Alert {
                        metric_value: Some(load),
                        threshold: Some(OVERLOAD_PCT),
                        ..self.alert(
                            "user-warning-overload",
                            true,
                            AlertSeverity::Warning,
                            AlertCategory::Load,
                            Entity::user(user),
                            "Перегрузка сотрудника",
                            format!(
                                "Сотрудник \"{}\" перегружен на {}%",
                                user.name,
                                load.round()
                            ),
                        )
                    });
                }

                if load < UNDERLOAD_PCT && metrics.demand_hours > 0.0 {
                    alerts.push(Alert {
                        metric_value: Some(load),
                        threshold: Some(UNDERLOAD_PCT),
                        ..self.alert(
                            "user-underload",
                            true,
                            AlertSeverity::Warning,
                            AlertCategory::Load,
                            Entity::user(user),
                            "Недогрузка сотрудника",
                            format!(
                                "Сотрудник \"{}\" загружен только на {}%",
                                user.name,
                                load.round()
                            ),
                        )
                    });
                }

                if user.norm().is_some() {
                    let logged = period_entries.iter().fold(0.0, |acc, e| acc + e.hours);
                    let expected = metrics.working_days as f64 * EXPECTED_HOURS_PER_DAY;
                    let compliance = if expected > 0.0 {
                        (logged / expected * 100.0).min(100.0)
                    } else {
                        100.0
                    };

                    let rule = if compliance < NORM_COMPLIANCE_CRITICAL {
                        Some((
                            "user-norm-critical",
                            AlertSeverity::Critical,
                            NORM_COMPLIANCE_CRITICAL,
                            "Критическое несоответствие нормам",
                        ))
                    } else if compliance < NORM_COMPLIANCE_WARNING {
                        Some((
                            "user-norm-warning",
                            AlertSeverity::Warning,
                            NORM_COMPLIANCE_WARNING,
                            "Низкое соответствие нормам",
                        ))
                    } else {
                        None
                    };
                    if let Some((rule, severity, threshold, title)) = rule {
                        alerts.push(Alert {
                            metric_value: Some(compliance),
                            threshold: Some(threshold),
                            ..self.alert(
                                rule,
                                true,
                                severity,
                                AlertCategory::Norms,
                                Entity::user(user),
                                title,
                                format!(
                                    "Сотрудник \"{}\" имеет соответствие нормам {}%",
                                    user.name,
                                    compliance.round()
                                ),
                            )
                        });
                    }
                }
            }

            let vacations: Vec<&Vacation> = user
                .vacations
                .iter()
                .filter(|v| v.overlaps(bounds.start, bounds.end))
                .collect();
            if !vacations.is_empty() {
                let info = vacations
                    .iter()
                    .map(|v| {
                        format!(
                            "{} - {}",
                            v.start_date.format("%d.%m.%Y"),
                            v.end_date.format("%d.%m.%Y")
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("; ");
                alerts.push(self.alert(
                    "user-vacation",
                    true,
                    AlertSeverity::Info,
                    AlertCategory::Vacation,
                    Entity::user(user),
                    "Активный отпуск сотрудника",
                    format!("Сотрудник \"{}\" в отпуске: {info}", user.name),
                ));
            }

            let undated = user
                .plans
                .iter()
                .filter(|p| p.is_active)
                .filter(|plan| {
                    let project = plan
                        .project_id
                        .and_then(|id| self.ctx.projects.iter().find(|p| p.id == id));
                    let start = plan.project_start_date.or(project.and_then(|p| p.start_date));
                    let end = plan.project_end_date.or(project.and_then(|p| p.end_date));
                    start.is_none() && end.is_none()
                })
                .count();
            if undated > 0 {
                alerts.push(Alert {
                    metric_value: Some(undated as f64),
                    ..self.alert(
                        "user-no-dates",
                        true,
                        AlertSeverity::Warning,
                        AlertCategory::DataQuality,
                        Entity::user(user),
                        "Проекты без указания дат",
                        format!(
                            "У сотрудника \"{}\" {undated} проектов без указания дат начала \
                             и окончания",
                            user.name
                        ),
                    )
                });
            }

            if let Some(alert) = self.forecast_overload(user) {
                alerts.push(alert);
            }

            let streak_end = bounds.end.min(self.today());
            let streak = longest_empty_streak(&period_entries, bounds.start, streak_end);
            if streak >= MAX_CONSECUTIVE_EMPTY_DAYS {
                let severity = if streak > CRITICAL_CONSECUTIVE_EMPTY_DAYS {
                    AlertSeverity::Critical
                } else {
                    AlertSeverity::Warning
                };
                alerts.push(Alert {
                    metric_value: Some(streak as f64),
                    threshold: Some(MAX_CONSECUTIVE_EMPTY_DAYS as f64),
                    ..self.alert(
                        "user-empty-days",
                        true,
                        severity,
                        AlertCategory::DataQuality,
                        Entity::user(user),
                        format!("Дни без таймшитов ({streak} дн.)"),
                        format!(
                            "Сотрудник \"{}\" не заполнял таймшиты {streak} дней подряд",
                            user.name
                        ),
                    )
                });
            }
        }
        alerts
    }

    /// Остаток плановых часов против мощности пн-пт по 8 часов до конца горизонта
    fn forecast_overload(&self, user: &User) -> Option<Alert> {
        let horizon_end = add_months(self.ctx.bounds.end, self.ctx.horizon_months);
        let planned = user
            .plans
            .iter()
            .filter(|p| p.is_active)
            .map(|plan| {
                let logged = plan
                    .project_id
                    .map_or(0.0, |project_id| self.ctx.logged.on_project(user.id, project_id));
                (plan.internal_hours - logged).max(0.0)
            })
            .fold(0.0, |acc, hours| acc + hours);
        let days = weekday_days(self.today(), horizon_end, &user.vacations);
        let capacity = days as f64 * EXPECTED_HOURS_PER_DAY;
        let utilization = if capacity > 0.0 { planned / capacity * 100.0 } else { 0.0 };

        (utilization > FORECAST_OVERLOAD).then(|| Alert {
            metric_value: Some(utilization),
            threshold: Some(FORECAST_OVERLOAD),
            ..self.alert(
                "user-forecast-overload",
                true,
                AlertSeverity::Critical,
                AlertCategory::Forecast,
                Entity::user(user),
                format!("Прогноз перегрузки на {} мес.", self.ctx.horizon_months),
                format!(
                    "Сотрудник \"{}\" будет перегружен на {}%. \
                     Запланировано {}ч при емкости {}ч",
                    user.name,
                    (utilization - 100.0).max(0.0).round(),
                    planned.round(),
                    capacity.round()
                ),
            )
        })
    }

    fn project_figures(&self, project: &Project) -> ProjectFigures {
        let planned = project.plans.iter().fold(0.0, |acc, p| acc + p.internal_hours);
        let actual = self.ctx.logged.project_total(project.id);
        let (delta, burn_rate) = if planned > 0.0 {
            ((actual - planned) / planned, actual / planned)
        } else {
            (0.0, 0.0)
        };
        ProjectFigures {
            planned,
            actual,
            delta,
            burn_rate,
            remaining_days: project.end_date.map(|end| (end - self.today()).num_days()),
            remaining_hours: (planned - actual).max(0.0),
        }
    }

    /// Оценка заполненности проекта в процентах: даты, планы, участники, плановые часы
    fn project_quality(project: &Project, figures: &ProjectFigures) -> f64 {
        let mut score = 0.0;
        score += match (project.start_date, project.end_date) {
            (Some(_), Some(_)) => 30.0,
            (Some(_), None) | (None, Some(_)) => 15.0,
            (None, None) => 0.0,
        };
        if !project.plans.is_empty() {
            score += 30.0;
        }
        if !project.member_ids.is_empty() {
            score += 20.0;
        }
        if figures.planned > 0.0 && figures.actual >= 0.0 {
            score += 20.0;
        }
        score
    }

    fn project_alerts(&self) -> Vec<Alert> {
        let mut alerts = Vec::new();
        let today = self.today();

        for project in self.ctx.projects.iter().filter(|p| p.is_active()) {
            let name = project.display_name();
            let figures = self.project_figures(project);

            match (project.start_date, project.end_date) {
                (None, None) => alerts.push(self.alert(
                    "project-no-dates",
                    false,
                    AlertSeverity::Critical,
                    AlertCategory::DataQuality,
                    Entity::project(project),
                    "Проект без дат начала и окончания",
                    format!("Проект \"{name}\" не имеет установленных дат начала и окончания"),
                )),
                (None, Some(_)) => alerts.push(self.alert(
                    "project-no-start",
                    false,
                    AlertSeverity::Warning,
                    AlertCategory::DataQuality,
                    Entity::project(project),
                    "Проект без даты начала",
                    format!("Проект \"{name}\" не имеет даты начала"),
                )),
                (Some(_), None) => alerts.push(self.alert(
                    "project-no-end",
                    false,
                    AlertSeverity::Warning,
                    AlertCategory::DataQuality,
                    Entity::project(project),
                    "Проект без даты окончания",
                    format!("Проект \"{name}\" не имеет даты окончания"),
                )),
                (Some(_), Some(_)) => {}
            }

            if project.plans.is_empty() {
                alerts.push(self.alert(
                    "project-no-plans",
                    false,
                    AlertSeverity::Critical,
                    AlertCategory::Project,
                    Entity::project(project),
                    "Проект без плановых часов",
                    format!("Проект \"{name}\" не имеет плановых часов"),
                ));
            }

            if let Some(end) = project.end_date {
                if end < today && figures.remaining_hours > 0.0 {
                    alerts.push(Alert {
                        period: Some(end.to_string()),
                        metric_value: Some(figures.remaining_hours),
                        ..self.alert(
                            "project-past-due",
                            false,
                            AlertSeverity::Critical,
                            AlertCategory::Project,
                            Entity::project(project),
                            "Проект просрочен",
                            format!(
                                "Проект \"{name}\" просрочен! Осталось {} часов",
                                figures.remaining_hours.round()
                            ),
                        )
                    });
                }

                if let Some(days) = figures.remaining_days {
                    if days > 0 && days < BURN_RATE_DAYS && figures.burn_rate < BURN_RATE_LOW {
                        alerts.push(Alert {
                            period: Some(end.to_string()),
                            metric_value: Some(figures.burn_rate),
                            threshold: Some(BURN_RATE_LOW),
                            ..self.alert(
                                "project-burn-rate",
                                false,
                                AlertSeverity::Critical,
                                AlertCategory::Project,
                                Entity::project(project),
                                "Высокий риск срыва сроков",
                                format!(
                                    "Проект \"{name}\": до конца {days} дней, выполнено только {}%",
                                    (figures.burn_rate * 100.0).round()
                                ),
                            )
                        });
                    }
                }
            }

            let delta = figures.delta.abs();
            let delta_rule = if delta > DELTA_CRITICAL {
                Some((
                    "project-delta-critical",
                    AlertSeverity::Critical,
                    DELTA_CRITICAL,
                    "Критическое отклонение от плана",
                ))
            } else if delta > DELTA_WARNING {
                Some((
                    "project-delta-warning",
                    AlertSeverity::Warning,
                    DELTA_WARNING,
                    "Значительное отклонение от плана",
                ))
            } else {
                None
            };
            if let Some((rule, severity, threshold, title)) = delta_rule {
                alerts.push(Alert {
                    metric_value: Some(figures.delta),
                    threshold: Some(threshold),
                    ..self.alert(
                        rule,
                        true,
                        severity,
                        AlertCategory::Project,
                        Entity::project(project),
                        title,
                        format!(
                            "Проект \"{name}\" имеет отклонение {}% от плана",
                            (figures.delta * 100.0).round()
                        ),
                    )
                });
            }

            let quality = Self::project_quality(project, &figures);
            let quality_threshold = CRITICAL_DATA_QUALITY * 100.0;
            if quality < quality_threshold {
                alerts.push(Alert {
                    metric_value: Some(quality),
                    threshold: Some(quality_threshold),
                    ..self.alert(
                        "project-data-quality",
                        true,
                        AlertSeverity::Warning,
                        AlertCategory::DataQuality,
                        Entity::project(project),
                        "Низкое качество данных проекта",
                        format!(
                            "Качество данных проекта \"{name}\" всего {}%",
                            quality.round()
                        ),
                    )
                });
            }
        }
        alerts
    }

    fn system_alerts(&self) -> Vec<Alert> {
        let mut alerts = Vec::new();

        let without_norms = self
            .ctx
            .users
            .iter()
            .filter(|u| u.is_active && u.norm().is_none())
            .count();
        if without_norms > 0 {
            alerts.push(Alert {
                metric_value: Some(without_norms as f64),
                ..self.alert(
                    "data-quality-no-norms",
                    true,
                    AlertSeverity::Warning,
                    AlertCategory::DataQuality,
                    Entity::system(),
                    "Пользователи без установленных норм",
                    format!(
                        "{without_norms} активных пользователей не имеют установленных норм \
                         рабочего времени"
                    ),
                )
            });
        }

        let empty_departments = self
            .ctx
            .departments
            .iter()
            .filter(|d| {
                !d.user_ids
                    .iter()
                    .any(|id| self.ctx.users.iter().any(|u| u.id == *id && u.is_active))
            })
            .count();
        if empty_departments > 0 {
            alerts.push(Alert {
                metric_value: Some(empty_departments as f64),
                ..self.alert(
                    "data-quality-empty-depts",
                    true,
                    AlertSeverity::Warning,
                    AlertCategory::DataQuality,
                    Entity::system(),
                    "Пустые отделы",
                    format!("{empty_departments} отделов не содержат активных пользователей"),
                )
            });
        }

        let zero_hours = self.ctx.entries.iter().filter(|e| e.hours == 0.0).count();
        if zero_hours > ZERO_HOUR_ENTRIES {
            alerts.push(Alert {
                metric_value: Some(zero_hours as f64),
                ..self.alert(
                    "data-quality-zero-hours",
                    true,
                    AlertSeverity::Info,
                    AlertCategory::DataQuality,
                    Entity::system(),
                    "Таймшиты с нулевыми часами",
                    format!(
                        "Обнаружено {zero_hours} таймшитов с нулевым количеством часов"
                    ),
                )
            });
        }

        let gaps = &self.ctx.metrics.warnings;
        if !gaps.is_empty() {
            let mut dates: Vec<NaiveDate> = gaps.iter().map(|w| w.missing_date).collect();
            dates.sort();
            dates.dedup();
            let listed = dates
                .iter()
                .map(|d| d.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            alerts.push(Alert {
                metric_value: Some(gaps.len() as f64),
                ..self.alert(
                    "data-quality-calendar-gaps",
                    true,
                    AlertSeverity::Critical,
                    AlertCategory::DataQuality,
                    Entity::system(),
                    "Пробелы в производственном календаре",
                    format!(
                        "Для {} сотрудников метрики не рассчитаны: \
                         нет данных календаря за {listed}",
                        gaps.len()
                    ),
                )
            });
        }

        alerts
    }
}
