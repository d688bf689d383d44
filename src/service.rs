//! Сборка данных дашборда по этапам
//!
//! Порядок: сотрудники, затем параллельно проекты, отделы, записи времени,
//! часы по проектам за всё время и планы, затем производственный календарь,
//! метрики и алерты. Каждый этап
//! проходит через кэш-конвейер, ошибка этапа называет сам этап.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::cache::keys::{self, all_dashboard_patterns, cache_key, Invalidation, RequestScope};
use crate::cache::{
    CacheOptions, CachePipeline, CacheResult, CacheSource, CacheTtl, ResolvedAlertStore,
};
use crate::error::{CacheError, DashboardError};
use crate::models::alerts::{alert_stats, with_resolution, AlertContext, AlertGenerator};
use crate::models::department::{compute_metrics, MetricsInput};
use crate::models::forecasting::LoggedHours;
use crate::models::weekly::weekly_window;
use crate::preprocessing::calendar::ProductionCalendar;
use crate::preprocessing::filters::{Filters, UserRestrictions};
use crate::preprocessing::period::{add_months, PeriodBounds};
use crate::preprocessing::what_if::{MergedEntities, WhatIfOverlay};
use crate::source::{DataQuery, DataSource};
use crate::types::{
    Alert, AlertStats, DashboardMetrics, Department, Plan, Project, TimeEntry, User, UserId,
};

/// Тело запроса дашборда
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DashboardRequest {
    #[serde(default)]
    pub filters: Option<Filters>,
    #[serde(default, alias = "userRestrictions")]
    pub user_restrictions: Option<UserRestrictions>,
    #[serde(default, alias = "whatIf")]
    pub what_if: Option<WhatIfOverlay>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DataSummary {
    pub users: usize,
    pub projects: usize,
    pub departments: usize,
    pub time_entries: usize,
    pub plans: usize,
    /// Длина периода в днях
    pub period: i64,
    pub alerts: usize,
    pub alerts_cache_key: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardData {
    pub users: Vec<User>,
    pub projects: Vec<Project>,
    pub departments: Vec<Department>,
    pub time_entries: Vec<TimeEntry>,
    pub plans: Vec<Plan>,
    pub metrics: DashboardMetrics,
    pub alerts: Vec<Alert>,
    pub alert_stats: AlertStats,
    pub timestamp: DateTime<Utc>,
    /// `cache`, `database` или `mixed` по источникам этапов
    pub cache_status: String,
    pub redis_enabled: bool,
    pub production_calendar_days: usize,
    /// Сообщения об этапах, отданных из устаревшего кэша
    pub degraded: Vec<String>,
    pub data_summary: DataSummary,
}

/// Активные алерты из кэша с наложенной решённостью
#[derive(Debug, Clone, Serialize)]
pub struct AlertsView {
    pub alerts: Vec<Alert>,
    pub total: usize,
    pub resolved: usize,
    pub active: usize,
    pub source: String,
    pub cache_key: String,
    pub stats: AlertStats,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InvalidationReport {
    pub message: String,
    pub deleted: usize,
    pub invalidated_keys: Invalidation,
}

/// Параметры кэширования этапов
#[derive(Debug, Clone, Copy)]
pub struct ServiceOptions {
    pub ttl: CacheTtl,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            ttl: CacheTtl::default(),
            max_retries: 3,
            retry_delay: Duration::from_millis(2000),
        }
    }
}

/// Диапазон календаря, нужный всем движкам: окно недельного ряда, период,
/// горизонт прогноза и концы проектов, по которым что-то прогнозируется
pub fn calendar_range(
    merged: &MergedEntities,
    bounds: PeriodBounds,
    horizon_months: u32,
    today: NaiveDate,
) -> (NaiveDate, NaiveDate) {
    let (window_start, window_end) = weekly_window(bounds.start, horizon_months);
    let start = window_start.min(bounds.start).min(today);

    let planned: Vec<_> = merged
        .users
        .iter()
        .flat_map(|u| u.effective_plans())
        .filter_map(|p| p.project_id)
        .collect();
    let latest_project_end = merged
        .projects
        .iter()
        .filter(|p| p.is_active() || planned.contains(&p.id))
        .filter_map(|p| p.end_date)
        .max();

    let mut end = window_end.max(add_months(bounds.end, horizon_months)).max(today);
    if let Some(project_end) = latest_project_end {
        end = end.max(project_end);
    }
    (start, end)
}

/// Учёт источников этапов для `cache_status`
#[derive(Default)]
struct StageLog {
    sources: Vec<CacheSource>,
    degraded: Vec<String>,
}

impl StageLog {
    fn record<T>(&mut self, stage: &str, result: &CacheResult<T>) {
        self.sources.push(result.source);
        if let Some(message) = &result.error {
            self.degraded.push(format!("{stage}: {message}"));
        }
    }

    fn status(&self) -> &'static str {
        if self.sources.iter().all(|s| *s == CacheSource::Cache) {
            "cache"
        } else if self.sources.iter().all(|s| *s == CacheSource::Database) {
            "database"
        } else {
            "mixed"
        }
    }
}

/// Данные, по которым строятся алерты
type AlertSources<'a> = (
    &'a MergedEntities,
    &'a [TimeEntry],
    &'a LoggedHours,
    &'a DashboardMetrics,
);

pub struct DashboardService {
    source: Arc<dyn DataSource>,
    pipeline: CachePipeline,
    resolved: ResolvedAlertStore,
    options: ServiceOptions,
}

impl DashboardService {
    pub fn new(
        source: Arc<dyn DataSource>,
        pipeline: CachePipeline,
        resolved: ResolvedAlertStore,
        options: ServiceOptions,
    ) -> Self {
        Self {
            source,
            pipeline,
            resolved,
            options,
        }
    }

    pub fn redis_enabled(&self) -> bool {
        self.pipeline.backend().is_some_and(|b| b.name() == "redis")
    }

    fn cache_options(&self, ttl_secs: u64) -> CacheOptions {
        CacheOptions::new(ttl_secs).with_retries(self.options.max_retries, self.options.retry_delay)
    }

    /// Полная сборка данных дашборда на момент `now`
    pub async fn load(
        &self,
        filters: Filters,
        restrictions: Option<UserRestrictions>,
        what_if: Option<WhatIfOverlay>,
        now: DateTime<Utc>,
    ) -> Result<DashboardData, DashboardError> {
        let today = now.date_naive();
        let bounds = filters.period.bounds(today);
        let horizon = filters.horizon_months;
        let ttl = self.options.ttl;

        let data_scope = RequestScope { restrictions: restrictions.as_ref(), what_if: None };
        let scope = RequestScope { restrictions: restrictions.as_ref(), what_if: what_if.as_ref() };
        let mut log = StageLog::default();

        info!(period = %bounds.key(), horizon, "Loading dashboard data");

        let query = DataQuery {
            filters: filters.clone(),
            restrictions: restrictions.clone(),
            bounds,
        };
        let source = &self.source;
        let q = &query;

        // 1. сотрудники
        let users_key = data_scope.key(keys::USERS, &filters, None);
        let long = self.cache_options(ttl.long_secs);
        let users = self
            .pipeline
            .fetch_or_compute(&users_key, &long, move || source.users(q))
            .await
            .map_err(|e| DashboardError::Users(format!("{e:#}")))?;
        log.record("users", &users);

        // 2. остальные сущности параллельно
        let user_ids: Vec<UserId> = users.data.iter().map(|u| u.id).collect();
        let ids = user_ids.as_slice();
        let projects_key = data_scope.key(keys::PROJECTS, &filters, None);
        let departments_key = data_scope.key(keys::DEPARTMENTS, &filters, None);
        let entries_key = data_scope.key(keys::TIME_ENTRIES, &filters, Some(&bounds.key()));
        let logged_key = data_scope.key(keys::LOGGED_HOURS, &filters, None);
        let plans_key = data_scope.key(keys::PLANS, &filters, None);
        let short = self.cache_options(ttl.short_secs);
        let default = self.cache_options(ttl.default_secs);

        let (projects, departments, entries, logged, plans) = tokio::try_join!(
            self.pipeline
                .fetch_or_compute(&projects_key, &long, move || source.projects(q, ids)),
            self.pipeline
                .fetch_or_compute(&departments_key, &long, move || source.departments(q)),
            self.pipeline
                .fetch_or_compute(&entries_key, &short, move || source.time_entries(q, ids)),
            self.pipeline
                .fetch_or_compute(&logged_key, &short, move || source.logged_totals(q, ids)),
            self.pipeline
                .fetch_or_compute(&plans_key, &default, move || source.plans(q, ids)),
        )
        .map_err(|e| DashboardError::RawData(format!("{e:#}")))?;
        log.record("projects", &projects);
        log.record("departments", &departments);
        log.record("time_entries", &entries);
        log.record("logged_hours", &logged);
        log.record("plans", &plans);
        let logged = LoggedHours::new(&logged.data);

        let mut merged = MergedEntities {
            users: users.data,
            projects: projects.data,
            departments: departments.data,
            plans: plans.data,
        };
        if let Some(overlay) = what_if.as_ref().filter(|o| !o.is_empty()) {
            merged = overlay.apply(merged, today);
            info!(
                users = merged.users.len(),
                projects = merged.projects.len(),
                "What-if overlay applied"
            );
        }
        let entries = entries.data;

        // 3. производственный календарь
        let (calendar_start, calendar_end) = calendar_range(&merged, bounds, horizon, today);
        let calendar_key = cache_key(
            keys::PRODUCTION_CALENDAR,
            &filters,
            Some(&format!("{calendar_start}_{calendar_end}")),
        );
        let calendar_days = self
            .pipeline
            .fetch_or_compute(&calendar_key, &long, move || {
                source.production_calendar(calendar_start, calendar_end)
            })
            .await
            .map_err(|e| DashboardError::Calendar(format!("{e:#}")))?;
        log.record("production_calendar", &calendar_days);
        let calendar = ProductionCalendar::new(calendar_days.data);
        let missing = calendar.missing_days(calendar_start, calendar_end);
        if !missing.is_empty() {
            warn!(missing = missing.len(), first = %missing[0], "Production calendar has gaps");
        }

        // 4. метрики
        let metrics_key = scope.key(keys::DASHBOARD_METRICS, &filters, Some(&bounds.key()));
        let metrics_options = self
            .cache_options(ttl.short_secs)
            .with_tags([keys::DASHBOARD_METRICS, keys::TIME_ENTRIES, keys::LOGGED_HOURS]);
        let metrics = self
            .pipeline
            .fetch_or_compute(&metrics_key, &metrics_options, || {
                let computed = compute_metrics(MetricsInput {
                    users: &merged.users,
                    projects: &merged.projects,
                    departments: &merged.departments,
                    entries: &entries,
                    logged: &logged,
                    plans: &merged.plans,
                    calendar: &calendar,
                    bounds,
                    horizon_months: horizon,
                    today,
                });
                async move { Ok::<_, DashboardError>(computed) }
            })
            .await?;
        log.record("metrics", &metrics);
        let metrics = metrics.data;

        // 5. алерты
        let alerts_key = scope.alerts_key(&filters, bounds);
        let alerts = self
            .generate_alerts(
                &alerts_key,
                (&merged, &entries, &logged, &metrics),
                bounds,
                horizon,
                now,
                &mut log,
            )
            .await;
        let resolved = self.resolved_map().await;
        let alerts = with_resolution(alerts, &resolved);

        let data_summary = DataSummary {
            users: merged.users.len(),
            projects: merged.projects.len(),
            departments: merged.departments.len(),
            time_entries: entries.len(),
            plans: merged.plans.len(),
            period: bounds.days(),
            alerts: alerts.len(),
            alerts_cache_key: alerts_key,
        };
        info!(
            users = data_summary.users,
            time_entries = data_summary.time_entries,
            alerts = data_summary.alerts,
            cache_status = log.status(),
            "Dashboard data ready"
        );

        Ok(DashboardData {
            alert_stats: alert_stats(&alerts),
            users: merged.users,
            projects: merged.projects,
            departments: merged.departments,
            time_entries: entries,
            plans: merged.plans,
            metrics,
            alerts,
            timestamp: now,
            cache_status: log.status().to_string(),
            redis_enabled: self.redis_enabled(),
            production_calendar_days: calendar.len(),
            degraded: log.degraded,
            data_summary,
        })
    }

    /// Генерация алертов в блокирующей задаче. Паника генератора даёт пустой список
    async fn generate_alerts(
        &self,
        key: &str,
        (merged, entries, logged, metrics): AlertSources<'_>,
        bounds: PeriodBounds,
        horizon_months: u32,
        now: DateTime<Utc>,
        log: &mut StageLog,
    ) -> Vec<Alert> {
        let input = Arc::new((merged.clone(), entries.to_vec(), logged.clone(), metrics.clone()));
        let options = CacheOptions::new(self.options.ttl.alerts_secs)
            .with_retries(0, self.options.retry_delay);

        let generated = self
            .pipeline
            .fetch_or_compute(key, &options, || {
                let input = Arc::clone(&input);
                tokio::task::spawn_blocking(move || {
                    let (merged, entries, logged, metrics) = &*input;
                    let generator = AlertGenerator::new(AlertContext {
                        users: &merged.users,
                        departments: &merged.departments,
                        projects: &merged.projects,
                        entries,
                        logged,
                        metrics,
                        bounds,
                        horizon_months,
                        now,
                    });
                    generator.generate()
                })
            })
            .await;

        match generated {
            Ok(result) => {
                log.record("alerts", &result);
                result.data
            }
            Err(err) => {
                error!(key, error = %err, "Alert generation failed, continuing without alerts");
                Vec::new()
            }
        }
    }

    async fn resolved_map(&self) -> HashMap<String, DateTime<Utc>> {
        self.resolved.resolved().await.unwrap_or_else(|err| {
            warn!(error = %err, "Resolved alerts are not available");
            HashMap::new()
        })
    }

    /// Активные алерты по ключу кэша
    pub async fn alerts(&self, cache_key: &str, now: DateTime<Utc>) -> AlertsView {
        let (alerts, source) = if !self.pipeline.is_enabled() {
            (Vec::new(), "cache_disabled")
        } else {
            match self.pipeline.read::<Vec<Alert>>(cache_key).await {
                Some(alerts) => (alerts, "cache"),
                None => (Vec::new(), "empty"),
            }
        };

        let total = alerts.len();
        let resolved = self.resolved_map().await;
        let active: Vec<Alert> = with_resolution(alerts, &resolved)
            .into_iter()
            .filter(|a| !a.resolved)
            .collect();

        AlertsView {
            total,
            resolved: total - active.len(),
            active: active.len(),
            stats: alert_stats(&active),
            alerts: active,
            source: source.to_string(),
            cache_key: cache_key.to_string(),
            timestamp: now,
        }
    }

    pub async fn resolve_alert(
        &self,
        alert_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), CacheError> {
        self.resolved.resolve(alert_id, now).await
    }

    pub async fn unresolve_alert(&self, alert_id: &str) -> Result<bool, CacheError> {
        self.resolved.unresolve(alert_id).await
    }

    /// Очистка кэша по фильтрам либо всего кэша дашборда
    pub async fn invalidate(
        &self,
        filters: Option<&Filters>,
        restrictions: Option<&UserRestrictions>,
        today: NaiveDate,
    ) -> Result<InvalidationReport, CacheError> {
        let Some(filters) = filters else {
            let patterns = all_dashboard_patterns();
            let deleted = self.pipeline.invalidate(&patterns).await?;
            return Ok(InvalidationReport {
                message: "All dashboard cache cleared".to_string(),
                deleted,
                invalidated_keys: Invalidation { exact: Vec::new(), patterns },
            });
        };

        let scope = RequestScope { restrictions, what_if: None };
        let plan = scope.invalidation(filters, filters.period.bounds(today));
        let all = plan.all();
        let deleted = self.pipeline.invalidate(&all).await?;
        Ok(InvalidationReport {
            message: format!("Cache invalidated for {} keys/patterns", all.len()),
            deleted,
            invalidated_keys: plan,
        })
    }
}
