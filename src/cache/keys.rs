//! Ключи кэша дашборда

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::preprocessing::filters::{Filters, UserRestrictions};
use crate::preprocessing::period::PeriodBounds;
use crate::preprocessing::what_if::WhatIfOverlay;

pub const USERS: &str = "users";
pub const PROJECTS: &str = "projects";
pub const DEPARTMENTS: &str = "departments";
pub const TIME_ENTRIES: &str = "time_entries";
pub const LOGGED_HOURS: &str = "logged_hours";
pub const PLANS: &str = "plans";
pub const PRODUCTION_CALENDAR: &str = "production_calendar";
pub const DASHBOARD_METRICS: &str = "dashboard_metrics";
pub const ALERTS_PREFIX: &str = "alerts:";

/// Префиксы данных одного запроса дашборда
pub const DASHBOARD_PREFIXES: [&str; 8] = [
    USERS,
    PROJECTS,
    DEPARTMENTS,
    TIME_ENTRIES,
    LOGGED_HOURS,
    PLANS,
    PRODUCTION_CALENDAR,
    DASHBOARD_METRICS,
];

/// Шаблоны полной очистки кэша дашборда
pub fn all_dashboard_patterns() -> Vec<String> {
    DASHBOARD_PREFIXES
        .iter()
        .map(|prefix| format!("{prefix}_*"))
        .chain(std::iter::once(format!("{ALERTS_PREFIX}*")))
        .collect()
}

fn join<T: ToString>(values: &[T]) -> String {
    values.iter().map(ToString::to_string).collect::<Vec<_>>().join(",")
}

/// Ключ вида
/// `{prefix}_{period}_{horizon}_{sel depts}_{excl depts}_{sel projects}_{excl projects}`
/// `_{excl statuses}[_{additional}]`
pub fn cache_key(prefix: &str, filters: &Filters, additional: Option<&str>) -> String {
    let statuses: Vec<&str> = filters
        .excluded_project_statuses
        .iter()
        .map(|s| s.as_str())
        .collect();
    let base = format!(
        "{prefix}_{}_{}_{}_{}_{}_{}_{}",
        filters.period.as_str(),
        filters.horizon_months,
        join(&filters.selected_departments),
        join(&filters.excluded_departments),
        join(&filters.selected_projects),
        join(&filters.excluded_projects),
        statuses.join(","),
    );
    match additional {
        Some(extra) if !extra.is_empty() => format!("{base}_{extra}"),
        _ => base,
    }
}

/// Область видимости запроса: ограничения руководителя и what-if сценарии.
/// Две разные области никогда не делят ключ кэша
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestScope<'a> {
    pub restrictions: Option<&'a UserRestrictions>,
    pub what_if: Option<&'a WhatIfOverlay>,
}

impl RequestScope<'_> {
    /// Короткий отпечаток области; `None` для полного доступа без сценариев
    pub fn fingerprint(&self) -> Option<String> {
        let restrictions = self
            .restrictions
            .filter(|r| {
                !r.full_access && (r.department_scope().is_some() || r.project_scope().is_some())
            });
        let what_if = self.what_if.filter(|w| !w.is_empty());
        if restrictions.is_none() && what_if.is_none() {
            return None;
        }

        let mut hasher = Sha256::new();
        if let Some(r) = restrictions {
            hasher.update(b"restrictions");
            hasher.update(serde_json::to_vec(r).unwrap_or_default());
        }
        if let Some(w) = what_if {
            hasher.update(b"what_if");
            hasher.update(serde_json::to_vec(w).unwrap_or_default());
        }
        Some(hex::encode(&hasher.finalize()[..6]))
    }

    /// Ключ данных с учётом области видимости
    pub fn key(&self, prefix: &str, filters: &Filters, additional: Option<&str>) -> String {
        let base = cache_key(prefix, filters, additional);
        match self.fingerprint() {
            Some(fp) => format!("{base}_s{fp}"),
            None => base,
        }
    }

    /// Ключ списка алертов: `alerts:` + ключ с пустым префиксом и границами периода
    pub fn alerts_key(&self, filters: &Filters, bounds: PeriodBounds) -> String {
        format!("{ALERTS_PREFIX}{}", self.key("", filters, Some(&bounds.key())))
    }

    /// Точные ключи и шаблоны для очистки данных конкретных фильтров
    pub fn invalidation(&self, filters: &Filters, bounds: PeriodBounds) -> Invalidation {
        let period = bounds.key();
        let mut exact: Vec<String> = DASHBOARD_PREFIXES
            .iter()
            .map(|prefix| {
                let additional = PERIOD_SCOPED.contains(prefix).then_some(period.as_str());
                cache_key(prefix, filters, additional)
            })
            .collect();
        exact.push(format!("{ALERTS_PREFIX}{}", cache_key("", filters, Some(&period))));

        let mut patterns: Vec<String> = DASHBOARD_PREFIXES
            .iter()
            .map(|prefix| format!("{}*", cache_key(prefix, filters, None)))
            .collect();
        patterns.push(format!("{ALERTS_PREFIX}{}*", cache_key("", filters, None)));
        if let Some(user_id) = self.restrictions.and_then(|r| r.user_id) {
            patterns.push(format!("user_{user_id}_*"));
        }

        Invalidation { exact, patterns }
    }
}

/// Префиксы, ключи которых включают границы периода
const PERIOD_SCOPED: [&str; 3] = [TIME_ENTRIES, PRODUCTION_CALENDAR, DASHBOARD_METRICS];

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct Invalidation {
    pub exact: Vec<String>,
    pub patterns: Vec<String>,
}

impl Invalidation {
    pub fn all(&self) -> Vec<String> {
        self.exact.iter().chain(&self.patterns).cloned().collect()
    }
}
