//! Источник исходных данных дашборда

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::preprocessing::calendar::date_range;
use crate::preprocessing::filters::{FilterSet, Filters, UserRestrictions};
use crate::preprocessing::period::PeriodBounds;
use crate::types::{
    Department, LoggedTotal, Plan, ProductionCalendarDay, Project, TimeEntry, User, UserId,
};

/// Параметры выборки одного запроса
#[derive(Debug, Clone)]
pub struct DataQuery {
    pub filters: Filters,
    pub restrictions: Option<UserRestrictions>,
    pub bounds: PeriodBounds,
}

impl DataQuery {
    pub fn filter_set(&self) -> FilterSet<'_> {
        FilterSet::new(&self.filters, self.restrictions.as_ref())
    }
}

/// Внешний источник данных. Таймауты и повторы соединения - его забота
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn users(&self, query: &DataQuery) -> Result<Vec<User>>;

    async fn departments(&self, query: &DataQuery) -> Result<Vec<Department>>;

    async fn projects(&self, query: &DataQuery, user_ids: &[UserId]) -> Result<Vec<Project>>;

    async fn time_entries(&self, query: &DataQuery, user_ids: &[UserId]) -> Result<Vec<TimeEntry>>;

    /// Суммы часов по сотруднику и проекту за всё время, без границ периода
    async fn logged_totals(
        &self,
        query: &DataQuery,
        user_ids: &[UserId],
    ) -> Result<Vec<LoggedTotal>>;

    async fn plans(&self, query: &DataQuery, user_ids: &[UserId]) -> Result<Vec<Plan>>;

    async fn production_calendar(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<ProductionCalendarDay>>;
}

/// Снимок всех сущностей в одном JSON документе
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub departments: Vec<Department>,
    #[serde(default)]
    pub time_entries: Vec<TimeEntry>,
    #[serde(default)]
    pub plans: Vec<Plan>,
    #[serde(default)]
    pub production_calendar: Vec<ProductionCalendarDay>,
}

/// Источник поверх снимка; фильтры и ограничения применяются в памяти
pub struct JsonSnapshotSource {
    snapshot: Snapshot,
}

impl JsonSnapshotSource {
    pub fn new(snapshot: Snapshot) -> Self {
        Self { snapshot }
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read snapshot {}", path.display()))?;
        let snapshot: Snapshot = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse snapshot {}", path.display()))?;
        info!(
            path = %path.display(),
            users = snapshot.users.len(),
            projects = snapshot.projects.len(),
            time_entries = snapshot.time_entries.len(),
            calendar_days = snapshot.production_calendar.len(),
            "Snapshot loaded"
        );
        Ok(Self::new(snapshot))
    }
}

#[async_trait]
impl DataSource for JsonSnapshotSource {
    async fn users(&self, query: &DataQuery) -> Result<Vec<User>> {
        Ok(query.filter_set().users(&self.snapshot.users, &self.snapshot.departments))
    }

    async fn departments(&self, query: &DataQuery) -> Result<Vec<Department>> {
        Ok(query.filter_set().departments(&self.snapshot.departments))
    }

    async fn projects(&self, query: &DataQuery, user_ids: &[UserId]) -> Result<Vec<Project>> {
        Ok(query.filter_set().projects(&self.snapshot.projects, user_ids))
    }

    async fn time_entries(&self, query: &DataQuery, user_ids: &[UserId]) -> Result<Vec<TimeEntry>> {
        Ok(query
            .filter_set()
            .time_entries(&self.snapshot.time_entries, query.bounds, user_ids))
    }

    async fn logged_totals(
        &self,
        query: &DataQuery,
        user_ids: &[UserId],
    ) -> Result<Vec<LoggedTotal>> {
        Ok(query
            .filter_set()
            .logged_totals(&self.snapshot.time_entries, user_ids))
    }

    async fn plans(&self, query: &DataQuery, user_ids: &[UserId]) -> Result<Vec<Plan>> {
        Ok(query.filter_set().plans(&self.snapshot.plans, user_ids))
    }

    async fn production_calendar(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<ProductionCalendarDay>> {
        Ok(self
            .snapshot
            .production_calendar
            .iter()
            .filter(|day| day.date >= start && day.date <= end)
            .cloned()
            .collect())
    }
}

/// Календарь без праздников: будни рабочие, выходные нет
pub fn weekday_calendar(start: NaiveDate, end: NaiveDate) -> Vec<ProductionCalendarDay> {
    use chrono::Datelike;

    date_range(start, end)
        .map(|date| {
            let weekend = date.weekday().number_from_monday() >= 6;
            ProductionCalendarDay {
                date,
                is_workday: !weekend,
                is_holiday: false,
                is_preholiday_short_day: false,
                holiday_name: None,
            }
        })
        .collect()
}
