//! Типы данных планировщика ресурсов

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub type UserId = i64;
pub type ProjectId = i64;
pub type DepartmentId = i64;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductionCalendarDay {
    pub date: NaiveDate,
    pub is_workday: bool,
    pub is_holiday: bool,
    #[serde(default)]
    pub is_preholiday_short_day: bool,
    #[serde(default)]
    pub holiday_name: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VacationType {
    Paid,
    Unpaid,
    Sick,
    DayOff,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Vacation {
    pub user_id: UserId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default = "default_vacation_type")]
    pub vacation_type: VacationType,
}

fn default_vacation_type() -> VacationType {
    VacationType::Paid
}

impl Vacation {
    pub fn contains(&self, day: NaiveDate) -> bool {
        day >= self.start_date && day <= self.end_date
    }

    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.start_date <= end && self.end_date >= start
    }
}

/// Норма сотрудника: рабочие дни недели (1 = понедельник) и дневные квоты часов
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Norm {
    pub working_days: Vec<u32>,
    pub hours_commercial: f64,
    pub hours_presale: f64,
    pub hours_internal: f64,
    #[serde(default)]
    pub works_on_holidays: bool,
    pub valid_from: NaiveDate,
    #[serde(default)]
    pub valid_to: Option<NaiveDate>,
}

impl Norm {
    pub fn daily_hours(&self) -> f64 {
        self.hours_commercial + self.hours_presale + self.hours_internal
    }

    pub fn works_on_weekday(&self, iso_weekday: u32) -> bool {
        self.working_days.contains(&iso_weekday)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Plan {
    pub id: i64,
    pub user_id: Option<UserId>,
    pub project_id: Option<ProjectId>,
    #[serde(default)]
    pub contracted_hours: f64,
    #[serde(default)]
    pub internal_hours: f64,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub project_start_date: Option<NaiveDate>,
    #[serde(default)]
    pub project_end_date: Option<NaiveDate>,
}

impl Plan {
    /// Активный план с ненулевыми часами
    pub fn is_effective(&self) -> bool {
        self.is_active && (self.contracted_hours > 0.0 || self.internal_hours > 0.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub created_at: NaiveDate,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub norms: Vec<Norm>,
    #[serde(default)]
    pub vacations: Vec<Vacation>,
    #[serde(default)]
    pub plans: Vec<Plan>,
}

impl User {
    /// Действующая норма: из нескольких исторических берётся последняя по `valid_from`
    pub fn norm(&self) -> Option<&Norm> {
        self.norms.iter().max_by_key(|n| n.valid_from)
    }

    pub fn is_on_vacation(&self, day: NaiveDate) -> bool {
        self.vacations.iter().any(|v| v.contains(day))
    }

    pub fn effective_plans(&self) -> impl Iterator<Item = &Plan> {
        self.plans.iter().filter(|p| p.is_effective())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Active,
    Presale,
    Internal,
    Archive,
    PresaleArchive,
    Completed,
    OnHold,
}

impl ProjectStatus {
    /// Статусы, часы по которым входят в спрос
    pub fn counts_toward_demand(self) -> bool {
        matches!(
            self,
            ProjectStatus::Active
                | ProjectStatus::Presale
                | ProjectStatus::PresaleArchive
                | ProjectStatus::Archive
        )
    }

    pub fn bucket(self) -> HoursBucket {
        match self {
            ProjectStatus::Active => HoursBucket::Commercial,
            ProjectStatus::Presale => HoursBucket::Presale,
            ProjectStatus::Internal => HoursBucket::Internal,
            _ => HoursBucket::Other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProjectStatus::Active => "active",
            ProjectStatus::Presale => "presale",
            ProjectStatus::Internal => "internal",
            ProjectStatus::Archive => "archive",
            ProjectStatus::PresaleArchive => "presale_archive",
            ProjectStatus::Completed => "completed",
            ProjectStatus::OnHold => "on_hold",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProjectType {
    Commercial,
    Presale,
    Internal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    #[serde(default)]
    pub name: Option<String>,
    pub status: ProjectStatus,
    #[serde(default)]
    pub project_type: Option<ProjectType>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub plans: Vec<Plan>,
    #[serde(default)]
    pub member_ids: Vec<UserId>,
}

impl Project {
    pub fn is_active(&self) -> bool {
        self.status == ProjectStatus::Active
    }

    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => "Без названия",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeEntry {
    pub id: i64,
    pub user_id: UserId,
    pub project_id: ProjectId,
    pub date: NaiveDate,
    pub hours: f64,
    #[serde(default)]
    pub project_status: Option<ProjectStatus>,
}

/// Все часы сотрудника по проекту без ограничения периодом
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggedTotal {
    pub user_id: UserId,
    pub project_id: ProjectId,
    pub hours: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Department {
    pub id: DepartmentId,
    pub name: String,
    #[serde(default)]
    pub lead_tg_id: Option<i64>,
    #[serde(default)]
    pub user_ids: Vec<UserId>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum HoursBucket {
    Commercial,
    Presale,
    Internal,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HoursDistributionItem {
    pub kind: HoursBucket,
    pub hours: f64,
    pub percentage: f64,
}

/// Статус загрузки по порогам 70 / 110 (границы относятся к «норме»)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LoadStatus {
    #[serde(rename = "малая загрузка")]
    Underloaded,
    #[serde(rename = "норма")]
    Normal,
    #[serde(rename = "перегруз")]
    Overloaded,
}

impl LoadStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            LoadStatus::Underloaded => "малая загрузка",
            LoadStatus::Normal => "норма",
            LoadStatus::Overloaded => "перегруз",
        }
    }
}

/// Результат расчёта по одному сотруднику; исходный `User` не изменяется
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserMetrics {
    pub user_id: UserId,
    pub capacity_hours: f64,
    pub demand_hours: f64,
    pub forecast_hours: f64,
    pub load_pct: f64,
    pub status: LoadStatus,
    pub working_days: u32,
    pub hours_distribution: Vec<HoursDistributionItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DataQualityMetrics {
    pub norm_coverage: f64,
    pub time_entry_completeness: f64,
    pub plan_coverage: f64,
    pub project_data_completeness: f64,
    pub recent_activity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeptAggregate {
    pub department_id: DepartmentId,
    pub department_name: String,
    pub capacity: f64,
    pub demand: f64,
    pub forecast: f64,
    pub load_pct: f64,
    pub status: LoadStatus,
    pub data_quality: f64,
    pub data_quality_metrics: DataQualityMetrics,
    pub hours_distribution: Vec<HoursDistributionItem>,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeeklyLoadData {
    pub week: String,
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub commercial: f64,
    pub presale: f64,
    pub internal: f64,
    pub capacity: f64,
    pub demand: f64,
    pub load_pct: f64,
    pub is_forecast: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DashboardKpis {
    pub avg_load: f64,
    pub active_users: usize,
    pub active_projects: usize,
    pub data_quality: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposedPoint {
    pub dept: String,
    pub capacity: f64,
    pub demand: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommercialSharePoint {
    pub dept: String,
    pub commercial_share: f64,
    pub load: f64,
    pub total_hours: f64,
    pub commercial_hours: f64,
}

/// Пробел в данных: для сотрудника не удалось посчитать метрики
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataWarning {
    pub user_id: UserId,
    pub missing_date: NaiveDate,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardMetrics {
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub dept_agg: Vec<DeptAggregate>,
    pub user_metrics: Vec<UserMetrics>,
    pub kpis: DashboardKpis,
    pub area_series: Vec<WeeklyLoadData>,
    pub pie_data: Vec<HoursDistributionItem>,
    pub composed_data: Vec<ComposedPoint>,
    pub scatter_data: Vec<CommercialSharePoint>,
    #[serde(default)]
    pub warnings: Vec<DataWarning>,
}

impl DashboardMetrics {
    pub fn user(&self, user_id: UserId) -> Option<&UserMetrics> {
        self.user_metrics.iter().find(|m| m.user_id == user_id)
    }

    pub fn department(&self, department_id: DepartmentId) -> Option<&DeptAggregate> {
        self.dept_agg.iter().find(|d| d.department_id == department_id)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Critical,
    Warning,
    Info,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AlertCategory {
    Load,
    DataQuality,
    Project,
    Norms,
    Vacation,
    Forecast,
}

impl AlertSeverity {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertSeverity::Critical => "critical",
            AlertSeverity::Warning => "warning",
            AlertSeverity::Info => "info",
        }
    }
}

impl AlertCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertCategory::Load => "load",
            AlertCategory::DataQuality => "data_quality",
            AlertCategory::Project => "project",
            AlertCategory::Norms => "norms",
            AlertCategory::Vacation => "vacation",
            AlertCategory::Forecast => "forecast",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    User,
    Department,
    Project,
    System,
}

impl EntityType {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityType::User => "user",
            EntityType::Department => "department",
            EntityType::Project => "project",
            EntityType::System => "system",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AlertSource {
    Person,
    Project,
    System,
}

impl AlertSource {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertSource::Person => "person",
            AlertSource::Project => "project",
            AlertSource::System => "system",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub severity: AlertSeverity,
    pub category: AlertCategory,
    pub title: String,
    pub description: String,
    pub entity_type: EntityType,
    pub entity_id: String,
    pub entity_name: String,
    #[serde(default)]
    pub period: Option<String>,
    #[serde(default)]
    pub metric_value: Option<f64>,
    #[serde(default)]
    pub threshold: Option<f64>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub resolved: bool,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
    pub source: AlertSource,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AlertStats {
    pub total: usize,
    pub critical: usize,
    pub warning: usize,
    pub info: usize,
    pub by_category: std::collections::BTreeMap<String, usize>,
    pub by_source: std::collections::BTreeMap<String, usize>,
}
