//! Resource Planner - движок планирования загрузки сотрудников
//!
//! Считает мощность, спрос и прогноз по сотрудникам и отделам на основе
//! производственного календаря, строит недельные ряды, оценивает качество
//! данных и формирует алерты. Данные отдаются через HTTP API с кэшем.

pub mod api;
pub mod cache;
pub mod error;
pub mod models;
pub mod preprocessing;
pub mod service;
pub mod settings;
pub mod source;
pub mod types;

pub use types::*;
pub use models::*;
pub use preprocessing::*;

// Re-export для удобства
pub use error::{ApiError, CacheError, CalendarError, DashboardError};
pub use service::{DashboardRequest, DashboardService, ServiceOptions};
pub use settings::Settings;
