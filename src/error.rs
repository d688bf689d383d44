//! Ошибки планировщика

use chrono::NaiveDate;
use thiserror::Error;

/// Ошибка производственного календаря
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CalendarError {
    #[error("в производственном календаре нет данных за {0}")]
    MissingDay(NaiveDate),
}

impl CalendarError {
    pub fn date(&self) -> NaiveDate {
        match self {
            CalendarError::MissingDay(date) => *date,
        }
    }
}

/// Ошибка кэша. Запись в кэш никогда не роняет запрос
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("ошибка Redis: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("ошибка сериализации: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("бэкенд кэша недоступен: {0}")]
    Unavailable(String),
}

/// Ошибки этапов сборки данных дашборда
#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("Ошибка на этапе загрузки пользователей: {0}")]
    Users(String),

    #[error("Ошибка на этапе загрузки сырых данных: {0}")]
    RawData(String),

    #[error("Ошибка на этапе загрузки производственного календаря: {0}")]
    Calendar(String),
}

impl DashboardError {
    pub fn stage(&self) -> &'static str {
        match self {
            DashboardError::Users(_) => "users",
            DashboardError::RawData(_) => "raw_data",
            DashboardError::Calendar(_) => "calendar",
        }
    }
}

/// Ошибка HTTP слоя
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Внутренняя ошибка: {0}")]
    Internal(String),
}

impl From<CacheError> for ApiError {
    fn from(err: CacheError) -> Self {
        ApiError::Internal(err.to_string())
    }
}
