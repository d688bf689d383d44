//! Настройки сервиса: значения по умолчанию, файл `config/default` и переменные `PLANNER__*`

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::cache::CacheTtl;
use crate::cache::resolved::RESOLVED_TTL_SECS;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub cache: CacheSettings,
    pub data: DataSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    Redis,
    Memory,
    None,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    pub backend: CacheBackendKind,
    #[serde(default)]
    pub redis_url: Option<String>,
    pub ttl: CacheTtl,
    pub max_retries: u32,
    /// Пауза между повторами, мс
    pub retry_delay_ms: u64,
    pub resolved_ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataSettings {
    /// JSON снимок исходных данных
    pub snapshot_path: String,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let ttl = CacheTtl::default();
        let builder = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8000)?
            .set_default("cache.backend", "memory")?
            .set_default("cache.ttl.default_secs", ttl.default_secs)?
            .set_default("cache.ttl.short_secs", ttl.short_secs)?
            .set_default("cache.ttl.long_secs", ttl.long_secs)?
            .set_default("cache.ttl.alerts_secs", ttl.alerts_secs)?
            .set_default("cache.max_retries", 3)?
            .set_default("cache.retry_delay_ms", 2000)?
            .set_default("cache.resolved_ttl_secs", RESOLVED_TTL_SECS)?
            .set_default("data.snapshot_path", "data/snapshot.json")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(Environment::with_prefix("PLANNER").separator("__"));

        builder.build()?.try_deserialize()
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_complete() {
        let settings = Settings::load().unwrap();
        assert_eq!(settings.server.port, 8000);
        assert_eq!(settings.cache.ttl, CacheTtl::default());
        assert_eq!(settings.cache.max_retries, 3);
        assert_eq!(settings.cache.resolved_ttl_secs, 24 * 60 * 60);
    }
}
