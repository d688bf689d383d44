//! Кэш: бэкенды и конвейер cache-aside с повторами и устаревшими данными

pub mod keys;
pub mod memory;
pub mod redis_backend;
pub mod resolved;

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::CacheError;

pub use memory::MemoryBackend;
pub use redis_backend::RedisBackend;
pub use resolved::ResolvedAlertStore;

/// Сообщение о работе на устаревших данных после исчерпания повторов
pub const STALE_DATA_MESSAGE: &str =
    "Используются кэшированные данные из-за ошибки получения свежих";

/// Хранилище строковых значений с TTL и поиском ключей по glob-шаблону
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), CacheError>;

    /// Удаляет ключи, возвращает число удалённых
    async fn del(&self, keys: &[String]) -> Result<usize, CacheError>;

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError>;

    fn name(&self) -> &'static str;
}

/// Классы TTL
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheTtl {
    pub default_secs: u64,
    pub short_secs: u64,
    pub long_secs: u64,
    pub alerts_secs: u64,
}

impl Default for CacheTtl {
    fn default() -> Self {
        Self {
            default_secs: 3 * 60 * 60,
            short_secs: 30 * 60,
            long_secs: 6 * 60 * 60,
            alerts_secs: 24 * 60 * 60,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheOptions {
    pub ttl: Duration,
    pub tags: Vec<String>,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl CacheOptions {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            ttl: Duration::from_secs(ttl_secs),
            tags: Vec::new(),
            max_retries: 3,
            retry_delay: Duration::from_millis(2000),
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_retries(mut self, max_retries: u32, retry_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_delay = retry_delay;
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CacheSource {
    Cache,
    Database,
}

/// Значение и откуда оно получено. `error` заполняется, когда отдаются устаревшие данные
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
    pub data: T,
    pub source: CacheSource,
    pub error: Option<String>,
}

impl<T> CacheResult<T> {
    fn fresh(data: T, source: CacheSource) -> Self {
        Self { data, source, error: None }
    }
}

/// Ключ со списком тегов значения
pub fn tags_key(key: &str) -> String {
    format!("tags:{key}")
}

/// Конвейер cache-aside. Без бэкенда работает напрямую с источником
#[derive(Clone, Default)]
pub struct CachePipeline {
    backend: Option<Arc<dyn CacheBackend>>,
}

impl CachePipeline {
    pub fn new(backend: Option<Arc<dyn CacheBackend>>) -> Self {
        Self { backend }
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    pub fn backend(&self) -> Option<&Arc<dyn CacheBackend>> {
        self.backend.as_ref()
    }

    /// Чтение с разбором JSON. Любая ошибка чтения считается промахом
    pub async fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let backend = self.backend.as_ref()?;
        match backend.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => Some(value),
                Err(err) => {
                    warn!(key, error = %err, "Cached value is not readable");
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                warn!(key, error = %err, "Cache read failed");
                None
            }
        }
    }

    /// Запись значения и его тегов с одним TTL
    pub async fn write<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        options: &CacheOptions,
    ) -> Result<(), CacheError> {
        let Some(backend) = self.backend.as_ref() else {
            return Ok(());
        };
        let ttl = options.ttl.as_secs();
        backend.set_ex(key, &serde_json::to_string(value)?, ttl).await?;
        if !options.tags.is_empty() {
            backend
                .set_ex(&tags_key(key), &serde_json::to_string(&options.tags)?, ttl)
                .await?;
        }
        Ok(())
    }

    /// Значение из кэша или из `fetch`
    ///
    /// Первая попытка читает ключ. При промахе вызывается `fetch`, результат
    /// кэшируется (ошибка записи только логируется). Ошибка `fetch` повторяется
    /// до `max_retries` раз с паузой `retry_delay`, затем ключ читается ещё раз:
    /// найденное значение отдаётся как устаревшее, иначе возвращается ошибка.
    pub async fn fetch_or_compute<T, E, F, Fut>(
        &self,
        key: &str,
        options: &CacheOptions,
        mut fetch: F,
    ) -> Result<CacheResult<T>, E>
    where
        T: Serialize + DeserializeOwned,
        E: Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if self.backend.is_none() {
            debug!(key, "Cache disabled, fetching directly");
            return fetch().await.map(|data| CacheResult::fresh(data, CacheSource::Database));
        }

        if let Some(cached) = self.read::<T>(key).await {
            debug!(key, "Cache hit");
            return Ok(CacheResult::fresh(cached, CacheSource::Cache));
        }

        let mut attempt = 0;
        loop {
            debug!(key, attempt, "Cache miss, fetching");
            match fetch().await {
                Ok(data) => {
                    if let Err(err) = self.write(key, &data, options).await {
                        warn!(key, error = %err, "Failed to cache value");
                    } else {
                        debug!(key, ttl = options.ttl.as_secs(), "Value cached");
                    }
                    return Ok(CacheResult::fresh(data, CacheSource::Database));
                }
                Err(err) if attempt < options.max_retries => {
                    attempt += 1;
                    warn!(
                        key,
                        attempt,
                        max_retries = options.max_retries,
                        error = %err,
                        "Fetch failed, retrying"
                    );
                    tokio::time::sleep(options.retry_delay).await;
                }
                Err(err) => {
                    if let Some(stale) = self.read::<T>(key).await {
                        warn!(key, error = %err, "Serving stale cache after fetch failure");
                        return Ok(CacheResult {
                            data: stale,
                            source: CacheSource::Cache,
                            error: Some(STALE_DATA_MESSAGE.to_string()),
                        });
                    }
                    return Err(err);
                }
            }
        }
    }

    /// Удаляет все ключи, подходящие под шаблоны. Единственный путь очистки кэша
    pub async fn invalidate<S: AsRef<str>>(&self, patterns: &[S]) -> Result<usize, CacheError> {
        let Some(backend) = self.backend.as_ref() else {
            return Ok(0);
        };

        let mut removed = 0;
        for pattern in patterns {
            let pattern = pattern.as_ref();
            let mut keys = backend.keys(pattern).await?;
            if keys.is_empty() {
                continue;
            }
            // теги живут и умирают вместе со значением
            let tags: Vec<String> = keys
                .iter()
                .filter(|k| !k.starts_with("tags:"))
                .map(|k| tags_key(k))
                .collect();
            keys.extend(tags);
            let deleted = backend.del(&keys).await?;
            info!(pattern, deleted, "Invalidated cache keys");
            removed += deleted;
        }
        Ok(removed)
    }
}
