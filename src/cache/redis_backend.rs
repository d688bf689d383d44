//! Кэш в Redis

use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::info;

use super::CacheBackend;
use crate::error::CacheError;

/// Бэкенд поверх Redis. Соединение мультиплексированное, берётся на каждую операцию
#[derive(Clone)]
pub struct RedisBackend {
    client: redis::Client,
}

impl RedisBackend {
    pub fn new(redis_url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)?;
        info!(url = redis_url, "Redis cache backend configured");
        Ok(Self { client })
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, CacheError> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut con = self.connection().await?;
        let value: Option<String> = con.get(key).await?;
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), CacheError> {
        let mut con = self.connection().await?;
        con.set_ex::<_, _, ()>(key, value, ttl_secs).await?;
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> Result<usize, CacheError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut con = self.connection().await?;
        let deleted: usize = con.del(keys.to_vec()).await?;
        Ok(deleted)
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        let mut con = self.connection().await?;
        let keys: Vec<String> = con.keys(pattern).await?;
        Ok(keys)
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
