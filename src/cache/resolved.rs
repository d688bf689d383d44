//! Хранилище решённых алертов
//!
//! Единственный источник признака «решён»: в кэшированном списке алертов
//! он не хранится и накладывается при чтении.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::CacheBackend;
use crate::error::CacheError;

pub const RESOLVED_PREFIX: &str = "resolved_alert:";
pub const RESOLVED_TTL_SECS: u64 = 24 * 60 * 60;

#[derive(Clone)]
pub struct ResolvedAlertStore {
    backend: Arc<dyn CacheBackend>,
    ttl_secs: u64,
}

impl ResolvedAlertStore {
    pub fn new(backend: Arc<dyn CacheBackend>, ttl_secs: u64) -> Self {
        Self { backend, ttl_secs }
    }

    fn key(alert_id: &str) -> String {
        format!("{RESOLVED_PREFIX}{alert_id}")
    }

    pub async fn resolve(&self, alert_id: &str, at: DateTime<Utc>) -> Result<(), CacheError> {
        self.backend
            .set_ex(&Self::key(alert_id), &at.to_rfc3339(), self.ttl_secs)
            .await?;
        info!(alert_id, ttl = self.ttl_secs, "Alert marked as resolved");
        Ok(())
    }

    pub async fn unresolve(&self, alert_id: &str) -> Result<bool, CacheError> {
        let removed = self.backend.del(&[Self::key(alert_id)]).await? > 0;
        info!(alert_id, removed, "Alert marked as unresolved");
        Ok(removed)
    }

    /// Все решённые алерты: id → момент решения
    pub async fn resolved(&self) -> Result<HashMap<String, DateTime<Utc>>, CacheError> {
        let keys = self.backend.keys(&format!("{RESOLVED_PREFIX}*")).await?;
        let mut resolved = HashMap::with_capacity(keys.len());

        for key in keys {
            let Some(alert_id) = key.strip_prefix(RESOLVED_PREFIX) else {
                continue;
            };
            let Some(raw) = self.backend.get(&key).await? else {
                continue;
            };
            match DateTime::parse_from_rfc3339(&raw) {
                Ok(at) => {
                    resolved.insert(alert_id.to_string(), at.with_timezone(&Utc));
                }
                Err(err) => warn!(key, error = %err, "Resolved alert timestamp is not readable"),
            }
        }
        Ok(resolved)
    }
}
