/// API сервер планировщика ресурсов

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use resource_planner::{
    api::{self, AppState},
    cache::{CacheBackend, CachePipeline, MemoryBackend, RedisBackend, ResolvedAlertStore},
    settings::{CacheBackendKind, Settings},
    source::JsonSnapshotSource,
    DashboardService, ServiceOptions,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Инициализация логирования
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let settings = Settings::load().context("failed to load settings")?;

    let backend: Option<Arc<dyn CacheBackend>> = match settings.cache.backend {
        CacheBackendKind::Redis => {
            let url = settings
                .cache
                .redis_url
                .as_deref()
                .context("cache.redis_url is required for the redis backend")?;
            match RedisBackend::new(url) {
                Ok(redis) => Some(Arc::new(redis) as Arc<dyn CacheBackend>),
                Err(err) => {
                    tracing::warn!("Redis is not available, caching disabled: {}", err);
                    None
                }
            }
        }
        CacheBackendKind::Memory => Some(Arc::new(MemoryBackend::new()) as Arc<dyn CacheBackend>),
        CacheBackendKind::None => None,
    };
    tracing::info!(
        "Cache backend: {}",
        backend.as_ref().map(|b| b.name()).unwrap_or("disabled")
    );

    // решённые алерты хранятся даже без кэша
    let resolved_backend: Arc<dyn CacheBackend> = match &backend {
        Some(backend) => Arc::clone(backend),
        None => Arc::new(MemoryBackend::new()),
    };

    let source = JsonSnapshotSource::load(&settings.data.snapshot_path).await?;

    let service = DashboardService::new(
        Arc::new(source),
        CachePipeline::new(backend),
        ResolvedAlertStore::new(resolved_backend, settings.cache.resolved_ttl_secs),
        ServiceOptions {
            ttl: settings.cache.ttl,
            max_retries: settings.cache.max_retries,
            retry_delay: Duration::from_millis(settings.cache.retry_delay_ms),
        },
    );

    let app = api::router(AppState::new(service));

    let addr = settings.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("Server listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
