//! ExoQuest Platform API server

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use exoquest_api::adapter::{LocalModelAdapter, ModelAdapter, RemoteModelAdapter};
use exoquest_api::config::{Config, ModelBackend};
use exoquest_api::storage::{DatasetService, FeedbackService, MemoryObjectStore, ObjectStore, S3ObjectStore};
use exoquest_api::{create_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    // Initialize logging
    let json = config.json_logs;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "exoquest_api=debug,tower_http=debug".into()))
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();

    tracing::info!("{} v{} starting ({})", config.app_name, config.app_version, config.environment);

    let store = connect_storage(&config).await;
    let adapter = build_adapter(&config)?;
    tracing::info!("Model adapter: {:?}", adapter.mode());

    let state = AppState {
        datasets: Arc::new(DatasetService::new(store.clone(), &config)),
        feedback: Arc::new(FeedbackService::new(store, config.storage.bucket_feedback.clone())),
        adapter,
        config: Arc::new(config.clone()),
    };

    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", config.host, config.port))?;
    tracing::info!("🚀 Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

/// S3/MinIO when reachable, otherwise a process-local store
async fn connect_storage(config: &Config) -> Arc<dyn ObjectStore> {
    let buckets = [
        config.storage.bucket_datasets.as_str(),
        config.storage.bucket_feedback.as_str(),
    ];

    let s3 = match S3ObjectStore::new(&config.storage) {
        Ok(s3) => s3,
        Err(e) => {
            tracing::warn!("Object storage client could not be created: {}. Using in-memory store", e);
            return Arc::new(MemoryObjectStore::with_buckets(buckets));
        }
    };

    for bucket in buckets {
        if let Err(e) = s3.ensure_bucket(bucket).await {
            let message = format!(
                "Bucket {} not available on {} ({}). Using in-memory store; uploads will not persist",
                bucket, config.storage.endpoint, e
            );
            if config.is_production() {
                tracing::error!("{}", message);
            } else {
                tracing::warn!("{}", message);
            }
            return Arc::new(MemoryObjectStore::with_buckets(buckets));
        }
    }

    tracing::info!("Object storage connected: {}", config.storage.endpoint);
    Arc::new(s3)
}

fn build_adapter(config: &Config) -> anyhow::Result<Arc<dyn ModelAdapter>> {
    Ok(match config.model_backend {
        ModelBackend::Local => Arc::new(LocalModelAdapter::load(config)),
        ModelBackend::Remote => {
            tracing::info!("Forwarding model calls to {}", config.model_base_url);
            let adapter = RemoteModelAdapter::new(&config.model_base_url)
                .map_err(|e| anyhow::anyhow!("Failed to create model client: {}", e))?;
            Arc::new(adapter)
        }
    })
}
