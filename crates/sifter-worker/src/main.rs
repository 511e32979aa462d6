use analysis_core::Config;
use analysis_pipeline::{register_handlers, AnalysisService};
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use result_cache::ResultCache;
use std::sync::Arc;
use task_queue::{JobQueue, JobRegistry, QueueName, Worker};
use tracker_client::MarketDataClient;
use tracing_subscriber::EnvFilter;

#[derive(Clone)]
struct HealthState {
    config: Config,
    client: Arc<MarketDataClient>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    let status = config.status();
    tracing::info!(
        provider_configured = status.provider_configured,
        keys = status.key_count,
        placeholder_keys = status.placeholder_keys,
        queues = ?config.worker_queues,
        "sifter worker starting"
    );
    if !status.provider_configured {
        tracing::warn!("no usable provider keys configured; analyses will degrade");
    }

    // Process-lifetime singletons: the key pool (inside the client) and the
    // store connections
    let client = Arc::new(MarketDataClient::new(
        config.usable_keys(),
        config.key_cooldown_minutes,
        config.provider_rate_limit,
    ));
    let cache = ResultCache::connect(&config.redis_url).await?;
    let queue = JobQueue::connect(&config.redis_url).await?;

    let service = Arc::new(AnalysisService::new(client.clone(), cache.clone(), queue.clone()));

    let mut registry = JobRegistry::new();
    register_handlers(&mut registry, service);
    let registry = Arc::new(registry);

    let queues: Vec<QueueName> = config
        .worker_queues
        .iter()
        .filter_map(|name| QueueName::parse(name))
        .collect();
    let queues = if queues.is_empty() {
        vec![QueueName::High, QueueName::Batch, QueueName::Compute]
    } else {
        queues
    };

    let health_state = HealthState {
        config: config.clone(),
        client,
    };
    let health_port = config.health_port;
    tokio::spawn(async move {
        if let Err(e) = serve_health(health_state, health_port).await {
            tracing::error!(error = %e, "health endpoint failed");
        }
    });

    // Several workers per process: coordinators block polling for their
    // leaves, so at least one slot must stay free for high/batch work
    let concurrency = config.worker_concurrency.max(1);
    let mut handles = Vec::with_capacity(concurrency);
    for _ in 0..concurrency {
        let worker = Worker::new(
            queue.clone(),
            cache.clone(),
            registry.clone(),
            queues.clone(),
        );
        handles.push(tokio::spawn(async move { worker.run().await }));
    }

    for handle in handles {
        handle.await?;
    }
    Ok(())
}

async fn serve_health(state: HealthState, port: u16) -> anyhow::Result<()> {
    let app = Router::new()
        .route("/health", get(health))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "health endpoint listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health(State(state): State<HealthState>) -> Json<serde_json::Value> {
    let config_status = state.config.status();
    let pool_status = state.client.key_pool().status().await;

    Json(serde_json::json!({
        "status": "healthy",
        "provider_configured": config_status.provider_configured,
        "cache_configured": config_status.cache_configured,
        "placeholder_keys": config_status.placeholder_keys,
        "key_pool": pool_status,
    }))
}
