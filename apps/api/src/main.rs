mod config;
mod cv;
mod errors;
mod llm_client;
mod models;
mod onboarding;
mod routes;
mod state;
mod storage;
#[cfg(test)]
mod test_support;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::cv::extract::PdfTextExtractor;
use crate::cv::pipeline::CvProcessor;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::state::AppState;
use crate::storage::archive::S3Archive;
use crate::storage::locks::{InProcessLocks, RedisLocks, UploadLocks};
use crate::storage::postgres::PgStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Career API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let store = Arc::new(PgStore::connect(&config.database_url).await?);

    // Initialize upload locks
    let lock_ttl = Duration::from_secs(config.upload_lock_ttl_secs);
    let locks: Arc<dyn UploadLocks> = match &config.redis_url {
        Some(url) => {
            let client = redis::Client::open(url.as_str())?;
            info!("Redis upload locks initialized (ttl {}s)", lock_ttl.as_secs());
            Arc::new(RedisLocks::new(client, lock_ttl))
        }
        None => {
            warn!("REDIS_URL not set; upload locks are local to this process");
            Arc::new(InProcessLocks::new(lock_ttl))
        }
    };

    // Initialize S3 / MinIO
    let s3 = build_s3_client(&config).await;
    let archive = Arc::new(S3Archive::new(s3, config.s3_bucket.clone()));
    info!("S3 client initialized");

    // Initialize LLM client
    let llm = Arc::new(LlmClient::new(
        config.openai_api_key.clone(),
        config.openai_base_url.clone(),
    ));
    info!(
        "LLM client initialized (completions: {}, embeddings: {})",
        llm_client::COMPLETION_MODEL,
        llm_client::EMBEDDING_MODEL
    );

    let processor = CvProcessor::new(
        Arc::new(PdfTextExtractor),
        llm.clone(),
        llm,
        store.clone(),
        config.extraction_mode,
    );
    info!("CV extraction mode: {}", config.extraction_mode);

    // Build app state
    let state = AppState {
        store,
        archive,
        locks,
        processor: Arc::new(processor),
        config: config.clone(),
    };

    // Build router
    let app = build_router(state).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "career-api-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}
