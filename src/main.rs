use std::sync::Arc;
use std::time::Duration;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use trolley_backend::{
    services::{
        gcp_auth::GcpTokenSource,
        gke::GkeRestClient,
        kubeconfig::GcloudKubeconfigGenerator,
    },
    store::{ClusterStore, MemoryClusterStore, RedisClusterStore},
    AppState, Config, GkeDiscovery,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_thread_ids(true)
        .init();

    info!("🚀 Starting Trolley Backend...");
    info!("✅ Configuration loaded, platform: {:?}", config.platform);

    // Cluster store: Redis when configured, process memory otherwise
    let store: Arc<dyn ClusterStore> = match config.redis_url.as_deref() {
        Some(url) => match RedisClusterStore::new(url) {
            Ok(store) => {
                info!("✅ Redis cluster store initialized");
                Arc::new(store)
            }
            Err(e) => {
                eprintln!("❌ Failed to initialize Redis store: {}", e);
                return Err(e.into());
            }
        },
        None => {
            warn!("⚠️ REDIS_URL is not set, cluster records are kept in memory");
            Arc::new(MemoryClusterStore::new())
        }
    };

    let mut app_state = match AppState::new(config.clone(), store) {
        Ok(state) => state,
        Err(e) => {
            eprintln!("❌ Failed to initialize orchestrator: {}", e);
            return Err(e.into());
        }
    };

    // GKE discovery needs a service account; the rest of the API works without it
    let http_timeout = Duration::from_secs(config.http_timeout_secs);
    match GcpTokenSource::from_file(&config.gcp_credentials_path, http_timeout) {
        Ok(tokens) => {
            let project_id = tokens
                .project_id()
                .map(str::to_string)
                .unwrap_or_else(|| config.gcp_project_id.clone());
            let client = reqwest::Client::builder().timeout(http_timeout).build()?;
            let api = GkeRestClient::new(client, Arc::new(tokens));
            let kubeconfig = GcloudKubeconfigGenerator::new(
                &config.kubeconfig_path,
                project_id.clone(),
                Duration::from_secs(config.command_timeout_secs),
            );
            app_state = app_state.with_discovery(GkeDiscovery::new(
                Arc::new(api),
                Arc::new(kubeconfig),
                project_id,
            ));
            info!("✅ GKE discovery initialized");
        }
        Err(e) => {
            warn!("⚠️ GKE discovery disabled: {}", e);
        }
    }

    let app = trolley_backend::router(app_state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            ),
    );

    // Start the server
    let listener = match tokio::net::TcpListener::bind(&config.server_address).await {
        Ok(listener) => {
            info!("🌐 Server listening on {}", config.server_address);
            listener
        }
        Err(e) => {
            eprintln!("❌ Failed to bind to {}: {}", config.server_address, e);
            return Err(e.into());
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("❌ Server error: {}", e);
        return Err(e.into());
    }

    info!("✅ Server stopped gracefully");
    Ok(())
}
