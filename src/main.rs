mod config;
mod error;
mod handlers;
mod models;
mod services;
#[cfg(feature = "web-server")]
mod web; // HTTP surface

use anyhow::Result;
use dotenv::dotenv;
use std::sync::Arc;

use config::Config;
use handlers::SessionOrchestrator;
use services::{GroqService, InferenceService, NutritionResolver, VisionDetector};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env first so RUST_LOG from it applies
    dotenv().ok();
    env_logger::init();

    log::info!("🚀 Starting Food Lens...");

    // Missing credentials stop us here, before any client exists
    let config = Config::from_env().map_err(|e| {
        log::error!("❌ Configuration error: {}", e);
        e
    })?;
    log::debug!("⚙️ Loaded configuration: {:?}", config);

    let inference: Arc<dyn InferenceService> = Arc::new(GroqService::from_config(&config)?);
    log::info!("✅ Inference client initialized: {}", config.base_url);

    let detector = VisionDetector::new(inference.clone(), config.vision_model.clone(), config.sampling);
    let resolver = NutritionResolver::new(inference, config.text_model.clone(), config.sampling);
    let orchestrator = SessionOrchestrator::new(detector, resolver, config.resolve_concurrency);
    log::info!(
        "✅ Pipeline ready (vision: {}, text: {}, concurrency: {})",
        config.vision_model,
        config.text_model,
        config.resolve_concurrency
    );

    #[cfg(feature = "web-server")]
    {
        use handlers::SessionStore;
        use web::server::{create_router, AppState};

        let state = Arc::new(AppState {
            orchestrator,
            store: SessionStore::new(config.max_sessions),
        });
        let app = create_router(state, config.max_upload_bytes);

        let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
        log::info!("🌐 Server listening on {}", config.bind_addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                log::info!("🛑 Shutting down...");
            })
            .await?;
    }

    #[cfg(not(feature = "web-server"))]
    {
        let _ = orchestrator;
        log::warn!("⚠️ Built without the web-server feature, nothing to serve");
    }

    Ok(())
}
