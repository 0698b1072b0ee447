use ai_teacher::config::ServerConfig;
use ai_teacher::domain::ports::ConfigProvider;
use ai_teacher::utils::{logger, validation::Validate};
use ai_teacher::{router, AppState};
use anyhow::Context;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match ServerConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load configuration: {}", e);
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(1);
        }
    };

    // 初始化日誌
    logger::init_logger(config.verbose, config.json_logs);

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    tracing::info!("🚀 Server running on port {}", config.port);
    tracing::info!("📱 Frontend URL: {}", config.frontend_url);
    if config.has_api_key() {
        tracing::info!("🤖 Gemini API Key: Configured (model {})", config.model_settings.name);
    } else {
        tracing::warn!("🤖 Gemini API Key: Missing, /api/ai will answer with 500");
    }
    if config.verbose {
        tracing::debug!("Allowed origins: {:?}", config.allowed_origins());
    }

    let state = AppState::from_config(&config).context("failed to build the AI client")?;
    let app = router(state, &config.allowed_origins());

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {}", address))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server error")?;

    tracing::info!("👋 Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
