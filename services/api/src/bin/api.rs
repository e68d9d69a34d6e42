//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        tts::parse_voice, DbAdapter, LocalFileStore, OpenAiChatAdapter, OpenAiTtsAdapter,
        SocialIdentityVerifier,
    },
    config::Config,
    error::ApiError,
    tasks::CleanupTask,
    web::{build_router, AppState, Services},
};
use async_openai::{config::OpenAIConfig, types::audio::SpeechModel, Client};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let openai_config = OpenAIConfig::new().with_api_key(
        config
            .openai_api_key
            .as_ref()
            .ok_or_else(|| ApiError::Internal("OPENAI_API_KEY is required".to_string()))?,
    );
    let openai_client = Client::with_config(openai_config);

    let tts_voice = parse_voice(&config.tts_voice).ok_or_else(|| {
        ApiError::Internal(format!(
            "Invalid TTS voice specified in config: '{}'",
            config.tts_voice
        ))
    })?;
    let tts = Arc::new(OpenAiTtsAdapter::new(
        openai_client.clone(),
        SpeechModel::Tts1Hd,
        tts_voice,
    ));
    let chat = Arc::new(OpenAiChatAdapter::new(
        openai_client,
        config.chat_model.clone(),
    ));

    let http = reqwest::Client::new();
    let identity = Arc::new(SocialIdentityVerifier::new(
        http,
        config.google_client_ids.clone(),
        config.apple_client_ids.clone(),
    ));
    if config.google_client_ids.is_empty() && config.apple_client_ids.is_empty() {
        tracing::warn!("No social client ids configured; every login will be rejected");
    }

    let files = Arc::new(LocalFileStore::new(
        config.file_storage_path.clone(),
        config.public_files_base.clone(),
    ));

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState::new(
        config.clone(),
        db_adapter,
        Services {
            identity,
            tts,
            chat,
            files,
        },
    ));

    // --- 5. Start Background Tasks ---
    let shutdown = CancellationToken::new();
    let cleanup = CleanupTask::new(
        app_state.conversations.clone(),
        app_state.relay.registry().clone(),
        config.cleanup_interval,
        config.short_conversation_grace,
    )
    .spawn(shutdown.clone());

    // --- 6. Create the Web Router ---
    let app = build_router(app_state)?;

    // --- 7. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;
    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown signal received");
            server_shutdown.cancel();
        })
        .await?;

    shutdown.cancel();
    if let Err(e) = cleanup.await {
        tracing::error!("Cleanup task ended abnormally: {}", e);
    }
    info!("Server stopped");

    Ok(())
}
