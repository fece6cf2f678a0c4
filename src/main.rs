//! Anonchat Backend Service
//!
//! Main entry point for the anonymous chat relay backend. This service
//! provides:
//! - Matchmaking between searching users
//! - Moderated message relay inside pairings
//! - A credit ledger with admin-approved payment claims

use anonchat_backend::config::AppConfig;
use anonchat_backend::database::{create_pool, run_migrations};
use anonchat_backend::error::{AppError, AppResult};
use anonchat_backend::gateway::Gateway;
use anonchat_backend::services::{
    LedgerService, Matchmaker, ModerationFilter, SessionRelay, StrikeService,
};
use anonchat_backend::transport::console::{self, ConsoleTransport};
use anonchat_backend::transport::ChatTransport;
use anonchat_backend::AppState;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> AppResult<()> {
    // Load environment variables first
    dotenv::dotenv().ok();

    // Load configuration
    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        AppError::Config(e)
    })?;
    let config = Arc::new(config);

    // Initialize tracing/logging with config
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("anonchat_backend={},sqlx=warn", config.log_level).into()
            }),
        )
        .init();

    info!("Anonchat backend service starting");
    info!("Environment: {}", config.environment);
    info!("Log level: {}", config.log_level);

    // =========================================================================
    // DATABASE SETUP
    // =========================================================================
    info!("Connecting to database...");

    let pool = create_pool(&config.database).await.map_err(|e| {
        error!("Failed to create database pool: {}", e);
        AppError::Database(e)
    })?;

    info!("Database connection pool created successfully");
    info!("Max connections: {}", config.database.max_connections);

    // Run migrations
    info!("Running database migrations...");
    run_migrations(&pool, None).await.map_err(|e| {
        error!("Database migration failed: {}", e);
        AppError::Database(e)
    })?;

    info!("Database migrations completed successfully");

    // =========================================================================
    // CORE SERVICES INITIALIZATION
    // =========================================================================
    info!("Initializing core services...");

    // Initialize application state with repositories
    let app_state = Arc::new(AppState::new(pool));
    info!("Application state initialized with repositories");

    // Moderation filter with the configured pattern set
    let moderation = Arc::new(ModerationFilter::new(&config.moderation)?);
    info!(
        "Moderation filter initialized ({} patterns, {} denylisted terms)",
        config.moderation.link_patterns.len(),
        config.moderation.denylist.len()
    );

    // Strike tracker
    let strikes = Arc::new(StrikeService::new(
        app_state.user_repo.clone(),
        &config.moderation,
    ));
    info!(
        "Strike tracker initialized (threshold {}, suspension {}h)",
        config.moderation.strike_threshold, config.moderation.suspension_hours
    );

    // Credit ledger
    let ledger = Arc::new(LedgerService::new(
        app_state.user_repo.clone(),
        app_state.transaction_repo.clone(),
    ));
    info!("Credit ledger initialized");

    // Matchmaker
    let matchmaker = Arc::new(Matchmaker::new(app_state.user_repo.clone()));
    info!("Matchmaker initialized");

    // Transport adapter (console for local runs)
    let transport: Arc<dyn ChatTransport> = Arc::new(ConsoleTransport::new());
    info!("Console transport initialized");

    // Session relay
    let relay = Arc::new(SessionRelay::new(
        app_state.user_repo.clone(),
        moderation,
        strikes.clone(),
        matchmaker.clone(),
        ledger.clone(),
        transport.clone(),
        config.reveal_cost,
    ));
    info!("Session relay initialized");

    // Event gateway
    let gateway = Arc::new(Gateway::new(
        app_state.user_repo.clone(),
        ledger,
        strikes,
        matchmaker,
        relay,
        transport,
        config.clone(),
    ));
    info!("Gateway initialized");

    // =========================================================================
    // READY
    // =========================================================================
    info!("Anonchat backend service ready");
    info!("Reading events from stdin; press Ctrl+C to shut down");

    // =========================================================================
    // SHUTDOWN HANDLING
    // =========================================================================
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received, shutting down gracefully...");
        }
        result = console::serve(gateway) => {
            match result {
                Ok(()) => info!("Event stream closed"),
                Err(e) => error!("Console transport error: {}", e),
            }
        }
    }

    info!("Anonchat backend service shutdown complete");
    Ok(())
}
