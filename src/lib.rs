//! Anonchat Backend Library
//!
//! This module exposes the backend components for use by tests and other
//! consumers: the user directory, the credit ledger, the matchmaking state
//! machine, the moderated session relay and the transport boundary.

pub mod config;
pub mod database;
pub mod error;
pub mod gateway;
pub mod models;
pub mod repositories;
pub mod services;
pub mod transport;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{AppError, AppResult};

use database::Database;
use repositories::*;
use std::sync::Arc;

/// Application state containing the pool and all repositories
pub struct AppState {
    pub database: Database,
    pub user_repo: Arc<UserRepository>,
    pub transaction_repo: Arc<TransactionRepository>,
}

impl AppState {
    /// Create a new AppState with initialized repositories
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        let database = Database::new(pool.clone());

        Self {
            database,
            user_repo: Arc::new(UserRepository::new(pool.clone())),
            transaction_repo: Arc::new(TransactionRepository::new(pool)),
        }
    }
}
