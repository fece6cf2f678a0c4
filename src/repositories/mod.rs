pub mod transaction_repository;
pub mod user_repository;

// Re-export all repositories for convenient access
pub use transaction_repository::TransactionRepository;
pub use user_repository::UserRepository;
