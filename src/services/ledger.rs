//! Credit ledger
//!
//! Integer per-user balances plus the auditable transaction log behind the
//! buy-credits flow. Debits are atomic with their sufficient-funds check;
//! transactions resolve exactly once.

use crate::error::{AppError, AppResult};
use crate::models::Transaction;
use crate::repositories::{TransactionRepository, UserRepository};
use std::sync::Arc;
use tracing::info;

/// Service for balance and transaction operations
pub struct LedgerService {
    user_repo: Arc<UserRepository>,
    transaction_repo: Arc<TransactionRepository>,
}

impl LedgerService {
    pub fn new(
        user_repo: Arc<UserRepository>,
        transaction_repo: Arc<TransactionRepository>,
    ) -> Self {
        Self {
            user_repo,
            transaction_repo,
        }
    }

    /// Current balance of a user
    pub async fn balance(&self, user_id: i64) -> AppResult<i64> {
        let user = self.user_repo.get(user_id).await?;
        Ok(user.balance)
    }

    /// Credit a positive amount to a user's balance
    pub async fn credit(&self, user_id: i64, amount: i64) -> AppResult<()> {
        if amount <= 0 {
            return Err(AppError::Validation("Credit amount must be positive".into()));
        }

        self.user_repo.credit_balance(user_id, amount).await?;
        info!("Credited {} to user {}", amount, user_id);

        Ok(())
    }

    /// Debit a positive amount, failing with `InsufficientFunds` if the
    /// balance does not cover it
    pub async fn debit(&self, user_id: i64, amount: i64) -> AppResult<()> {
        if amount <= 0 {
            return Err(AppError::Validation("Debit amount must be positive".into()));
        }

        self.user_repo.try_debit_balance(user_id, amount).await?;
        info!("Debited {} from user {}", amount, user_id);

        Ok(())
    }

    /// Open a pending transaction for a payment claim
    pub async fn open_transaction(
        &self,
        user_id: i64,
        amount: i64,
        proof_ref: &str,
    ) -> AppResult<Transaction> {
        if amount <= 0 {
            return Err(AppError::Validation(
                "Transaction amount must be positive".into(),
            ));
        }

        let transaction = self
            .transaction_repo
            .create(user_id, amount, proof_ref)
            .await?;
        info!(
            "Opened transaction {} for user {} (amount {})",
            transaction.id, user_id, amount
        );

        Ok(transaction)
    }

    /// Change the amount of a still-pending transaction
    pub async fn amend_pending_amount(&self, id: i64, amount: i64) -> AppResult<()> {
        if amount <= 0 {
            return Err(AppError::Validation(
                "Transaction amount must be positive".into(),
            ));
        }

        self.transaction_repo.amend_pending_amount(id, amount).await?;

        Ok(())
    }

    /// Resolve a pending transaction exactly once
    ///
    /// Approving credits the owner with the stored amount; rejecting only
    /// flips the status. Unknown or already-resolved ids fail with
    /// `NotFound`. Returns the prior snapshot for notification purposes.
    pub async fn resolve_transaction(&self, id: i64, approve: bool) -> AppResult<Transaction> {
        let snapshot = self.transaction_repo.resolve(id, approve).await?;
        info!(
            "Transaction {} {} (user {}, amount {})",
            id,
            if approve { "approved" } else { "rejected" },
            snapshot.user_id,
            snapshot.amount
        );

        Ok(snapshot)
    }

    /// Transaction history for a user, newest first
    pub async fn history(&self, user_id: i64, limit: i64) -> AppResult<Vec<Transaction>> {
        let transactions = self.transaction_repo.find_by_user(user_id, limit).await?;
        Ok(transactions)
    }
}
