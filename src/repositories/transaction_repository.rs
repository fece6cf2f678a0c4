//! Repository for credit purchase transactions
//!
//! Transactions are created pending and resolved exactly once; the approve
//! path credits the owning user's balance inside the same database
//! transaction so a claim can never be double-credited.

use crate::error::RepositoryError;
use crate::models::{Transaction, TransactionStatus};
use sqlx::SqlitePool;

pub struct TransactionRepository {
    pool: SqlitePool,
}

impl TransactionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a pending transaction for a payment claim
    pub async fn create(
        &self,
        user_id: i64,
        amount: i64,
        proof_ref: &str,
    ) -> Result<Transaction, RepositoryError> {
        let result = sqlx::query(
            r#"
            INSERT INTO transactions (user_id, amount, proof_ref, status, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .bind(proof_ref)
        .bind(TransactionStatus::Pending)
        .bind(chrono::Utc::now().naive_utc())
        .execute(&self.pool)
        .await?;

        self.get(result.last_insert_rowid()).await
    }

    /// Find a transaction by id
    pub async fn find_by_id(&self, id: i64) -> Result<Option<Transaction>, RepositoryError> {
        let transaction = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT id, user_id, amount, proof_ref, status, created_at
            FROM transactions
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(transaction)
    }

    /// Find a transaction by id, failing if unknown
    pub async fn get(&self, id: i64) -> Result<Transaction, RepositoryError> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("Transaction {} not found", id)))
    }

    /// Transaction history for a user, newest first
    pub async fn find_by_user(
        &self,
        user_id: i64,
        limit: i64,
    ) -> Result<Vec<Transaction>, RepositoryError> {
        let transactions = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT id, user_id, amount, proof_ref, status, created_at
            FROM transactions
            WHERE user_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(transactions)
    }

    /// Change the amount of a still-pending transaction
    ///
    /// Admin approvals may grant a different package than the provisional
    /// claim amount. Resolved transactions are immutable.
    pub async fn amend_pending_amount(&self, id: i64, amount: i64) -> Result<(), RepositoryError> {
        let rows = sqlx::query(
            r#"
            UPDATE transactions
            SET amount = ?
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(amount)
        .bind(id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows == 0 {
            return Err(RepositoryError::NotFound(format!(
                "Transaction {} not found or already resolved",
                id
            )));
        }

        Ok(())
    }

    /// Resolve a pending transaction exactly once
    ///
    /// On approve the owning user is credited with the stored amount in the
    /// same database transaction. Resolving an unknown or already-resolved id
    /// fails with `NotFound` and never credits twice. Returns the prior
    /// (pending) snapshot for notification purposes.
    pub async fn resolve(&self, id: i64, approve: bool) -> Result<Transaction, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let snapshot = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT id, user_id, amount, proof_ref, status, created_at
            FROM transactions
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| RepositoryError::NotFound(format!("Transaction {} not found", id)))?;

        let new_status = if approve {
            TransactionStatus::Approved
        } else {
            TransactionStatus::Rejected
        };

        // Guarded on 'pending' so a concurrent resolution loses cleanly
        let rows = sqlx::query(
            r#"
            UPDATE transactions
            SET status = ?
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(new_status)
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if rows == 0 {
            tx.rollback().await?;
            return Err(RepositoryError::NotFound(format!(
                "Transaction {} already resolved",
                id
            )));
        }

        if approve {
            sqlx::query("UPDATE users SET balance = balance + ? WHERE id = ?")
                .bind(snapshot.amount)
                .bind(snapshot.user_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(snapshot)
    }
}
