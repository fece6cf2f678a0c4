//! Repository for the user directory
//!
//! The authoritative record of every known user. `set_status` is the only
//! writer of the status/partner pair and always refreshes the activity
//! timestamp in the same statement.

use crate::error::RepositoryError;
use crate::models::{Gender, User, UserStatus};
use chrono::NaiveDateTime;
use sqlx::SqlitePool;

pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    /// Create a new UserRepository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Directory accessors
    // =========================================================================

    /// Find a user by transport id
    pub async fn find_by_id(&self, id: i64) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, full_name, phone, gender, xp, balance, warnings,
                   suspended_until, status, partner_id, last_activity
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Find a user by transport id, failing if unknown
    pub async fn get(&self, id: i64) -> Result<User, RepositoryError> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("User {} not found", id)))
    }

    /// Insert a new user in the onboarding state; a no-op for known users
    ///
    /// Returns the user whether it was created or already existed.
    pub async fn create_if_absent(
        &self,
        id: i64,
        username: Option<&str>,
        full_name: &str,
    ) -> Result<User, RepositoryError> {
        if let Some(user) = self.find_by_id(id).await? {
            return Ok(user);
        }

        sqlx::query(
            r#"
            INSERT INTO users (id, username, full_name, status, last_activity)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(username)
        .bind(full_name)
        .bind(UserStatus::Onboarding)
        .bind(chrono::Utc::now().naive_utc())
        .execute(&self.pool)
        .await?;

        self.get(id).await
    }

    /// Users ranked by experience, descending; ties resolved by id for a
    /// stable order
    pub async fn top_by_xp(&self, limit: i64) -> Result<Vec<User>, RepositoryError> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, full_name, phone, gender, xp, balance, warnings,
                   suspended_until, status, partner_id, last_activity
            FROM users
            ORDER BY xp DESC, id ASC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    // =========================================================================
    // Profile mutators
    // =========================================================================

    /// Record the user's phone number
    pub async fn set_phone(&self, id: i64, phone: &str) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE users SET phone = ? WHERE id = ?")
            .bind(phone)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Record the user's gender
    pub async fn set_gender(&self, id: i64, gender: Gender) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE users SET gender = ? WHERE id = ?")
            .bind(gender)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Write status, partner and a refreshed activity timestamp atomically
    pub async fn set_status(
        &self,
        id: i64,
        status: UserStatus,
        partner: Option<i64>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            UPDATE users
            SET status = ?, partner_id = ?, last_activity = ?
            WHERE id = ?
            "#,
        )
        .bind(status)
        .bind(partner)
        .bind(chrono::Utc::now().naive_utc())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Status transition guarded on the expected current status
    ///
    /// Clears the partner reference and refreshes the activity timestamp.
    /// Returns false when the user was not in `from`, making check-then-act
    /// a single atomic step.
    pub async fn transition_status(
        &self,
        id: i64,
        from: UserStatus,
        to: UserStatus,
    ) -> Result<bool, RepositoryError> {
        let rows = sqlx::query(
            r#"
            UPDATE users
            SET status = ?, partner_id = NULL, last_activity = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(to)
        .bind(chrono::Utc::now().naive_utc())
        .bind(id)
        .bind(from)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(rows > 0)
    }

    /// Award experience points
    pub async fn add_xp(&self, id: i64, amount: i64) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE users SET xp = xp + ? WHERE id = ?")
            .bind(amount)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // =========================================================================
    // Strike / suspension state
    // =========================================================================

    /// Overwrite the warning counter
    pub async fn set_warnings(&self, id: i64, warnings: i64) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE users SET warnings = ? WHERE id = ?")
            .bind(warnings)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Set or clear the suspension expiry
    pub async fn set_suspension(
        &self,
        id: i64,
        until: Option<NaiveDateTime>,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE users SET suspended_until = ? WHERE id = ?")
            .bind(until)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // =========================================================================
    // Balance mutators (owned by the Ledger service)
    // =========================================================================

    /// Increase the balance
    pub async fn credit_balance(&self, id: i64, amount: i64) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE users SET balance = balance + ? WHERE id = ?")
            .bind(amount)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Decrease the balance, atomically with the sufficient-funds check
    ///
    /// The check and the decrement are one guarded statement, so concurrent
    /// debits cannot both pass the check.
    pub async fn try_debit_balance(&self, id: i64, amount: i64) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET balance = balance - ?1
            WHERE id = ?2 AND balance >= ?1
            "#,
        )
        .bind(amount)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let user = self.get(id).await?;
            return Err(RepositoryError::InsufficientFunds {
                balance: user.balance,
                required: amount,
            });
        }

        Ok(())
    }

    // =========================================================================
    // Matchmaking queries (owned by the Matchmaker service)
    // =========================================================================

    /// Oldest searching user, optionally restricted to one gender
    ///
    /// `last_activity ASC` approximates FIFO fairness across searchers.
    pub async fn find_searching_candidate(
        &self,
        exclude_id: i64,
        gender: Option<Gender>,
    ) -> Result<Option<User>, RepositoryError> {
        let candidate = match gender {
            Some(gender) => {
                sqlx::query_as::<_, User>(
                    r#"
                    SELECT id, username, full_name, phone, gender, xp, balance, warnings,
                           suspended_until, status, partner_id, last_activity
                    FROM users
                    WHERE status = 'searching' AND id != ? AND gender = ?
                    ORDER BY last_activity ASC
                    LIMIT 1
                    "#,
                )
                .bind(exclude_id)
                .bind(gender)
                .fetch_optional(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, User>(
                    r#"
                    SELECT id, username, full_name, phone, gender, xp, balance, warnings,
                           suspended_until, status, partner_id, last_activity
                    FROM users
                    WHERE status = 'searching' AND id != ?
                    ORDER BY last_activity ASC
                    LIMIT 1
                    "#,
                )
                .bind(exclude_id)
                .fetch_optional(&self.pool)
                .await?
            }
        };

        Ok(candidate)
    }

    /// Flip requester and candidate from searching to chatting in one database
    /// transaction
    ///
    /// Both updates are guarded on `status = 'searching'`; if either side was
    /// claimed or left the queue in the meantime, the transaction rolls back
    /// and `false` is returned.
    pub async fn claim_pair(
        &self,
        requester_id: i64,
        candidate_id: i64,
    ) -> Result<bool, RepositoryError> {
        let now = chrono::Utc::now().naive_utc();
        let mut tx = self.pool.begin().await?;

        let candidate_rows = sqlx::query(
            r#"
            UPDATE users
            SET status = 'chatting', partner_id = ?, last_activity = ?
            WHERE id = ? AND status = 'searching'
            "#,
        )
        .bind(requester_id)
        .bind(now)
        .bind(candidate_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if candidate_rows == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        let requester_rows = sqlx::query(
            r#"
            UPDATE users
            SET status = 'chatting', partner_id = ?, last_activity = ?
            WHERE id = ? AND status = 'searching'
            "#,
        )
        .bind(candidate_id)
        .bind(now)
        .bind(requester_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if requester_rows == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        tx.commit().await?;

        Ok(true)
    }

    /// Best-effort partner-side cleanup: return a user to idle only if still
    /// paired with the expected partner
    pub async fn release_partner(
        &self,
        id: i64,
        expected_partner: i64,
    ) -> Result<bool, RepositoryError> {
        let rows = sqlx::query(
            r#"
            UPDATE users
            SET status = 'idle', partner_id = NULL, last_activity = ?
            WHERE id = ? AND partner_id = ?
            "#,
        )
        .bind(chrono::Utc::now().naive_utc())
        .bind(id)
        .bind(expected_partner)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(rows > 0)
    }
}
