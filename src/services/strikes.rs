//! Strike accumulation and timed suspensions
//!
//! Warnings accumulate per user; at the configured threshold the counter
//! resets and a timed suspension is stamped. Expiry is evaluated lazily on
//! read, there is no background sweep.

use crate::config::ModerationConfig;
use crate::error::AppResult;
use crate::repositories::UserRepository;
use std::sync::Arc;
use tracing::info;

/// Result of recording a strike
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrikeOutcome {
    /// Below the threshold; carries the new warning count
    Warned(u32),
    /// Threshold reached: counter reset, suspension stamped
    Suspended,
}

/// Tracks warnings and issues suspensions
pub struct StrikeService {
    user_repo: Arc<UserRepository>,
    threshold: u32,
    suspension: chrono::Duration,
}

impl StrikeService {
    pub fn new(user_repo: Arc<UserRepository>, config: &ModerationConfig) -> Self {
        Self {
            user_repo,
            threshold: config.strike_threshold,
            suspension: config.suspension_duration(),
        }
    }

    /// Record one strike against a user
    ///
    /// Reaching the threshold resets the warning counter to zero and stamps
    /// a suspension expiry; otherwise the incremented count is returned.
    pub async fn record_strike(&self, user_id: i64) -> AppResult<StrikeOutcome> {
        let user = self.user_repo.get(user_id).await?;
        let warnings = user.warnings as u32 + 1;

        if warnings >= self.threshold {
            let until = chrono::Utc::now().naive_utc() + self.suspension;
            self.user_repo.set_warnings(user_id, 0).await?;
            self.user_repo.set_suspension(user_id, Some(until)).await?;
            info!("User {} suspended until {}", user_id, until);
            return Ok(StrikeOutcome::Suspended);
        }

        self.user_repo.set_warnings(user_id, warnings as i64).await?;
        info!("User {} warned ({}/{})", user_id, warnings, self.threshold);

        Ok(StrikeOutcome::Warned(warnings))
    }

    /// Whether the user is currently suspended
    ///
    /// An expiry in the past is cleared on this read (lazy expiry); the call
    /// is idempotent and safe on every inbound event. Unknown users are not
    /// suspended.
    pub async fn is_suspended(&self, user_id: i64) -> AppResult<bool> {
        let user = match self.user_repo.find_by_id(user_id).await? {
            Some(user) => user,
            None => return Ok(false),
        };

        match user.suspended_until {
            Some(until) if until > chrono::Utc::now().naive_utc() => Ok(true),
            Some(_) => {
                // Expired: clear the stamp so later reads short-circuit
                self.user_repo.set_suspension(user_id, None).await?;
                Ok(false)
            }
            None => Ok(false),
        }
    }
}
