//! Matchmaker state machine
//!
//! Moves users between idle, searching and chatting, and establishes or
//! tears down symmetric pairings. All pairing flips run under a single
//! claim mutex and inside CAS-guarded database transactions, so no user can
//! be claimed by two concurrent searches.

use crate::error::{AppError, AppResult};
use crate::models::{User, UserStatus};
use crate::repositories::UserRepository;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// Result of `start_search`
#[derive(Debug, Clone)]
pub enum SearchOutcome {
    /// Paired immediately; both sides are already chatting
    Matched { partner: User },
    /// No candidate available; the user stays in the searching state
    Searching,
}

/// Result of `end_chat`, carrying the partner to notify
#[derive(Debug, Clone, Copy)]
pub struct EndedChat {
    pub partner_id: Option<i64>,
}

/// The matchmaking state machine
pub struct Matchmaker {
    user_repo: Arc<UserRepository>,
    /// Serializes candidate selection and claiming; the single coordination
    /// point for pairing decisions
    claim_lock: Mutex<()>,
}

impl Matchmaker {
    pub fn new(user_repo: Arc<UserRepository>) -> Self {
        Self {
            user_repo,
            claim_lock: Mutex::new(()),
        }
    }

    /// Enter the searching state and attempt an immediate pairing
    ///
    /// Requires an idle user with a set gender. When a partner is found both
    /// users transition to chatting in the same logical step; callers never
    /// observe a matched pair still searching.
    pub async fn start_search(&self, user_id: i64) -> AppResult<SearchOutcome> {
        let user = self.user_repo.get(user_id).await?;

        match user.status {
            UserStatus::Onboarding => {
                return Err(AppError::NotEligible(
                    "Finish setting up your profile first".into(),
                ))
            }
            UserStatus::Searching => {
                return Err(AppError::NotEligible("You are already searching".into()))
            }
            UserStatus::Chatting => {
                return Err(AppError::NotEligible(
                    "You are already in a conversation".into(),
                ))
            }
            UserStatus::Idle => {}
        }

        let gender = user.gender.ok_or_else(|| {
            AppError::NotEligible("Select your gender before searching".into())
        })?;

        // Guarded flip: a duplicate concurrent search loses here instead of
        // clobbering a pairing established in the meantime
        if !self
            .user_repo
            .transition_status(user_id, UserStatus::Idle, UserStatus::Searching)
            .await?
        {
            return Err(AppError::NotEligible("You are already searching".into()));
        }
        info!("User {} started searching", user_id);

        // Selection and claiming are serialized so two concurrent searches
        // can never claim the same candidate.
        let _guard = self.claim_lock.lock().await;

        loop {
            // Prefer the opposite gender, then fall back to any searcher;
            // within a tier the oldest activity wins (FIFO fairness).
            let candidate = match self
                .user_repo
                .find_searching_candidate(user_id, Some(gender.opposite()))
                .await?
            {
                Some(candidate) => Some(candidate),
                None => self.user_repo.find_searching_candidate(user_id, None).await?,
            };

            let candidate = match candidate {
                Some(candidate) => candidate,
                None => return Ok(SearchOutcome::Searching),
            };

            if self.user_repo.claim_pair(user_id, candidate.id).await? {
                let partner = self.user_repo.get(candidate.id).await?;
                info!("Paired user {} with user {}", user_id, partner.id);
                return Ok(SearchOutcome::Matched { partner });
            }

            // The claim lost one of its guards. If the requester is no
            // longer searching the search is over; otherwise the candidate
            // left the queue and the next one is tried.
            let requester = self.user_repo.get(user_id).await?;
            if requester.status != UserStatus::Searching {
                return Ok(SearchOutcome::Searching);
            }
        }
    }

    /// Leave the searching state
    pub async fn stop_search(&self, user_id: i64) -> AppResult<()> {
        let user = self.user_repo.get(user_id).await?;

        if user.status != UserStatus::Searching {
            return Err(AppError::NotEligible("You are not searching".into()));
        }

        if !self
            .user_repo
            .transition_status(user_id, UserStatus::Searching, UserStatus::Idle)
            .await?
        {
            // Claimed or stopped in the meantime; nothing left to do
            return Err(AppError::NotEligible("You are not searching".into()));
        }
        info!("User {} stopped searching", user_id);

        Ok(())
    }

    /// End the requester's conversation, returning both sides to idle
    ///
    /// The partner side is cleaned up best-effort: the requester's own
    /// transition succeeds even if the partner record is gone or already
    /// idle. The returned partner id lets the boundary notify the other
    /// side's transport of the session end.
    pub async fn end_chat(&self, user_id: i64) -> AppResult<EndedChat> {
        let user = self.user_repo.get(user_id).await?;

        if user.status != UserStatus::Chatting {
            return Err(AppError::NotEligible(
                "You are not in a conversation".into(),
            ));
        }

        let partner_id = user.partner_id;

        if !self
            .user_repo
            .transition_status(user_id, UserStatus::Chatting, UserStatus::Idle)
            .await?
        {
            // The partner's own end_chat got here first
            return Err(AppError::NotEligible(
                "You are not in a conversation".into(),
            ));
        }

        if let Some(partner_id) = partner_id {
            // Only release the partner if it is still paired with us
            self.user_repo.release_partner(partner_id, user_id).await?;
            info!("User {} ended chat with user {}", user_id, partner_id);
        }

        Ok(EndedChat { partner_id })
    }

    /// Tear down a pairing symmetrically (suspension, delivery failure)
    pub async fn disconnect(&self, user_id: i64, partner_id: i64) -> AppResult<()> {
        self.user_repo
            .set_status(user_id, UserStatus::Idle, None)
            .await?;
        self.user_repo.release_partner(partner_id, user_id).await?;
        info!("Disconnected users {} and {}", user_id, partner_id);

        Ok(())
    }
}
