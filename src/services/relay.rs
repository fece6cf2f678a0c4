//! Session relay
//!
//! Orchestrates in-conversation behavior: every inbound message passes
//! through the moderation filter and the strike tracker before being
//! forwarded to the paired partner. A failed forward is the sole recovery
//! path for an unreachable partner and tears the pairing down; there is no
//! retry.

use crate::error::{AppError, AppResult};
use crate::models::UserStatus;
use crate::repositories::UserRepository;
use crate::services::{LedgerService, Matchmaker, ModerationFilter, StrikeOutcome, StrikeService};
use crate::transport::{ChatTransport, MessageRef};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

/// What happened to an in-chat message; the gateway turns this into replies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Sender has no live pairing; route to the generic fallback
    NotInChat,
    /// Disallowed link: suppressed, no strike, no experience
    LinkBlocked,
    /// Disallowed word below the strike threshold; carries the new count
    Warned(u32),
    /// Disallowed word reached the threshold; pairing torn down
    SenderSuspended { partner_id: i64 },
    /// Clean message forwarded to the partner
    Forwarded,
    /// Partner transport unreachable; pairing torn down
    ConnectionLost { partner_id: i64 },
}

/// Profile snapshot disclosed by the paid reveal feature
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartnerProfile {
    pub id: i64,
    pub full_name: String,
    pub username: Option<String>,
    pub phone: Option<String>,
}

/// Orchestrates message relay between paired users
pub struct SessionRelay {
    user_repo: Arc<UserRepository>,
    moderation: Arc<ModerationFilter>,
    strikes: Arc<StrikeService>,
    matchmaker: Arc<Matchmaker>,
    ledger: Arc<LedgerService>,
    transport: Arc<dyn ChatTransport>,
    reveal_cost: i64,
}

impl SessionRelay {
    pub fn new(
        user_repo: Arc<UserRepository>,
        moderation: Arc<ModerationFilter>,
        strikes: Arc<StrikeService>,
        matchmaker: Arc<Matchmaker>,
        ledger: Arc<LedgerService>,
        transport: Arc<dyn ChatTransport>,
        reveal_cost: i64,
    ) -> Self {
        Self {
            user_repo,
            moderation,
            strikes,
            matchmaker,
            ledger,
            transport,
            reveal_cost,
        }
    }

    /// Run one inbound message through moderation, strikes, experience and
    /// forwarding
    ///
    /// `text` is the message text or attachment caption, if any. The message
    /// itself is forwarded via the transport's copy primitive so attachments
    /// survive verbatim.
    pub async fn handle_message(
        &self,
        sender_id: i64,
        text: Option<&str>,
        message: &MessageRef,
    ) -> AppResult<RelayOutcome> {
        let sender = self.user_repo.get(sender_id).await?;

        let partner_id = match (sender.status, sender.partner_id) {
            (UserStatus::Chatting, Some(partner_id)) => partner_id,
            _ => return Ok(RelayOutcome::NotInChat),
        };

        let content = text.unwrap_or("");

        // Link violations are suppressed but deliberately not strikes
        if self.moderation.contains_disallowed_link(content) {
            return Ok(RelayOutcome::LinkBlocked);
        }

        if self.moderation.contains_disallowed_word(content) {
            return match self.strikes.record_strike(sender_id).await? {
                StrikeOutcome::Suspended => {
                    self.matchmaker.disconnect(sender_id, partner_id).await?;
                    Ok(RelayOutcome::SenderSuspended { partner_id })
                }
                StrikeOutcome::Warned(count) => Ok(RelayOutcome::Warned(count)),
            };
        }

        // Flat per-message experience reward
        self.user_repo.add_xp(sender_id, 1).await?;

        match self.transport.copy_message(message, partner_id).await {
            Ok(()) => Ok(RelayOutcome::Forwarded),
            Err(err) => {
                warn!(
                    "Forwarding from user {} to user {} failed: {}",
                    sender_id, partner_id, err
                );
                self.matchmaker.disconnect(sender_id, partner_id).await?;
                Ok(RelayOutcome::ConnectionLost { partner_id })
            }
        }
    }

    /// Disclose the chat partner's profile for the configured credit cost
    ///
    /// Requires an active conversation; the debit fails with
    /// `InsufficientFunds` when the balance does not cover the cost. The
    /// partner is unaffected and not notified.
    pub async fn reveal_partner(&self, user_id: i64) -> AppResult<PartnerProfile> {
        let user = self.user_repo.get(user_id).await?;

        let partner_id = match (user.status, user.partner_id) {
            (UserStatus::Chatting, Some(partner_id)) => partner_id,
            _ => {
                return Err(AppError::NotEligible(
                    "You are not in a conversation".into(),
                ))
            }
        };

        self.ledger.debit(user_id, self.reveal_cost).await?;

        let partner = self.user_repo.get(partner_id).await?;

        Ok(PartnerProfile {
            id: partner.id,
            full_name: partner.full_name,
            username: partner.username,
            phone: partner.phone,
        })
    }

    /// Price of the reveal feature
    pub fn reveal_cost(&self) -> i64 {
        self.reveal_cost
    }
}
