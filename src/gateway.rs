//! Inbound event dispatcher
//!
//! Every event from the transport lands here: the suspension gate runs
//! first, then the event is routed to the matchmaker, the session relay or
//! the ledger. Benign domain errors become informational replies; anything
//! unexpected is logged and ignored, leaving state untouched.

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::models::{Gender, UserStatus};
use crate::repositories::UserRepository;
use crate::services::{
    LedgerService, Matchmaker, RelayOutcome, SearchOutcome, SessionRelay, StrikeService,
};
use crate::transport::{
    AdminDecision, ChatTransport, InboundEvent, KeyboardHint, MenuAction, MessageRef,
    PaymentReview, UserRef,
};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Routes inbound transport events to the domain services
pub struct Gateway {
    user_repo: Arc<UserRepository>,
    ledger: Arc<LedgerService>,
    strikes: Arc<StrikeService>,
    matchmaker: Arc<Matchmaker>,
    relay: Arc<SessionRelay>,
    transport: Arc<dyn ChatTransport>,
    config: Arc<AppConfig>,
}

impl Gateway {
    pub fn new(
        user_repo: Arc<UserRepository>,
        ledger: Arc<LedgerService>,
        strikes: Arc<StrikeService>,
        matchmaker: Arc<Matchmaker>,
        relay: Arc<SessionRelay>,
        transport: Arc<dyn ChatTransport>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            user_repo,
            ledger,
            strikes,
            matchmaker,
            relay,
            transport,
            config,
        }
    }

    /// Handle one inbound event; never fails the caller
    pub async fn handle_event(&self, event: InboundEvent) {
        if let Err(err) = self.dispatch(event).await {
            // Recovered locally; a malformed or unexpected event leaves
            // state untouched
            if err.is_benign() {
                warn!("Event rejected: {}", err);
            } else {
                error!("Event handling failed: {}", err);
            }
        }
    }

    async fn dispatch(&self, event: InboundEvent) -> AppResult<()> {
        // Suspension is checked before any routing; suspended users only
        // ever receive the suspension notice. Admin decisions are exempt.
        if let Some(actor) = event_actor(&event) {
            if self.strikes.is_suspended(actor).await? {
                self.say(
                    actor,
                    "You are suspended for breaking the rules. Try again later.",
                    KeyboardHint::None,
                )
                .await;
                return Ok(());
            }
        }

        match event {
            InboundEvent::Start { user } => self.on_start(user).await,
            InboundEvent::ContactShared { user, phone } => self.on_contact(user, &phone).await,
            InboundEvent::GenderChosen { user, gender } => self.on_gender(user, gender).await,
            InboundEvent::Menu { user, action } => self.on_menu(user, action).await,
            InboundEvent::Text {
                user,
                message,
                text,
            } => self.on_text(user, message, &text).await,
            InboundEvent::Photo {
                user,
                message,
                photo_ref,
                caption,
            } => self.on_photo(user, message, &photo_ref, caption.as_deref()).await,
            InboundEvent::AdminDecision { admin_id, decision } => {
                self.on_admin_decision(admin_id, decision).await
            }
        }
    }

    // =========================================================================
    // Registration & onboarding
    // =========================================================================

    async fn on_start(&self, user: UserRef) -> AppResult<()> {
        let record = self
            .user_repo
            .create_if_absent(user.id, user.username.as_deref(), &user.full_name)
            .await?;
        info!("Start from user {}", user.id);

        if record.phone.is_none() {
            self.say(
                user.id,
                "Welcome! Share your phone number to start using the service.",
                KeyboardHint::ContactRequest,
            )
            .await;
            return Ok(());
        }

        if record.gender.is_none() {
            self.say(user.id, "Please select your gender:", KeyboardHint::Gender)
                .await;
            return Ok(());
        }

        self.say(
            user.id,
            &format!(
                "Welcome back, {}! Press \"Search\" to find a partner.",
                record.full_name
            ),
            KeyboardHint::Main,
        )
        .await;

        Ok(())
    }

    async fn on_contact(&self, user: UserRef, phone: &str) -> AppResult<()> {
        let record = match self.user_repo.find_by_id(user.id).await? {
            Some(record) => record,
            None => {
                warn!("Contact from unknown user {}", user.id);
                return Ok(());
            }
        };

        // Only the onboarding contact share sets the phone
        if record.phone.is_some() {
            return Ok(());
        }

        self.user_repo.set_phone(user.id, phone).await?;

        if record.gender.is_none() {
            self.say(
                user.id,
                "Number saved! Now select your gender:",
                KeyboardHint::Gender,
            )
            .await;
        } else {
            self.complete_onboarding(user.id).await?;
            self.say(
                user.id,
                "All set! You can start chatting now.",
                KeyboardHint::Main,
            )
            .await;
        }

        Ok(())
    }

    async fn on_gender(&self, user: UserRef, gender: Gender) -> AppResult<()> {
        if self.user_repo.find_by_id(user.id).await?.is_none() {
            warn!("Gender choice from unknown user {}", user.id);
            return Ok(());
        }

        self.user_repo.set_gender(user.id, gender).await?;

        let record = self.user_repo.get(user.id).await?;
        if record.phone.is_none() {
            self.say(
                user.id,
                "Share your phone number to finish setting up:",
                KeyboardHint::ContactRequest,
            )
            .await;
            return Ok(());
        }

        self.complete_onboarding(user.id).await?;
        self.say(
            user.id,
            "All set! You can start chatting now.",
            KeyboardHint::Main,
        )
        .await;

        Ok(())
    }

    /// Leave onboarding once phone and gender are both present
    async fn complete_onboarding(&self, user_id: i64) -> AppResult<()> {
        let record = self.user_repo.get(user_id).await?;
        if record.status == UserStatus::Onboarding && record.is_profile_complete() {
            self.user_repo
                .set_status(user_id, UserStatus::Idle, None)
                .await?;
        }
        Ok(())
    }

    // =========================================================================
    // Menu actions
    // =========================================================================

    async fn on_menu(&self, user: UserRef, action: MenuAction) -> AppResult<()> {
        if self.user_repo.find_by_id(user.id).await?.is_none() {
            warn!("Menu action from unknown user {}", user.id);
            return Ok(());
        }

        match action {
            MenuAction::Search => self.on_search(user.id).await,
            MenuAction::StopSearch => self.on_stop_search(user.id).await,
            MenuAction::EndChat => self.on_end_chat(user.id).await,
            MenuAction::RevealPartner => self.on_reveal(user.id).await,
            MenuAction::BuyCredits => self.on_buy_credits(user.id).await,
            MenuAction::Profile => self.on_profile(user.id).await,
            MenuAction::Leaderboard => self.on_leaderboard(user.id).await,
            MenuAction::Rules => self.on_rules(user.id).await,
        }
    }

    async fn on_search(&self, user_id: i64) -> AppResult<()> {
        match self.matchmaker.start_search(user_id).await {
            Ok(SearchOutcome::Matched { partner }) => {
                let text = "Partner found! You can start the conversation.\n\n\
                            Links and ads are forbidden. Every clean message earns experience.";
                self.say(user_id, text, KeyboardHint::Chat).await;
                self.say(partner.id, text, KeyboardHint::Chat).await;
                Ok(())
            }
            Ok(SearchOutcome::Searching) => {
                self.say(
                    user_id,
                    "Searching for a partner... please wait.",
                    KeyboardHint::Searching,
                )
                .await;
                Ok(())
            }
            Err(err) => self.report_or_raise(user_id, err).await,
        }
    }

    async fn on_stop_search(&self, user_id: i64) -> AppResult<()> {
        match self.matchmaker.stop_search(user_id).await {
            Ok(()) => {
                self.say(user_id, "Search stopped.", KeyboardHint::Main).await;
                Ok(())
            }
            Err(err) => self.report_or_raise(user_id, err).await,
        }
    }

    async fn on_end_chat(&self, user_id: i64) -> AppResult<()> {
        match self.matchmaker.end_chat(user_id).await {
            Ok(ended) => {
                self.say(user_id, "Conversation ended.", KeyboardHint::Main)
                    .await;
                if let Some(partner_id) = ended.partner_id {
                    self.say(
                        partner_id,
                        "Your partner ended the conversation.",
                        KeyboardHint::Main,
                    )
                    .await;
                }
                Ok(())
            }
            Err(err) => self.report_or_raise(user_id, err).await,
        }
    }

    async fn on_reveal(&self, user_id: i64) -> AppResult<()> {
        match self.relay.reveal_partner(user_id).await {
            Ok(profile) => {
                let username = profile
                    .username
                    .map(|u| format!("@{}", u))
                    .unwrap_or_else(|| "not set".to_string());
                let phone = profile.phone.unwrap_or_else(|| "not set".to_string());
                self.say(
                    user_id,
                    &format!(
                        "About your partner:\n\n\
                         Name: {}\nId: {}\nUsername: {}\nPhone: {}\n\n\
                         {} credits were taken from your balance.",
                        profile.full_name,
                        profile.id,
                        username,
                        phone,
                        self.relay.reveal_cost()
                    ),
                    KeyboardHint::Chat,
                )
                .await;
                Ok(())
            }
            Err(err) => self.report_or_raise(user_id, err).await,
        }
    }

    async fn on_buy_credits(&self, user_id: i64) -> AppResult<()> {
        let packages = self
            .config
            .credit_packages
            .iter()
            .map(|p| format!("- {} credits", p))
            .collect::<Vec<_>>()
            .join("\n");

        self.say(
            user_id,
            &format!(
                "Credit packages:\n{}\n\n\
                 Payment card: {}\n\n\
                 After paying, send a screenshot of the receipt here.",
                packages, self.config.payment_card
            ),
            KeyboardHint::Main,
        )
        .await;

        Ok(())
    }

    async fn on_profile(&self, user_id: i64) -> AppResult<()> {
        let record = self.user_repo.get(user_id).await?;
        let gender = record
            .gender
            .map(|g| g.as_str().to_string())
            .unwrap_or_else(|| "not set".to_string());
        let phone = record.phone.unwrap_or_else(|| "not set".to_string());

        self.say(
            user_id,
            &format!(
                "Your profile:\n\n\
                 Id: {}\nExperience: {}\nCredits: {}\nGender: {}\nPhone: {}\n\
                 Warnings: {}/{}",
                record.id,
                record.xp,
                record.balance,
                gender,
                phone,
                record.warnings,
                self.config.moderation.strike_threshold
            ),
            KeyboardHint::Main,
        )
        .await;

        Ok(())
    }

    async fn on_leaderboard(&self, user_id: i64) -> AppResult<()> {
        let top = self.user_repo.top_by_xp(10).await?;
        let mut text = String::from("Leaderboard (by experience):\n\n");
        for (i, user) in top.iter().enumerate() {
            text.push_str(&format!("{}. {} - {} xp\n", i + 1, user.full_name, user.xp));
        }

        self.say(user_id, &text, KeyboardHint::Main).await;

        Ok(())
    }

    async fn on_rules(&self, user_id: i64) -> AppResult<()> {
        self.say(
            user_id,
            &format!(
                "Rules:\n\n\
                 1. Sharing your phone number is required for registration.\n\
                 2. Press \"Search\" and the service will find you a partner.\n\
                 3. Offensive language earns warnings; {} warnings mean a {}-hour suspension.\n\
                 4. Links, ads and usernames are strictly forbidden.\n\
                 5. Credits unlock extras such as revealing a partner's profile ({} credits).\n\
                 6. To buy credits, pay by card and send the receipt here as a photo.",
                self.config.moderation.strike_threshold,
                self.config.moderation.suspension_hours,
                self.config.reveal_cost
            ),
            KeyboardHint::Main,
        )
        .await;

        Ok(())
    }

    // =========================================================================
    // In-chat traffic
    // =========================================================================

    async fn on_text(&self, user: UserRef, message: MessageRef, text: &str) -> AppResult<()> {
        let record = match self.user_repo.find_by_id(user.id).await? {
            Some(record) => record,
            None => {
                warn!("Text from unknown user {}", user.id);
                return Ok(());
            }
        };

        if record.status == UserStatus::Chatting {
            return self.relay_and_reply(user.id, Some(text), message).await;
        }

        self.say(
            user.id,
            "Use the menu buttons to find a partner.",
            KeyboardHint::Main,
        )
        .await;

        Ok(())
    }

    async fn relay_and_reply(
        &self,
        sender_id: i64,
        text: Option<&str>,
        message: MessageRef,
    ) -> AppResult<()> {
        match self.relay.handle_message(sender_id, text, &message).await? {
            RelayOutcome::NotInChat => {
                self.say(
                    sender_id,
                    "Use the menu buttons to find a partner.",
                    KeyboardHint::Main,
                )
                .await;
            }
            RelayOutcome::LinkBlocked => {
                // The original message is removed best-effort; link
                // violations are not strikes
                if let Err(err) = self.transport.delete_message(&message).await {
                    warn!("Could not delete message {:?}: {}", message, err);
                }
                self.say(
                    sender_id,
                    "Links and usernames are forbidden! Your message was removed.",
                    KeyboardHint::Chat,
                )
                .await;
            }
            RelayOutcome::Warned(count) => {
                self.say(
                    sender_id,
                    &format!(
                        "Offensive language is forbidden! Warning {}/{}.",
                        count, self.config.moderation.strike_threshold
                    ),
                    KeyboardHint::Chat,
                )
                .await;
            }
            RelayOutcome::SenderSuspended { partner_id } => {
                self.say(
                    partner_id,
                    "Your partner was suspended for a violation.",
                    KeyboardHint::Main,
                )
                .await;
                self.say(
                    sender_id,
                    &format!(
                        "You used offensive language {} times and are suspended for {} hours.",
                        self.config.moderation.strike_threshold,
                        self.config.moderation.suspension_hours
                    ),
                    KeyboardHint::Main,
                )
                .await;
            }
            RelayOutcome::Forwarded => {}
            RelayOutcome::ConnectionLost { .. } => {
                self.say(
                    sender_id,
                    "The connection with your partner was lost.",
                    KeyboardHint::Main,
                )
                .await;
            }
        }

        Ok(())
    }

    // =========================================================================
    // Payments
    // =========================================================================

    async fn on_photo(
        &self,
        user: UserRef,
        message: MessageRef,
        photo_ref: &str,
        caption: Option<&str>,
    ) -> AppResult<()> {
        let record = match self.user_repo.find_by_id(user.id).await? {
            Some(record) => record,
            None => {
                warn!("Photo from unknown user {}", user.id);
                return Ok(());
            }
        };

        // Photos inside a conversation are relayed, not treated as payments
        if record.status == UserStatus::Chatting {
            return self.relay_and_reply(user.id, caption, message).await;
        }

        let transaction = self
            .ledger
            .open_transaction(user.id, self.config.smallest_package(), photo_ref)
            .await?;

        self.say(
            user.id,
            "Your receipt was sent to the administrator. Please wait for confirmation.",
            KeyboardHint::Main,
        )
        .await;

        let review = PaymentReview {
            transaction_id: transaction.id,
            user_id: user.id,
            full_name: record.full_name,
            proof_ref: photo_ref.to_string(),
            packages: self.config.credit_packages.clone(),
        };

        if let Err(err) = self
            .transport
            .send_payment_review(self.config.admin_id, &review)
            .await
        {
            warn!("Could not forward payment review to admin: {}", err);
        }

        Ok(())
    }

    async fn on_admin_decision(&self, admin_id: i64, decision: AdminDecision) -> AppResult<()> {
        if admin_id != self.config.admin_id {
            warn!("Admin decision from non-admin user {}", admin_id);
            return Ok(());
        }

        let result = match decision {
            AdminDecision::Approve {
                transaction_id,
                amount,
            } => {
                if let Some(amount) = amount {
                    if let Err(err) = self.ledger.amend_pending_amount(transaction_id, amount).await
                    {
                        return self.report_to_admin(transaction_id, err).await;
                    }
                }
                self.ledger.resolve_transaction(transaction_id, true).await
            }
            AdminDecision::Reject { transaction_id } => {
                self.ledger.resolve_transaction(transaction_id, false).await
            }
        };

        match result {
            Ok(snapshot) => {
                let text = if matches!(decision, AdminDecision::Approve { .. }) {
                    format!(
                        "Congratulations! {} credits were added to your balance.",
                        snapshot.amount
                    )
                } else {
                    "Your payment was rejected.".to_string()
                };
                self.say(snapshot.user_id, &text, KeyboardHint::Main).await;
                Ok(())
            }
            Err(err) => {
                let transaction_id = match decision {
                    AdminDecision::Approve { transaction_id, .. } => transaction_id,
                    AdminDecision::Reject { transaction_id } => transaction_id,
                };
                self.report_to_admin(transaction_id, err).await
            }
        }
    }

    /// Lookup misses on the admin path are reported back to the admin
    async fn report_to_admin(&self, transaction_id: i64, err: AppError) -> AppResult<()> {
        if err.is_not_found() {
            warn!("Admin decision on transaction {}: {}", transaction_id, err);
            self.say(
                self.config.admin_id,
                &format!(
                    "Transaction {} was not found or is already resolved.",
                    transaction_id
                ),
                KeyboardHint::None,
            )
            .await;
            return Ok(());
        }
        Err(err)
    }

    // =========================================================================
    // Reply plumbing
    // =========================================================================

    /// Turn benign domain errors into informational replies
    async fn report_or_raise(&self, user_id: i64, err: AppError) -> AppResult<()> {
        match &err {
            AppError::NotEligible(msg) => {
                self.say(user_id, msg, KeyboardHint::Main).await;
                Ok(())
            }
            AppError::InsufficientFunds { balance, required } => {
                self.say(
                    user_id,
                    &format!(
                        "You do not have enough credits! This costs {}, you have {}.",
                        required, balance
                    ),
                    KeyboardHint::Main,
                )
                .await;
                Ok(())
            }
            _ => Err(err),
        }
    }

    /// Best-effort reply; delivery failures here are logged, never raised
    async fn say(&self, to: i64, text: &str, keyboard: KeyboardHint) {
        if let Err(err) = self.transport.send_text(to, text, keyboard).await {
            warn!("Could not deliver reply to user {}: {}", to, err);
        }
    }
}

/// The user a gate check applies to; admin decisions are exempt
fn event_actor(event: &InboundEvent) -> Option<i64> {
    match event {
        InboundEvent::Start { user }
        | InboundEvent::ContactShared { user, .. }
        | InboundEvent::GenderChosen { user, .. }
        | InboundEvent::Menu { user, .. }
        | InboundEvent::Text { user, .. }
        | InboundEvent::Photo { user, .. } => Some(user.id),
        InboundEvent::AdminDecision { .. } => None,
    }
}
