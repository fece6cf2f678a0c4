//! Transport boundary
//!
//! The messaging platform that actually delivers text and attachments is an
//! external collaborator. This module defines the inbound event vocabulary
//! it feeds us and the outbound `ChatTransport` trait we drive it through.
//! A JSON-lines console adapter for local runs lives in [`console`].

pub mod console;

use crate::models::Gender;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Opaque handle to a transport message, usable for copy and delete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRef(pub i64);

/// Which reply keyboard the transport should render next to a text
///
/// Rendering is the transport's concern; this is only a hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyboardHint {
    Main,
    Searching,
    Chat,
    Gender,
    ContactRequest,
    None,
}

/// Transport-side delivery failures
#[derive(Error, Debug)]
pub enum TransportError {
    /// The recipient cannot be reached (blocked the bot, deleted account)
    #[error("Recipient unreachable: {0}")]
    Unreachable(String),

    /// The send itself failed
    #[error("Send failed: {0}")]
    Send(String),
}

/// Identity attached to every user-originated event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRef {
    pub id: i64,
    pub username: Option<String>,
    pub full_name: String,
}

/// Menu actions exposed to users
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MenuAction {
    Search,
    StopSearch,
    EndChat,
    RevealPartner,
    BuyCredits,
    Profile,
    Leaderboard,
    Rules,
}

/// An administrator's verdict on a payment claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum AdminDecision {
    /// Approve the claim, optionally granting a different amount than the
    /// provisional one
    Approve {
        transaction_id: i64,
        amount: Option<i64>,
    },
    /// Reject the claim
    Reject { transaction_id: i64 },
}

/// Everything the transport can hand us
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    /// First contact / the start command
    Start { user: UserRef },
    /// The user shared their contact during onboarding
    ContactShared { user: UserRef, phone: String },
    /// The user picked a gender
    GenderChosen { user: UserRef, gender: Gender },
    /// A menu button press
    Menu { user: UserRef, action: MenuAction },
    /// A plain text message
    Text {
        user: UserRef,
        message: MessageRef,
        text: String,
    },
    /// A photo; a payment claim when the sender is not chatting
    Photo {
        user: UserRef,
        message: MessageRef,
        photo_ref: String,
        caption: Option<String>,
    },
    /// An administrator resolved a payment claim
    AdminDecision {
        admin_id: i64,
        decision: AdminDecision,
    },
}

/// A payment claim forwarded to the administrator for review
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentReview {
    pub transaction_id: i64,
    pub user_id: i64,
    pub full_name: String,
    pub proof_ref: String,
    /// Amounts the admin can grant with one press
    pub packages: Vec<i64>,
}

/// Outbound side of the messaging platform
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Deliver a text with a keyboard hint
    async fn send_text(
        &self,
        to: i64,
        text: &str,
        keyboard: KeyboardHint,
    ) -> Result<(), TransportError>;

    /// Relay a message verbatim to another user
    async fn copy_message(&self, message: &MessageRef, to: i64) -> Result<(), TransportError>;

    /// Remove a message; best-effort
    async fn delete_message(&self, message: &MessageRef) -> Result<(), TransportError>;

    /// Show a payment proof to the administrator with approve/reject actions
    async fn send_payment_review(
        &self,
        admin_id: i64,
        review: &PaymentReview,
    ) -> Result<(), TransportError>;
}
