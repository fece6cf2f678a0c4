mod helpers;

use anonchat_backend::models::{Gender, TransactionStatus, UserStatus};
use anonchat_backend::transport::{
    AdminDecision, InboundEvent, MenuAction, MessageRef, UserRef,
};
use helpers::*;

fn user_ref(id: i64, name: &str) -> UserRef {
    UserRef {
        id,
        username: Some(format!("user{}", id)),
        full_name: name.to_string(),
    }
}

/// Start → contact → gender walks a new user from onboarding to idle
#[tokio::test]
async fn test_onboarding_flow() {
    let harness = TestHarness::new().await;

    harness
        .gateway
        .handle_event(InboundEvent::Start {
            user: user_ref(1, "Alice"),
        })
        .await;

    let user = harness.db.user_repo.get(1).await.unwrap();
    assert_eq!(user.status, UserStatus::Onboarding);

    harness
        .gateway
        .handle_event(InboundEvent::ContactShared {
            user: user_ref(1, "Alice"),
            phone: "+15550001".to_string(),
        })
        .await;

    harness
        .gateway
        .handle_event(InboundEvent::GenderChosen {
            user: user_ref(1, "Alice"),
            gender: Gender::Female,
        })
        .await;

    let user = harness.db.user_repo.get(1).await.unwrap();
    assert_eq!(user.status, UserStatus::Idle);
    assert_eq!(user.phone.as_deref(), Some("+15550001"));
    assert_eq!(user.gender, Some(Gender::Female));
}

/// A photo outside a chat opens a pending claim and notifies the admin;
/// the admin's approval with an explicit amount credits exactly that
#[tokio::test]
async fn test_payment_claim_and_admin_approval() {
    let harness = TestHarness::new().await;
    create_ready_user(&harness.db, 1, "Alice", Gender::Female).await;

    harness
        .gateway
        .handle_event(InboundEvent::Photo {
            user: user_ref(1, "Alice"),
            message: MessageRef(100),
            photo_ref: "file-abc".to_string(),
            caption: None,
        })
        .await;

    let reviews = harness.transport.reviews.lock().unwrap().clone();
    assert_eq!(reviews.len(), 1);
    let review = &reviews[0];
    assert_eq!(review.user_id, 1);
    assert_eq!(review.proof_ref, "file-abc");

    let pending = harness
        .db
        .transaction_repo
        .get(review.transaction_id)
        .await
        .unwrap();
    assert_eq!(pending.status, TransactionStatus::Pending);
    assert_eq!(pending.amount, harness.config.smallest_package());

    harness
        .gateway
        .handle_event(InboundEvent::AdminDecision {
            admin_id: harness.config.admin_id,
            decision: AdminDecision::Approve {
                transaction_id: review.transaction_id,
                amount: Some(200),
            },
        })
        .await;

    assert_eq!(harness.ledger.balance(1).await.unwrap(), 200);
    let resolved = harness
        .db
        .transaction_repo
        .get(review.transaction_id)
        .await
        .unwrap();
    assert_eq!(resolved.status, TransactionStatus::Approved);
    assert_eq!(resolved.amount, 200);

    // A second approval is reported to the admin and does not credit again
    harness
        .gateway
        .handle_event(InboundEvent::AdminDecision {
            admin_id: harness.config.admin_id,
            decision: AdminDecision::Approve {
                transaction_id: review.transaction_id,
                amount: None,
            },
        })
        .await;
    assert_eq!(harness.ledger.balance(1).await.unwrap(), 200);
    assert!(!harness.transport.texts_to(harness.config.admin_id).is_empty());
}

#[tokio::test]
async fn test_rejected_claim_never_credits() {
    let harness = TestHarness::new().await;
    create_ready_user(&harness.db, 1, "Alice", Gender::Female).await;

    harness
        .gateway
        .handle_event(InboundEvent::Photo {
            user: user_ref(1, "Alice"),
            message: MessageRef(101),
            photo_ref: "file-def".to_string(),
            caption: None,
        })
        .await;

    let transaction_id = harness.transport.reviews.lock().unwrap()[0].transaction_id;

    harness
        .gateway
        .handle_event(InboundEvent::AdminDecision {
            admin_id: harness.config.admin_id,
            decision: AdminDecision::Reject { transaction_id },
        })
        .await;

    assert_eq!(harness.ledger.balance(1).await.unwrap(), 0);
    let resolved = harness.db.transaction_repo.get(transaction_id).await.unwrap();
    assert_eq!(resolved.status, TransactionStatus::Rejected);
}

/// Decisions from anyone but the configured admin are ignored
#[tokio::test]
async fn test_non_admin_decision_is_ignored() {
    let harness = TestHarness::new().await;
    create_ready_user(&harness.db, 1, "Alice", Gender::Female).await;

    let transaction = harness
        .ledger
        .open_transaction(1, 100, "file-xyz")
        .await
        .unwrap();

    harness
        .gateway
        .handle_event(InboundEvent::AdminDecision {
            admin_id: 12345,
            decision: AdminDecision::Approve {
                transaction_id: transaction.id,
                amount: None,
            },
        })
        .await;

    assert_eq!(harness.ledger.balance(1).await.unwrap(), 0);
    let stored = harness.db.transaction_repo.get(transaction.id).await.unwrap();
    assert_eq!(stored.status, TransactionStatus::Pending);
}

/// Suspended users only ever receive the suspension notice
#[tokio::test]
async fn test_suspension_gate_blocks_actions() {
    let harness = TestHarness::new().await;
    create_ready_user(&harness.db, 1, "Alice", Gender::Female).await;

    let future = chrono::Utc::now().naive_utc() + chrono::Duration::hours(2);
    harness
        .db
        .user_repo
        .set_suspension(1, Some(future))
        .await
        .unwrap();

    harness
        .gateway
        .handle_event(InboundEvent::Menu {
            user: user_ref(1, "Alice"),
            action: MenuAction::Search,
        })
        .await;

    // The search never ran
    let user = harness.db.user_repo.get(1).await.unwrap();
    assert_eq!(user.status, UserStatus::Idle);

    let texts = harness.transport.texts_to(1);
    assert_eq!(texts.len(), 1);
    assert!(texts[0].contains("suspended"));
}

/// A full search-chat-end cycle through events keeps both users informed
#[tokio::test]
async fn test_search_and_end_chat_through_events() {
    let harness = TestHarness::new().await;
    create_ready_user(&harness.db, 1, "Alice", Gender::Female).await;
    create_ready_user(&harness.db, 2, "Bob", Gender::Male).await;

    harness
        .gateway
        .handle_event(InboundEvent::Menu {
            user: user_ref(1, "Alice"),
            action: MenuAction::Search,
        })
        .await;
    harness
        .gateway
        .handle_event(InboundEvent::Menu {
            user: user_ref(2, "Bob"),
            action: MenuAction::Search,
        })
        .await;

    assert_pairing_invariant(&harness.db).await;
    assert_eq!(
        harness.db.user_repo.get(1).await.unwrap().status,
        UserStatus::Chatting
    );

    // Both sides were told a partner was found
    assert!(harness
        .transport
        .texts_to(1)
        .iter()
        .any(|t| t.contains("Partner found")));
    assert!(harness
        .transport
        .texts_to(2)
        .iter()
        .any(|t| t.contains("Partner found")));

    // A text while chatting is relayed to the partner
    harness
        .gateway
        .handle_event(InboundEvent::Text {
            user: user_ref(1, "Alice"),
            message: MessageRef(200),
            text: "hi!".to_string(),
        })
        .await;
    assert_eq!(harness.transport.copies_to(2), vec![200]);

    harness
        .gateway
        .handle_event(InboundEvent::Menu {
            user: user_ref(2, "Bob"),
            action: MenuAction::EndChat,
        })
        .await;

    let a = harness.db.user_repo.get(1).await.unwrap();
    let b = harness.db.user_repo.get(2).await.unwrap();
    assert_eq!(a.status, UserStatus::Idle);
    assert_eq!(b.status, UserStatus::Idle);
    assert!(harness
        .transport
        .texts_to(1)
        .iter()
        .any(|t| t.contains("ended the conversation")));
}

/// Plain text outside a chat gets the generic fallback
#[tokio::test]
async fn test_idle_text_gets_fallback_reply() {
    let harness = TestHarness::new().await;
    create_ready_user(&harness.db, 1, "Alice", Gender::Female).await;

    harness
        .gateway
        .handle_event(InboundEvent::Text {
            user: user_ref(1, "Alice"),
            message: MessageRef(300),
            text: "hello?".to_string(),
        })
        .await;

    let texts = harness.transport.texts_to(1);
    assert_eq!(texts.len(), 1);
    assert!(texts[0].contains("menu buttons"));
}

/// The leaderboard lists users by experience
#[tokio::test]
async fn test_leaderboard_orders_by_experience() {
    let harness = TestHarness::new().await;
    create_ready_user(&harness.db, 1, "Alice", Gender::Female).await;
    create_ready_user(&harness.db, 2, "Bob", Gender::Male).await;
    harness.db.user_repo.add_xp(2, 5).await.unwrap();

    harness
        .gateway
        .handle_event(InboundEvent::Menu {
            user: user_ref(1, "Alice"),
            action: MenuAction::Leaderboard,
        })
        .await;

    let texts = harness.transport.texts_to(1);
    assert_eq!(texts.len(), 1);
    let bob_pos = texts[0].find("Bob").unwrap();
    let alice_pos = texts[0].find("Alice").unwrap();
    assert!(bob_pos < alice_pos, "Higher-xp user should be listed first");
}
