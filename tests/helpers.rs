use anonchat_backend::config::{AppConfig, DatabaseConfig};
use anonchat_backend::database::{create_pool, run_migrations};
use anonchat_backend::gateway::Gateway;
use anonchat_backend::models::*;
use anonchat_backend::repositories::*;
use anonchat_backend::services::*;
use anonchat_backend::transport::{
    ChatTransport, KeyboardHint, MessageRef, PaymentReview, TransportError,
};
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Test database over in-memory SQLite
pub struct TestDatabase {
    pub pool: SqlitePool,
    pub user_repo: Arc<UserRepository>,
    pub transaction_repo: Arc<TransactionRepository>,
}

impl TestDatabase {
    /// Create a new in-memory test database with the schema applied
    ///
    /// A single connection keeps every query on the same in-memory database.
    pub async fn new() -> Self {
        let config = DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            acquire_timeout_secs: 10,
        };

        let pool = create_pool(&config)
            .await
            .expect("Failed to create test database pool");

        run_migrations(&pool, None)
            .await
            .expect("Failed to run migrations");

        Self {
            pool: pool.clone(),
            user_repo: Arc::new(UserRepository::new(pool.clone())),
            transaction_repo: Arc::new(TransactionRepository::new(pool)),
        }
    }
}

/// Transport double recording every outbound call, with copy fault injection
#[derive(Default)]
pub struct MockTransport {
    pub sent: Mutex<Vec<(i64, String, KeyboardHint)>>,
    pub copies: Mutex<Vec<(i64, i64)>>,
    pub deleted: Mutex<Vec<i64>>,
    pub reviews: Mutex<Vec<PaymentReview>>,
    fail_copy: AtomicBool,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every subsequent copy_message fail (unreachable partner)
    pub fn set_fail_copy(&self, fail: bool) {
        self.fail_copy.store(fail, Ordering::SeqCst);
    }

    /// Texts delivered to one user, in order
    pub fn texts_to(&self, user_id: i64) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(to, _, _)| *to == user_id)
            .map(|(_, text, _)| text.clone())
            .collect()
    }

    pub fn copies_to(&self, user_id: i64) -> Vec<i64> {
        self.copies
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, to)| *to == user_id)
            .map(|(message, _)| *message)
            .collect()
    }
}

#[async_trait]
impl ChatTransport for MockTransport {
    async fn send_text(
        &self,
        to: i64,
        text: &str,
        keyboard: KeyboardHint,
    ) -> Result<(), TransportError> {
        self.sent
            .lock()
            .unwrap()
            .push((to, text.to_string(), keyboard));
        Ok(())
    }

    async fn copy_message(&self, message: &MessageRef, to: i64) -> Result<(), TransportError> {
        if self.fail_copy.load(Ordering::SeqCst) {
            return Err(TransportError::Unreachable(format!("user {}", to)));
        }
        self.copies.lock().unwrap().push((message.0, to));
        Ok(())
    }

    async fn delete_message(&self, message: &MessageRef) -> Result<(), TransportError> {
        self.deleted.lock().unwrap().push(message.0);
        Ok(())
    }

    async fn send_payment_review(
        &self,
        _admin_id: i64,
        review: &PaymentReview,
    ) -> Result<(), TransportError> {
        self.reviews.lock().unwrap().push(review.clone());
        Ok(())
    }
}

/// Configuration used by the tests: a small denylist and a known admin id
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.moderation.denylist = vec!["badword".to_string()];
    config.admin_id = 999;
    config
}

/// Fully wired service stack over a test database and a mock transport
pub struct TestHarness {
    pub db: TestDatabase,
    pub config: Arc<AppConfig>,
    pub transport: Arc<MockTransport>,
    pub strikes: Arc<StrikeService>,
    pub ledger: Arc<LedgerService>,
    pub matchmaker: Arc<Matchmaker>,
    pub relay: Arc<SessionRelay>,
    pub gateway: Arc<Gateway>,
}

impl TestHarness {
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: AppConfig) -> Self {
        let db = TestDatabase::new().await;
        let config = Arc::new(config);
        let transport = MockTransport::new();

        let moderation =
            Arc::new(ModerationFilter::new(&config.moderation).expect("Invalid moderation config"));
        let strikes = Arc::new(StrikeService::new(db.user_repo.clone(), &config.moderation));
        let ledger = Arc::new(LedgerService::new(
            db.user_repo.clone(),
            db.transaction_repo.clone(),
        ));
        let matchmaker = Arc::new(Matchmaker::new(db.user_repo.clone()));
        let relay = Arc::new(SessionRelay::new(
            db.user_repo.clone(),
            moderation,
            strikes.clone(),
            matchmaker.clone(),
            ledger.clone(),
            transport.clone(),
            config.reveal_cost,
        ));
        let gateway = Arc::new(Gateway::new(
            db.user_repo.clone(),
            ledger.clone(),
            strikes.clone(),
            matchmaker.clone(),
            relay.clone(),
            transport.clone(),
            config.clone(),
        ));

        Self {
            db,
            config,
            transport,
            strikes,
            ledger,
            matchmaker,
            relay,
            gateway,
        }
    }
}

/// Create a user with a complete profile in the idle state
pub async fn create_ready_user(db: &TestDatabase, id: i64, name: &str, gender: Gender) -> User {
    db.user_repo
        .create_if_absent(id, Some(&format!("user{}", id)), name)
        .await
        .expect("Failed to create user");
    db.user_repo
        .set_phone(id, &format!("+1000{}", id))
        .await
        .expect("Failed to set phone");
    db.user_repo
        .set_gender(id, gender)
        .await
        .expect("Failed to set gender");
    db.user_repo
        .set_status(id, UserStatus::Idle, None)
        .await
        .expect("Failed to set status");
    db.user_repo.get(id).await.expect("Failed to fetch user")
}

/// Pair two ready users through the matchmaker
pub async fn pair_users(harness: &TestHarness, a: i64, b: i64) {
    match harness.matchmaker.start_search(a).await.unwrap() {
        SearchOutcome::Searching => {}
        SearchOutcome::Matched { partner } => {
            panic!("Unexpected immediate match with user {}", partner.id)
        }
    }
    match harness.matchmaker.start_search(b).await.unwrap() {
        SearchOutcome::Matched { partner } => assert_eq!(partner.id, a),
        SearchOutcome::Searching => panic!("Expected a match between {} and {}", a, b),
    }
}

/// Check the core pairing invariant over the whole directory:
/// chatting <=> partner set, and every pairing is symmetric
pub async fn assert_pairing_invariant(db: &TestDatabase) {
    let users = db.user_repo.top_by_xp(1000).await.expect("Failed to list users");

    for user in &users {
        match user.status {
            UserStatus::Chatting => {
                let partner_id = user
                    .partner_id
                    .unwrap_or_else(|| panic!("User {} chatting without a partner", user.id));
                let partner = users
                    .iter()
                    .find(|u| u.id == partner_id)
                    .unwrap_or_else(|| panic!("Partner {} of user {} missing", partner_id, user.id));
                assert_eq!(
                    partner.status,
                    UserStatus::Chatting,
                    "Partner {} of chatting user {} is not chatting",
                    partner.id,
                    user.id
                );
                assert_eq!(
                    partner.partner_id,
                    Some(user.id),
                    "Pairing between {} and {} is not symmetric",
                    user.id,
                    partner.id
                );
            }
            _ => assert_eq!(
                user.partner_id, None,
                "Non-chatting user {} holds a partner reference",
                user.id
            ),
        }
    }
}
