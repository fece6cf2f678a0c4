pub mod ledger;
pub mod matchmaker;
pub mod moderation;
pub mod relay;
pub mod strikes;

pub use ledger::LedgerService;
pub use matchmaker::{Matchmaker, SearchOutcome};
pub use moderation::ModerationFilter;
pub use relay::{PartnerProfile, RelayOutcome, SessionRelay};
pub use strikes::{StrikeOutcome, StrikeService};
