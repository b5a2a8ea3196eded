// Challenge lifecycle: types, storage, and the expiry sweeper

pub mod store;
pub mod sweeper;
pub mod types;

pub use store::{ChallengeStore, MemoryChallengeStore};
pub use sweeper::start_sweeper;
pub use types::{Challenge, ChallengeConfig, ChallengeStatus};
