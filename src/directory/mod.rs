// Read-only reference data: merchants and user verification profiles

pub mod merchant;
pub mod user;

use serde::Deserialize;

pub use merchant::{MemoryMerchantDirectory, MerchantCredential, MerchantDirectory};
pub use user::{
    provider_username, MemoryUserDirectory, ProviderDevice, UserDirectory, UserRecord,
};

/// User directory configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryConfig {
    /// Seeded user profiles
    #[serde(default)]
    pub users: Vec<UserRecord>,
    /// Hand unknown users the demo profile instead of no profile
    #[serde(default = "default_assume_profile")]
    pub assume_default_profile: bool,
}

fn default_assume_profile() -> bool {
    true
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            users: Vec::new(),
            assume_default_profile: true,
        }
    }
}
