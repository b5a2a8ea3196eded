// Merchant credential directory

use async_trait::async_trait;
use std::collections::HashMap;
use serde::Deserialize;
use tracing::warn;

use crate::error::AppError;

/// Merchant credentials and home profile. Read-only reference data
/// used to authenticate callers and anchor the foreign-transaction rule.
#[derive(Debug, Clone, Deserialize)]
pub struct MerchantCredential {
    pub merchant_id: String,
    pub api_key: String,
    /// Settlement currency of the merchant
    pub currency: String,
    /// Country code (ISO 3166-1 alpha-2)
    pub home_country: String,
    pub contact_email: String,
}

/// Read interface over merchant reference data
#[async_trait]
pub trait MerchantDirectory: Send + Sync {
    /// Validate merchant id and API key; returns the credential on match
    async fn authenticate(
        &self,
        merchant_id: &str,
        api_key: &str,
    ) -> Result<MerchantCredential, AppError>;
}

/// In-memory merchant directory seeded from configuration
pub struct MemoryMerchantDirectory {
    merchants: HashMap<String, MerchantCredential>,
}

impl MemoryMerchantDirectory {
    pub fn new(seed: Vec<MerchantCredential>) -> Self {
        let merchants = seed
            .into_iter()
            .map(|m| (m.merchant_id.clone(), m))
            .collect();
        Self { merchants }
    }
}

#[async_trait]
impl MerchantDirectory for MemoryMerchantDirectory {
    async fn authenticate(
        &self,
        merchant_id: &str,
        api_key: &str,
    ) -> Result<MerchantCredential, AppError> {
        match self.merchants.get(merchant_id) {
            Some(merchant) if merchant.api_key == api_key => Ok(merchant.clone()),
            Some(_) => {
                warn!("API key mismatch for merchant {}", merchant_id);
                Err(AppError::InvalidMerchant)
            }
            None => {
                warn!("Unknown merchant {}", merchant_id);
                Err(AppError::InvalidMerchant)
            }
        }
    }
}
