// Purchase decision log

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{DeviceInfo, GeoInfo, TransactionContext};
use crate::risk::Decision;

/// One evaluated transaction and its MFA outcome
#[derive(Debug, Clone, Serialize)]
pub struct PurchaseRecord {
    pub purchase_id: String,
    pub merchant_id: String,
    pub amount: f64,
    pub currency: String,
    pub geo: GeoInfo,
    pub device: DeviceInfo,
    pub email: String,
    pub requested_at: DateTime<Utc>,
    pub mfa_required: bool,
    /// Decision reason recorded at evaluation time
    pub reason: String,
    /// Unset until the challenge reaches a verified or denied state
    pub mfa_successful: Option<bool>,
    pub approved_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait PurchaseStorage: Send + Sync {
    async fn insert(&self, record: PurchaseRecord) -> Result<(), AppError>;

    async fn get(&self, purchase_id: &str) -> Option<PurchaseRecord>;

    /// Fill in the MFA outcome; approval time is set only on success
    async fn mark_outcome(
        &self,
        purchase_id: &str,
        successful: bool,
        at: DateTime<Utc>,
    ) -> Result<(), AppError>;
}

/// In-memory purchase storage
pub struct MemoryPurchaseStorage {
    records: RwLock<HashMap<String, PurchaseRecord>>,
}

impl MemoryPurchaseStorage {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryPurchaseStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PurchaseStorage for MemoryPurchaseStorage {
    async fn insert(&self, record: PurchaseRecord) -> Result<(), AppError> {
        let mut records = self.records.write().await;
        records.insert(record.purchase_id.clone(), record);
        Ok(())
    }

    async fn get(&self, purchase_id: &str) -> Option<PurchaseRecord> {
        let records = self.records.read().await;
        records.get(purchase_id).cloned()
    }

    async fn mark_outcome(
        &self,
        purchase_id: &str,
        successful: bool,
        at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(purchase_id)
            .ok_or_else(|| AppError::Internal("purchase record not found".to_string()))?;

        record.mfa_successful = Some(successful);
        if successful {
            record.approved_at = Some(at);
        }
        Ok(())
    }
}

/// Records every evaluated transaction. Low-risk transactions are
/// approved at decision time; challenged ones get their outcome when
/// verification finishes.
pub struct PurchaseLog {
    storage: Arc<dyn PurchaseStorage>,
}

impl PurchaseLog {
    pub fn new(storage: Arc<dyn PurchaseStorage>) -> Self {
        Self { storage }
    }

    pub async fn record_decision(
        &self,
        context: &TransactionContext,
        merchant_id: &str,
        decision: &Decision,
    ) -> Result<PurchaseRecord, AppError> {
        let now = Utc::now();
        let record = PurchaseRecord {
            purchase_id: Uuid::new_v4().to_string(),
            merchant_id: merchant_id.to_string(),
            amount: context.amount,
            currency: context.currency.clone(),
            geo: context.geo.clone(),
            device: context.device.clone(),
            email: context.email.clone(),
            requested_at: now,
            mfa_required: decision.require_mfa,
            reason: decision.reason.as_str().to_string(),
            mfa_successful: if decision.require_mfa { None } else { Some(true) },
            approved_at: if decision.require_mfa { None } else { Some(now) },
        };

        debug!(
            "Recorded purchase {} for merchant {} (mfa_required={})",
            record.purchase_id, merchant_id, record.mfa_required
        );
        self.storage.insert(record.clone()).await?;
        Ok(record)
    }

    pub async fn record_outcome(&self, purchase_id: &str, successful: bool) -> Result<(), AppError> {
        self.storage
            .mark_outcome(purchase_id, successful, Utc::now())
            .await
    }

    pub async fn get(&self, purchase_id: &str) -> Option<PurchaseRecord> {
        self.storage.get(purchase_id).await
    }
}
