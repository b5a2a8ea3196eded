// Verification adjudication

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

use crate::challenge::{Challenge, ChallengeStatus, ChallengeStore};
use crate::directory::{provider_username, UserDirectory};
use crate::dispatch::provider::{MfaProvider, ProviderConfig};
use crate::error::AppError;
use crate::models::Method;
use crate::notify::{Notifier, TransactionSummary};
use crate::purchase::PurchaseLog;

/// Outcome of one verification attempt
#[derive(Debug, Clone, Serialize)]
pub struct VerificationResult {
    pub challenge_id: String,
    pub allow: bool,
    pub reason: String,
    pub attempts_remaining: u32,
    pub verified_at: Option<DateTime<Utc>>,
    pub status: ChallengeStatus,
}

/// Normalizes every verification channel into one allow or deny
/// answer, consuming an attempt on the challenge. Provider verdicts
/// go through the mapping table in verdict.rs; anything the table
/// does not recognize counts as a denial.
pub struct Adjudicator {
    store: Arc<dyn ChallengeStore>,
    provider: Arc<dyn MfaProvider>,
    users: Arc<dyn UserDirectory>,
    purchases: Arc<PurchaseLog>,
    notifier: Arc<Notifier>,
    config: ProviderConfig,
}

impl Adjudicator {
    pub fn new(
        store: Arc<dyn ChallengeStore>,
        provider: Arc<dyn MfaProvider>,
        users: Arc<dyn UserDirectory>,
        purchases: Arc<PurchaseLog>,
        notifier: Arc<Notifier>,
        config: ProviderConfig,
    ) -> Self {
        Self {
            store,
            provider,
            users,
            purchases,
            notifier,
            config,
        }
    }

    /// Adjudicate the proof for a sent challenge. A provider failure
    /// propagates without consuming an attempt.
    pub async fn verify(
        &self,
        challenge_id: &str,
        proof: &str,
    ) -> Result<VerificationResult, AppError> {
        let challenge = self.store.get(challenge_id).await?;

        match challenge.status {
            ChallengeStatus::Sent => {}
            ChallengeStatus::Expired => return Err(AppError::ChallengeExpired),
            ChallengeStatus::Denied => return Err(AppError::AttemptsExhausted),
            ChallengeStatus::Verified => {
                return Err(AppError::Validation(
                    "challenge already verified".to_string(),
                ))
            }
            ChallengeStatus::Cancelled => {
                return Err(AppError::Validation("challenge was cancelled".to_string()))
            }
            ChallengeStatus::Pending | ChallengeStatus::MethodSelected => {
                return Err(AppError::Validation(
                    "challenge is not awaiting verification".to_string(),
                ))
            }
        }

        let method = challenge
            .method
            .ok_or_else(|| AppError::Internal("sent challenge has no method".to_string()))?;

        let success = match method {
            Method::Sms => {
                let expected = challenge.expected_code.as_deref().ok_or_else(|| {
                    AppError::Internal("sms challenge has no expected code".to_string())
                })?;
                proof.trim() == expected
            }
            Method::Passcode => {
                let user = self.users.lookup(&challenge.context.email).await;
                let username = provider_username(
                    &challenge.context.email,
                    user.as_ref(),
                    self.config.derive_username_from_email,
                );
                self.provider
                    .verify_passcode(&username, proof.trim())
                    .await?
                    .allowed()
            }
            Method::Push | Method::Phone => {
                let correlation_id = challenge.correlation_id.as_deref().ok_or_else(|| {
                    AppError::Internal("sent challenge has no correlation id".to_string())
                })?;
                self.provider.auth_status(correlation_id).await?.allowed()
            }
        };

        let updated = self.store.record_attempt(challenge_id, success).await?;

        if success {
            self.finalize_success(&updated).await;
            return Ok(VerificationResult {
                challenge_id: updated.challenge_id.clone(),
                allow: true,
                reason: "verified".to_string(),
                attempts_remaining: updated.attempts_remaining(),
                verified_at: updated.verified_at,
                status: updated.status,
            });
        }

        let reason = if updated.status == ChallengeStatus::Denied {
            if let Some(purchase_id) = &updated.purchase_id {
                if let Err(err) = self.purchases.record_outcome(purchase_id, false).await {
                    warn!("Failed to record denied purchase outcome: {}", err);
                }
            }
            "attempts_exhausted"
        } else {
            match method {
                Method::Sms => "invalid_code",
                _ => "denied_by_provider",
            }
        };

        Ok(VerificationResult {
            challenge_id: updated.challenge_id.clone(),
            allow: false,
            reason: reason.to_string(),
            attempts_remaining: updated.attempts_remaining(),
            verified_at: None,
            status: updated.status,
        })
    }

    /// Outcome bookkeeping and notifications never fail a verify
    async fn finalize_success(&self, challenge: &Challenge) {
        let mut merchant_id = "unknown".to_string();
        if let Some(purchase_id) = &challenge.purchase_id {
            if let Some(record) = self.purchases.get(purchase_id).await {
                merchant_id = record.merchant_id;
            }
            if let Err(err) = self.purchases.record_outcome(purchase_id, true).await {
                warn!("Failed to record purchase outcome: {}", err);
            }
        }

        let summary = TransactionSummary {
            amount: challenge.context.amount,
            currency: challenge.context.currency.clone(),
            merchant_id,
            challenge_id: challenge.challenge_id.clone(),
        };
        let verified_at = challenge.verified_at.unwrap_or_else(Utc::now);
        if let Err(err) = self
            .notifier
            .send_transaction_success(&challenge.context.email, &summary, verified_at)
            .await
        {
            warn!("Failed to send success notification: {}", err);
        }
    }
}
