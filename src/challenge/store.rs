// Challenge storage with per-challenge locking

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use super::types::{Challenge, ChallengeConfig, ChallengeStatus};
use crate::error::AppError;
use crate::models::Method;

/// Trait for challenge storage backends. All state transitions are
/// serialized per challenge; a shared persistent backend can replace
/// the in-memory one without touching callers.
#[async_trait]
pub trait ChallengeStore: Send + Sync {
    /// Insert a new pending challenge. Fails with
    /// DuplicateActiveChallenge when the transaction already has a
    /// non-terminal one.
    async fn create(&self, challenge: Challenge) -> Result<Challenge, AppError>;

    /// Fetch a challenge snapshot by id, applying lazy expiry
    async fn get(&self, challenge_id: &str) -> Result<Challenge, AppError>;

    /// Resolve a user's most recent active challenge, matching the
    /// transaction email or its local part
    async fn find_active_by_user(&self, username: &str) -> Option<Challenge>;

    async fn select_method(
        &self,
        challenge_id: &str,
        method: Method,
        device: Option<String>,
    ) -> Result<Challenge, AppError>;

    async fn mark_sent(
        &self,
        challenge_id: &str,
        correlation_id: String,
        expected_code: Option<String>,
    ) -> Result<Challenge, AppError>;

    /// Consume one verification attempt and finalize on success or
    /// exhaustion
    async fn record_attempt(&self, challenge_id: &str, success: bool)
        -> Result<Challenge, AppError>;

    async fn cancel(&self, challenge_id: &str) -> Result<Challenge, AppError>;

    /// Force expiry when past TTL; no-op otherwise
    async fn expire(&self, challenge_id: &str) -> Result<(), AppError>;

    /// Number of non-terminal challenges
    async fn active_count(&self) -> usize;

    /// Expire every past-TTL challenge, release their transaction
    /// slots, and drop terminal records past retention. Returns how
    /// many challenges were newly expired.
    async fn sweep_expired(&self, now: DateTime<Utc>) -> usize;
}

/// Arena state: challenge records plus the transaction index that
/// backs the one-active-challenge-per-transaction invariant
struct Arena {
    challenges: HashMap<String, Arc<Mutex<Challenge>>>,
    txn_index: HashMap<String, String>,
}

/// In-memory challenge store. The outer lock guards only map
/// structure; every state transition takes the per-challenge mutex,
/// so requests for different challenges never contend.
pub struct MemoryChallengeStore {
    arena: RwLock<Arena>,
    config: ChallengeConfig,
}

impl MemoryChallengeStore {
    pub fn new(config: ChallengeConfig) -> Self {
        Self {
            arena: RwLock::new(Arena {
                challenges: HashMap::new(),
                txn_index: HashMap::new(),
            }),
            config,
        }
    }

    /// Clone out the per-challenge handle so the outer lock is held
    /// only for the lookup
    async fn entry(&self, challenge_id: &str) -> Result<Arc<Mutex<Challenge>>, AppError> {
        let arena = self.arena.read().await;
        arena
            .challenges
            .get(challenge_id)
            .cloned()
            .ok_or(AppError::ChallengeNotFound)
    }
}

#[async_trait]
impl ChallengeStore for MemoryChallengeStore {
    async fn create(&self, challenge: Challenge) -> Result<Challenge, AppError> {
        let mut arena = self.arena.write().await;

        // Lock order is always arena before challenge, so inspecting
        // the incumbent here cannot deadlock against a transition.
        if let Some(existing_id) = arena.txn_index.get(&challenge.transaction_id).cloned() {
            if let Some(existing) = arena.challenges.get(&existing_id).cloned() {
                let mut guard = existing.lock().await;
                guard.expire_if_due(Utc::now());
                if !guard.status.is_terminal() {
                    return Err(AppError::DuplicateActiveChallenge);
                }
            }
        }

        arena.txn_index.insert(
            challenge.transaction_id.clone(),
            challenge.challenge_id.clone(),
        );
        arena.challenges.insert(
            challenge.challenge_id.clone(),
            Arc::new(Mutex::new(challenge.clone())),
        );

        debug!(
            "Created challenge {} for transaction {} (reason: {})",
            challenge.challenge_id, challenge.transaction_id, challenge.reason
        );
        Ok(challenge)
    }

    async fn get(&self, challenge_id: &str) -> Result<Challenge, AppError> {
        let entry = self.entry(challenge_id).await?;
        let mut challenge = entry.lock().await;
        challenge.expire_if_due(Utc::now());
        Ok(challenge.clone())
    }

    async fn find_active_by_user(&self, username: &str) -> Option<Challenge> {
        let snapshot: Vec<Arc<Mutex<Challenge>>> = {
            let arena = self.arena.read().await;
            arena.challenges.values().cloned().collect()
        };

        let mut found: Option<Challenge> = None;
        for entry in snapshot {
            let mut challenge = entry.lock().await;
            challenge.expire_if_due(Utc::now());
            if challenge.status.is_terminal() {
                continue;
            }
            let email = &challenge.context.email;
            let local = email.split('@').next().unwrap_or(email);
            if email != username && local != username {
                continue;
            }
            if found
                .as_ref()
                .map_or(true, |f| challenge.created_at > f.created_at)
            {
                found = Some(challenge.clone());
            }
        }
        found
    }

    async fn select_method(
        &self,
        challenge_id: &str,
        method: Method,
        device: Option<String>,
    ) -> Result<Challenge, AppError> {
        let entry = self.entry(challenge_id).await?;
        let mut challenge = entry.lock().await;
        challenge.select_method(method, device, Utc::now())?;
        debug!("Challenge {} selected method {}", challenge_id, method);
        Ok(challenge.clone())
    }

    async fn mark_sent(
        &self,
        challenge_id: &str,
        correlation_id: String,
        expected_code: Option<String>,
    ) -> Result<Challenge, AppError> {
        let entry = self.entry(challenge_id).await?;
        let mut challenge = entry.lock().await;
        challenge.mark_sent(correlation_id, expected_code, Utc::now())?;
        debug!("Challenge {} marked sent", challenge_id);
        Ok(challenge.clone())
    }

    async fn record_attempt(
        &self,
        challenge_id: &str,
        success: bool,
    ) -> Result<Challenge, AppError> {
        let entry = self.entry(challenge_id).await?;
        let mut challenge = entry.lock().await;
        challenge.record_attempt(success, Utc::now())?;

        match challenge.status {
            ChallengeStatus::Verified => {
                info!("Challenge {} verified", challenge_id);
            }
            ChallengeStatus::Denied => {
                info!(
                    "Challenge {} denied after {} attempts",
                    challenge_id, challenge.attempts
                );
            }
            _ => {
                debug!(
                    "Challenge {} failed attempt, {} remaining",
                    challenge_id,
                    challenge.attempts_remaining()
                );
            }
        }
        Ok(challenge.clone())
    }

    async fn cancel(&self, challenge_id: &str) -> Result<Challenge, AppError> {
        let entry = self.entry(challenge_id).await?;
        let mut challenge = entry.lock().await;
        challenge.cancel(Utc::now())?;
        info!("Challenge {} cancelled", challenge_id);
        Ok(challenge.clone())
    }

    async fn expire(&self, challenge_id: &str) -> Result<(), AppError> {
        let entry = self.entry(challenge_id).await?;
        let mut challenge = entry.lock().await;
        if challenge.expire_if_due(Utc::now()) {
            debug!("Challenge {} expired", challenge_id);
        }
        Ok(())
    }

    async fn active_count(&self) -> usize {
        let arena = self.arena.read().await;
        let mut count = 0;
        for entry in arena.challenges.values() {
            let challenge = entry.lock().await;
            if !challenge.status.is_terminal() {
                count += 1;
            }
        }
        count
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        // Snapshot handles first so each record is examined under its
        // own lock, never racing an in-flight verify
        let snapshot: Vec<(String, Arc<Mutex<Challenge>>)> = {
            let arena = self.arena.read().await;
            arena
                .challenges
                .iter()
                .map(|(id, entry)| (id.clone(), entry.clone()))
                .collect()
        };

        let retention = Duration::minutes(self.config.retention_minutes);
        let mut reaped = 0;
        let mut released: Vec<(String, String)> = Vec::new();
        let mut purged: Vec<String> = Vec::new();

        for (challenge_id, entry) in snapshot {
            let mut challenge = entry.lock().await;
            if challenge.expire_if_due(now) {
                reaped += 1;
            }
            if challenge.status.is_terminal() {
                released.push((challenge.transaction_id.clone(), challenge_id.clone()));
                if now > challenge.expires_at + retention {
                    purged.push(challenge_id);
                }
            }
        }

        if !released.is_empty() || !purged.is_empty() {
            let mut arena = self.arena.write().await;
            for (transaction_id, challenge_id) in released {
                if arena.txn_index.get(&transaction_id) == Some(&challenge_id) {
                    arena.txn_index.remove(&transaction_id);
                }
            }
            for challenge_id in purged {
                arena.challenges.remove(&challenge_id);
            }
        }

        if reaped > 0 {
            debug!("Swept {} challenges past their TTL", reaped);
        }
        reaped
    }
}
