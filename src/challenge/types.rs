// Challenge types and lifecycle state machine

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Method, TransactionContext};

/// Challenge lifecycle configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ChallengeConfig {
    /// Time-to-live for a challenge, in minutes
    #[serde(default = "default_ttl_minutes")]
    pub ttl_minutes: i64,
    /// Verification attempts before the challenge is denied
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Cadence of the background expiry sweep
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
    /// How long terminal challenges stay queryable before removal
    #[serde(default = "default_retention_minutes")]
    pub retention_minutes: i64,
}

fn default_ttl_minutes() -> i64 {
    15
}

fn default_max_attempts() -> u32 {
    3
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_retention_minutes() -> i64 {
    60
}

impl Default for ChallengeConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: default_ttl_minutes(),
            max_attempts: default_max_attempts(),
            sweep_interval_seconds: default_sweep_interval(),
            retention_minutes: default_retention_minutes(),
        }
    }
}

/// Challenge lifecycle status. Transitions only move forward:
/// pending -> method_selected -> sent -> verified | denied, with
/// expired and cancelled reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeStatus {
    Pending,
    MethodSelected,
    Sent,
    Verified,
    Denied,
    Expired,
    Cancelled,
}

impl ChallengeStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ChallengeStatus::Verified
                | ChallengeStatus::Denied
                | ChallengeStatus::Expired
                | ChallengeStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeStatus::Pending => "pending",
            ChallengeStatus::MethodSelected => "method_selected",
            ChallengeStatus::Sent => "sent",
            ChallengeStatus::Verified => "verified",
            ChallengeStatus::Denied => "denied",
            ChallengeStatus::Expired => "expired",
            ChallengeStatus::Cancelled => "cancelled",
        }
    }
}

/// One in-progress MFA attempt tied to one transaction
#[derive(Debug, Clone)]
pub struct Challenge {
    pub challenge_id: String,
    pub transaction_id: String,
    pub context: TransactionContext,
    pub status: ChallengeStatus,
    /// Decision reason that triggered this challenge
    pub reason: String,
    pub candidate_methods: Vec<Method>,
    pub method: Option<Method>,
    /// Device selected for provider-backed methods
    pub device: Option<String>,
    /// One-time code awaiting comparison (sms only)
    pub expected_code: Option<String>,
    /// Provider-side transaction id from the last dispatch
    pub correlation_id: Option<String>,
    pub attempts: u32,
    pub max_attempts: u32,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
    /// Purchase record awaiting this challenge's outcome
    pub purchase_id: Option<String>,
}

impl Challenge {
    pub fn new(
        transaction_id: String,
        context: TransactionContext,
        candidate_methods: Vec<Method>,
        reason: String,
        purchase_id: Option<String>,
        config: &ChallengeConfig,
    ) -> Self {
        let now = Utc::now();
        Self {
            challenge_id: Uuid::new_v4().to_string(),
            transaction_id,
            context,
            status: ChallengeStatus::Pending,
            reason,
            candidate_methods,
            method: None,
            device: None,
            expected_code: None,
            correlation_id: None,
            attempts: 0,
            max_attempts: config.max_attempts,
            created_at: now,
            expires_at: now + Duration::minutes(config.ttl_minutes),
            verified_at: None,
            purchase_id,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn attempts_remaining(&self) -> u32 {
        self.max_attempts.saturating_sub(self.attempts)
    }

    pub fn expires_in_seconds(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds().max(0)
    }

    /// Move a past-TTL challenge to expired. Returns true when the
    /// transition happened on this call.
    pub fn expire_if_due(&mut self, now: DateTime<Utc>) -> bool {
        if !self.status.is_terminal() && self.is_expired(now) {
            self.status = ChallengeStatus::Expired;
            return true;
        }
        false
    }

    /// Select the verification method. Valid from pending or
    /// method_selected; in sent it only accepts the already-chosen
    /// method (the resend path).
    pub fn select_method(
        &mut self,
        method: Method,
        device: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        self.check_usable(now)?;

        match self.status {
            ChallengeStatus::Pending | ChallengeStatus::MethodSelected => {
                if !self.candidate_methods.contains(&method) {
                    return Err(AppError::InvalidSelection(format!(
                        "method {} not available for this challenge",
                        method
                    )));
                }
                self.method = Some(method);
                self.device = device;
                self.status = ChallengeStatus::MethodSelected;
                Ok(())
            }
            ChallengeStatus::Sent => {
                if self.method == Some(method) {
                    // Resend keeps the selection as-is
                    Ok(())
                } else {
                    Err(AppError::InvalidSelection(
                        "method already locked in for this challenge".to_string(),
                    ))
                }
            }
            _ => Err(self.terminal_error()),
        }
    }

    /// Record a completed dispatch. Valid from method_selected, and
    /// from sent for resends.
    pub fn mark_sent(
        &mut self,
        correlation_id: String,
        expected_code: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        self.check_usable(now)?;

        match self.status {
            ChallengeStatus::MethodSelected | ChallengeStatus::Sent => {
                self.correlation_id = Some(correlation_id);
                self.expected_code = expected_code;
                self.status = ChallengeStatus::Sent;
                Ok(())
            }
            ChallengeStatus::Pending => Err(AppError::Validation(
                "no verification method selected".to_string(),
            )),
            _ => Err(self.terminal_error()),
        }
    }

    /// Consume one verification attempt. Success finalizes the
    /// challenge as verified; spending the last attempt on a failure
    /// finalizes it as denied.
    pub fn record_attempt(&mut self, success: bool, now: DateTime<Utc>) -> Result<(), AppError> {
        self.check_usable(now)?;

        match self.status {
            ChallengeStatus::Sent => {
                self.attempts += 1;
                if success {
                    self.status = ChallengeStatus::Verified;
                    self.verified_at = Some(now);
                } else if self.attempts >= self.max_attempts {
                    self.status = ChallengeStatus::Denied;
                }
                Ok(())
            }
            ChallengeStatus::Pending | ChallengeStatus::MethodSelected => Err(
                AppError::Validation("challenge is not awaiting verification".to_string()),
            ),
            _ => Err(self.terminal_error()),
        }
    }

    /// User-initiated cancel; terminal from any non-terminal state.
    /// Cancelling twice is a no-op.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), AppError> {
        self.check_usable(now)?;

        match self.status {
            ChallengeStatus::Cancelled => Ok(()),
            s if s.is_terminal() => Err(self.terminal_error()),
            _ => {
                self.status = ChallengeStatus::Cancelled;
                Ok(())
            }
        }
    }

    /// Lazy expiry applied at the head of every operation
    fn check_usable(&mut self, now: DateTime<Utc>) -> Result<(), AppError> {
        if self.status == ChallengeStatus::Expired || self.expire_if_due(now) {
            return Err(AppError::ChallengeExpired);
        }
        Ok(())
    }

    fn terminal_error(&self) -> AppError {
        match self.status {
            ChallengeStatus::Verified => {
                AppError::Validation("challenge already verified".to_string())
            }
            ChallengeStatus::Denied => AppError::AttemptsExhausted,
            ChallengeStatus::Expired => AppError::ChallengeExpired,
            ChallengeStatus::Cancelled => {
                AppError::Validation("challenge was cancelled".to_string())
            }
            _ => AppError::Internal("terminal_error on non-terminal challenge".to_string()),
        }
    }
}
