// Verification method dispatch

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use super::provider::{MfaProvider, ProviderConfig};
use super::sms::{generate_code, SmsSender};
use crate::challenge::{ChallengeStatus, ChallengeStore};
use crate::directory::{provider_username, UserDirectory};
use crate::error::AppError;
use crate::models::Method;

/// Outcome of a dispatch, echoed back to the caller
#[derive(Debug, Clone, Serialize)]
pub struct SendResult {
    pub challenge_id: String,
    pub correlation_id: String,
    pub status: ChallengeStatus,
    pub message: String,
}

/// Routes a selected verification method to its delivery channel and
/// records the dispatch on the challenge. A provider or gateway
/// failure propagates without moving the challenge forward, so the
/// caller can retry the send.
pub struct MethodDispatcher {
    store: Arc<dyn ChallengeStore>,
    provider: Arc<dyn MfaProvider>,
    sms: Arc<dyn SmsSender>,
    users: Arc<dyn UserDirectory>,
    config: ProviderConfig,
}

impl MethodDispatcher {
    pub fn new(
        store: Arc<dyn ChallengeStore>,
        provider: Arc<dyn MfaProvider>,
        sms: Arc<dyn SmsSender>,
        users: Arc<dyn UserDirectory>,
        config: ProviderConfig,
    ) -> Self {
        Self {
            store,
            provider,
            sms,
            users,
            config,
        }
    }

    /// Lock in the method and deliver the challenge. Calling again
    /// with the same method re-issues delivery for that method.
    pub async fn dispatch(
        &self,
        challenge_id: &str,
        method: Method,
        device: Option<String>,
    ) -> Result<SendResult, AppError> {
        let challenge = self
            .store
            .select_method(challenge_id, method, device)
            .await?;

        debug!(
            "Dispatching {} for challenge {} (transaction {})",
            method, challenge.challenge_id, challenge.transaction_id
        );

        let user = self.users.lookup(&challenge.context.email).await;

        let (correlation_id, expected_code, message) = match method {
            Method::Sms => {
                let phone = user.as_ref().and_then(|u| u.phone.clone()).ok_or_else(|| {
                    AppError::InvalidSelection("no phone number on file for sms".to_string())
                })?;
                let code = generate_code();
                self.sms.send_code(&phone, &code).await?;
                (
                    Uuid::new_v4().to_string(),
                    Some(code),
                    "verification code sent via sms".to_string(),
                )
            }
            Method::Push | Method::Phone => {
                // "auto" is resolved provider-side; anything else must be
                // a registered device id
                if let Some(requested) = challenge.device.as_deref() {
                    let registered = requested == "auto"
                        || user
                            .as_ref()
                            .map(|u| u.devices.iter().any(|d| d.device_id == requested))
                            .unwrap_or(false);
                    if !registered {
                        return Err(AppError::InvalidSelection(format!(
                            "device '{}' is not registered for this user",
                            requested
                        )));
                    }
                }
                let username = provider_username(
                    &challenge.context.email,
                    user.as_ref(),
                    self.config.derive_username_from_email,
                );
                let txid = self
                    .provider
                    .start_auth(&username, method, challenge.device.as_deref())
                    .await?;
                let message = match method {
                    Method::Push => "approval request sent to your device".to_string(),
                    _ => "phone call placed to your device".to_string(),
                };
                (txid, None, message)
            }
            Method::Passcode => {
                // Nothing to deliver; the user reads the code off
                // their authenticator and verifies it directly
                (
                    Uuid::new_v4().to_string(),
                    None,
                    "enter the passcode from your authenticator".to_string(),
                )
            }
        };

        let updated = self
            .store
            .mark_sent(&challenge.challenge_id, correlation_id.clone(), expected_code)
            .await?;

        info!(
            "Challenge {} dispatched via {} (correlation {})",
            updated.challenge_id, method, correlation_id
        );

        Ok(SendResult {
            challenge_id: updated.challenge_id,
            correlation_id,
            status: updated.status,
            message,
        })
    }
}
