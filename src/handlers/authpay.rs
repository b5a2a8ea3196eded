// Handlers for the /authpay endpoints

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use super::AppState;
use crate::challenge::{Challenge, ChallengeStatus};
use crate::error::AppError;
use crate::models::{
    CancelRequest, GeoInfo, InitRequest, InitResponse, Method, SendRequest, TransactionContext,
    VerifyRequest,
};
use crate::notify::TransactionSummary;
use crate::risk::evaluate;
use crate::verify::VerificationResult;

/// Parse a request body, folding JSON syntax and shape errors into
/// the normalized error envelope
fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T, AppError> {
    serde_json::from_str(body)
        .map_err(|e| AppError::Validation(format!("malformed request body: {}", e)))
}

/// Initialize a challenge for a payment. Low-risk transactions are
/// approved inline; risky ones get a pending challenge.
pub async fn init_challenge(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<InitResponse>, AppError> {
    let request: InitRequest = parse_body(&body)?;
    let defaults = &state.config.defaults;

    // Fill in default values for missing fields
    let merchant_id = request
        .merchant_id
        .unwrap_or_else(|| defaults.merchant_id.clone());
    let api_key = request.api_key.unwrap_or_else(|| defaults.api_key.clone());
    let currency = request
        .currency
        .unwrap_or_else(|| defaults.currency.clone())
        .to_uppercase();
    let email = request.email.unwrap_or_else(|| defaults.email.clone());
    let geo = request
        .geo
        .map(GeoInfo::from)
        .unwrap_or_else(|| GeoInfo::from_country(&defaults.geo_country));
    let device = request.device.unwrap_or_default();

    let amount = request
        .amount
        .ok_or_else(|| AppError::Validation("missing required field: amount".to_string()))?;
    if !amount.is_finite() || amount <= 0.0 {
        return Err(AppError::Validation(
            "amount must be a positive number".to_string(),
        ));
    }
    if !state.config.currency_supported(&currency) {
        return Err(AppError::Validation(format!(
            "unsupported currency: {}",
            currency
        )));
    }
    if !email.contains('@') {
        return Err(AppError::Validation("invalid email address".to_string()));
    }

    let merchant = state.merchants.authenticate(&merchant_id, &api_key).await?;

    let transaction_id = request
        .transaction_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let context = TransactionContext {
        transaction_id,
        amount,
        currency,
        geo,
        device,
        email,
    };

    let user = state.users.lookup(&context.email).await;
    let decision = evaluate(&context, &merchant, user.as_ref(), &state.config.risk);

    info!(
        "Transaction {} evaluated: mfa_required={} reason={} matched={:?}",
        context.transaction_id,
        decision.require_mfa,
        decision.reason,
        decision.matched.iter().map(|r| r.as_str()).collect::<Vec<_>>()
    );

    let purchase = state
        .purchases
        .record_decision(&context, &merchant.merchant_id, &decision)
        .await?;

    if !decision.require_mfa {
        return Ok(Json(InitResponse {
            challenge_id: None,
            mfa_required: false,
            reason: decision.reason.as_str().to_string(),
            allow: Some(true),
            methods: None,
            expires_in_seconds: None,
        }));
    }

    if decision.candidate_methods.is_empty() {
        return Err(AppError::Validation(
            "no verification methods available for this user".to_string(),
        ));
    }

    let challenge = Challenge::new(
        context.transaction_id.clone(),
        context.clone(),
        decision.candidate_methods.clone(),
        decision.reason.as_str().to_string(),
        Some(purchase.purchase_id.clone()),
        &state.config.challenge,
    );
    let created = state.store.create(challenge).await?;

    // Notifications are advisory and never fail the request
    let summary = TransactionSummary {
        amount: context.amount,
        currency: context.currency.clone(),
        merchant_id: merchant.merchant_id.clone(),
        challenge_id: created.challenge_id.clone(),
    };
    if let Err(err) = state
        .notifier
        .send_mfa_required(&context.email, &summary, decision.reason.as_str())
        .await
    {
        warn!("Failed to send verification notice: {}", err);
    }
    if decision.reason.is_fraud_signal() {
        if let Err(err) = state
            .notifier
            .send_fraud_alert(&merchant.contact_email, &summary, decision.reason.as_str())
            .await
        {
            warn!("Failed to send fraud alert: {}", err);
        }
    }

    let expires_in_seconds = created.expires_in_seconds(Utc::now());
    Ok(Json(InitResponse {
        challenge_id: Some(created.challenge_id),
        mfa_required: true,
        reason: decision.reason.as_str().to_string(),
        allow: None,
        methods: Some(created.candidate_methods),
        expires_in_seconds: Some(expires_in_seconds),
    }))
}

/// Select a method and deliver the challenge. A body carrying a
/// passcode short-circuits into verification: for sms the second call
/// verifies the received code, for the passcode factor the token code
/// is adjudicated directly.
pub async fn send_challenge(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<Value>, AppError> {
    let request: SendRequest = parse_body(&body)?;

    let challenge_id = match (request.challenge_id, request.username) {
        (Some(id), _) => id,
        (None, Some(username)) => {
            state
                .store
                .find_active_by_user(&username)
                .await
                .ok_or(AppError::ChallengeNotFound)?
                .challenge_id
        }
        (None, None) => {
            return Err(AppError::Validation(
                "challenge_id or username is required".to_string(),
            ))
        }
    };

    if let Some(passcode) = &request.passcode {
        let result = match request.method {
            Method::Sms => state.adjudicator.verify(&challenge_id, passcode).await?,
            Method::Passcode => {
                // Lock in the factor on first use, then adjudicate
                let challenge = state.store.get(&challenge_id).await?;
                if matches!(
                    challenge.status,
                    ChallengeStatus::Pending | ChallengeStatus::MethodSelected
                ) {
                    state
                        .dispatcher
                        .dispatch(&challenge_id, Method::Passcode, request.device.clone())
                        .await?;
                }
                state.adjudicator.verify(&challenge_id, passcode).await?
            }
            _ => {
                return Err(AppError::Validation(
                    "passcode field is only accepted for the sms and passcode methods".to_string(),
                ))
            }
        };
        return verification_response(result);
    }

    let sent = state
        .dispatcher
        .dispatch(&challenge_id, request.method, request.device)
        .await?;

    Ok(Json(json!({
        "challenge_id": sent.challenge_id,
        "method": request.method,
        "status": sent.status,
        "correlation_id": sent.correlation_id,
        "message": sent.message,
    })))
}

/// Verify a challenge with the supplied proof
pub async fn verify_challenge(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<Value>, AppError> {
    let request: VerifyRequest = parse_body(&body)?;
    let result = state
        .adjudicator
        .verify(&request.challenge_id, &request.proof)
        .await?;
    verification_response(result)
}

/// Cancel an in-flight challenge
pub async fn cancel_challenge(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<Value>, AppError> {
    let request: CancelRequest = parse_body(&body)?;
    let challenge = state.store.cancel(&request.challenge_id).await?;

    Ok(Json(json!({
        "challenge_id": challenge.challenge_id,
        "status": challenge.status,
    })))
}

/// Acknowledge provider callbacks. The verdict still comes from
/// polling; the payload is logged for the audit trail.
pub async fn webhook(body: String) -> Json<Value> {
    let payload: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
    info!("Webhook received: {}", payload);
    Json(json!({ "received": true }))
}

/// Map an adjudicated result onto the wire: approvals return a body,
/// rejections surface through the error envelope
fn verification_response(result: VerificationResult) -> Result<Json<Value>, AppError> {
    if result.allow {
        return Ok(Json(json!({
            "allow": true,
            "challenge_id": result.challenge_id,
            "verified_at": result.verified_at,
        })));
    }

    if result.status == ChallengeStatus::Denied {
        Err(AppError::AttemptsExhausted)
    } else {
        Err(AppError::InvalidProof {
            reason: result.reason,
            attempts_remaining: result.attempts_remaining,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_body_rejects_invalid_json() {
        let err = parse_body::<VerifyRequest>("{not json").unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(err.code(), "validation_error");
    }

    #[test]
    fn test_parse_body_rejects_wrong_shape() {
        let err = parse_body::<VerifyRequest>(r#"{"challenge_id": 7}"#).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_verification_response_maps_denial_to_lockout() {
        let denied = VerificationResult {
            challenge_id: "c-1".to_string(),
            allow: false,
            reason: "attempts_exhausted".to_string(),
            attempts_remaining: 0,
            verified_at: None,
            status: ChallengeStatus::Denied,
        };
        let err = verification_response(denied).unwrap_err();
        assert_eq!(err, AppError::AttemptsExhausted);

        let failed = VerificationResult {
            challenge_id: "c-1".to_string(),
            allow: false,
            reason: "invalid_code".to_string(),
            attempts_remaining: 2,
            verified_at: None,
            status: ChallengeStatus::Sent,
        };
        let err = verification_response(failed).unwrap_err();
        assert_eq!(
            err,
            AppError::InvalidProof {
                reason: "invalid_code".to_string(),
                attempts_remaining: 2
            }
        );
    }
}
