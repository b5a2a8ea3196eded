// Application error taxonomy and HTTP mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Application-level error type mapped onto HTTP responses.
/// Every failure that crosses the HTTP boundary renders as the
/// JSON envelope {error, code, detail?}.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AppError {
    /// Unknown merchant id or mismatched API key
    #[error("invalid merchant credentials")]
    InvalidMerchant,

    /// Malformed or missing request data
    #[error("invalid request")]
    Validation(String),

    /// No challenge with the given id
    #[error("challenge not found")]
    ChallengeNotFound,

    /// Challenge past its TTL
    #[error("challenge expired")]
    ChallengeExpired,

    /// An active challenge already exists for the transaction
    #[error("active challenge already exists for this transaction")]
    DuplicateActiveChallenge,

    /// Method or device not available for this challenge
    #[error("invalid method or device selection")]
    InvalidSelection(String),

    /// Provider could not be reached after an internal retry
    #[error("verification provider unavailable")]
    ProviderUnavailable,

    /// Provider call exceeded its deadline; challenge state unchanged
    #[error("verification provider timed out")]
    ProviderTimeout,

    /// Proof rejected; one attempt consumed
    #[error("invalid proof provided")]
    InvalidProof {
        reason: String,
        attempts_remaining: u32,
    },

    /// Attempt budget spent; challenge is terminally denied
    #[error("verification attempts exhausted")]
    AttemptsExhausted,

    /// Unexpected internal failure
    #[error("internal error")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable code callers can branch on
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidMerchant => "invalid_merchant",
            AppError::Validation(_) => "validation_error",
            AppError::ChallengeNotFound => "challenge_not_found",
            AppError::ChallengeExpired => "challenge_expired",
            AppError::DuplicateActiveChallenge => "duplicate_active_challenge",
            AppError::InvalidSelection(_) => "invalid_selection",
            AppError::ProviderUnavailable => "provider_unavailable",
            AppError::ProviderTimeout => "provider_timeout",
            AppError::InvalidProof { .. } => "invalid_proof",
            AppError::AttemptsExhausted => "attempts_exhausted",
            AppError::Internal(_) => "internal_error",
        }
    }

    /// HTTP status the error surfaces as
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidMerchant => StatusCode::UNAUTHORIZED,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::ChallengeNotFound => StatusCode::NOT_FOUND,
            AppError::ChallengeExpired => StatusCode::GONE,
            AppError::DuplicateActiveChallenge => StatusCode::CONFLICT,
            AppError::InvalidSelection(_) => StatusCode::BAD_REQUEST,
            AppError::ProviderUnavailable => StatusCode::BAD_GATEWAY,
            AppError::ProviderTimeout => StatusCode::GATEWAY_TIMEOUT,
            AppError::InvalidProof { .. } => StatusCode::UNAUTHORIZED,
            AppError::AttemptsExhausted => StatusCode::LOCKED,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let mut body = json!({
            "error": self.to_string(),
            "code": self.code(),
        });

        match &self {
            AppError::Validation(detail)
            | AppError::InvalidSelection(detail)
            | AppError::Internal(detail) => {
                body["detail"] = json!(detail);
            }
            AppError::InvalidProof {
                reason,
                attempts_remaining,
            } => {
                body["allow"] = json!(false);
                body["detail"] = json!(reason);
                body["attempts_remaining"] = json!(attempts_remaining);
            }
            AppError::AttemptsExhausted => {
                body["allow"] = json!(false);
                body["attempts_remaining"] = json!(0);
            }
            _ => {}
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::InvalidMerchant.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::Validation("bad amount".to_string()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::ChallengeNotFound.status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(AppError::ChallengeExpired.status(), StatusCode::GONE);
        assert_eq!(
            AppError::DuplicateActiveChallenge.status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::ProviderUnavailable.status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::ProviderTimeout.status(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            AppError::InvalidProof {
                reason: "invalid_code".to_string(),
                attempts_remaining: 2
            }
            .status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AppError::AttemptsExhausted.status(), StatusCode::LOCKED);
    }

    #[test]
    fn test_stable_codes() {
        assert_eq!(AppError::InvalidMerchant.code(), "invalid_merchant");
        assert_eq!(AppError::ChallengeExpired.code(), "challenge_expired");
        assert_eq!(
            AppError::DuplicateActiveChallenge.code(),
            "duplicate_active_challenge"
        );
        assert_eq!(AppError::AttemptsExhausted.code(), "attempts_exhausted");
    }
}
