// Request and response bodies for the /authpay endpoints

use serde::{Deserialize, Serialize};

use super::transaction::{DeviceInfo, GeoInput, Method};

/// Body of POST /authpay/init. Optional fields fall back to the
/// configured request defaults.
#[derive(Debug, Deserialize)]
pub struct InitRequest {
    pub merchant_id: Option<String>,
    pub api_key: Option<String>,
    pub amount: Option<f64>,
    pub currency: Option<String>,
    pub email: Option<String>,
    pub geo: Option<GeoInput>,
    pub device: Option<DeviceInfo>,
    /// Caller-supplied transaction correlation; generated when absent
    pub transaction_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InitResponse {
    pub challenge_id: Option<String>,
    pub mfa_required: bool,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub methods: Option<Vec<Method>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in_seconds: Option<i64>,
}

/// Body of POST /authpay/send. The challenge resolves by id, or by
/// username for provider-style clients that never saw one. A passcode
/// present here short-circuits into verification: the second sms call
/// carries the received code, and the passcode method carries the
/// token code directly.
#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub challenge_id: Option<String>,
    /// Resolves to the user's most recent active challenge
    pub username: Option<String>,
    pub method: Method,
    pub device: Option<String>,
    pub passcode: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub challenge_id: String,
    pub proof: String,
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub challenge_id: String,
}
