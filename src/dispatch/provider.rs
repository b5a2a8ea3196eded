// Third-party MFA provider client

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::Method;
use crate::verify::verdict::ProviderVerdict;

/// Provider connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// Base URL of the provider API; simulated in-process when unset
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Derive provider usernames by stripping trailing digits from
    /// the email local part. Off by default; see
    /// directory::provider_username.
    #[serde(default)]
    pub derive_username_from_email: bool,
}

fn default_timeout_seconds() -> u64 {
    10
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_seconds: default_timeout_seconds(),
            derive_username_from_email: false,
        }
    }
}

/// Client for the MFA provider's auth API. Push and phone run as
/// provider-side transactions polled for a terminal verdict; passcode
/// adjudicates synchronously.
#[async_trait]
pub trait MfaProvider: Send + Sync {
    /// Start a push or phone auth transaction; returns the provider
    /// transaction id used as the correlation id
    async fn start_auth(
        &self,
        username: &str,
        factor: Method,
        device: Option<&str>,
    ) -> Result<String, AppError>;

    /// Verify a user-supplied passcode. The device parameter is
    /// deliberately absent from this call.
    async fn verify_passcode(
        &self,
        username: &str,
        passcode: &str,
    ) -> Result<ProviderVerdict, AppError>;

    /// Fetch the verdict for a started transaction. The provider
    /// holds the request until the transaction is terminal; our
    /// client timeout caps the wait.
    async fn auth_status(&self, correlation_id: &str) -> Result<ProviderVerdict, AppError>;
}

/// Build the provider client for the configuration: HTTP-backed when
/// a base URL is set, otherwise the in-process simulator
pub fn build_provider(config: &ProviderConfig) -> Result<Arc<dyn MfaProvider>, AppError> {
    match &config.base_url {
        Some(base_url) => {
            info!("Using MFA provider at {}", base_url);
            Ok(Arc::new(HttpMfaProvider::new(base_url, config)?))
        }
        None => {
            info!("No MFA provider configured; using in-process simulator");
            Ok(Arc::new(SimulatedProvider::new()))
        }
    }
}

/// JSON-over-HTTP provider client with a hard per-call deadline and
/// one internal retry for transient failures
pub struct HttpMfaProvider {
    client: reqwest::Client,
    base_url: String,
}

impl HttpMfaProvider {
    pub fn new(base_url: &str, config: &ProviderConfig) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AppError::Internal(format!("failed to build provider client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value, AppError> {
        let url = format!("{}{}", self.base_url, path);

        let response = match self.client.post(&url).json(body).send().await {
            Ok(resp) if resp.status().is_server_error() => {
                warn!("Provider returned {}, retrying once", resp.status());
                self.client
                    .post(&url)
                    .json(body)
                    .send()
                    .await
                    .map_err(map_transport_error)?
            }
            Ok(resp) => resp,
            Err(err) if err.is_timeout() => return Err(AppError::ProviderTimeout),
            Err(err) => {
                warn!("Provider call failed, retrying once: {}", err);
                self.client
                    .post(&url)
                    .json(body)
                    .send()
                    .await
                    .map_err(map_transport_error)?
            }
        };

        if response.status().is_server_error() {
            return Err(AppError::ProviderUnavailable);
        }
        Ok(response.json::<Value>().await.unwrap_or(Value::Null))
    }

    async fn get_json(&self, path: &str, query: &[(&str, &str)]) -> Result<Value, AppError> {
        let url = format!("{}{}", self.base_url, path);

        let response = match self.client.get(&url).query(query).send().await {
            Ok(resp) if resp.status().is_server_error() => {
                warn!("Provider returned {}, retrying once", resp.status());
                self.client
                    .get(&url)
                    .query(query)
                    .send()
                    .await
                    .map_err(map_transport_error)?
            }
            Ok(resp) => resp,
            Err(err) if err.is_timeout() => return Err(AppError::ProviderTimeout),
            Err(err) => {
                warn!("Provider call failed, retrying once: {}", err);
                self.client
                    .get(&url)
                    .query(query)
                    .send()
                    .await
                    .map_err(map_transport_error)?
            }
        };

        if response.status().is_server_error() {
            return Err(AppError::ProviderUnavailable);
        }
        Ok(response.json::<Value>().await.unwrap_or(Value::Null))
    }
}

fn map_transport_error(err: reqwest::Error) -> AppError {
    if err.is_timeout() {
        AppError::ProviderTimeout
    } else {
        AppError::ProviderUnavailable
    }
}

#[async_trait]
impl MfaProvider for HttpMfaProvider {
    async fn start_auth(
        &self,
        username: &str,
        factor: Method,
        device: Option<&str>,
    ) -> Result<String, AppError> {
        let body = json!({
            "username": username,
            "factor": factor.as_str(),
            "device": device.unwrap_or("auto"),
        });

        let value = self.post_json("/auth", &body).await?;
        match value.get("txid").and_then(Value::as_str) {
            Some(txid) => Ok(txid.to_string()),
            None => {
                warn!("Provider auth response carried no txid: {}", value);
                Err(AppError::ProviderUnavailable)
            }
        }
    }

    async fn verify_passcode(
        &self,
        username: &str,
        passcode: &str,
    ) -> Result<ProviderVerdict, AppError> {
        // No device key here: the passcode factor rejects one
        let body = json!({
            "username": username,
            "factor": "passcode",
            "passcode": passcode,
        });

        let value = self.post_json("/auth", &body).await?;
        Ok(ProviderVerdict::from_value(value))
    }

    async fn auth_status(&self, correlation_id: &str) -> Result<ProviderVerdict, AppError> {
        let value = self
            .get_json("/auth_status", &[("txid", correlation_id)])
            .await?;
        Ok(ProviderVerdict::from_value(value))
    }
}

/// In-process stand-in used when no provider URL is configured.
/// Push and phone transactions auto-approve on the first status
/// query; passcode approves any non-empty code.
pub struct SimulatedProvider {
    transactions: Mutex<HashSet<String>>,
}

impl SimulatedProvider {
    pub fn new() -> Self {
        Self {
            transactions: Mutex::new(HashSet::new()),
        }
    }
}

impl Default for SimulatedProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MfaProvider for SimulatedProvider {
    async fn start_auth(
        &self,
        username: &str,
        factor: Method,
        device: Option<&str>,
    ) -> Result<String, AppError> {
        let txid = Uuid::new_v4().to_string();
        self.transactions.lock().await.insert(txid.clone());
        info!(
            "Simulated {} auth for {} on device {} (txid {})",
            factor,
            username,
            device.unwrap_or("auto"),
            txid
        );
        Ok(txid)
    }

    async fn verify_passcode(
        &self,
        _username: &str,
        passcode: &str,
    ) -> Result<ProviderVerdict, AppError> {
        let result = if passcode.trim().is_empty() {
            "deny"
        } else {
            "allow"
        };
        Ok(ProviderVerdict::from_value(json!({ "result": result })))
    }

    async fn auth_status(&self, correlation_id: &str) -> Result<ProviderVerdict, AppError> {
        let known = self.transactions.lock().await.contains(correlation_id);
        let value = if known {
            json!({"result": "allow", "status_msg": "Success. Logging you in."})
        } else {
            json!({"result": "deny", "status_msg": "Unknown transaction."})
        };
        Ok(ProviderVerdict::from_value(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_simulated_push_roundtrip() {
        let provider = SimulatedProvider::new();

        let txid = provider
            .start_auth("jdoe", Method::Push, None)
            .await
            .unwrap();
        let verdict = provider.auth_status(&txid).await.unwrap();
        assert!(verdict.allowed());
    }

    #[tokio::test]
    async fn test_simulated_unknown_transaction_denies() {
        let provider = SimulatedProvider::new();
        let verdict = provider.auth_status("no-such-txid").await.unwrap();
        assert!(!verdict.allowed());
    }

    #[tokio::test]
    async fn test_simulated_passcode() {
        let provider = SimulatedProvider::new();

        let allowed = provider.verify_passcode("jdoe", "123456").await.unwrap();
        assert!(allowed.allowed());

        let denied = provider.verify_passcode("jdoe", "   ").await.unwrap();
        assert!(!denied.allowed());
    }

    #[tokio::test]
    async fn test_http_provider_unreachable_maps_to_unavailable() {
        // Nothing listens on this port; the connect fails fast and
        // the internal retry fails the same way
        let config = ProviderConfig {
            base_url: Some("http://127.0.0.1:1".to_string()),
            timeout_seconds: 2,
            derive_username_from_email: false,
        };
        let provider = HttpMfaProvider::new("http://127.0.0.1:1", &config).unwrap();

        let err = provider
            .start_auth("jdoe", Method::Push, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::ProviderUnavailable | AppError::ProviderTimeout
        ));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let config = ProviderConfig::default();
        let provider = HttpMfaProvider::new("http://provider.example/", &config).unwrap();
        assert_eq!(provider.base_url, "http://provider.example");
    }

    async fn serve_stub(app: axum::Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn http_provider(base_url: &str, timeout_seconds: u64) -> HttpMfaProvider {
        let config = ProviderConfig {
            base_url: Some(base_url.to_string()),
            timeout_seconds,
            derive_username_from_email: false,
        };
        HttpMfaProvider::new(base_url, &config).unwrap()
    }

    #[tokio::test]
    async fn test_http_provider_retries_transient_server_error() {
        use axum::http::StatusCode;
        use axum::routing::post;
        use std::sync::atomic::{AtomicUsize, Ordering};

        let calls = Arc::new(AtomicUsize::new(0));
        let handler_calls = calls.clone();
        let app = axum::Router::new().route(
            "/auth",
            post(move || {
                let calls = handler_calls.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        (
                            StatusCode::INTERNAL_SERVER_ERROR,
                            axum::Json(json!({ "message": "try again" })),
                        )
                    } else {
                        (StatusCode::OK, axum::Json(json!({ "txid": "t-1" })))
                    }
                }
            }),
        );
        let base_url = serve_stub(app).await;
        let provider = http_provider(&base_url, 2);

        let txid = provider
            .start_auth("jdoe", Method::Push, None)
            .await
            .unwrap();
        assert_eq!(txid, "t-1");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_http_provider_persistent_server_error_is_unavailable() {
        use axum::http::StatusCode;
        use axum::routing::post;

        let app = axum::Router::new().route(
            "/auth",
            post(|| async { (StatusCode::BAD_GATEWAY, axum::Json(json!({}))) }),
        );
        let base_url = serve_stub(app).await;
        let provider = http_provider(&base_url, 2);

        let err = provider
            .verify_passcode("jdoe", "123456")
            .await
            .unwrap_err();
        assert_eq!(err, AppError::ProviderUnavailable);
    }

    #[tokio::test]
    async fn test_http_provider_slow_response_is_timeout() {
        use axum::routing::get;

        let app = axum::Router::new().route(
            "/auth_status",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                axum::Json(json!({ "result": "allow" }))
            }),
        );
        let base_url = serve_stub(app).await;
        let provider = http_provider(&base_url, 1);

        let err = provider.auth_status("t-1").await.unwrap_err();
        assert_eq!(err, AppError::ProviderTimeout);
    }
}
