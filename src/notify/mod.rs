// Customer and merchant notifications

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::error::AppError;

/// Notification settings
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    /// Delivery backend: "log" or "file"
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Directory for the file backend's message documents
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default = "default_company_name")]
    pub company_name: String,
}

fn default_backend() -> String {
    "log".to_string()
}

fn default_output_dir() -> String {
    "./outbox".to_string()
}

fn default_company_name() -> String {
    "SecurePayments".to_string()
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            output_dir: default_output_dir(),
            company_name: default_company_name(),
        }
    }
}

/// Transaction fields shared by every notification
#[derive(Debug, Clone)]
pub struct TransactionSummary {
    pub amount: f64,
    pub currency: String,
    pub merchant_id: String,
    pub challenge_id: String,
}

/// A rendered message ready for a delivery backend
#[derive(Debug, Clone, Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub company: String,
    pub created_at: DateTime<Utc>,
}

/// Customer-facing description for a fraud signal
pub fn fraud_message(reason: &str) -> &'static str {
    match reason {
        "high_amount" => "High transaction amount detected",
        "foreign_transaction" => "Transaction from unusual location",
        "high_risk_geo" => "Transaction from high-risk location",
        "new_device" => "Transaction from new or unrecognized device",
        "suspicious_email" => "Suspicious email domain detected",
        _ => "Suspicious activity detected",
    }
}

#[async_trait]
pub trait MessageBackend: Send + Sync {
    async fn deliver(&self, message: &EmailMessage) -> Result<(), AppError>;
}

/// Logs messages instead of delivering them
pub struct LogMailer;

#[async_trait]
impl MessageBackend for LogMailer {
    async fn deliver(&self, message: &EmailMessage) -> Result<(), AppError> {
        info!("Email to {}: {}", message.to, message.subject);
        Ok(())
    }
}

/// Writes each message as a JSON document, one file per message
pub struct FileMailer {
    output_dir: PathBuf,
}

impl FileMailer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }
}

#[async_trait]
impl MessageBackend for FileMailer {
    async fn deliver(&self, message: &EmailMessage) -> Result<(), AppError> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| AppError::Internal(format!("failed to create outbox: {}", e)))?;

        let stamp = message.created_at.format("%Y%m%dT%H%M%S%fZ");
        let path = self.output_dir.join(format!("email_{}.json", stamp));
        let body = serde_json::to_vec_pretty(message)
            .map_err(|e| AppError::Internal(format!("failed to render message: {}", e)))?;
        tokio::fs::write(&path, body)
            .await
            .map_err(|e| AppError::Internal(format!("failed to write message: {}", e)))?;

        info!("Email written to {}", path.display());
        Ok(())
    }
}

/// Builds notification messages and hands them to the configured
/// backend. Callers treat delivery failures as non-fatal.
pub struct Notifier {
    backend: Arc<dyn MessageBackend>,
    company: String,
}

impl Notifier {
    pub fn new(backend: Arc<dyn MessageBackend>, company: String) -> Self {
        Self { backend, company }
    }

    pub fn from_config(config: &NotificationConfig) -> Self {
        let backend: Arc<dyn MessageBackend> = match config.backend.as_str() {
            "file" => Arc::new(FileMailer::new(config.output_dir.clone())),
            _ => Arc::new(LogMailer),
        };
        Self::new(backend, config.company_name.clone())
    }

    /// Tell the customer additional verification is needed
    pub async fn send_mfa_required(
        &self,
        to: &str,
        summary: &TransactionSummary,
        reason: &str,
    ) -> Result<(), AppError> {
        let message = EmailMessage {
            to: to.to_string(),
            subject: format!(
                "Verification Required - {} {:.2} Transaction",
                summary.currency, summary.amount
            ),
            text: format!(
                "Additional verification is required to complete your transaction.\n\
                 Amount: {} {:.2}\nMerchant ID: {}\nTransaction ID: {}\n\
                 Verification Reason: {}\n\
                 Please complete the verification process to proceed.\n\
                 This is an automated message from {}.",
                summary.currency,
                summary.amount,
                summary.merchant_id,
                summary.challenge_id,
                reason,
                self.company
            ),
            company: self.company.clone(),
            created_at: Utc::now(),
        };
        self.backend.deliver(&message).await
    }

    /// Alert the merchant contact about a flagged transaction
    pub async fn send_fraud_alert(
        &self,
        to: &str,
        summary: &TransactionSummary,
        reason: &str,
    ) -> Result<(), AppError> {
        let message = EmailMessage {
            to: to.to_string(),
            subject: "Fraud Alert - Action Required".to_string(),
            text: format!(
                "URGENT: Suspicious Transaction Detected\n\
                 Alert Reason: {}\n\
                 Amount: {} {:.2}\nMerchant ID: {}\nTransaction ID: {}\n\
                 Status: REQUIRES VERIFICATION\n\
                 For your security, this transaction has been temporarily held \
                 pending verification.\n\
                 This is an automated security alert from {}.",
                fraud_message(reason),
                summary.currency,
                summary.amount,
                summary.merchant_id,
                summary.challenge_id,
                self.company
            ),
            company: self.company.clone(),
            created_at: Utc::now(),
        };
        self.backend.deliver(&message).await
    }

    /// Confirm a verified transaction to the customer
    pub async fn send_transaction_success(
        &self,
        to: &str,
        summary: &TransactionSummary,
        verified_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let message = EmailMessage {
            to: to.to_string(),
            subject: format!(
                "Transaction Successful - {} {:.2}",
                summary.currency, summary.amount
            ),
            text: format!(
                "Your transaction has been successfully processed and verified.\n\
                 Amount: {} {:.2}\nMerchant ID: {}\nDate & Time: {}\nTransaction ID: {}\n\
                 If you did not authorize this transaction, please contact our \
                 support team immediately.\n\
                 This is an automated message from {}.",
                summary.currency,
                summary.amount,
                summary.merchant_id,
                verified_at.format("%Y-%m-%d %H:%M:%S"),
                summary.challenge_id,
                self.company
            ),
            company: self.company.clone(),
            created_at: Utc::now(),
        };
        self.backend.deliver(&message).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn summary() -> TransactionSummary {
        TransactionSummary {
            amount: 500.0,
            currency: "USD".to_string(),
            merchant_id: "demo_merchant".to_string(),
            challenge_id: "chal-1".to_string(),
        }
    }

    #[test]
    fn test_fraud_message_mapping() {
        assert_eq!(
            fraud_message("high_risk_geo"),
            "Transaction from high-risk location"
        );
        assert_eq!(
            fraud_message("new_device"),
            "Transaction from new or unrecognized device"
        );
        assert_eq!(
            fraud_message("suspicious_email"),
            "Suspicious email domain detected"
        );
        assert_eq!(
            fraud_message("foreign_transaction"),
            "Transaction from unusual location"
        );
        assert_eq!(fraud_message("anything_else"), "Suspicious activity detected");
    }

    #[tokio::test]
    async fn test_log_backend_accepts_all_messages() {
        let notifier = Notifier::new(Arc::new(LogMailer), "SecurePayments".to_string());

        notifier
            .send_mfa_required("user@example.com", &summary(), "amount_threshold")
            .await
            .unwrap();
        notifier
            .send_fraud_alert("ops@merchant.example", &summary(), "high_risk_geo")
            .await
            .unwrap();
        notifier
            .send_transaction_success("user@example.com", &summary(), Utc::now())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_file_backend_writes_message_documents() {
        let dir = std::env::temp_dir().join(format!("outbox-{}", Uuid::new_v4()));
        let notifier = Notifier::new(
            Arc::new(FileMailer::new(dir.clone())),
            "SecurePayments".to_string(),
        );

        notifier
            .send_transaction_success("user@example.com", &summary(), Utc::now())
            .await
            .unwrap();

        let mut entries = tokio::fs::read_dir(&dir).await.unwrap();
        let entry = entries.next_entry().await.unwrap().unwrap();
        let raw = tokio::fs::read_to_string(entry.path()).await.unwrap();
        let doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(doc["to"], "user@example.com");
        assert!(doc["subject"]
            .as_str()
            .unwrap()
            .starts_with("Transaction Successful"));

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[test]
    fn test_backend_selection_from_config() {
        let config = NotificationConfig::default();
        assert_eq!(config.backend, "log");
        assert_eq!(config.company_name, "SecurePayments");
        // Builds without touching the filesystem
        let _ = Notifier::from_config(&config);
    }
}
