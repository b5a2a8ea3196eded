// SMS one-time code delivery

use async_trait::async_trait;
use rand::Rng;
use tracing::info;

use crate::error::AppError;

/// Generate a six digit one-time code
pub fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    rng.gen_range(100000..=999999).to_string()
}

/// Delivery channel for SMS one-time codes
#[async_trait]
pub trait SmsSender: Send + Sync {
    async fn send_code(&self, phone: &str, code: &str) -> Result<(), AppError>;
}

/// Logs the code instead of sending it. Stands in for an SMS gateway
/// in development and tests.
pub struct LogSmsSender;

#[async_trait]
impl SmsSender for LogSmsSender {
    async fn send_code(&self, phone: &str, code: &str) -> Result<(), AppError> {
        info!("SMS to {}: your verification code is {}", phone, code);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_code_is_six_digits() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
            let n: u32 = code.parse().unwrap();
            assert!((100000..=999999).contains(&n));
        }
    }

    #[tokio::test]
    async fn test_log_sender_accepts_code() {
        let sender = LogSmsSender;
        sender.send_code("+15550100000", "123456").await.unwrap();
    }
}
