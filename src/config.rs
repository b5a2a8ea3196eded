// Application configuration

use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::challenge::ChallengeConfig;
use crate::directory::{DirectoryConfig, MerchantCredential};
use crate::dispatch::ProviderConfig;
use crate::notify::NotificationConfig;
use crate::risk::RiskConfig;

/// HTTP server settings
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Fallbacks applied to omitted init fields, mirroring the demo
/// merchant seed
#[derive(Debug, Clone, Deserialize)]
pub struct RequestDefaults {
    #[serde(default = "default_merchant_id")]
    pub merchant_id: String,
    #[serde(default = "default_api_key")]
    pub api_key: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_email")]
    pub email: String,
    #[serde(default = "default_geo_country")]
    pub geo_country: String,
}

fn default_merchant_id() -> String {
    "demo_merchant".to_string()
}

fn default_api_key() -> String {
    "sk_test_demo_key_12345".to_string()
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_email() -> String {
    "user@example.com".to_string()
}

fn default_geo_country() -> String {
    "US".to_string()
}

impl Default for RequestDefaults {
    fn default() -> Self {
        Self {
            merchant_id: default_merchant_id(),
            api_key: default_api_key(),
            currency: default_currency(),
            email: default_email(),
            geo_country: default_geo_country(),
        }
    }
}

/// Top-level application configuration. Every section falls back to
/// working defaults so the service runs with no config file at all.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub risk: RiskConfig,
    pub challenge: ChallengeConfig,
    /// Merchant credential seed list
    pub merchants: Vec<MerchantCredential>,
    pub directory: DirectoryConfig,
    pub defaults: RequestDefaults,
    pub supported_currencies: Vec<String>,
    pub provider: ProviderConfig,
    pub notifications: NotificationConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            risk: RiskConfig::default(),
            challenge: ChallengeConfig::default(),
            merchants: vec![MerchantCredential {
                merchant_id: default_merchant_id(),
                api_key: default_api_key(),
                currency: default_currency(),
                home_country: default_geo_country(),
                contact_email: "demo@securepayments.example".to_string(),
            }],
            directory: DirectoryConfig::default(),
            defaults: RequestDefaults::default(),
            supported_currencies: vec![
                "USD".to_string(),
                "EUR".to_string(),
                "GBP".to_string(),
            ],
            provider: ProviderConfig::default(),
            notifications: NotificationConfig::default(),
        }
    }
}

impl AppConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.merchants.is_empty() {
            return Err("Configuration must define at least one merchant".to_string());
        }
        for merchant in &self.merchants {
            if merchant.merchant_id.is_empty() || merchant.api_key.is_empty() {
                return Err("Merchant entries must have an id and an api_key".to_string());
            }
        }
        if self.supported_currencies.is_empty() {
            return Err("Configuration must list at least one supported currency".to_string());
        }
        if self.risk.base_amount_threshold <= 0.0 {
            return Err("risk.base_amount_threshold must be positive".to_string());
        }
        if self.risk.high_amount_threshold < self.risk.base_amount_threshold {
            return Err(
                "risk.high_amount_threshold must be at or above the base threshold".to_string(),
            );
        }
        if self.challenge.ttl_minutes < 0 {
            return Err("challenge.ttl_minutes must not be negative".to_string());
        }
        if self.challenge.max_attempts == 0 {
            return Err("challenge.max_attempts must be at least 1".to_string());
        }
        Ok(())
    }

    pub fn currency_supported(&self, currency: &str) -> bool {
        self.supported_currencies
            .iter()
            .any(|c| c.eq_ignore_ascii_case(currency))
    }
}

/// Load configuration from a YAML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Arc<AppConfig>, String> {
    let path = path.as_ref();
    info!("Loading configuration from: {}", path.display());

    let contents = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config file '{}': {}", path.display(), e))?;

    let config: AppConfig = serde_yaml::from_str(&contents)
        .map_err(|e| format!("Failed to parse YAML config: {}", e))?;

    config.validate()?;

    info!(
        "Configuration loaded with {} merchant(s), {} seeded user(s)",
        config.merchants.len(),
        config.directory.users.len()
    );

    Ok(Arc::new(config))
}

/// Load configuration with fallback options. Missing files are not an
/// error; the built-in defaults stand in.
pub fn load_config_with_fallback() -> Result<Arc<AppConfig>, String> {
    // Try loading from environment variable first
    if let Ok(config_path) = std::env::var("AUTHPAY_CONFIG") {
        match load_config(&config_path) {
            Ok(config) => return Ok(config),
            Err(e) => warn!(
                "Failed to load config from AUTHPAY_CONFIG ({}): {}",
                config_path, e
            ),
        }
    }

    // Try common config file locations
    let paths = vec![
        "config.yaml",
        "config.yml",
        "config/config.yaml",
        "/etc/authpay/config.yaml",
    ];

    for path in paths {
        if Path::new(path).exists() {
            match load_config(path) {
                Ok(config) => return Ok(config),
                Err(e) => warn!("Failed to load config from '{}': {}", path, e),
            }
        }
    }

    info!("No configuration file found; using built-in defaults");
    let config = AppConfig::default();
    config.validate()?;
    Ok(Arc::new(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_demo_seed() {
        let config = AppConfig::default();
        config.validate().unwrap();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.merchants.len(), 1);
        assert_eq!(config.merchants[0].merchant_id, "demo_merchant");
        assert_eq!(config.defaults.email, "user@example.com");
        assert_eq!(
            config.supported_currencies,
            vec!["USD", "EUR", "GBP"]
        );
        assert_eq!(config.risk.base_amount_threshold, 100.0);
        assert_eq!(config.challenge.max_attempts, 3);
        assert!(config.provider.base_url.is_none());
    }

    #[test]
    fn test_load_partial_yaml_fills_defaults() {
        let yaml = r#"
server:
  port: 8080
risk:
  base_amount_threshold: 250
merchants:
  - merchant_id: acme
    api_key: sk_live_acme
    currency: EUR
    home_country: DE
    contact_email: ops@acme.example
"#;

        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        config.validate().unwrap();

        assert_eq!(config.server.port, 8080);
        // Host falls back inside the partially-specified section
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.risk.base_amount_threshold, 250.0);
        assert_eq!(config.risk.high_amount_threshold, 1000.0);
        assert_eq!(config.merchants[0].merchant_id, "acme");
        assert_eq!(config.challenge.ttl_minutes, 15);
    }

    #[test]
    fn test_validation_rejects_empty_merchants() {
        let config = AppConfig {
            merchants: vec![],
            ..AppConfig::default()
        };

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("at least one merchant"));
    }

    #[test]
    fn test_validation_rejects_inverted_thresholds() {
        let mut config = AppConfig::default();
        config.risk.high_amount_threshold = 50.0;

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("high_amount_threshold"));
    }

    #[test]
    fn test_currency_supported_ignores_case() {
        let config = AppConfig::default();
        assert!(config.currency_supported("usd"));
        assert!(config.currency_supported("EUR"));
        assert!(!config.currency_supported("JPY"));
    }

    #[test]
    fn test_provider_section_parses() {
        let yaml = r#"
provider:
  base_url: "https://mfa.example.com"
  timeout_seconds: 5
"#;

        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            config.provider.base_url.as_deref(),
            Some("https://mfa.example.com")
        );
        assert_eq!(config.provider.timeout_seconds, 5);
        assert!(!config.provider.derive_username_from_email);
    }
}
