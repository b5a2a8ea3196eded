// Risk rules for incoming transactions

use serde::{Deserialize, Serialize};

use crate::directory::UserRecord;
use crate::directory::MerchantCredential;
use crate::models::{Method, TransactionContext};

/// Risk evaluation thresholds and lists
#[derive(Debug, Clone, Deserialize)]
pub struct RiskConfig {
    #[serde(default = "default_base_threshold")]
    pub base_amount_threshold: f64,
    #[serde(default = "default_high_threshold")]
    pub high_amount_threshold: f64,
    /// Country codes that always require MFA
    #[serde(default = "default_high_risk_countries")]
    pub high_risk_countries: Vec<String>,
    /// Substrings marking disposable email domains
    #[serde(default = "default_email_markers")]
    pub disposable_email_markers: Vec<String>,
}

fn default_base_threshold() -> f64 {
    100.0
}

fn default_high_threshold() -> f64 {
    1000.0
}

fn default_high_risk_countries() -> Vec<String> {
    vec!["NG".to_string(), "PK".to_string(), "IR".to_string()]
}

fn default_email_markers() -> Vec<String> {
    vec![
        "temp".to_string(),
        "tempmail".to_string(),
        "10minutemail".to_string(),
    ]
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            base_amount_threshold: default_base_threshold(),
            high_amount_threshold: default_high_threshold(),
            high_risk_countries: default_high_risk_countries(),
            disposable_email_markers: default_email_markers(),
        }
    }
}

/// Why a transaction does or does not need MFA
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RiskReason {
    HighAmount,
    AmountThreshold,
    HighRiskGeo,
    ForeignTransaction,
    NewDevice,
    SuspiciousEmail,
    LowRisk,
}

impl RiskReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskReason::HighAmount => "high_amount",
            RiskReason::AmountThreshold => "amount_threshold",
            RiskReason::HighRiskGeo => "high_risk_geo",
            RiskReason::ForeignTransaction => "foreign_transaction",
            RiskReason::NewDevice => "new_device",
            RiskReason::SuspiciousEmail => "suspicious_email",
            RiskReason::LowRisk => "low_risk",
        }
    }

    /// Reasons that warrant a fraud alert to the merchant
    pub fn is_fraud_signal(&self) -> bool {
        matches!(
            self,
            RiskReason::HighRiskGeo
                | RiskReason::ForeignTransaction
                | RiskReason::NewDevice
                | RiskReason::SuspiciousEmail
        )
    }
}

impl std::fmt::Display for RiskReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of evaluating one transaction
#[derive(Debug, Clone)]
pub struct Decision {
    pub require_mfa: bool,
    /// Highest-priority matched reason, or LowRisk
    pub reason: RiskReason,
    /// Every matched reason in priority order, for logging
    pub matched: Vec<RiskReason>,
    pub candidate_methods: Vec<Method>,
}

/// Evaluate a transaction against the risk rules, in priority order.
/// Deterministic and side-effect-free: the same inputs always produce
/// the same decision.
pub fn evaluate(
    context: &TransactionContext,
    merchant: &MerchantCredential,
    user: Option<&UserRecord>,
    config: &RiskConfig,
) -> Decision {
    let mut matched = Vec::new();

    if context.amount >= config.high_amount_threshold {
        matched.push(RiskReason::HighAmount);
    } else if context.amount >= config.base_amount_threshold {
        matched.push(RiskReason::AmountThreshold);
    }

    if config
        .high_risk_countries
        .iter()
        .any(|c| c.eq_ignore_ascii_case(&context.geo.country))
    {
        matched.push(RiskReason::HighRiskGeo);
    } else if !context
        .geo
        .country
        .eq_ignore_ascii_case(&merchant.home_country)
    {
        matched.push(RiskReason::ForeignTransaction);
    }

    if is_new_device(context, user) {
        matched.push(RiskReason::NewDevice);
    }

    if is_disposable_email(&context.email, &config.disposable_email_markers) {
        matched.push(RiskReason::SuspiciousEmail);
    }

    let reason = matched.first().copied().unwrap_or(RiskReason::LowRisk);
    let candidate_methods = user.map(|u| u.candidate_methods()).unwrap_or_default();

    Decision {
        require_mfa: !matched.is_empty(),
        reason,
        matched,
        candidate_methods,
    }
}

/// A device counts as new when the client flags it, or when it carries
/// a fingerprint the user's profile has never seen
fn is_new_device(context: &TransactionContext, user: Option<&UserRecord>) -> bool {
    if context.device.new_device {
        return true;
    }
    match (&context.device.fingerprint, user) {
        (Some(fingerprint), Some(record)) if !record.known_fingerprints.is_empty() => {
            !record.known_fingerprints.contains(fingerprint)
        }
        _ => false,
    }
}

fn is_disposable_email(email: &str, markers: &[String]) -> bool {
    let domain = match email.rsplit_once('@') {
        Some((_, domain)) => domain.to_lowercase(),
        None => return false,
    };
    markers
        .iter()
        .any(|marker| domain.contains(&marker.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DeviceInfo, GeoInfo};

    fn merchant() -> MerchantCredential {
        MerchantCredential {
            merchant_id: "demo_merchant".to_string(),
            api_key: "sk_test_demo_key_12345".to_string(),
            currency: "USD".to_string(),
            home_country: "US".to_string(),
            contact_email: "merchant@example.com".to_string(),
        }
    }

    fn context(amount: f64, country: &str, new_device: bool, email: &str) -> TransactionContext {
        TransactionContext {
            transaction_id: "txn-1".to_string(),
            amount,
            currency: "USD".to_string(),
            geo: GeoInfo::from_country(country),
            device: DeviceInfo {
                fingerprint: None,
                user_agent: None,
                new_device,
            },
            email: email.to_string(),
        }
    }

    fn user() -> UserRecord {
        UserRecord::default_profile("user@gmail.com")
    }

    #[test]
    fn test_rules_in_priority_order() {
        let cfg = RiskConfig::default();
        let m = merchant();
        let u = user();

        let cases: Vec<(TransactionContext, bool, RiskReason)> = vec![
            (
                context(1500.0, "US", false, "user@gmail.com"),
                true,
                RiskReason::HighAmount,
            ),
            (
                context(1000.0, "US", false, "user@gmail.com"),
                true,
                RiskReason::HighAmount,
            ),
            (
                context(500.0, "US", false, "user@gmail.com"),
                true,
                RiskReason::AmountThreshold,
            ),
            (
                context(100.0, "US", false, "user@gmail.com"),
                true,
                RiskReason::AmountThreshold,
            ),
            (
                context(50.0, "NG", false, "user@gmail.com"),
                true,
                RiskReason::HighRiskGeo,
            ),
            (
                context(50.0, "FR", false, "user@gmail.com"),
                true,
                RiskReason::ForeignTransaction,
            ),
            (
                context(50.0, "US", true, "user@gmail.com"),
                true,
                RiskReason::NewDevice,
            ),
            (
                context(50.0, "US", false, "user@tempmail.com"),
                true,
                RiskReason::SuspiciousEmail,
            ),
            (
                context(50.0, "US", false, "user@gmail.com"),
                false,
                RiskReason::LowRisk,
            ),
        ];

        for (ctx, require_mfa, reason) in cases {
            let decision = evaluate(&ctx, &m, Some(&u), &cfg);
            assert_eq!(
                decision.require_mfa, require_mfa,
                "amount={} country={}",
                ctx.amount, ctx.geo.country
            );
            assert_eq!(decision.reason, reason);
        }
    }

    #[test]
    fn test_amounts_at_or_above_base_always_require_mfa() {
        let cfg = RiskConfig::default();
        let m = merchant();
        let u = user();

        for amount in [100.0, 250.0, 999.99, 1000.0, 50000.0] {
            let decision = evaluate(&context(amount, "US", false, "user@gmail.com"), &m, Some(&u), &cfg);
            assert!(decision.require_mfa, "amount={}", amount);
            assert!(matches!(
                decision.reason,
                RiskReason::AmountThreshold | RiskReason::HighAmount
            ));
        }
    }

    #[test]
    fn test_highest_priority_reason_wins_but_all_are_recorded() {
        let cfg = RiskConfig::default();
        let m = merchant();
        let u = user();

        // High amount from a high-risk country on a new device
        let ctx = context(2000.0, "IR", true, "user@10minutemail.net");
        let decision = evaluate(&ctx, &m, Some(&u), &cfg);

        assert_eq!(decision.reason, RiskReason::HighAmount);
        assert_eq!(
            decision.matched,
            vec![
                RiskReason::HighAmount,
                RiskReason::HighRiskGeo,
                RiskReason::NewDevice,
                RiskReason::SuspiciousEmail,
            ]
        );
    }

    #[test]
    fn test_unknown_fingerprint_counts_as_new_device() {
        let cfg = RiskConfig::default();
        let m = merchant();

        let mut record = user();
        record.known_fingerprints = vec!["fp-known".to_string()];

        let mut ctx = context(50.0, "US", false, "user@gmail.com");
        ctx.device.fingerprint = Some("fp-other".to_string());

        let decision = evaluate(&ctx, &m, Some(&record), &cfg);
        assert_eq!(decision.reason, RiskReason::NewDevice);

        ctx.device.fingerprint = Some("fp-known".to_string());
        let decision = evaluate(&ctx, &m, Some(&record), &cfg);
        assert_eq!(decision.reason, RiskReason::LowRisk);
    }

    #[test]
    fn test_disposable_email_matches_domain_only() {
        let markers = default_email_markers();

        assert!(is_disposable_email("user@tempmail.com", &markers));
        assert!(is_disposable_email("user@mail.10minutemail.net", &markers));
        // Marker text in the local part is not a domain match
        assert!(!is_disposable_email("temp.user@gmail.com", &markers));
        assert!(!is_disposable_email("not-an-email", &markers));
    }

    #[test]
    fn test_geo_comparison_ignores_case() {
        let cfg = RiskConfig::default();
        let m = merchant();
        let u = user();

        let mut ctx = context(50.0, "US", false, "user@gmail.com");
        ctx.geo.country = "us".to_string();

        let decision = evaluate(&ctx, &m, Some(&u), &cfg);
        assert_eq!(decision.reason, RiskReason::LowRisk);
    }

    #[test]
    fn test_candidate_methods_come_from_user_profile() {
        let cfg = RiskConfig::default();
        let m = merchant();

        let decision = evaluate(
            &context(500.0, "US", false, "user@gmail.com"),
            &m,
            Some(&user()),
            &cfg,
        );
        assert!(decision.candidate_methods.contains(&Method::Sms));

        let decision = evaluate(&context(500.0, "US", false, "user@gmail.com"), &m, None, &cfg);
        assert!(decision.candidate_methods.is_empty());
    }

    #[test]
    fn test_deterministic_for_same_input() {
        let cfg = RiskConfig::default();
        let m = merchant();
        let u = user();
        let ctx = context(750.0, "GB", true, "user@tempmail.com");

        let first = evaluate(&ctx, &m, Some(&u), &cfg);
        let second = evaluate(&ctx, &m, Some(&u), &cfg);

        assert_eq!(first.require_mfa, second.require_mfa);
        assert_eq!(first.reason, second.reason);
        assert_eq!(first.matched, second.matched);
    }
}
