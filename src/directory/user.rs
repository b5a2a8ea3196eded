// User directory: verification capabilities on file

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

use crate::models::Method;

/// A device registered with the MFA provider
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderDevice {
    pub device_id: String,
    pub display_name: String,
    /// Factors this device can serve (push, phone)
    #[serde(default)]
    pub capabilities: Vec<Method>,
}

/// Verification profile for one user
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserRecord {
    pub email: String,
    /// Provider-side username; falls back to the email local part
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub devices: Vec<ProviderDevice>,
    /// Device fingerprints seen on prior transactions
    #[serde(default)]
    pub known_fingerprints: Vec<String>,
}

impl UserRecord {
    /// Demo profile handed out for users without a directory entry:
    /// a phone on file plus one push-and-phone-capable device
    pub fn default_profile(email: &str) -> Self {
        Self {
            email: email.to_string(),
            username: None,
            phone: Some("+15550100000".to_string()),
            devices: vec![ProviderDevice {
                device_id: "auto".to_string(),
                display_name: "Primary device".to_string(),
                capabilities: vec![Method::Push, Method::Phone],
            }],
            known_fingerprints: Vec::new(),
        }
    }

    /// Verification methods this user can be challenged with.
    /// Sms needs a phone on file; push and phone need a capable
    /// registered device; passcode works with any registered device.
    pub fn candidate_methods(&self) -> Vec<Method> {
        let mut methods = Vec::new();

        if self.phone.is_some() {
            methods.push(Method::Sms);
        }
        if self
            .devices
            .iter()
            .any(|d| d.capabilities.contains(&Method::Push))
        {
            methods.push(Method::Push);
        }
        if self
            .devices
            .iter()
            .any(|d| d.capabilities.contains(&Method::Phone))
        {
            methods.push(Method::Phone);
        }
        if !self.devices.is_empty() {
            methods.push(Method::Passcode);
        }

        methods
    }

    pub fn has_device(&self, device_id: &str) -> bool {
        self.devices.iter().any(|d| d.device_id == device_id)
    }
}

/// Provider-side username for a user. Prefers the directory entry,
/// otherwise uses the email local part. Stripping trailing digits is
/// an opt-in compatibility heuristic for providers that register
/// usernames without numeric suffixes; it mangles usernames that
/// legitimately end in digits, so it stays off by default.
pub fn provider_username(
    email: &str,
    record: Option<&UserRecord>,
    strip_trailing_digits: bool,
) -> String {
    if let Some(name) = record.and_then(|r| r.username.clone()) {
        return name;
    }

    let local = email.split('@').next().unwrap_or(email);
    if strip_trailing_digits {
        let stripped = local.trim_end_matches(|c: char| c.is_ascii_digit());
        if !stripped.is_empty() {
            return stripped.to_string();
        }
    }
    local.to_string()
}

/// Read interface over user reference data
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn lookup(&self, email: &str) -> Option<UserRecord>;
}

/// In-memory user directory seeded from configuration. With
/// `assume_default_profile` set, unknown users resolve to the demo
/// profile instead of None.
pub struct MemoryUserDirectory {
    users: HashMap<String, UserRecord>,
    assume_default_profile: bool,
}

impl MemoryUserDirectory {
    pub fn new(seed: Vec<UserRecord>, assume_default_profile: bool) -> Self {
        let users = seed.into_iter().map(|u| (u.email.clone(), u)).collect();
        Self {
            users,
            assume_default_profile,
        }
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn lookup(&self, email: &str) -> Option<UserRecord> {
        if let Some(record) = self.users.get(email) {
            return Some(record.clone());
        }
        if self.assume_default_profile {
            return Some(UserRecord::default_profile(email));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_methods_full_profile() {
        let record = UserRecord::default_profile("user@example.com");
        let methods = record.candidate_methods();

        assert!(methods.contains(&Method::Sms));
        assert!(methods.contains(&Method::Push));
        assert!(methods.contains(&Method::Phone));
        assert!(methods.contains(&Method::Passcode));
    }

    #[test]
    fn test_candidate_methods_phone_only() {
        let record = UserRecord {
            email: "user@example.com".to_string(),
            phone: Some("+15551234567".to_string()),
            ..Default::default()
        };

        assert_eq!(record.candidate_methods(), vec![Method::Sms]);
    }

    #[test]
    fn test_candidate_methods_empty_profile() {
        let record = UserRecord {
            email: "user@example.com".to_string(),
            ..Default::default()
        };

        assert!(record.candidate_methods().is_empty());
    }

    #[test]
    fn test_provider_username_prefers_directory_entry() {
        let record = UserRecord {
            email: "jane.doe42@example.com".to_string(),
            username: Some("jdoe".to_string()),
            ..Default::default()
        };

        let name = provider_username("jane.doe42@example.com", Some(&record), true);
        assert_eq!(name, "jdoe");
    }

    #[test]
    fn test_provider_username_local_part() {
        let name = provider_username("jane.doe42@example.com", None, false);
        assert_eq!(name, "jane.doe42");
    }

    #[test]
    fn test_provider_username_strips_trailing_digits_when_enabled() {
        let name = provider_username("jane.doe42@example.com", None, true);
        assert_eq!(name, "jane.doe");
    }

    #[test]
    fn test_provider_username_all_digit_local_part_kept() {
        // Stripping everything would leave no username at all
        let name = provider_username("12345@example.com", None, true);
        assert_eq!(name, "12345");
    }

    #[tokio::test]
    async fn test_lookup_seeded_user() {
        let seeded = UserRecord {
            email: "known@example.com".to_string(),
            phone: Some("+15559876543".to_string()),
            ..Default::default()
        };
        let directory = MemoryUserDirectory::new(vec![seeded], false);

        let record = directory.lookup("known@example.com").await.unwrap();
        assert_eq!(record.phone.as_deref(), Some("+15559876543"));

        assert!(directory.lookup("unknown@example.com").await.is_none());
    }

    #[tokio::test]
    async fn test_lookup_default_profile_fallback() {
        let directory = MemoryUserDirectory::new(Vec::new(), true);

        let record = directory.lookup("anyone@example.com").await.unwrap();
        assert!(record.phone.is_some());
        assert!(!record.devices.is_empty());
    }
}
