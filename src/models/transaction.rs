// Transaction context shared across the MFA decision pipeline

use serde::{Deserialize, Serialize};

/// Verification method available to a user
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    Sms,
    Push,
    Phone,
    Passcode,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Sms => "sms",
            Method::Push => "push",
            Method::Phone => "phone",
            Method::Passcode => "passcode",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Geographic origin of a transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoInfo {
    /// Country code (ISO 3166-1 alpha-2)
    pub country: String,
    pub region: Option<String>,
    pub ip: Option<String>,
}

impl GeoInfo {
    pub fn from_country(country: &str) -> Self {
        Self {
            country: country.to_uppercase(),
            region: None,
            ip: None,
        }
    }
}

/// Wire form of the geo field: either a bare country code string
/// or a structured object
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum GeoInput {
    Country(String),
    Full {
        country: String,
        #[serde(default)]
        region: Option<String>,
        #[serde(default)]
        ip: Option<String>,
    },
}

impl From<GeoInput> for GeoInfo {
    fn from(input: GeoInput) -> Self {
        match input {
            GeoInput::Country(country) => GeoInfo::from_country(&country),
            GeoInput::Full {
                country,
                region,
                ip,
            } => GeoInfo {
                country: country.to_uppercase(),
                region,
                ip,
            },
        }
    }
}

/// Device details submitted with a transaction
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceInfo {
    #[serde(default)]
    pub fingerprint: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Client-asserted flag for a device not seen before
    #[serde(default)]
    pub new_device: bool,
}

/// Transaction data evaluated for MFA. Immutable once submitted.
#[derive(Debug, Clone)]
pub struct TransactionContext {
    pub transaction_id: String,
    pub amount: f64,
    pub currency: String,
    pub geo: GeoInfo,
    pub device: DeviceInfo,
    pub email: String,
}
