// Provider verdict shapes and their normalization

use serde::Deserialize;
use serde_json::Value;

/// Raw adjudication payload from the MFA provider. Provider API
/// versions disagree on how success is spelled, so each observed
/// shape gets a variant; anything unrecognized falls through to
/// Unknown and adjudicates as a denial.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ProviderVerdict {
    /// {"result": "allow"} and friends
    Result {
        result: String,
        #[serde(default)]
        status_msg: Option<String>,
    },
    /// {"status": "OK"} and friends
    Status {
        status: String,
        #[serde(default)]
        status_msg: Option<String>,
    },
    /// Success spelled out in prose only
    Message { status_msg: String },
    /// Unrecognized payload
    Unknown(Value),
}

/// Markers for result-shaped payloads
const RESULT_MARKERS: &[(&str, bool)] = &[("allow", true), ("deny", false)];

/// Markers for status-shaped payloads
const STATUS_MARKERS: &[(&str, bool)] = &[("OK", true), ("FAIL", false)];

fn marker_allows(table: &[(&str, bool)], marker: &str) -> bool {
    table
        .iter()
        .find(|(name, _)| *name == marker)
        .map(|(_, allowed)| *allowed)
        .unwrap_or(false)
}

impl ProviderVerdict {
    /// Parse a provider payload, keeping unrecognized shapes instead
    /// of failing
    pub fn from_value(value: Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or(ProviderVerdict::Unknown(value))
    }

    /// Normalize the heterogeneous success markers to one boolean.
    /// Markers outside the tables adjudicate as denial.
    pub fn allowed(&self) -> bool {
        match self {
            ProviderVerdict::Result { result, .. } => marker_allows(RESULT_MARKERS, result),
            ProviderVerdict::Status { status, .. } => marker_allows(STATUS_MARKERS, status),
            ProviderVerdict::Message { status_msg } => {
                status_msg.to_lowercase().contains("success")
            }
            ProviderVerdict::Unknown(_) => false,
        }
    }
}
