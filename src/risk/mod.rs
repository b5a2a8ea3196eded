// Risk-based MFA decision rules

pub mod rules;

pub use rules::{evaluate, Decision, RiskConfig, RiskReason};
