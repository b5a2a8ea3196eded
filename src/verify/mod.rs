// Verification adjudication: provider verdict normalization and the
// adjudicator that applies it to challenges

pub mod adjudicator;
pub mod verdict;

pub use adjudicator::{Adjudicator, VerificationResult};
pub use verdict::ProviderVerdict;
