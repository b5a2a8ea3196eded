// Verification method dispatch: provider client, sms delivery and
// the dispatcher that ties them to the challenge lifecycle

pub mod dispatcher;
pub mod provider;
pub mod sms;

pub use dispatcher::{MethodDispatcher, SendResult};
pub use provider::{build_provider, HttpMfaProvider, MfaProvider, ProviderConfig, SimulatedProvider};
pub use sms::{generate_code, LogSmsSender, SmsSender};
