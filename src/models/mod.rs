pub mod requests;
pub mod transaction;

pub use requests::{CancelRequest, InitRequest, InitResponse, SendRequest, VerifyRequest};
pub use transaction::{DeviceInfo, GeoInfo, GeoInput, Method, TransactionContext};
