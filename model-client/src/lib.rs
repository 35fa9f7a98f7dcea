//! HTTP plumbing for talking to a hosted text-generation model.

mod error;
mod generate;
mod provider;
mod request;
mod retry;
mod transport;

pub use crate::error::ClientError;
pub use crate::error::TransportError;
pub use crate::generate::GenerateClient;
pub use crate::provider::Provider;
pub use crate::request::Request;
pub use crate::request::Response;
pub use crate::retry::RetryOn;
pub use crate::retry::RetryPolicy;
pub use crate::retry::backoff;
pub use crate::retry::run_with_retry;
pub use crate::transport::HttpTransport;
pub use crate::transport::ReqwestTransport;
