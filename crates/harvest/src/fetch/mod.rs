//! Rate-limited HTTP fetching.
//!
//! Every request of a run goes through one [`Fetcher`], which bounds the
//! number of in-flight requests with an [`AdmissionGate`] and retries
//! rate-limited responses with exponential backoff.

mod endpoint;
mod fetcher;
mod gate;
mod mock;
mod transport;

pub use endpoint::{Endpoint, Keys, Request};
pub use fetcher::{FetchConfig, FetchOutcome, Fetcher, RetryPolicy};
pub use gate::{AdmissionGate, AdmissionGuard};
pub use mock::MockTransport;
pub use transport::{HttpTransport, RawResponse, Transport};
