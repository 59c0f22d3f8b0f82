//! harvest-fetch: download scheduler for catalog attachments.
//!
//! Fetches every work item whose destination is missing, with a fixed window
//! of requests in flight, per-request retry, and atomic writes. Also used to
//! fetch ONNX model files before the face stage starts.

pub mod error;
pub mod models;
pub mod retry;
pub mod scheduler;
pub mod transport;

pub use error::FetchError;
pub use models::ensure_model;
pub use retry::{RetryPolicy, Retryable};
pub use scheduler::{Downloader, DEFAULT_CONCURRENCY};
pub use transport::{HttpTransport, Transport, DEFAULT_USER_AGENT};
