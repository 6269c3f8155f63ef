//! OKX request-dispatch kernel
//!
//! Every endpoint service hands a [`Request`](crate::core::types::Request) to a
//! [`Dispatch`] implementation and gets back a classified [`Outcome`] or a typed
//! [`OkxError`](crate::core::errors::OkxError). The kernel contains no endpoint
//! knowledge; it owns the policy shared by all of them.
//!
//! # Architecture
//!
//! ## Transport
//! - `Dispatcher`: attempt loop tying gate, signer, HTTP call and retry policy together
//! - `CallContext`: caller cancellation and deadlines, observed at every suspension point
//!
//! ## Authentication
//! - `Signer`: pluggable authentication interface
//! - `HmacSigner`: Base64(HMAC-SHA256) over `timestamp + method + requestPath + body`
//! - `Clock`: injectable timestamp source (`SystemClock`, `FixedClock`)
//!
//! ## Flow control
//! - `Gate`: per-endpoint in-flight bound and optional request rate
//! - `RetryPolicy`: idempotency-aware retry decisions and backoff schedule
//!
//! ## Results
//! - `Classifier`: `{code, msg, data}` envelope and SBE payload classification
//! - `Stats`: per-call counters with copy-on-read snapshots
//!
//! # Usage
//!
//! ```rust,no_run
//! use okx_rest::core::config::{Credentials, OkxConfig};
//! use okx_rest::core::kernel::*;
//! use okx_rest::core::types::{Expect, Request};
//!
//! # async fn example() -> Result<(), okx_rest::OkxError> {
//! let config = OkxConfig::new(Credentials::new("key", "secret", "passphrase")).max_retries(2);
//! let dispatcher = Dispatcher::new(config)?;
//!
//! let request = Request::get("/api/v5/account/balance").query("ccy", "BTC").signed();
//! let outcome = dispatcher
//!     .execute(&CallContext::new(), &request, Expect::AtLeastOne)
//!     .await?;
//! let balance: serde_json::Value = outcome.first()?;
//!
//! println!("{} {}", balance, dispatcher.stats().request_total);
//! # Ok(())
//! # }
//! ```
pub mod clock;
pub mod context;
pub mod envelope;
pub mod gate;
pub mod rest;
pub mod retry;
pub mod signer;
pub mod stats;

// Re-export key types for convenience
pub use clock::{iso_timestamp, Clock, FixedClock, SystemClock};
pub use context::CallContext;
pub use envelope::{Classifier, Envelope, Outcome, Payload, RawResponse};
pub use gate::{EndpointLimit, Gate, GateConfig, GatePermit};
pub use rest::{ClientBuilder, Dispatch, Dispatcher};
pub use retry::{Backoff, RetryDecision, RetryPolicy, RATE_LIMIT_CODE};
pub use signer::{HmacSigner, SignatureHeaders, Signer};
pub use stats::{Stats, StatsSnapshot};
