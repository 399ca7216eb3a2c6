//! Blocking client for the accounts API with retrying dispatch.
//!
//! # Overview
//! `AccountClient` exposes fetch, create and delete for a single remote
//! account resource. Every call goes through a `Dispatcher`: by default a
//! `RetryingDispatcher` (exponential backoff with jitter on transport
//! failures) wrapped around a `DirectDispatcher` over `ureq`.
//!
//! # Design
//! - Requests and responses are plain data (`HttpRequest`, `HttpResponse`);
//!   only a `Transport` does I/O, so the dispatch and normalization logic is
//!   testable without sockets.
//! - Dispatchers compose by wrapping and hold no per-call state. Retry state
//!   lives inside one `execute` call.
//! - A `CallContext` carries the caller's deadline and cancellation signal
//!   across all attempts and backoff waits of one call.
//! - Every failure surfaces as an `ApiError`; HTTP-level failures are always
//!   `ApiError::Request` with a comparable `RequestError`.
//! - Configuration is an immutable `ClientConfig` value fixed at
//!   construction.

pub mod backoff;
pub mod client;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod normalize;
pub mod transport;
pub mod types;

pub use client::AccountClient;
pub use config::{ClientConfig, RetryConfig};
pub use context::{CallContext, CancelToken};
pub use dispatch::{DirectDispatcher, Dispatcher, RetryingDispatcher};
pub use error::{ApiError, DispatchError, RequestError, TransportError};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use transport::{Transport, UreqTransport};
pub use types::{
    Account, AccountAttributes, AccountAttributesRequest, AccountRequest, AccountResponse,
    ErrorBody, Links,
};
