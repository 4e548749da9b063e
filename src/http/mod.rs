//! HTTP fetcher module
//!
//! The single network client handed to every dataset through its sync
//! context.
//!
//! # Features
//!
//! - **Automatic Retries**: transient statuses, timeouts and connect errors
//! - **Rate Limiting**: token bucket shared across concurrent datasets
//! - **Downloads**: bodies streamed to files under the run's temp directory

mod client;
mod rate_limit;

pub use client::{HttpClient, HttpClientConfig, HttpClientConfigBuilder};
pub use rate_limit::{RateLimiter, RateLimiterConfig};
