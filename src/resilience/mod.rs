//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request pipeline:
//!     → timeouts.rs (whole pipeline under the effective deadline)
//!     → dispatcher attempt
//!     → On failure: retries.rs (retryable?) → backoff.rs (how long to wait)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every request has a deadline
//! - Retries only for idempotent requests (GET, HEAD, etc.)
//! - Retry logic lives in dispatchers, not in the routing core

pub mod backoff;
pub mod retries;
pub mod timeouts;

pub use backoff::Backoff;
pub use retries::{is_retryable, RetryPolicy};
pub use timeouts::{effective_timeout, with_deadline};
