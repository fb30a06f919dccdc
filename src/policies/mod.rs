//! Wait policies.
//!
//! This module groups the knobs that control **how long** the runtime keeps
//! looking for something on the page.
//!
//! ## Contents
//! - [`RetryPolicy`] fixed interval + bounded retry count
//!
//! ## Quick wiring
//! ```text
//! Config { poll: RetryPolicy, fragment_wait: RetryPolicy, ... }
//!      └─► poller::poll(search, is_found, policy)
//!           - policy.delay(n) between attempts
//!           - policy.max_retries bounds the chain
//! ```
//!
//! ## Defaults
//! - `RetryPolicy::default()` → interval=250ms, max_retries=10.

mod retry;

pub use retry::RetryPolicy;
