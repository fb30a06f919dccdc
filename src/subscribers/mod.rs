//! # Asynchronous event subscribers.
//!
//! ```text
//!   Bus::emit ──► broadcast tap ──► Runtime listener ──► SubscriberSet::emit
//!                                                            │
//!                                             ┌──────────────┼──────────────┐
//!                                             ▼              ▼              ▼
//!                                        LogWriter        Custom          ...
//! ```
//!
//! - [`Subscribe`]: the extension point
//! - [`SubscriberSet`]: per-subscriber queues and workers
//! - [`LogWriter`]: renders events through `tracing` (feature `logging`)

#[cfg(feature = "logging")]
mod log;
mod set;
mod subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
