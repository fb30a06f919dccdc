//! # Asynchronous event consumers.
//!
//! Bus listeners run synchronously inside `emit()`. Consumers that need to
//! await (writing to a file, posting to a collector) implement [`Subscribe`]
//! instead; the runtime feeds them from the bus broadcast tap through a
//! [`SubscriberSet`](crate::subscribers::SubscriberSet), one bounded queue
//! and one worker per subscriber.
//!
//! ## Contract
//! - A slow subscriber never delays the page or other subscribers.
//! - When its queue is full, events for that subscriber are dropped and a
//!   `SubscriberOverflow` event is published.
//! - A panic inside `on_event` is caught and published as
//!   `SubscriberPanicked`; the worker keeps going.
//!
//! ## Example
//! ```rust
//! use pagevisor::{Event, EventKind, Subscribe};
//! use async_trait::async_trait;
//!
//! struct Reloads;
//!
//! #[async_trait]
//! impl Subscribe for Reloads {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.kind == EventKind::ViewReloaded {
//!             // refresh an overlay...
//!         }
//!     }
//!     fn name(&self) -> &'static str { "reloads" }
//!     fn queue_capacity(&self) -> usize { 64 }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Consumer of bus events, driven by its own worker task.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles one event.
    async fn on_event(&self, event: &Event);

    /// Name used in logs and overflow/panic events.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Capacity of this subscriber's queue (min 1).
    fn queue_capacity(&self) -> usize {
        1024
    }
}
