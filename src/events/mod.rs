//! Semantic events: types and the document-scoped bus.
//!
//! This module groups the event **data model** and the **bus** through which
//! the observer manager, the module registry and the session wiring announce
//! what happened on the page.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] synchronous listener dispatch plus a broadcast tap for async
//!   subscribers
//!
//! ## Quick reference
//! - **Publishers**: `ObserverManager` (`ViewReloaded`, `CounterChanged`,
//!   observer diagnostics), `ModuleRegistry` (`AllModulesLoaded`, module
//!   diagnostics), `session` (credential diagnostics), `SubscriberSet`
//!   workers (overflow/panic).
//! - **Consumers**: module code via [`Bus::on`], the runtime's subscriber
//!   listener via [`Bus::subscribe`].

mod bus;
mod event;

pub use bus::{Bus, ListenerId};
pub use event::{Event, EventKind};
