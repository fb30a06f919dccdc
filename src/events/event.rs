//! # Events announced on the page.
//!
//! The [`EventKind`] enum classifies events in three groups:
//! - **Semantic events**: what consumers react to (`ViewReloaded`,
//!   `CounterChanged`, `AllModulesLoaded`). They carry no payload beyond
//!   occurrence.
//! - **Diagnostic events**: module and observer lifecycle, credential
//!   bookkeeping, subscriber health. Useful for logs and tests.
//! - **Custom events**: any other name a module wants to dispatch.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically across every bus in the process.
//!
//! ## Example
//! ```rust
//! use pagevisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::ModuleFailed)
//!     .with_module("shout")
//!     .with_reason("boom");
//!
//! assert_eq!(ev.kind, EventKind::ModuleFailed);
//! assert_eq!(ev.module.as_deref(), Some("shout"));
//! assert_eq!(ev.reason.as_deref(), Some("boom"));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::SystemTime;

use serde_json::Value;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of page events.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    // === Semantic events ===
    /// Main page content finished a load/transition cycle.
    ViewReloaded,

    /// The tracked counter element was mutated.
    CounterChanged,

    /// The load pass processed every registered module.
    AllModulesLoaded,

    // === Module lifecycle ===
    /// A module's `load` hook returned successfully.
    ///
    /// Sets:
    /// - `module`: module id
    ModuleLoaded,

    /// A module was disabled when the load pass reached it.
    ///
    /// Sets:
    /// - `module`: module id
    ModuleSkipped,

    /// A module's `load` hook failed.
    ///
    /// Sets:
    /// - `module`: module id
    /// - `reason`: failure message
    ModuleFailed,

    // === Observer lifecycle ===
    /// An observer was attached to a target that had none.
    ///
    /// Sets:
    /// - `target`: logical target name
    ObserverAttached,

    /// A new observer was attached and the previous one disconnected.
    ///
    /// Sets:
    /// - `target`: logical target name
    ObserverReplaced,

    // === Credentials ===
    /// A credential was fetched and stored for a module.
    ///
    /// Sets:
    /// - `module`: module id
    CredentialStored,

    /// A module's credential was reset to "none".
    ///
    /// Sets:
    /// - `module`: module id
    /// - `reason`: why (settings page, fetch failure)
    CredentialCleared,

    // === Subscriber health ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `reason`: subscriber name and panic info
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `reason`: subscriber name and cause
    SubscriberOverflow,

    /// Any other named event.
    Custom(Arc<str>),
}

impl EventKind {
    /// Returns the event name as dispatched on the document.
    ///
    /// # Example
    /// ```
    /// use pagevisor::EventKind;
    ///
    /// assert_eq!(EventKind::ViewReloaded.name(), "view_reloaded");
    /// assert_eq!(EventKind::custom("shout").name(), "shout");
    /// ```
    pub fn name(&self) -> &str {
        match self {
            EventKind::ViewReloaded => "view_reloaded",
            EventKind::CounterChanged => "counter_changed",
            EventKind::AllModulesLoaded => "all_modules_loaded",
            EventKind::ModuleLoaded => "module_loaded",
            EventKind::ModuleSkipped => "module_skipped",
            EventKind::ModuleFailed => "module_failed",
            EventKind::ObserverAttached => "observer_attached",
            EventKind::ObserverReplaced => "observer_replaced",
            EventKind::CredentialStored => "credential_stored",
            EventKind::CredentialCleared => "credential_cleared",
            EventKind::SubscriberPanicked => "subscriber_panicked",
            EventKind::SubscriberOverflow => "subscriber_overflow",
            EventKind::Custom(name) => name,
        }
    }

    /// Builds a [`EventKind::Custom`] kind.
    pub fn custom(name: impl Into<Arc<str>>) -> Self {
        EventKind::Custom(name.into())
    }

    /// True for the three events consumers are meant to react to.
    pub fn is_semantic(&self) -> bool {
        matches!(
            self,
            EventKind::ViewReloaded | EventKind::CounterChanged | EventKind::AllModulesLoaded
        )
    }
}

/// Page event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Module id, if applicable.
    pub module: Option<Arc<str>>,
    /// Logical observation target, if applicable.
    pub target: Option<Arc<str>>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Free-form payload for custom events.
    pub detail: Option<Value>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            module: None,
            target: None,
            reason: None,
            detail: None,
        }
    }

    /// Attaches a module id.
    #[inline]
    pub fn with_module(mut self, module: impl Into<Arc<str>>) -> Self {
        self.module = Some(module.into());
        self
    }

    /// Attaches an observation target name.
    #[inline]
    pub fn with_target(mut self, target: impl Into<Arc<str>>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a JSON payload.
    #[inline]
    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = Some(detail);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_reason(format!("subscriber={subscriber} info={info}"))
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }

    #[inline]
    pub fn is_subscriber_panic(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberPanicked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_numbers_increase() {
        let a = Event::new(EventKind::ViewReloaded);
        let b = Event::new(EventKind::ViewReloaded);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn custom_kinds_compare_by_name() {
        assert_eq!(EventKind::custom("ping"), EventKind::custom("ping"));
        assert_ne!(EventKind::custom("ping"), EventKind::custom("pong"));
        assert!(!EventKind::custom("ping").is_semantic());
        assert!(EventKind::CounterChanged.is_semantic());
    }
}
