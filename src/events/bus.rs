//! # Document-scoped event bus.
//!
//! [`Bus`] dispatches [`Event`]s the way a document dispatches custom events:
//! synchronously, in registration order, to the listeners registered at the
//! moment of the call.
//!
//! ## Architecture
//! ```text
//! Publishers:                         Consumers:
//!   ObserverManager ──┐               ┌──► listener (on kind)     sync, in order
//!   ModuleRegistry  ──┼──► Bus::emit ─┼──► listener (on_any)      sync, in order
//!   session         ──┘               └──► broadcast tap ───────► subscriber_listener
//!                                            (subscribe())          (in Runtime)
//! ```
//!
//! ## Rules
//! - **Synchronous**: `emit()` returns after every matching listener ran.
//! - **Snapshot dispatch**: the listener list is copied before dispatch, so a
//!   listener added (or removed) during a dispatch does not change who
//!   receives that dispatch.
//! - **No queuing**: listeners registered after an emit never see it.
//! - **Re-entrant**: a listener may emit, register or unregister; no lock is
//!   held while listeners run.
//! - **Broadcast tap**: every event is also sent to a bounded broadcast
//!   channel for async consumers; slow receivers observe `Lagged`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;

use super::event::{Event, EventKind};

/// Handle returned by [`Bus::on`]/[`Bus::on_any`], used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type ListenerFn = Arc<dyn Fn(&Event) + Send + Sync>;

struct Listener {
    id: ListenerId,
    /// `None` listens to every kind.
    kind: Option<EventKind>,
    f: ListenerFn,
}

struct Inner {
    listeners: RwLock<Vec<Listener>>,
    next_id: AtomicU64,
    tx: broadcast::Sender<Event>,
}

/// Synchronous event dispatcher with a broadcast tap.
///
/// ### Properties
/// - **Cloneable**: cheap to clone (shares one listener table).
/// - **Fire-and-forget**: an event with no listeners is dropped.
#[derive(Clone)]
pub struct Bus {
    inner: Arc<Inner>,
}

impl Bus {
    /// Creates a new bus whose broadcast tap holds up to `capacity` events.
    ///
    /// The minimum capacity is 1 (clamped).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                listeners: RwLock::new(Vec::new()),
                next_id: AtomicU64::new(1),
                tx,
            }),
        }
    }

    /// Registers a listener for one event kind.
    pub fn on<F>(&self, kind: EventKind, f: F) -> ListenerId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.register(Some(kind), Arc::new(f))
    }

    /// Registers a listener for every event.
    pub fn on_any<F>(&self, f: F) -> ListenerId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.register(None, Arc::new(f))
    }

    /// Unregisters a listener. Returns `false` if it was already gone.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut listeners = self.inner.listeners.write();
        let before = listeners.len();
        listeners.retain(|l| l.id != id);
        listeners.len() != before
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.read().len()
    }

    /// Dispatches an event to the listeners registered right now, then to the
    /// broadcast tap.
    pub fn emit(&self, ev: Event) {
        let targets: Vec<ListenerFn> = {
            let listeners = self.inner.listeners.read();
            listeners
                .iter()
                .filter(|l| match &l.kind {
                    Some(kind) => *kind == ev.kind,
                    None => true,
                })
                .map(|l| Arc::clone(&l.f))
                .collect()
        };

        for f in targets {
            f(&ev);
        }
        let _ = self.inner.tx.send(ev);
    }

    /// Shorthand for `emit(Event::new(kind))`.
    pub fn emit_kind(&self, kind: EventKind) {
        self.emit(Event::new(kind));
    }

    /// Creates a receiver on the broadcast tap.
    ///
    /// - A receiver only gets events **sent after** it subscribes.
    /// - Slow receivers get `RecvError::Lagged(n)` and skip over missed items.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.inner.tx.subscribe()
    }

    fn register(&self, kind: Option<EventKind>, f: ListenerFn) -> ListenerId {
        let id = ListenerId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner.listeners.write().push(Listener { id, kind, f });
        id
    }
}

impl std::fmt::Debug for Bus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn delivers_only_matching_kind() {
        let bus = Bus::new(8);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let s = Arc::clone(&seen);
        bus.on(EventKind::ViewReloaded, move |e| s.lock().push(e.kind.clone()));

        bus.emit_kind(EventKind::CounterChanged);
        bus.emit_kind(EventKind::ViewReloaded);

        assert_eq!(*seen.lock(), vec![EventKind::ViewReloaded]);
    }

    #[test]
    fn listener_added_during_dispatch_misses_that_dispatch() {
        let bus = Bus::new(8);
        let late_hits = Arc::new(Mutex::new(0u32));

        let b = bus.clone();
        let hits = Arc::clone(&late_hits);
        bus.on(EventKind::ViewReloaded, move |_| {
            let hits = Arc::clone(&hits);
            b.on(EventKind::ViewReloaded, move |_| *hits.lock() += 1);
        });

        bus.emit_kind(EventKind::ViewReloaded);
        assert_eq!(*late_hits.lock(), 0);

        // the listener added during the first dispatch sees the second one
        bus.emit_kind(EventKind::ViewReloaded);
        assert_eq!(*late_hits.lock(), 1);
    }

    #[test]
    fn off_removes_listener() {
        let bus = Bus::new(8);
        let hits = Arc::new(Mutex::new(0u32));
        let h = Arc::clone(&hits);
        let id = bus.on_any(move |_| *h.lock() += 1);

        bus.emit_kind(EventKind::CounterChanged);
        assert!(bus.off(id));
        assert!(!bus.off(id));
        bus.emit_kind(EventKind::CounterChanged);

        assert_eq!(*hits.lock(), 1);
        assert_eq!(bus.listener_count(), 0);
    }

    #[tokio::test]
    async fn broadcast_tap_receives_emitted_events() {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        bus.emit_kind(EventKind::AllModulesLoaded);
        let ev = rx.recv().await.expect("event");
        assert_eq!(ev.kind, EventKind::AllModulesLoaded);
    }
}
