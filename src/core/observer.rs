//! # ObserverManager: raw page mutations into semantic events.
//!
//! The host application never announces "the main view finished loading" or
//! "the counter changed". [`ObserverManager`] infers both from mutations and
//! publishes them on the [`Bus`]:
//!
//! ```text
//! start()
//!   ├─► fragment wait (200ms x 20) ── found ──► emit ViewReloaded (once)
//!   │         └─► attach indicator observer ── display: none ──► emit ViewReloaded
//!   │         └─► attach body observer ─────── cursor: progress ─► re-attach indicator
//!   │         └─► fragment listener ────────── ^#news | ^#help ──► emit ViewReloaded
//!   │
//!   └─► counter chain: town probe ──► attach counter observer ── any mutation ──► emit CounterChanged
//!         ▲
//!         └── re-run on every fragment change
//! ```
//!
//! ## Rules
//! - Each target (indicator, body, counter) has at most one live observer;
//!   a replacement is attached before its predecessor is disconnected.
//! - The fragment wait only gates the initial emission; the observers are
//!   installed whether it succeeds or not.
//! - A wait that never succeeds leaves that observer uninstalled; nothing is
//!   reported as an error.
//! - [`ObserverManager::shutdown`] cancels every pending wait and disconnects
//!   every observer and listener the manager owns.

use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use regex::Regex;
use tracing::{debug, info, warn};

use super::config::Config;
use super::poller::{PollOutcome, RetryPoller};
use super::slot::ObserverSlot;
use crate::error::ConfigError;
use crate::events::{Bus, Event, EventKind};
use crate::page::{
    MutationCallback, MutationRecord, NodeRef, ObserveOptions, Page, Selector, WatchHandle,
};

const INDICATOR: &str = "loading_indicator";
const BODY: &str = "body";
const COUNTER: &str = "counter";

/// Turns page mutations into `ViewReloaded` and `CounterChanged`.
///
/// Cheap to clone; clones share the same observers.
#[derive(Clone)]
pub struct ObserverManager {
    shared: Arc<Shared>,
}

struct Shared {
    page: Arc<dyn Page>,
    bus: Bus,
    poller: RetryPoller,
    cfg: Config,
    virtual_pages: Vec<Regex>,
    indicator: ObserverSlot,
    body: ObserverSlot,
    counter: ObserverSlot,
    listeners: Mutex<Vec<Box<dyn WatchHandle>>>,
    started: AtomicBool,
}

impl ObserverManager {
    /// Creates a stopped manager.
    ///
    /// Its waits run on a child of `poller`'s token: cancelling the runtime
    /// stops them, while [`shutdown`](Self::shutdown) stops only these.
    pub fn new(
        page: Arc<dyn Page>,
        bus: Bus,
        poller: &RetryPoller,
        cfg: &Config,
    ) -> Result<Self, ConfigError> {
        let virtual_pages = cfg.virtual_page_patterns()?;
        let poller = RetryPoller::with_token(cfg.poll, poller.token().child_token());

        Ok(Self {
            shared: Arc::new(Shared {
                page,
                bus,
                poller,
                cfg: cfg.clone(),
                virtual_pages,
                indicator: ObserverSlot::new(INDICATOR),
                body: ObserverSlot::new(BODY),
                counter: ObserverSlot::new(COUNTER),
                listeners: Mutex::new(Vec::new()),
                started: AtomicBool::new(false),
            }),
        })
    }

    /// Installs the waits, observers and listeners.
    ///
    /// Returns `false` when the manager was already started or shut down.
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> bool {
        let shared = &self.shared;
        if shared.poller.token().is_cancelled() || shared.started.swap(true, Ordering::AcqRel) {
            return false;
        }

        let s = Arc::clone(shared);
        if shared.poller.spawn_guarded(s.watch_view_reloads()).is_none() {
            warn!("no async runtime; page observers not installed");
            shared.started.store(false, Ordering::Release);
            return false;
        }

        Shared::spawn_counter_chain(shared);
        let weak = Arc::downgrade(shared);
        let handle = shared.page.on_fragment_change(Arc::new(move |_: &str| {
            if let Some(s) = weak.upgrade() {
                Shared::spawn_counter_chain(&s);
            }
        }));
        shared.keep_listener(handle);

        info!("page observers starting");
        true
    }

    /// Cancels pending waits and disconnects everything the manager owns.
    ///
    /// Idempotent. A shut-down manager cannot be restarted.
    pub fn shutdown(&self) {
        let shared = &self.shared;
        shared.poller.cancel();

        let listeners: Vec<_> = shared.listeners.lock().drain(..).collect();
        for handle in listeners {
            handle.disconnect();
        }
        let released = [&shared.indicator, &shared.body, &shared.counter]
            .into_iter()
            .filter(|slot| slot.release())
            .count();

        debug!(released, "page observers shut down");
    }

    pub fn is_started(&self) -> bool {
        self.shared.started.load(Ordering::Acquire)
    }

    /// Number of targets with a live observer (0..=3).
    pub fn active_observers(&self) -> usize {
        [&self.shared.indicator, &self.shared.body, &self.shared.counter]
            .into_iter()
            .filter(|slot| slot.is_active())
            .count()
    }
}

impl std::fmt::Debug for ObserverManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverManager")
            .field("started", &self.is_started())
            .field("active_observers", &self.active_observers())
            .finish()
    }
}

impl Shared {
    async fn watch_view_reloads(self: Arc<Self>) {
        let page = Arc::clone(&self.page);
        let fragment = self
            .poller
            .poll(
                || Ok::<_, Infallible>(page.fragment()),
                |f: &String| !f.is_empty(),
                self.cfg.fragment_wait,
            )
            .await;

        match fragment {
            Ok(PollOutcome::Found { value, attempt }) => {
                debug!(fragment = %value, attempt, "initial view ready");
                self.bus.emit(Event::new(EventKind::ViewReloaded).with_reason("initial"));
            }
            Ok(PollOutcome::Exhausted { attempts }) => {
                debug!(attempts, "no fragment; initial reload not announced");
            }
            Ok(PollOutcome::Cancelled { .. }) => return,
            Err(e) => warn!(error = %e, "fragment wait aborted"),
        }

        self.attach_indicator().await;
        self.attach_body().await;
        self.listen_virtual_pages();
    }

    async fn attach_indicator(self: &Arc<Self>) {
        let Some(node) = self.find(&self.cfg.loading_indicator, INDICATOR).await else {
            return;
        };

        let weak = Arc::downgrade(self);
        let callback: MutationCallback = Arc::new(move |records: &[MutationRecord]| {
            let Some(s) = weak.upgrade() else {
                return;
            };
            let page = s.page.as_ref();
            if records.iter().any(|r| s.cfg.hidden_style.matches(page, r.target)) {
                s.bus.emit(Event::new(EventKind::ViewReloaded).with_target(INDICATOR));
            }
        });
        self.install(&self.indicator, node, ObserveOptions::attributes(), callback);
    }

    async fn attach_body(self: &Arc<Self>) {
        let Some(node) = self.find(&self.cfg.body, BODY).await else {
            return;
        };

        let weak = Arc::downgrade(self);
        let callback: MutationCallback = Arc::new(move |records: &[MutationRecord]| {
            let Some(s) = weak.upgrade() else {
                return;
            };
            let page = s.page.as_ref();
            if records.iter().any(|r| s.cfg.busy_style.matches(page, r.target)) {
                let again = Arc::clone(&s);
                s.poller
                    .spawn_guarded(async move { again.attach_indicator().await });
            }
        });
        self.install(&self.body, node, ObserveOptions::attributes(), callback);
    }

    fn listen_virtual_pages(self: &Arc<Self>) {
        let weak: Weak<Self> = Arc::downgrade(self);
        let handle = self.page.on_fragment_change(Arc::new(move |fragment: &str| {
            let Some(s) = weak.upgrade() else {
                return;
            };
            if s.virtual_pages.iter().any(|re| re.is_match(fragment)) {
                debug!(fragment, "virtual page shown");
                s.bus.emit(Event::new(EventKind::ViewReloaded).with_reason("virtual page"));
            }
        }));
        self.keep_listener(handle);
    }

    fn spawn_counter_chain(self: &Arc<Self>) {
        let s = Arc::clone(self);
        self.poller.spawn_guarded(async move { s.watch_counter().await });
    }

    async fn watch_counter(self: &Arc<Self>) {
        if let Some(gate) = &self.cfg.counter_gate {
            let found = self
                .poller
                .element(self.page.as_ref(), gate, self.cfg.town_probe)
                .await;
            if !matches!(found, Ok(Some(_))) {
                debug!(gate = %gate, "counter gate absent; counter not watched");
                return;
            }
        }
        let Some(node) = self.find(&self.cfg.counter, COUNTER).await else {
            return;
        };

        let weak = Arc::downgrade(self);
        let callback: MutationCallback = Arc::new(move |_: &[MutationRecord]| {
            if let Some(s) = weak.upgrade() {
                s.bus.emit(Event::new(EventKind::CounterChanged).with_target(COUNTER));
            }
        });
        self.install(&self.counter, node, ObserveOptions::child_list_subtree(), callback);
    }

    async fn find(&self, selector: &Selector, name: &'static str) -> Option<NodeRef> {
        match self
            .poller
            .element(self.page.as_ref(), selector, self.cfg.poll)
            .await
        {
            Ok(found) => found,
            Err(e) => {
                warn!(target_name = name, error = %e, "lookup aborted");
                None
            }
        }
    }

    fn install(
        &self,
        slot: &ObserverSlot,
        node: NodeRef,
        options: ObserveOptions,
        callback: MutationCallback,
    ) {
        if self.poller.token().is_cancelled() {
            return;
        }
        match self.page.observe(node, options, callback) {
            Ok(handle) => {
                slot.hand_off(handle, &self.bus);
                // lost a race with shutdown
                if self.poller.token().is_cancelled() {
                    slot.release();
                }
            }
            Err(e) => debug!(%node, error = %e, label = e.as_label(), "observe refused"),
        }
    }

    fn keep_listener(&self, handle: Box<dyn WatchHandle>) {
        let mut listeners = self.listeners.lock();
        if self.poller.token().is_cancelled() {
            handle.disconnect();
            return;
        }
        listeners.push(handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::page::{Element, MemoryPage, WatchRecord};

    struct Fixture {
        page: Arc<MemoryPage>,
        bus: Bus,
        manager: ObserverManager,
        seen: Arc<Mutex<Vec<EventKind>>>,
    }

    fn fixture(page: MemoryPage) -> Fixture {
        let page = Arc::new(page);
        let bus = Bus::new(64);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        bus.on_any(move |e| {
            if e.kind.is_semantic() {
                s.lock().push(e.kind.clone());
            }
        });

        let manager = ObserverManager::new(
            page.clone(),
            bus.clone(),
            &RetryPoller::default(),
            &Config::default(),
        )
        .expect("valid config");
        Fixture {
            page,
            bus,
            manager,
            seen,
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_secs(10)).await;
    }

    fn town_page() -> (MemoryPage, NodeRef, NodeRef) {
        let page = MemoryPage::new().with_fragment("#city/enter?go=city/bank;sk=ab12c");
        page.append_to_body(Element::new("div").with_id("clock"));
        let wheel = page.append_to_body(Element::new("div").with_id("loading_section"));
        let counter = page.append_to_body(Element::new("div").with_id("movesCounter"));
        (page, wheel, counter)
    }

    #[tokio::test(start_paused = true)]
    async fn initial_reload_is_announced_once() {
        let (page, _, _) = town_page();
        let f = fixture(page);

        assert!(f.manager.start());
        assert!(!f.manager.start());
        settle().await;

        assert_eq!(*f.seen.lock(), vec![EventKind::ViewReloaded]);
        assert_eq!(f.manager.active_observers(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn indicator_hidden_announces_reload() {
        let (page, wheel, _) = town_page();
        let f = fixture(page);
        f.manager.start();
        settle().await;
        f.seen.lock().clear();

        f.page.set_style(wheel, "display", "block").unwrap();
        assert!(f.seen.lock().is_empty());

        f.page.set_style(wheel, "display", "none").unwrap();
        assert_eq!(*f.seen.lock(), vec![EventKind::ViewReloaded]);
    }

    #[tokio::test(start_paused = true)]
    async fn observers_install_without_fragment() {
        let page = MemoryPage::new();
        let wheel = page.append_to_body(Element::new("div").with_id("loading_section"));
        let f = fixture(page);
        f.manager.start();
        settle().await;

        assert!(f.seen.lock().is_empty());
        f.page.set_style(wheel, "display", "none").unwrap();
        assert_eq!(*f.seen.lock(), vec![EventKind::ViewReloaded]);
    }

    #[tokio::test(start_paused = true)]
    async fn busy_body_hands_indicator_observer_off() {
        let (page, wheel, _) = town_page();
        let f = fixture(page);
        let replaced = Arc::new(Mutex::new(0u32));
        let r = Arc::clone(&replaced);
        f.bus.on(EventKind::ObserverReplaced, move |e| {
            if e.target.as_deref() == Some(INDICATOR) {
                *r.lock() += 1;
            }
        });
        f.manager.start();
        settle().await;

        f.page.set_style(f.page.body(), "cursor", "progress").unwrap();
        settle().await;

        assert_eq!(*replaced.lock(), 1);
        assert_eq!(f.page.observers_on(wheel), 1);

        let on_wheel: Vec<WatchRecord> = f
            .page
            .watch_log()
            .into_iter()
            .filter(|r| match r {
                WatchRecord::Attached { node, .. } | WatchRecord::Disconnected { node, .. } => {
                    *node == wheel
                }
            })
            .collect();
        let (old, new) = match on_wheel.as_slice() {
            [WatchRecord::Attached { observer: old, .. }, WatchRecord::Attached { observer: new, .. }, WatchRecord::Disconnected { observer: gone, .. }] =>
            {
                assert_eq!(gone, old);
                (*old, *new)
            }
            other => panic!("unexpected hand-off sequence: {other:?}"),
        };
        assert_ne!(old, new);

        // still one event per hide after the hand-off
        f.seen.lock().clear();
        f.page.set_style(wheel, "display", "none").unwrap();
        assert_eq!(*f.seen.lock(), vec![EventKind::ViewReloaded]);
    }

    #[tokio::test(start_paused = true)]
    async fn replaced_indicator_is_followed_across_busy_pulses() {
        let (page, wheel, _) = town_page();
        let f = fixture(page);
        f.manager.start();
        settle().await;

        let mut retired = vec![wheel];
        let mut current = wheel;
        for _ in 0..3 {
            current = f
                .page
                .replace(current, Element::new("div").with_id("loading_section"))
                .unwrap();
            f.page.set_style(f.page.body(), "cursor", "progress").unwrap();
            settle().await;

            assert_eq!(f.page.observers_on(current), 1);
            for old in &retired {
                assert_eq!(f.page.observers_on(*old), 0);
            }
            retired.push(current);
        }

        // rapid pulses without replacement keep a single observer
        for _ in 0..4 {
            f.page.set_style(f.page.body(), "cursor", "progress").unwrap();
        }
        settle().await;
        assert_eq!(f.page.observers_on(current), 1);

        f.seen.lock().clear();
        f.page.set_style(current, "display", "none").unwrap();
        assert_eq!(*f.seen.lock(), vec![EventKind::ViewReloaded]);
        f.page.set_style(current, "display", "block").unwrap();
        f.page.set_style(current, "display", "none").unwrap();
        assert_eq!(
            *f.seen.lock(),
            vec![EventKind::ViewReloaded, EventKind::ViewReloaded]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn virtual_pages_announce_reload() {
        let (page, _, _) = town_page();
        let f = fixture(page);
        f.manager.start();
        settle().await;
        f.seen.lock().clear();

        f.page.navigate("#news");
        f.page.navigate("#help?id=3");
        f.page.navigate("#city/enter?go=city/well;sk=ab12c");
        settle().await;

        assert_eq!(
            *f.seen.lock(),
            vec![EventKind::ViewReloaded, EventKind::ViewReloaded]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn counter_mutation_announces_change() {
        let (page, _, counter) = town_page();
        let f = fixture(page);
        f.manager.start();
        settle().await;
        f.seen.lock().clear();

        let inner = f.page.append(counter, Element::new("div")).unwrap();
        f.page.set_text(inner, "5/6").unwrap();

        assert_eq!(
            *f.seen.lock(),
            vec![EventKind::CounterChanged, EventKind::CounterChanged]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn counter_is_not_watched_outside_town() {
        let page = MemoryPage::new().with_fragment("#outside?sk=ab12c");
        let counter = page.append_to_body(Element::new("div").with_id("movesCounter"));
        let f = fixture(page);
        f.manager.start();
        settle().await;

        assert_eq!(f.page.observers_on(counter), 0);
        f.page.set_text(counter, "6/6").unwrap();
        assert!(!f.seen.lock().contains(&EventKind::CounterChanged));
    }

    #[tokio::test(start_paused = true)]
    async fn navigation_replaces_counter_observer() {
        let (page, _, counter) = town_page();
        let f = fixture(page);
        f.manager.start();
        settle().await;

        f.page.navigate("#city/enter?go=city/well;sk=ab12c");
        settle().await;

        assert_eq!(f.page.observers_on(counter), 1);
        f.seen.lock().clear();
        f.page.set_text(counter, "4/6").unwrap();
        assert_eq!(*f.seen.lock(), vec![EventKind::CounterChanged]);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_disconnects_everything() {
        let (page, wheel, counter) = town_page();
        let f = fixture(page);
        f.manager.start();
        settle().await;

        f.manager.shutdown();
        f.manager.shutdown();

        assert_eq!(f.manager.active_observers(), 0);
        assert_eq!(f.page.observer_count(), 0);
        assert_eq!(f.page.navigation_listener_count(), 0);

        f.seen.lock().clear();
        f.page.set_style(wheel, "display", "none").unwrap();
        f.page.set_text(counter, "1/6").unwrap();
        f.page.navigate("#news");
        settle().await;
        assert!(f.seen.lock().is_empty());
        assert!(!f.manager.start());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_pending_waits() {
        let page = MemoryPage::new();
        let f = fixture(page);
        f.manager.start();
        tokio::time::sleep(Duration::from_millis(300)).await;
        f.manager.shutdown();

        f.page.append_to_body(Element::new("div").with_id("loading_section"));
        settle().await;

        assert_eq!(f.page.observer_count(), 0);
        assert!(f.seen.lock().is_empty());
    }
}
