use parking_lot::Mutex;
use serde_json::json;
use tracing::debug;

use crate::events::{Bus, Event, EventKind};
use crate::page::WatchHandle;

/// Holds the single live observer of one logical target.
///
/// The caller attaches the replacement first and passes its handle to
/// [`hand_off`](Self::hand_off); only then is the previous handle
/// disconnected, so the target is never unobserved in between.
pub(super) struct ObserverSlot {
    name: &'static str,
    current: Mutex<Option<Box<dyn WatchHandle>>>,
}

impl ObserverSlot {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            current: Mutex::new(None),
        }
    }

    /// Installs an already attached handle and disconnects the previous one.
    pub fn hand_off(&self, next: Box<dyn WatchHandle>, bus: &Bus) {
        let id = next.id();
        let previous = self.current.lock().replace(next);

        let kind = match previous {
            Some(old) => {
                old.disconnect();
                debug!(target_name = self.name, observer = id, replaced = old.id(), "observer replaced");
                EventKind::ObserverReplaced
            }
            None => {
                debug!(target_name = self.name, observer = id, "observer attached");
                EventKind::ObserverAttached
            }
        };
        bus.emit(
            Event::new(kind)
                .with_target(self.name)
                .with_detail(json!({ "observer": id })),
        );
    }

    /// Disconnects the live handle, if any.
    pub fn release(&self) -> bool {
        let current = self.current.lock().take();
        match current {
            Some(handle) => {
                handle.disconnect();
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.current.lock().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::page::{Element, MemoryPage, ObserveOptions, Page, WatchRecord};

    #[test]
    fn replacement_is_attached_before_previous_is_disconnected() {
        let page = MemoryPage::new();
        let node = page.append_to_body(Element::new("div"));
        let bus = Bus::new(8);
        let slot = ObserverSlot::new("loading_indicator");
        let noop = || Arc::new(|_: &[crate::page::MutationRecord]| {});

        let first = page.observe(node, ObserveOptions::attributes(), noop()).unwrap();
        let first_id = first.id();
        slot.hand_off(first, &bus);

        let second = page.observe(node, ObserveOptions::attributes(), noop()).unwrap();
        let second_id = second.id();
        slot.hand_off(second, &bus);

        assert_eq!(
            page.watch_log(),
            vec![
                WatchRecord::Attached { observer: first_id, node },
                WatchRecord::Attached { observer: second_id, node },
                WatchRecord::Disconnected { observer: first_id, node },
            ]
        );
        assert_eq!(page.observers_on(node), 1);

        assert!(slot.release());
        assert!(!slot.release());
        assert!(!slot.is_active());
        assert_eq!(page.observers_on(node), 0);
    }
}
