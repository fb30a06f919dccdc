//! # LogWriter: events rendered through `tracing`.
//!
//! ## Example output (with a `fmt` subscriber)
//! ```text
//! INFO pagevisor::subscribers::log: view reloaded seq=4 reason="initial"
//! DEBUG pagevisor::subscribers::log: observer attached seq=5 target_name="loading_indicator"
//! INFO pagevisor::subscribers::log: module loaded seq=9 module="shout"
//! WARN pagevisor::subscribers::log: module failed seq=10 module="tool" reason="hook failed: no panel"
//! INFO pagevisor::subscribers::log: all modules loaded seq=11
//! ```

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Subscriber writing every event as a `tracing` record.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let seq = e.seq;
        let module = e.module.as_deref().unwrap_or_default();
        let target = e.target.as_deref().unwrap_or_default();
        let reason = e.reason.as_deref().unwrap_or_default();

        match &e.kind {
            EventKind::ViewReloaded => info!(seq, target_name = target, reason, "view reloaded"),
            EventKind::CounterChanged => debug!(seq, "counter changed"),
            EventKind::AllModulesLoaded => info!(seq, "all modules loaded"),
            EventKind::ModuleLoaded => info!(seq, module, "module loaded"),
            EventKind::ModuleSkipped => debug!(seq, module, "module skipped"),
            EventKind::ModuleFailed => warn!(seq, module, reason, "module failed"),
            EventKind::ObserverAttached => debug!(seq, target_name = target, "observer attached"),
            EventKind::ObserverReplaced => debug!(seq, target_name = target, "observer replaced"),
            EventKind::CredentialStored => info!(seq, module, "credential stored"),
            EventKind::CredentialCleared => info!(seq, module, reason, "credential cleared"),
            EventKind::SubscriberPanicked => warn!(seq, reason, "subscriber panicked"),
            EventKind::SubscriberOverflow => warn!(seq, reason, "subscriber overflow"),
            EventKind::Custom(name) => debug!(seq, name = %name, module, "custom event"),
        }
    }

    fn name(&self) -> &'static str {
        "log_writer"
    }
}
