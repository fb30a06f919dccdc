//! # Session gating and credential bookkeeping.
//!
//! Everything here only makes sense for a logged-in user:
//!
//! ```text
//! is_logged_in()  (login panel, 250ms x 20)
//!   └─ true ──► CredentialSync::install_settings_listener()
//!                 ViewReloaded on the settings page ──► clear_all()
//!          ──► CredentialSync::fetch_missing()
//!                 for each enabled external tool without a key:
//!                     GET disclaimer ──► key | null ──► save_properties
//! ```
//!
//! Credentials live in the module's properties at `/tool/api_key`; the
//! directory to ask for is `/tool/directory_id`. `null` means "no key".

use std::sync::{Arc, Weak};

use futures::future::join_all;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::config::Config;
use super::poller::RetryPoller;
use crate::error::ConfigError;
use crate::events::{Bus, Event, EventKind, ListenerId};
use crate::modules::{set_pointer, ModuleRegistry};
use crate::net::ApiKeyFetcher;
use crate::page::Page;

const API_KEY: &str = "/tool/api_key";
const DIRECTORY_ID: &str = "/tool/directory_id";

/// Probes for the login panel.
///
/// Resolves to `false` when the panel never appears, the wait is cancelled,
/// or the lookup fails.
pub async fn is_logged_in(poller: &RetryPoller, page: &dyn Page, cfg: &Config) -> bool {
    match poller
        .element(page, &cfg.login_indicator, cfg.login_probe)
        .await
    {
        Ok(found) => found.is_some(),
        Err(e) => {
            warn!(error = %e, "login probe aborted");
            false
        }
    }
}

/// Fetches and clears the credentials of external-tool modules.
pub struct CredentialSync {
    registry: Arc<ModuleRegistry>,
    fetcher: ApiKeyFetcher,
    page: Arc<dyn Page>,
    bus: Bus,
    settings_page: Regex,
    tool_type: String,
}

impl CredentialSync {
    pub fn new(
        registry: Arc<ModuleRegistry>,
        fetcher: ApiKeyFetcher,
        page: Arc<dyn Page>,
        bus: Bus,
        cfg: &Config,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            registry,
            fetcher,
            page,
            bus,
            settings_page: cfg.settings_page_pattern()?,
            tool_type: cfg.external_tool_type.clone(),
        })
    }

    /// True while the settings page is shown.
    pub fn on_settings_page(&self) -> bool {
        self.settings_page.is_match(&self.page.fragment())
    }

    /// Fetches a key for every enabled external tool that has none.
    ///
    /// Does nothing on the settings page. Requests run concurrently; a
    /// failed request stores `null`. Returns the number of keys stored.
    pub async fn fetch_missing(&self) -> usize {
        if self.on_settings_page() {
            debug!("on settings page; credentials not fetched");
            return 0;
        }

        let pending: Vec<(String, String)> = self
            .registry
            .ids_of_type(&self.tool_type)
            .into_iter()
            .filter_map(|id| self.needs_key(&id).map(|dir| (id, dir)))
            .collect();
        if pending.is_empty() {
            return 0;
        }
        debug!(modules = pending.len(), "fetching credentials");

        let results = join_all(pending.into_iter().map(|(id, dir)| async move {
            let key = self.fetcher.fetch(&dir).await;
            self.store(&id, key)
        }))
        .await;

        let stored = results.into_iter().filter(|stored| *stored).count();
        info!(stored, "credentials fetched");
        stored
    }

    /// Directory id of a module that should fetch its key now.
    fn needs_key(&self, id: &str) -> Option<String> {
        if !self.registry.is_enabled(id).unwrap_or(false) {
            return None;
        }
        let props = self.registry.properties(id).ok()?;
        if !props.pointer(API_KEY).map_or(true, Value::is_null) {
            return None;
        }
        match props.pointer(DIRECTORY_ID) {
            Some(Value::String(dir)) => Some(dir.clone()),
            Some(Value::Number(dir)) => Some(dir.to_string()),
            _ => {
                debug!(module = id, "no directory id; credential not fetched");
                None
            }
        }
    }

    /// Stores `key` (or `null`) and persists it. Returns `true` for a key.
    fn store(&self, id: &str, key: Option<String>) -> bool {
        let stored = key.is_some();
        let value = key.map_or(Value::Null, Value::String);
        if self.write_key(id, value) {
            let event = if stored {
                Event::new(EventKind::CredentialStored)
            } else {
                Event::new(EventKind::CredentialCleared).with_reason("fetch failed")
            };
            self.bus.emit(event.with_module(id));
        }
        stored
    }

    /// Resets every external tool's key to `null`, enabled or not.
    pub fn clear_all(&self) -> usize {
        let mut cleared = 0;
        for id in self.registry.ids_of_type(&self.tool_type) {
            if self.write_key(&id, Value::Null) {
                cleared += 1;
                self.bus.emit(
                    Event::new(EventKind::CredentialCleared)
                        .with_module(id.as_str())
                        .with_reason("settings page"),
                );
            }
        }
        info!(cleared, "credentials cleared");
        cleared
    }

    fn write_key(&self, id: &str, value: Value) -> bool {
        if let Err(e) = self
            .registry
            .update_properties(id, |props| set_pointer(props, API_KEY, value))
        {
            warn!(module = id, error = %e, "credential not updated");
            return false;
        }
        if let Err(e) = self.registry.save_properties(id) {
            warn!(module = id, error = %e, label = e.as_label(), "credential not persisted");
        }
        true
    }

    /// Clears every key whenever a reload lands on the settings page.
    pub fn install_settings_listener(self: &Arc<Self>) -> ListenerId {
        let weak: Weak<Self> = Arc::downgrade(self);
        self.bus.on(EventKind::ViewReloaded, move |_| {
            if let Some(sync) = weak.upgrade() {
                if sync.on_settings_page() {
                    sync.clear_all();
                }
            }
        })
    }
}

impl std::fmt::Debug for CredentialSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialSync")
            .field("tool_type", &self.tool_type)
            .field("settings_page", &self.settings_page.as_str())
            .finish()
    }
}
