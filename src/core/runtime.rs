//! # Runtime: owns one instance of every component and drives startup.
//!
//! ```text
//! RuntimeBuilder::build()
//!   ├─ Config::validate()
//!   ├─ ModuleRegistry: declare_types(cfg.module_types), register(specs...)
//!   └─ SubscriberSet: one queue + worker per subscriber
//!
//! Runtime::start()
//!   ├─ subscriber_listener(): Bus.subscribe() ─► SubscriberSet::emit(&Event)
//!   ├─ Translator::set_language(language_for(hostname))
//!   ├─ ModuleRegistry::init()  ──► ModuleLoaded/Skipped/Failed ... AllModulesLoaded
//!   └─ is_logged_in()  (login panel, bounded wait)
//!         └─ true ──► CredentialSync::install_settings_listener()
//!                 ──► ObserverManager::start()  ──► ViewReloaded / CounterChanged
//!                 ──► spawn_guarded(CredentialSync::fetch_missing())
//!                       (runs beside the observers; CredentialStored per key)
//!
//! Runtime::shutdown()
//!   ├─ runtime token cancelled   → every pending wait stops
//!   ├─ observers and listeners disconnected
//!   └─ subscriber queues drained
//! ```
//!
//! Several runtimes may live in one process; nothing here is global except
//! the event sequence counter.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{
    builder::RuntimeBuilder,
    config::Config,
    observer::ObserverManager,
    poller::RetryPoller,
    session::{is_logged_in, CredentialSync},
};
use crate::{
    error::ConfigError,
    events::{Bus, ListenerId},
    i18n::Translator,
    modules::{LoadReport, ModuleRegistry},
    page::Page,
    subscribers::SubscriberSet,
};

/// Summary of [`Runtime::start`].
///
/// Serializes to JSON for hosts that ship startup reports elsewhere.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StartReport {
    /// Outcome of the load pass.
    pub load: LoadReport,
    /// Whether the login panel was found.
    pub logged_in: bool,
    /// Language detected from the hostname, if the host is known.
    pub language: Option<String>,
}

/// Page runtime: registry, observers, bus and collaborators.
pub struct Runtime {
    cfg: Config,
    bus: Bus,
    page: Arc<dyn Page>,
    poller: RetryPoller,
    registry: Arc<ModuleRegistry>,
    translator: Arc<dyn Translator>,
    credentials: Arc<CredentialSync>,
    observers: ObserverManager,
    subs: Mutex<Option<Arc<SubscriberSet>>>,
    listener: Mutex<Option<JoinHandle<()>>>,
    settings_listener: Mutex<Option<ListenerId>>,
    credential_task: Mutex<Option<JoinHandle<()>>>,
    started: AtomicBool,
}

impl Runtime {
    /// Returns a builder for a runtime with the given configuration.
    pub fn builder(cfg: Config) -> RuntimeBuilder {
        RuntimeBuilder::new(cfg)
    }

    #[allow(clippy::too_many_arguments)]
    pub(super) fn new_internal(
        cfg: Config,
        bus: Bus,
        page: Arc<dyn Page>,
        poller: RetryPoller,
        registry: Arc<ModuleRegistry>,
        translator: Arc<dyn Translator>,
        credentials: Arc<CredentialSync>,
        observers: ObserverManager,
        subs: Arc<SubscriberSet>,
    ) -> Self {
        Self {
            cfg,
            bus,
            page,
            poller,
            registry,
            translator,
            credentials,
            observers,
            subs: Mutex::new(Some(subs)),
            listener: Mutex::new(None),
            settings_listener: Mutex::new(None),
            credential_task: Mutex::new(None),
            started: AtomicBool::new(false),
        }
    }

    /// Runs the startup sequence once.
    ///
    /// Configuration defects (registry misuse) fail loudly; a missing login
    /// panel only shows up in the report. Credential requests run on a
    /// background task bound to the runtime token and never delay the
    /// observers or this call.
    pub async fn start(&self) -> Result<StartReport, ConfigError> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(ConfigError::AlreadyInitialized);
        }
        self.subscriber_listener();

        let language = self.detect_language();
        let load = self.registry.init()?;

        let logged_in = is_logged_in(&self.poller, self.page.as_ref(), &self.cfg).await;
        if logged_in {
            *self.settings_listener.lock() = Some(self.credentials.install_settings_listener());
            self.observers.start();
            let credentials = Arc::clone(&self.credentials);
            *self.credential_task.lock() = self.poller.spawn_guarded(async move {
                credentials.fetch_missing().await;
            });
        } else {
            info!("user not logged in; page observers not started");
        }

        Ok(StartReport {
            load,
            logged_in,
            language,
        })
    }

    /// Stops every wait and observer and drains the subscriber queues.
    ///
    /// Idempotent.
    pub async fn shutdown(&self) {
        self.poller.cancel();
        self.observers.shutdown();
        if let Some(id) = self.settings_listener.lock().take() {
            self.bus.off(id);
        }
        let credential_task = self.credential_task.lock().take();
        if let Some(handle) = credential_task {
            let _ = handle.await;
        }

        let listener = self.listener.lock().take();
        if let Some(handle) = listener {
            let _ = handle.await;
        }
        let subs = self.subs.lock().take();
        if let Some(subs) = subs {
            match Arc::try_unwrap(subs) {
                Ok(set) => set.shutdown().await,
                Err(_) => warn!("subscriber set still shared; queues not drained"),
            }
        }
        debug!("runtime shut down");
    }

    /// Passes the hostname's language to the translator.
    fn detect_language(&self) -> Option<String> {
        let host = self.page.hostname();
        match self.cfg.language_for(&host) {
            Some(code) => {
                self.translator.set_language(code);
                debug!(host = %host, language = code, "language detected");
                Some(code.to_string())
            }
            None => {
                debug!(host = %host, "unknown host; keeping default language");
                None
            }
        }
    }

    /// Forwards bus events to the subscriber set until shutdown.
    fn subscriber_listener(&self) {
        let Some(set) = self.subs.lock().as_ref().map(Arc::clone) else {
            return;
        };
        if set.is_empty() {
            return;
        }

        let mut rx = self.bus.subscribe();
        let token = self.poller.token().clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    ev = rx.recv() => match ev {
                        Ok(ev) => set.emit(&ev),
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "subscriber listener lagged");
                        }
                        Err(RecvError::Closed) => break,
                    },
                    _ = token.cancelled() => {
                        loop {
                            match rx.try_recv() {
                                Ok(ev) => set.emit(&ev),
                                Err(TryRecvError::Lagged(_)) => continue,
                                Err(_) => break,
                            }
                        }
                        break;
                    }
                }
            }
        });
        *self.listener.lock() = Some(handle);
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Module registry; more modules may be registered until `start`.
    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    pub fn translator(&self) -> &Arc<dyn Translator> {
        &self.translator
    }

    pub fn page(&self) -> &Arc<dyn Page> {
        &self.page
    }

    /// Retry poller bound to the runtime token.
    pub fn poller(&self) -> &RetryPoller {
        &self.poller
    }

    pub fn observers(&self) -> &ObserverManager {
        &self.observers
    }

    pub fn credentials(&self) -> &Arc<CredentialSync> {
        &self.credentials
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("registry", &self.registry)
            .field("started", &self.is_started())
            .finish()
    }
}
