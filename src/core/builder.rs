use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::{
    config::Config, observer::ObserverManager, poller::RetryPoller, runtime::Runtime,
    session::CredentialSync,
};
use crate::{
    error::ConfigError,
    events::Bus,
    i18n::{Catalog, Translator},
    modules::{ModuleRegistry, ModuleSpec},
    net::{ApiKeyFetcher, NetworkBridge},
    page::Page,
    storage::{MemoryStorage, PrefixedStorage, Storage},
    subscribers::{Subscribe, SubscriberSet},
};

/// Builder for a [`Runtime`] and its collaborators.
///
/// The page and the network bridge are required. Storage defaults to an
/// in-memory map, the translator to an empty [`Catalog`] falling back to
/// English.
pub struct RuntimeBuilder {
    cfg: Config,
    page: Option<Arc<dyn Page>>,
    bridge: Option<Arc<dyn NetworkBridge>>,
    storage: Option<Arc<dyn Storage>>,
    translator: Option<Arc<dyn Translator>>,
    subscribers: Vec<Arc<dyn Subscribe>>,
    modules: Vec<ModuleSpec>,
}

impl RuntimeBuilder {
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            page: None,
            bridge: None,
            storage: None,
            translator: None,
            subscribers: Vec::new(),
            modules: Vec::new(),
        }
    }

    /// Sets the live page.
    pub fn with_page(mut self, page: Arc<dyn Page>) -> Self {
        self.page = Some(page);
        self
    }

    /// Sets the transport used for credential requests.
    pub fn with_bridge(mut self, bridge: Arc<dyn NetworkBridge>) -> Self {
        self.bridge = Some(bridge);
        self
    }

    /// Sets the backing store. Keys are prefixed with
    /// [`Config::storage_prefix`].
    pub fn with_storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn with_translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = Some(translator);
        self
    }

    /// Sets event subscribers.
    ///
    /// Subscribers receive every bus event through dedicated workers with
    /// bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Queues modules for registration at build time.
    pub fn with_modules(mut self, modules: Vec<ModuleSpec>) -> Self {
        self.modules.extend(modules);
        self
    }

    /// Queues one module for registration at build time.
    pub fn register(mut self, spec: ModuleSpec) -> Self {
        self.modules.push(spec);
        self
    }

    /// Builds the runtime.
    ///
    /// Validates the configuration, declares the module types and registers
    /// the queued modules. Must be called from within a tokio runtime
    /// (subscriber workers are spawned here).
    pub fn build(self) -> Result<Arc<Runtime>, ConfigError> {
        let cfg = self.cfg;
        cfg.validate()?;

        let page = self
            .page
            .ok_or(ConfigError::MissingCollaborator { name: "page" })?;
        let bridge = self.bridge.ok_or(ConfigError::MissingCollaborator {
            name: "network bridge",
        })?;
        let backend = self
            .storage
            .unwrap_or_else(|| Arc::new(MemoryStorage::new()) as Arc<dyn Storage>);
        let storage: Arc<dyn Storage> =
            Arc::new(PrefixedStorage::new(backend, cfg.storage_prefix.clone()));
        let translator = self
            .translator
            .unwrap_or_else(|| Arc::new(Catalog::new("en")) as Arc<dyn Translator>);

        let bus = Bus::new(cfg.bus_capacity_clamped());
        let runtime_token = CancellationToken::new();
        let poller = RetryPoller::with_token(cfg.poll, runtime_token);

        let registry = Arc::new(ModuleRegistry::new(storage, bus.clone()));
        registry.declare_types(cfg.module_types.clone())?;
        for spec in self.modules {
            registry.register(spec)?;
        }

        let fetcher = ApiKeyFetcher::new(bridge, &cfg)?;
        let credentials = Arc::new(CredentialSync::new(
            Arc::clone(&registry),
            fetcher,
            Arc::clone(&page),
            bus.clone(),
            &cfg,
        )?);
        let observers = ObserverManager::new(Arc::clone(&page), bus.clone(), &poller, &cfg)?;
        let subs = Arc::new(SubscriberSet::new(self.subscribers, bus.clone()));

        Ok(Arc::new(Runtime::new_internal(
            cfg,
            bus,
            page,
            poller,
            registry,
            translator,
            credentials,
            observers,
            subs,
        )))
    }
}
