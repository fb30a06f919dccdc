//! # pagevisor
//!
//! **Pagevisor** is a module orchestration and DOM-state synchronisation
//! runtime for page enhancers.
//!
//! It waits for dynamically rendered elements, turns raw mutations into
//! semantic events the host page never announces, and runs a set of
//! optional feature modules against the page in a deterministic order.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │  ModuleSpec  │   │  ModuleSpec  │   │  ModuleSpec  │
//!     │  CONTAINER   │   │  INTERFACE_  │   │ EXTERNAL_TOOL│
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Runtime (explicit context object)                                │
//! │  - ModuleRegistry (types, load order, persisted state)            │
//! │  - ObserverManager (mutations → semantic events)                  │
//! │  - RetryPoller (bounded waits, one cancellation token)            │
//! │  - CredentialSync (external-tool keys)                            │
//! └──────┬──────────────────┬──────────────────┬───────────────┬──────┘
//!        ▼                  ▼                  ▼               │
//!   load pass         loading indicator    counter            │
//!   ModuleLoaded      body "busy" style    (gated by town)    │
//!   AllModulesLoaded  ViewReloaded         CounterChanged     │
//!        │                  │                  │               │
//!        ▼                  ▼                  ▼               ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │          Bus (synchronous listeners + broadcast tap)              │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                       ┌────────────────────────┐
//!                       │  subscriber_listener   │
//!                       │     (in Runtime)       │
//!                       └───────────┬────────────┘
//!                                   ▼
//!                             SubscriberSet
//!                           (per-sub queues)
//!                         ┌─────────┼─────────┐
//!                         ▼         ▼         ▼
//!                      worker1   worker2   workerN
//! ```
//!
//! ### Lifecycle
//! ```text
//! Runtime::start()
//!   ├─► language from hostname ─► Translator::set_language
//!   ├─► ModuleRegistry::init()
//!   │      for each module, type order then registration order:
//!   │        ├─ disabled ─► ModuleSkipped
//!   │        ├─ load Ok  ─► ModuleLoaded
//!   │        └─ load Err ─► ModuleFailed
//!   │      AllModulesLoaded once every module was processed
//!   └─► is_logged_in()
//!          └─ true ─► clear credentials on the settings page
//!                 ─► ObserverManager::start()
//!                 ─► fetch missing credentials (background task)
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                        |
//! |-------------------|--------------------------------------------------------------|-------------------------------------------|
//! | **Waits**         | Bounded fixed-interval searches.                             | [`RetryPoller`], [`RetryPolicy`], [`poll`]|
//! | **Observers**     | Semantic events from DOM mutations.                          | [`ObserverManager`], [`Page`]             |
//! | **Events**        | Named events with synchronous listeners.                     | [`Bus`], [`Event`], [`EventKind`]         |
//! | **Modules**       | Ordered, persisted feature units.                            | [`Module`], [`ModuleFn`], [`ModuleRegistry`]|
//! | **Subscriber API**| Async consumers of every event.                              | [`Subscribe`], [`SubscriberSet`]          |
//! | **Collaborators** | Storage, network, translation.                               | [`Storage`], [`NetworkBridge`], [`Translator`]|
//! | **Configuration** | Centralized settings.                                        | [`Config`]                                |
//!
//! ## Optional features
//! - `logging`: exports the built-in [`LogWriter`] subscriber.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use pagevisor::{
//!     Config, Element, MemoryPage, ModuleFn, ModuleSpec, NetworkBridge, Request, Response,
//!     Runtime, TransportError,
//! };
//!
//! struct Offline;
//!
//! #[async_trait]
//! impl NetworkBridge for Offline {
//!     async fn request(&self, req: Request) -> Result<Response, TransportError> {
//!         Err(TransportError::Failed {
//!             method: req.method.to_string(),
//!             path: req.path,
//!             reason: "offline".into(),
//!         })
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let page = Arc::new(MemoryPage::new().with_hostname("www.hordes.fr"));
//!     page.append_to_body(Element::new("div").with_id("tid_sidePanel_user"));
//!
//!     let runtime = Runtime::builder(Config::default())
//!         .with_page(page)
//!         .with_bridge(Arc::new(Offline))
//!         .register(ModuleSpec::new(ModuleFn::arc("hello", |_ctx| Ok(())), "CONTAINER"))
//!         .build()?;
//!
//!     let report = runtime.start().await?;
//!     assert_eq!(report.load.loaded, vec!["hello"]);
//!     assert_eq!(report.language.as_deref(), Some("fr"));
//!     assert!(report.logged_in);
//!
//!     runtime.shutdown().await;
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod events;
mod i18n;
mod modules;
mod net;
mod page;
mod policies;
mod storage;
mod subscribers;

// ---- Public re-exports ----

pub use core::{
    is_logged_in, poll, Config, CredentialSync, ExhaustedFn, ObserverManager, PollOutcome,
    RetryPoller, Runtime, RuntimeBuilder, StartReport,
};
pub use error::{
    ConfigError, DomError, HookError, PollError, RegistryError, StorageError, TransportError,
};
pub use events::{Bus, Event, EventKind, ListenerId};
pub use i18n::{Catalog, Translator};
pub use modules::{
    merge_properties, LoadReport, Module, ModuleContext, ModuleFn, ModuleRef, ModuleRegistry,
    ModuleSpec, ModuleState,
};
pub use net::{ApiKeyFetcher, Method, NetworkBridge, Request, Response};
pub use page::{
    Element, MemoryPage, MutationCallback, MutationKind, MutationRecord, NavigationCallback,
    NodeRef, ObserveOptions, Page, Selector, StyleMatch, WatchHandle, WatchRecord,
};
pub use policies::RetryPolicy;
pub use storage::{JsonFileStorage, MemoryStorage, PrefixedStorage, Storage};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose the built-in logger subscriber.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
