//! # Module registry: types, load order, persisted state and the load pass.
//!
//! The registry is configured once (types, then modules) and then runs a
//! single load pass:
//!
//! ```text
//! declare_types([A, B, C])      fixes the load order
//! register(spec) ...            validates type/id, merges persisted state
//! init()
//!   for module in (type rank, registration order):
//!       disabled ──► Skipped ─► emit ModuleSkipped ─► total -= 1
//!       enabled  ──► load(ctx)
//!                      ├─ Ok   ─► Loaded ─► emit ModuleLoaded
//!                      └─ Err  ─► Failed ─► emit ModuleFailed
//!                    initialised += 1
//!       initialised >= total ─► emit AllModulesLoaded (once)
//! ```
//!
//! ## Rules
//! - Registration closes when the pass starts (`RegistrationClosed`).
//! - The pass runs once (`AlreadyInitialized`).
//! - No lock is held while a hook or a bus listener runs; listeners may call
//!   back into the registry.
//! - Persisted keys: `module.{id}.enabled` and `module.{id}.properties`.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::completion::Completion;
use super::module::{merge_properties, ModuleContext, ModuleRef, ModuleSpec};
use super::{enabled_key, properties_key};
use crate::error::{ConfigError, HookError, RegistryError};
use crate::events::{Bus, Event, EventKind};
use crate::storage::Storage;

/// Where a module stands in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleState {
    /// Registered; the load pass has not reached it.
    Registered,
    /// Disabled when the pass reached it.
    Skipped,
    /// `load` returned `Ok`.
    Loaded,
    /// `load` returned an error or panicked.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Configuring,
    Loading,
    Loaded,
}

struct Entry {
    module: ModuleRef,
    id: String,
    module_type: String,
    enabled: bool,
    properties: Value,
    state: ModuleState,
}

struct Inner {
    types: Vec<String>,
    entries: Vec<Entry>,
    phase: Phase,
}

impl Inner {
    fn rank(&self, module_type: &str) -> Option<usize> {
        self.types.iter().position(|t| t == module_type)
    }

    fn entry(&self, id: &str) -> Result<&Entry, ConfigError> {
        self.entries
            .iter()
            .find(|e| e.id == id)
            .ok_or_else(|| ConfigError::UnknownModule {
                module: id.to_string(),
            })
    }

    fn entry_mut(&mut self, id: &str) -> Result<&mut Entry, ConfigError> {
        self.entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| ConfigError::UnknownModule {
                module: id.to_string(),
            })
    }

    /// Entry indices in load order: type rank, then registration order.
    fn priority_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.entries.len()).collect();
        order.sort_by_key(|&i| self.rank(&self.entries[i].module_type).unwrap_or(usize::MAX));
        order
    }
}

/// Summary of a load pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// Modules whose hook succeeded, in load order.
    pub loaded: Vec<String>,
    /// Modules passed over because they were disabled.
    pub skipped: Vec<String>,
    /// Modules whose hook failed, with the failure message.
    pub failed: Vec<(String, String)>,
}

impl LoadReport {
    /// Number of modules the pass processed.
    pub fn total(&self) -> usize {
        self.loaded.len() + self.skipped.len() + self.failed.len()
    }
}

/// Ordered set of modules with persisted state.
pub struct ModuleRegistry {
    inner: Mutex<Inner>,
    storage: Arc<dyn Storage>,
    bus: Bus,
}

impl ModuleRegistry {
    /// Creates an empty registry persisting through `storage`.
    pub fn new(storage: Arc<dyn Storage>, bus: Bus) -> Self {
        Self {
            inner: Mutex::new(Inner {
                types: Vec::new(),
                entries: Vec::new(),
                phase: Phase::Configuring,
            }),
            storage,
            bus,
        }
    }

    /// Declares the module types; their order is the load order.
    ///
    /// May be called again before the pass, as long as every registered
    /// module keeps a declared type.
    pub fn declare_types<I, S>(&self, types: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let types: Vec<String> = types.into_iter().map(Into::into).collect();
        if types.is_empty() {
            return Err(ConfigError::NoTypes);
        }
        for (i, name) in types.iter().enumerate() {
            if types[..i].contains(name) {
                return Err(ConfigError::DuplicateType { name: name.clone() });
            }
        }

        let mut inner = self.inner.lock();
        if inner.phase != Phase::Configuring {
            return Err(ConfigError::AlreadyInitialized);
        }
        if let Some(orphan) = inner.entries.iter().find(|e| !types.contains(&e.module_type)) {
            return Err(ConfigError::UnknownType {
                module: orphan.id.clone(),
                module_type: orphan.module_type.clone(),
            });
        }
        debug!(types = ?types, "module types declared");
        inner.types = types;
        Ok(())
    }

    /// Declared types, in load order.
    pub fn types(&self) -> Vec<String> {
        self.inner.lock().types.clone()
    }

    /// Registers a module.
    ///
    /// Persisted state wins over the `ModuleSpec` defaults: a saved enabled flag
    /// replaces the default one, saved properties are deep-merged over the
    /// default properties. Unreadable persisted state falls back to the
    /// defaults.
    pub fn register(&self, spec: ModuleSpec) -> Result<(), ConfigError> {
        let (module, module_type, enabled, mut properties) = spec.into_parts();
        let id = module.name().to_string();

        {
            let inner = self.inner.lock();
            if inner.phase != Phase::Configuring {
                return Err(ConfigError::RegistrationClosed { module: id });
            }
            if inner.rank(&module_type).is_none() {
                return Err(ConfigError::UnknownType {
                    module: id,
                    module_type,
                });
            }
            if inner.entries.iter().any(|e| e.id == id) {
                return Err(ConfigError::DuplicateModule { module: id });
            }
        }

        let enabled = match self.storage.get(&enabled_key(&id)) {
            Ok(Some(Value::Bool(saved))) => saved,
            Ok(_) => enabled,
            Err(e) => {
                warn!(module = %id, error = %e, "saved enabled flag unreadable; using default");
                enabled
            }
        };
        match self.storage.get(&properties_key(&id)) {
            Ok(Some(saved)) => merge_properties(&mut properties, saved),
            Ok(None) => {}
            Err(e) => warn!(module = %id, error = %e, "saved properties unreadable; using defaults"),
        }

        let mut inner = self.inner.lock();
        // re-check: the lock was released while reading storage
        if inner.phase != Phase::Configuring {
            return Err(ConfigError::RegistrationClosed { module: id });
        }
        if inner.entries.iter().any(|e| e.id == id) {
            return Err(ConfigError::DuplicateModule { module: id });
        }
        debug!(module = %id, module_type = %module_type, enabled, "module registered");
        inner.entries.push(Entry {
            module,
            id,
            module_type,
            enabled,
            properties,
            state: ModuleState::Registered,
        });
        Ok(())
    }

    /// Runs the load pass.
    ///
    /// Emits `ModuleLoaded`/`ModuleSkipped`/`ModuleFailed` per module and
    /// `AllModulesLoaded` exactly once, right after the last module was
    /// processed (or immediately when none are registered).
    pub fn init(&self) -> Result<LoadReport, ConfigError> {
        let order = {
            let mut inner = self.inner.lock();
            match inner.phase {
                Phase::Configuring if inner.types.is_empty() => {
                    return Err(ConfigError::NotConfigured)
                }
                Phase::Configuring => {}
                Phase::Loading | Phase::Loaded => return Err(ConfigError::AlreadyInitialized),
            }
            inner.phase = Phase::Loading;
            inner.priority_order()
        };

        info!(modules = order.len(), "load pass starting");
        let mut completion = Completion::new(order.len());
        let mut report = LoadReport::default();

        for idx in order {
            let (module, id, module_type, mut enabled, mut properties) = {
                let inner = self.inner.lock();
                let e = &inner.entries[idx];
                (
                    Arc::clone(&e.module),
                    e.id.clone(),
                    e.module_type.clone(),
                    e.enabled,
                    e.properties.clone(),
                )
            };

            let done = if !enabled {
                self.set_state(idx, ModuleState::Skipped);
                debug!(module = %id, "module disabled; skipped");
                self.bus
                    .emit(Event::new(EventKind::ModuleSkipped).with_module(id.as_str()));
                report.skipped.push(id);
                completion.skip()
            } else {
                let (enabled_before, properties_before) = (enabled, properties.clone());
                let outcome = {
                    let mut ctx = ModuleContext::new(
                        &id,
                        &module_type,
                        &mut enabled,
                        &mut properties,
                        self.storage.as_ref(),
                        &self.bus,
                    );
                    catch_unwind(AssertUnwindSafe(|| module.load(&mut ctx)))
                        .unwrap_or_else(|panic| Err(HookError::failed(panic_message(&panic))))
                };

                // Only the fields the hook touched are written back; changes made
                // through the registry while the hook ran stay in place.
                {
                    let mut inner = self.inner.lock();
                    let e = &mut inner.entries[idx];
                    if enabled != enabled_before {
                        e.enabled = enabled;
                    }
                    if properties != properties_before {
                        e.properties = properties;
                    }
                    e.state = match outcome {
                        Ok(()) => ModuleState::Loaded,
                        Err(_) => ModuleState::Failed,
                    };
                }

                match outcome {
                    Ok(()) => {
                        debug!(module = %id, "module loaded");
                        self.bus
                            .emit(Event::new(EventKind::ModuleLoaded).with_module(id.as_str()));
                        report.loaded.push(id);
                    }
                    Err(e) => {
                        warn!(module = %id, error = %e, label = e.as_label(), "module failed to load");
                        self.bus.emit(
                            Event::new(EventKind::ModuleFailed)
                                .with_module(id.as_str())
                                .with_reason(e.to_string()),
                        );
                        report.failed.push((id, e.to_string()));
                    }
                }
                completion.loaded()
            };

            if done {
                self.announce_complete(&report);
            }
        }

        if completion.finish() {
            self.announce_complete(&report);
        }
        self.inner.lock().phase = Phase::Loaded;
        Ok(report)
    }

    fn announce_complete(&self, report: &LoadReport) {
        info!(
            loaded = report.loaded.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "all modules loaded"
        );
        self.bus.emit_kind(EventKind::AllModulesLoaded);
    }

    fn set_state(&self, idx: usize, state: ModuleState) {
        self.inner.lock().entries[idx].state = state;
    }

    /// Number of registered modules.
    pub fn count(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// True once the load pass started.
    pub fn is_initialized(&self) -> bool {
        self.inner.lock().phase != Phase::Configuring
    }

    /// Module ids in load order.
    pub fn ids_in_priority_order(&self) -> Vec<String> {
        let inner = self.inner.lock();
        inner
            .priority_order()
            .into_iter()
            .map(|i| inner.entries[i].id.clone())
            .collect()
    }

    /// Ids of the modules of one type, in registration order.
    pub fn ids_of_type(&self, module_type: &str) -> Vec<String> {
        self.inner
            .lock()
            .entries
            .iter()
            .filter(|e| e.module_type == module_type)
            .map(|e| e.id.clone())
            .collect()
    }

    pub fn is_enabled(&self, id: &str) -> Result<bool, ConfigError> {
        Ok(self.inner.lock().entry(id)?.enabled)
    }

    /// Changes and persists a module's enabled flag.
    pub fn set_enabled(&self, id: &str, enabled: bool) -> Result<(), RegistryError> {
        self.inner.lock().entry_mut(id)?.enabled = enabled;
        self.storage.set(&enabled_key(id), Value::Bool(enabled))?;
        Ok(())
    }

    pub fn state(&self, id: &str) -> Result<ModuleState, ConfigError> {
        Ok(self.inner.lock().entry(id)?.state)
    }

    /// Snapshot of a module's properties.
    pub fn properties(&self, id: &str) -> Result<Value, ConfigError> {
        Ok(self.inner.lock().entry(id)?.properties.clone())
    }

    /// Edits a module's properties in memory.
    ///
    /// The closure runs under the registry lock and must not call back into
    /// the registry.
    pub fn update_properties<F>(&self, id: &str, f: F) -> Result<(), ConfigError>
    where
        F: FnOnce(&mut Value),
    {
        f(&mut self.inner.lock().entry_mut(id)?.properties);
        Ok(())
    }

    /// Persists a module's current properties.
    pub fn save_properties(&self, id: &str) -> Result<(), RegistryError> {
        let properties = self.properties(id)?;
        self.storage.set(&properties_key(id), properties)?;
        Ok(())
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("ModuleRegistry")
            .field("types", &inner.types)
            .field("modules", &inner.entries.len())
            .field("phase", &inner.phase)
            .finish()
    }
}

fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        String::from("panicked")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::ModuleFn;
    use crate::storage::MemoryStorage;
    use serde_json::json;

    struct Harness {
        storage: Arc<MemoryStorage>,
        bus: Bus,
        registry: ModuleRegistry,
        log: Arc<Mutex<Vec<String>>>,
    }

    /// Records hook calls as `load:{id}` and every bus event by name.
    fn harness() -> Harness {
        let storage = Arc::new(MemoryStorage::new());
        let bus = Bus::new(64);
        let log = Arc::new(Mutex::new(Vec::new()));
        let l = Arc::clone(&log);
        bus.on_any(move |e| match &e.module {
            Some(m) => l.lock().push(format!("{}:{m}", e.kind.name())),
            None => l.lock().push(e.kind.name().to_string()),
        });
        let registry = ModuleRegistry::new(storage.clone(), bus.clone());
        Harness {
            storage,
            bus,
            registry,
            log,
        }
    }

    fn recording(id: &'static str, log: &Arc<Mutex<Vec<String>>>) -> ModuleRef {
        let log = Arc::clone(log);
        ModuleFn::arc(id, move |ctx| {
            log.lock().push(format!("load:{}", ctx.id()));
            Ok(())
        })
    }

    #[test]
    fn loads_by_type_then_registration_order() {
        let h = harness();
        h.registry.declare_types(["A", "B"]).unwrap();
        h.registry
            .register(ModuleSpec::new(recording("m1", &h.log), "B"))
            .unwrap();
        h.registry
            .register(ModuleSpec::new(recording("m2", &h.log), "A").with_enabled(false))
            .unwrap();
        h.registry
            .register(ModuleSpec::new(recording("m3", &h.log), "A"))
            .unwrap();

        assert_eq!(h.registry.ids_in_priority_order(), vec!["m2", "m3", "m1"]);

        let report = h.registry.init().unwrap();

        assert_eq!(
            *h.log.lock(),
            vec![
                "module_skipped:m2",
                "load:m3",
                "module_loaded:m3",
                "load:m1",
                "module_loaded:m1",
                "all_modules_loaded",
            ]
        );
        assert_eq!(report.loaded, vec!["m3", "m1"]);
        assert_eq!(report.skipped, vec!["m2"]);
        assert_eq!(h.registry.state("m2").unwrap(), ModuleState::Skipped);
        assert_eq!(h.registry.state("m1").unwrap(), ModuleState::Loaded);
    }

    #[test]
    fn trailing_disabled_modules_still_complete_the_pass() {
        let h = harness();
        h.registry.declare_types(["A"]).unwrap();
        h.registry
            .register(ModuleSpec::new(recording("m1", &h.log), "A"))
            .unwrap();
        h.registry
            .register(ModuleSpec::new(recording("m2", &h.log), "A").with_enabled(false))
            .unwrap();

        h.registry.init().unwrap();

        let log = h.log.lock();
        assert_eq!(log.last().map(String::as_str), Some("all_modules_loaded"));
        assert_eq!(log.iter().filter(|l| *l == "all_modules_loaded").count(), 1);
    }

    #[test]
    fn all_disabled_completes_once() {
        let h = harness();
        h.registry.declare_types(["A"]).unwrap();
        for id in ["m1", "m2"] {
            h.registry
                .register(ModuleSpec::new(recording(id, &h.log), "A").with_enabled(false))
                .unwrap();
        }

        h.registry.init().unwrap();

        assert_eq!(
            *h.log.lock(),
            vec!["module_skipped:m1", "module_skipped:m2", "all_modules_loaded"]
        );
    }

    #[test]
    fn empty_registry_completes_immediately() {
        let h = harness();
        h.registry.declare_types(["A"]).unwrap();

        let report = h.registry.init().unwrap();

        assert_eq!(report.total(), 0);
        assert_eq!(*h.log.lock(), vec!["all_modules_loaded"]);
    }

    #[test]
    fn failing_hook_is_reported_and_counted() {
        let h = harness();
        h.registry.declare_types(["A"]).unwrap();
        h.registry
            .register(ModuleSpec::new(
                ModuleFn::arc("broken", |_| Err(HookError::failed("no panel"))),
                "A",
            ))
            .unwrap();
        h.registry
            .register(ModuleSpec::new(
                ModuleFn::arc("panicky", |_| panic!("bad state")),
                "A",
            ))
            .unwrap();

        let report = h.registry.init().unwrap();

        assert_eq!(report.failed.len(), 2);
        assert!(report.failed[1].1.contains("bad state"));
        assert_eq!(h.registry.state("broken").unwrap(), ModuleState::Failed);
        assert_eq!(
            *h.log.lock(),
            vec![
                "module_failed:broken",
                "module_failed:panicky",
                "all_modules_loaded"
            ]
        );
    }

    #[test]
    fn configuration_errors_fail_loudly() {
        let h = harness();
        assert_eq!(h.registry.init().unwrap_err(), ConfigError::NotConfigured);
        assert_eq!(
            h.registry.declare_types(Vec::<String>::new()).unwrap_err(),
            ConfigError::NoTypes
        );
        assert_eq!(
            h.registry.declare_types(["A", "B", "A"]).unwrap_err().as_label(),
            "config_duplicate_type"
        );

        h.registry.declare_types(["A"]).unwrap();
        let err = h
            .registry
            .register(ModuleSpec::new(recording("m1", &h.log), "Z"))
            .unwrap_err();
        assert_eq!(err.as_label(), "config_unknown_type");

        h.registry
            .register(ModuleSpec::new(recording("m1", &h.log), "A"))
            .unwrap();
        let err = h
            .registry
            .register(ModuleSpec::new(recording("m1", &h.log), "A"))
            .unwrap_err();
        assert_eq!(err.as_label(), "config_duplicate_module");

        h.registry.init().unwrap();
        assert_eq!(h.registry.init().unwrap_err(), ConfigError::AlreadyInitialized);
        let err = h
            .registry
            .register(ModuleSpec::new(recording("late", &h.log), "A"))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::RegistrationClosed {
                module: "late".into()
            }
        );
        assert_eq!(h.registry.count(), 1);
    }

    #[test]
    fn persisted_state_survives_a_new_registry() {
        let h = harness();
        h.registry.declare_types(["EXTERNAL_TOOL"]).unwrap();
        let defaults = json!({ "tool": { "directory_id": 12, "api_key": null } });
        h.registry
            .register(
                ModuleSpec::new(recording("tool", &h.log), "EXTERNAL_TOOL")
                    .with_properties(defaults.clone()),
            )
            .unwrap();

        h.registry
            .update_properties("tool", |p| p["tool"]["api_key"] = json!("k"))
            .unwrap();
        h.registry.save_properties("tool").unwrap();
        h.registry.set_enabled("tool", false).unwrap();

        // later session, with a new default key
        let next = ModuleRegistry::new(h.storage.clone(), h.bus.clone());
        next.declare_types(["EXTERNAL_TOOL"]).unwrap();
        let mut upgraded = defaults;
        upgraded["tool"]["url"] = json!("https://example.org");
        next.register(
            ModuleSpec::new(recording("tool", &h.log), "EXTERNAL_TOOL").with_properties(upgraded),
        )
        .unwrap();

        assert!(!next.is_enabled("tool").unwrap());
        assert_eq!(
            next.properties("tool").unwrap(),
            json!({ "tool": { "directory_id": 12, "api_key": "k", "url": "https://example.org" } })
        );
        assert_eq!(
            h.storage.keys(),
            vec!["module.tool.enabled", "module.tool.properties"]
        );
    }

    #[test]
    fn hook_edits_are_kept_and_saved_on_request() {
        let h = harness();
        h.registry.declare_types(["A"]).unwrap();
        h.registry
            .register(ModuleSpec::new(
                ModuleFn::arc("counter", |ctx| {
                    let runs = ctx.property("/runs").and_then(Value::as_u64).unwrap_or(0);
                    ctx.set_property("/runs", json!(runs + 1));
                    ctx.save_properties()?;
                    Ok(())
                }),
                "A",
            ))
            .unwrap();

        h.registry.init().unwrap();

        assert_eq!(h.registry.properties("counter").unwrap(), json!({ "runs": 1 }));
        assert_eq!(
            h.storage.get("module.counter.properties").unwrap(),
            Some(json!({ "runs": 1 }))
        );
    }

    #[test]
    fn listeners_may_call_back_into_the_registry() {
        let h = harness();
        let registry = Arc::new(ModuleRegistry::new(h.storage.clone(), h.bus.clone()));
        registry.declare_types(["A"]).unwrap();
        registry
            .register(ModuleSpec::new(recording("m1", &h.log), "A"))
            .unwrap();

        let r = Arc::clone(&registry);
        let seen = Arc::new(Mutex::new(None));
        let s = Arc::clone(&seen);
        h.bus.on(EventKind::ModuleLoaded, move |_| {
            *s.lock() = Some(r.state("m1").ok());
        });

        registry.init().unwrap();
        assert_eq!(*seen.lock(), Some(Some(ModuleState::Loaded)));
    }

    #[test]
    fn toggling_flags_mid_pass_completes_once() {
        let h = harness();
        let registry = Arc::new(ModuleRegistry::new(h.storage.clone(), h.bus.clone()));
        registry.declare_types(["A"]).unwrap();
        registry
            .register(ModuleSpec::new(recording("m0", &h.log), "A").with_enabled(false))
            .unwrap();
        registry
            .register(ModuleSpec::new(recording("m1", &h.log), "A"))
            .unwrap();
        registry
            .register(ModuleSpec::new(recording("m2", &h.log), "A"))
            .unwrap();

        let r = Arc::clone(&registry);
        h.bus.on(EventKind::ModuleSkipped, move |e| {
            if e.module.as_deref() == Some("m0") {
                r.set_enabled("m0", false).unwrap();
            }
        });
        let r = Arc::clone(&registry);
        h.bus.on(EventKind::ModuleLoaded, move |e| {
            if e.module.as_deref() == Some("m1") {
                r.set_enabled("m0", true).unwrap();
                r.set_enabled("m2", false).unwrap();
            }
        });

        let report = registry.init().unwrap();

        assert_eq!(report.loaded, vec!["m1"]);
        assert_eq!(report.skipped, vec!["m0", "m2"]);
        let log = h.log.lock();
        assert_eq!(
            log.iter().filter(|l| *l == "all_modules_loaded").count(),
            1
        );
        assert!(!log.contains(&String::from("load:m0")));
        assert!(!log.contains(&String::from("load:m2")));
        assert_eq!(registry.state("m0").unwrap(), ModuleState::Skipped);
        assert!(registry.is_enabled("m0").unwrap());
        assert!(!registry.is_enabled("m2").unwrap());
    }

    #[test]
    fn registry_changes_made_during_a_hook_are_not_overwritten() {
        let h = harness();
        let registry = Arc::new(ModuleRegistry::new(h.storage.clone(), h.bus.clone()));
        registry.declare_types(["A"]).unwrap();
        registry
            .register(
                ModuleSpec::new(
                    ModuleFn::arc("mood", |ctx| {
                        ctx.emit(Event::new(EventKind::custom("mood_changed")));
                        Ok(())
                    }),
                    "A",
                )
                .with_properties(json!({ "tone": "calm" })),
            )
            .unwrap();

        let r = Arc::clone(&registry);
        h.bus.on(EventKind::custom("mood_changed"), move |_| {
            r.set_enabled("mood", false).unwrap();
            r.update_properties("mood", |props| props["tone"] = json!("loud"))
                .unwrap();
        });

        let report = registry.init().unwrap();

        assert_eq!(report.loaded, vec!["mood"]);
        assert!(!registry.is_enabled("mood").unwrap());
        assert_eq!(registry.properties("mood").unwrap(), json!({ "tone": "loud" }));
        assert_eq!(
            h.storage.get("module.mood.enabled").unwrap(),
            Some(json!(false))
        );
    }

    #[test]
    fn type_helpers() {
        let h = harness();
        h.registry.declare_types(["A", "B"]).unwrap();
        h.registry
            .register(ModuleSpec::new(recording("b1", &h.log), "B"))
            .unwrap();
        h.registry
            .register(ModuleSpec::new(recording("a1", &h.log), "A"))
            .unwrap();
        h.registry
            .register(ModuleSpec::new(recording("b2", &h.log), "B"))
            .unwrap();

        assert_eq!(h.registry.ids_of_type("B"), vec!["b1", "b2"]);
        assert!(h.registry.ids_of_type("C").is_empty());
        assert_eq!(h.registry.types(), vec!["A", "B"]);
        assert!(!h.registry.is_initialized());
    }
}
