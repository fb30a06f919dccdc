//! # Module abstraction and function-backed module implementation.
//!
//! A module is an optional feature unit run against the page once per load
//! pass. It has a stable [`name`](Module::name) (its id) and a synchronous
//! [`load`](Module::load) hook receiving a [`ModuleContext`]: the module's
//! own properties and enabled flag, plus the bus and storage.
//!
//! [`ModuleFn`] wraps a closure; [`ModuleRef`] is the shared handle stored in
//! the registry.

use std::borrow::Cow;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{HookError, StorageError};
use crate::events::{Bus, Event};
use crate::storage::Storage;

/// # Feature unit run by the registry.
///
/// # Example
/// ```
/// use pagevisor::{HookError, Module, ModuleContext};
///
/// struct Shout;
///
/// impl Module for Shout {
///     fn name(&self) -> &str { "shout" }
///
///     fn load(&self, ctx: &mut ModuleContext<'_>) -> Result<(), HookError> {
///         let loud = ctx.property("/loud").and_then(|v| v.as_bool()).unwrap_or(false);
///         if loud {
///             ctx.set_property("/times_loaded", 1.into());
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait Module: Send + Sync + 'static {
    /// Stable, unique module id.
    fn name(&self) -> &str;

    /// Runs once per load pass, only if the module is enabled when the pass
    /// reaches it.
    fn load(&self, ctx: &mut ModuleContext<'_>) -> Result<(), HookError>;
}

/// Shared handle to a module.
pub type ModuleRef = Arc<dyn Module>;

/// Closure-backed [`Module`].
///
/// # Example
/// ```
/// use pagevisor::{ModuleFn, ModuleRef};
///
/// let m: ModuleRef = ModuleFn::arc("noop", |_ctx| Ok(()));
/// assert_eq!(m.name(), "noop");
/// ```
#[derive(Debug)]
pub struct ModuleFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> ModuleFn<F>
where
    F: Fn(&mut ModuleContext<'_>) -> Result<(), HookError> + Send + Sync + 'static,
{
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the module and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

impl<F> Module for ModuleFn<F>
where
    F: Fn(&mut ModuleContext<'_>) -> Result<(), HookError> + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&self, ctx: &mut ModuleContext<'_>) -> Result<(), HookError> {
        (self.f)(ctx)
    }
}

/// Registration bundle: the module, its type and its defaults.
///
/// Defaults apply only when nothing was persisted for the module; persisted
/// properties are merged over `properties` at registration.
#[derive(Clone)]
pub struct ModuleSpec {
    module: ModuleRef,
    module_type: String,
    enabled: bool,
    properties: Value,
}

impl ModuleSpec {
    /// Enabled by default, with empty properties.
    pub fn new(module: ModuleRef, module_type: impl Into<String>) -> Self {
        Self {
            module,
            module_type: module_type.into(),
            enabled: true,
            properties: Value::Object(Default::default()),
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_properties(mut self, properties: Value) -> Self {
        self.properties = properties;
        self
    }

    pub fn module(&self) -> &ModuleRef {
        &self.module
    }

    pub fn id(&self) -> &str {
        self.module.name()
    }

    pub fn module_type(&self) -> &str {
        &self.module_type
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn properties(&self) -> &Value {
        &self.properties
    }

    pub(crate) fn into_parts(self) -> (ModuleRef, String, bool, Value) {
        (self.module, self.module_type, self.enabled, self.properties)
    }
}

impl std::fmt::Debug for ModuleSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleSpec")
            .field("id", &self.id())
            .field("module_type", &self.module_type)
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// What a `load` hook may touch.
///
/// Changes to properties stay in memory until
/// [`save_properties`](Self::save_properties); changes to the enabled flag
/// are persisted immediately.
pub struct ModuleContext<'a> {
    id: &'a str,
    module_type: &'a str,
    enabled: &'a mut bool,
    properties: &'a mut Value,
    storage: &'a dyn Storage,
    bus: &'a Bus,
}

impl<'a> ModuleContext<'a> {
    pub(crate) fn new(
        id: &'a str,
        module_type: &'a str,
        enabled: &'a mut bool,
        properties: &'a mut Value,
        storage: &'a dyn Storage,
        bus: &'a Bus,
    ) -> Self {
        Self {
            id,
            module_type,
            enabled,
            properties,
            storage,
            bus,
        }
    }

    pub fn id(&self) -> &str {
        self.id
    }

    pub fn module_type(&self) -> &str {
        self.module_type
    }

    pub fn properties(&self) -> &Value {
        self.properties
    }

    pub fn properties_mut(&mut self) -> &mut Value {
        self.properties
    }

    /// Property at a JSON pointer (`/tool/api_key`).
    pub fn property(&self, pointer: &str) -> Option<&Value> {
        self.properties.pointer(pointer)
    }

    /// Sets the property at a JSON pointer, creating intermediate objects.
    pub fn set_property(&mut self, pointer: &str, value: Value) {
        set_pointer(self.properties, pointer, value);
    }

    pub fn is_enabled(&self) -> bool {
        *self.enabled
    }

    /// Changes and persists the enabled flag.
    pub fn set_enabled(&mut self, enabled: bool) -> Result<(), StorageError> {
        *self.enabled = enabled;
        self.storage
            .set(&super::enabled_key(self.id), Value::Bool(enabled))
    }

    /// Persists the current properties.
    pub fn save_properties(&self) -> Result<(), StorageError> {
        self.storage
            .set(&super::properties_key(self.id), self.properties.clone())
    }

    pub fn bus(&self) -> &Bus {
        self.bus
    }

    /// Emits an event tagged with this module's id.
    pub fn emit(&self, event: Event) {
        self.bus.emit(event.with_module(self.id));
    }
}

/// Deep-merges `saved` over `base`.
///
/// Objects merge key by key; any other value in `saved` replaces the one in
/// `base`. Keys only present in `saved` are kept.
///
/// # Example
/// ```
/// use serde_json::json;
/// use pagevisor::merge_properties;
///
/// let mut props = json!({ "tool": { "api_key": null, "directory_id": 12 }, "new": true });
/// merge_properties(&mut props, json!({ "tool": { "api_key": "k" }, "old": 1 }));
///
/// assert_eq!(
///     props,
///     json!({ "tool": { "api_key": "k", "directory_id": 12 }, "new": true, "old": 1 })
/// );
/// ```
pub fn merge_properties(base: &mut Value, saved: Value) {
    match (base, saved) {
        (Value::Object(base), Value::Object(saved)) => {
            for (key, value) in saved {
                match base.get_mut(&key) {
                    Some(slot) if slot.is_object() && value.is_object() => {
                        merge_properties(slot, value)
                    }
                    _ => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, saved) => *base = saved,
    }
}

pub(crate) fn set_pointer(root: &mut Value, pointer: &str, value: Value) {
    if pointer.is_empty() {
        *root = value;
        return;
    }
    let mut cur = root;
    let mut parts = pointer
        .trim_start_matches('/')
        .split('/')
        .map(|p| p.replace("~1", "/").replace("~0", "~"))
        .peekable();

    while let Some(part) = parts.next() {
        if !cur.is_object() {
            *cur = Value::Object(Default::default());
        }
        let Value::Object(map) = cur else {
            return;
        };
        if parts.peek().is_none() {
            map.insert(part, value);
            return;
        }
        cur = map.entry(part).or_insert(Value::Null);
    }
}
