//! # Modules and the module registry.
//!
//! - [`Module`]: trait for an optional feature unit with a `load` hook
//! - [`ModuleFn`]: closure-backed module
//! - [`ModuleRef`]: shared module handle (`Arc<dyn Module>`)
//! - [`ModuleSpec`]: module + type + defaults, as registered
//! - [`ModuleContext`]: what a hook may touch
//! - [`ModuleRegistry`]: types, load order, persisted state, the load pass

mod completion;
mod module;
mod registry;

pub use module::{merge_properties, Module, ModuleContext, ModuleFn, ModuleRef, ModuleSpec};
pub use registry::{LoadReport, ModuleRegistry, ModuleState};

pub(crate) use module::set_pointer;

pub(crate) fn enabled_key(id: &str) -> String {
    format!("module.{id}.enabled")
}

pub(crate) fn properties_key(id: &str) -> String {
    format!("module.{id}.properties")
}
